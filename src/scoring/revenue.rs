// src/scoring/revenue.rs

use serde::Serialize;
use utoipa::ToSchema;

use crate::models::{CompetitionLevel, EstimatedRevenue, TechnicalDifficulty, Theme};

/// Share of the annual market a solo product can expect to capture.
const ANNUAL_CAPTURE_RATE: f64 = 0.05;

const CONSERVATIVE_MULTIPLIER: f64 = 0.5;
const REALISTIC_MULTIPLIER: f64 = 1.0;
const OPTIMISTIC_MULTIPLIER: f64 = 1.8;

/// Fraction of the realistic monthly revenue reached in each month after launch.
const RAMP_CURVE: [f64; 12] = [
    0.05, 0.10, 0.18, 0.28, 0.40, 0.52, 0.64, 0.75, 0.84, 0.91, 0.96, 1.0,
];

pub const MILESTONE_MONTHLY_10K: f64 = 10_000.0;
pub const MILESTONE_MONTHLY_100K: f64 = 100_000.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RevenueInput {
    pub market_size: f64,
    pub monetization_score: u8,
    pub competition_level: CompetitionLevel,
    pub technical_difficulty: TechnicalDifficulty,
}

impl From<&Theme> for RevenueInput {
    fn from(theme: &Theme) -> Self {
        Self {
            market_size: theme.market_size,
            monetization_score: theme.monetization_score,
            competition_level: theme.competition_level,
            technical_difficulty: theme.technical_difficulty,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
pub struct RevenueScenarios {
    pub conservative: f64,
    pub realistic: f64,
    pub optimistic: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Milestone {
    pub label: String,
    pub target_monthly: f64,
    /// Months from today; `None` when the ramp never reaches the target.
    pub months: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RevenueProjection {
    pub baseline_monthly: f64,
    pub time_to_market_months: u32,
    pub scenarios: RevenueScenarios,
    pub estimated_revenue: EstimatedRevenue,
    pub milestones: Vec<Milestone>,
}

pub fn competition_multiplier(level: CompetitionLevel) -> f64 {
    match level {
        CompetitionLevel::Low => 1.0,
        CompetitionLevel::Medium => 0.7,
        CompetitionLevel::High => 0.4,
    }
}

pub fn time_to_market_months(difficulty: TechnicalDifficulty) -> u32 {
    match difficulty {
        TechnicalDifficulty::Beginner => 1,
        TechnicalDifficulty::Intermediate => 3,
        TechnicalDifficulty::Advanced => 6,
    }
}

pub fn project_revenue(theme: &Theme) -> RevenueProjection {
    project(&RevenueInput::from(theme))
}

pub fn project(input: &RevenueInput) -> RevenueProjection {
    let market_size = if input.market_size.is_finite() {
        input.market_size.max(0.0)
    } else {
        0.0
    };
    let score = f64::from(input.monetization_score.min(100)) / 100.0;
    let ttm = time_to_market_months(input.technical_difficulty);
    let delay_discount = 1.0 / (1.0 + f64::from(ttm) / 12.0);

    let baseline_monthly = market_size * ANNUAL_CAPTURE_RATE / 12.0
        * score
        * competition_multiplier(input.competition_level)
        * delay_discount;

    let scenarios = RevenueScenarios {
        conservative: baseline_monthly * CONSERVATIVE_MULTIPLIER,
        realistic: baseline_monthly * REALISTIC_MULTIPLIER,
        optimistic: baseline_monthly * OPTIMISTIC_MULTIPLIER,
    };

    let milestones = vec![
        Milestone {
            label: "first_revenue".to_string(),
            target_monthly: 0.0,
            months: months_until(scenarios.realistic, 0.0, ttm),
        },
        Milestone {
            label: "monthly_10k".to_string(),
            target_monthly: MILESTONE_MONTHLY_10K,
            months: months_until(scenarios.realistic, MILESTONE_MONTHLY_10K, ttm),
        },
        Milestone {
            label: "monthly_100k".to_string(),
            target_monthly: MILESTONE_MONTHLY_100K,
            months: months_until(scenarios.realistic, MILESTONE_MONTHLY_100K, ttm),
        },
    ];

    RevenueProjection {
        baseline_monthly,
        time_to_market_months: ttm,
        estimated_revenue: EstimatedRevenue::new(scenarios.conservative, scenarios.optimistic),
        scenarios,
        milestones,
    }
}

/// First month in which the ramped revenue exceeds `target` (or is positive,
/// for a zero target), counted from today and including the build period.
fn months_until(realistic_monthly: f64, target: f64, time_to_market: u32) -> Option<u32> {
    RAMP_CURVE
        .iter()
        .position(|fraction| {
            let revenue = realistic_monthly * fraction;
            if target <= 0.0 {
                revenue > 0.0
            } else {
                revenue >= target
            }
        })
        .map(|idx| time_to_market + idx as u32 + 1)
}

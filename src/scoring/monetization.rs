// src/scoring/monetization.rs

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// The six inputs of the monetization score, each on a 0–100 scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MonetizationFactors {
    pub market_size: f64,
    pub payment_willingness: f64,
    /// Higher means more crowded; inverted before weighting.
    pub competition_level: f64,
    pub revenue_models: f64,
    /// Higher means more expensive; inverted before weighting.
    pub customer_acquisition_cost: f64,
    pub customer_lifetime_value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum Factor {
    MarketSize,
    PaymentWillingness,
    CompetitionLevel,
    RevenueModels,
    CustomerAcquisitionCost,
    CustomerLifetimeValue,
}

impl Factor {
    pub const ALL: [Factor; 6] = [
        Factor::MarketSize,
        Factor::PaymentWillingness,
        Factor::CompetitionLevel,
        Factor::RevenueModels,
        Factor::CustomerAcquisitionCost,
        Factor::CustomerLifetimeValue,
    ];

    pub fn weight(&self) -> f64 {
        match self {
            Factor::MarketSize => 0.25,
            Factor::PaymentWillingness => 0.20,
            Factor::CompetitionLevel => 0.15,
            Factor::RevenueModels => 0.15,
            Factor::CustomerAcquisitionCost => 0.10,
            Factor::CustomerLifetimeValue => 0.15,
        }
    }

    pub fn is_inverted(&self) -> bool {
        matches!(self, Factor::CompetitionLevel | Factor::CustomerAcquisitionCost)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Factor::MarketSize => "marketSize",
            Factor::PaymentWillingness => "paymentWillingness",
            Factor::CompetitionLevel => "competitionLevel",
            Factor::RevenueModels => "revenueModels",
            Factor::CustomerAcquisitionCost => "customerAcquisitionCost",
            Factor::CustomerLifetimeValue => "customerLifetimeValue",
        }
    }
}

impl MonetizationFactors {
    pub fn raw(&self, factor: Factor) -> f64 {
        match factor {
            Factor::MarketSize => self.market_size,
            Factor::PaymentWillingness => self.payment_willingness,
            Factor::CompetitionLevel => self.competition_level,
            Factor::RevenueModels => self.revenue_models,
            Factor::CustomerAcquisitionCost => self.customer_acquisition_cost,
            Factor::CustomerLifetimeValue => self.customer_lifetime_value,
        }
    }

    /// Factor value after clamping to 0–100 and inverting where a higher raw
    /// value hurts monetization.
    pub fn adjusted(&self, factor: Factor) -> f64 {
        let value = clamp_factor(self.raw(factor));
        if factor.is_inverted() {
            100.0 - value
        } else {
            value
        }
    }
}

fn clamp_factor(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FactorContribution {
    pub factor: Factor,
    pub value: f64,
    pub weight: f64,
    pub contribution: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MonetizationScore {
    pub score: u8,
    pub breakdown: Vec<FactorContribution>,
}

impl MonetizationScore {
    pub fn contribution(&self, factor: Factor) -> Option<f64> {
        self.breakdown
            .iter()
            .find(|c| c.factor == factor)
            .map(|c| c.contribution)
    }
}

pub fn calculate_monetization_score(factors: &MonetizationFactors) -> MonetizationScore {
    let breakdown: Vec<FactorContribution> = Factor::ALL
        .iter()
        .map(|&factor| {
            let value = factors.adjusted(factor);
            FactorContribution {
                factor,
                value,
                weight: factor.weight(),
                contribution: value * factor.weight(),
            }
        })
        .collect();

    let total: f64 = breakdown.iter().map(|c| c.contribution).sum();
    let score = total.round().clamp(0.0, 100.0) as u8;

    MonetizationScore { score, breakdown }
}

// src/tier.rs
//
// Subscription tiers and the features they unlock. Every access check goes
// through `Tier::allows` so the ordering lives in one place.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    #[default]
    Free,
    Basic,
    Pro,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Free => "free",
            Tier::Basic => "basic",
            Tier::Pro => "pro",
        }
    }

    pub fn allows(&self, required: Tier) -> bool {
        *self >= required
    }

    pub fn can_use(&self, feature: Feature) -> bool {
        self.allows(feature.required_tier())
    }

    /// How many themes a list request returns, `None` meaning unlimited.
    pub fn theme_list_limit(&self) -> Option<usize> {
        match self {
            Tier::Free => Some(FREE_THEME_LIMIT),
            Tier::Basic | Tier::Pro => None,
        }
    }
}

pub const FREE_THEME_LIMIT: usize = 10;

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free" => Ok(Tier::Free),
            "basic" => Ok(Tier::Basic),
            "pro" => Ok(Tier::Pro),
            other => Err(format!("unknown tier: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feature {
    ThemeBrowse,
    ScoreBreakdown,
    TrendAnalysis,
    CompetitorAnalysis,
    RevenueProjection,
}

impl Feature {
    pub fn required_tier(&self) -> Tier {
        match self {
            Feature::ThemeBrowse | Feature::ScoreBreakdown => Tier::Free,
            Feature::TrendAnalysis | Feature::CompetitorAnalysis => Tier::Basic,
            Feature::RevenueProjection => Tier::Pro,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Feature::ThemeBrowse => "theme_browse",
            Feature::ScoreBreakdown => "score_breakdown",
            Feature::TrendAnalysis => "trend_analysis",
            Feature::CompetitorAnalysis => "competitor_analysis",
            Feature::RevenueProjection => "revenue_projection",
        }
    }
}

// src/models.rs

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::scoring::monetization::MonetizationFactors;
use crate::tier::Tier;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum CompetitionLevel {
    Low,
    Medium,
    High,
}

impl CompetitionLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompetitionLevel::Low => "low",
            CompetitionLevel::Medium => "medium",
            CompetitionLevel::High => "high",
        }
    }
}

impl FromStr for CompetitionLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(CompetitionLevel::Low),
            "medium" => Ok(CompetitionLevel::Medium),
            "high" => Ok(CompetitionLevel::High),
            other => Err(format!("unknown competition level: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TechnicalDifficulty {
    Beginner,
    Intermediate,
    Advanced,
}

impl TechnicalDifficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            TechnicalDifficulty::Beginner => "beginner",
            TechnicalDifficulty::Intermediate => "intermediate",
            TechnicalDifficulty::Advanced => "advanced",
        }
    }
}

impl FromStr for TechnicalDifficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "beginner" => Ok(TechnicalDifficulty::Beginner),
            "intermediate" => Ok(TechnicalDifficulty::Intermediate),
            "advanced" => Ok(TechnicalDifficulty::Advanced),
            other => Err(format!("unknown technical difficulty: {other}")),
        }
    }
}

/// Monthly revenue range in yen. `min <= max` always holds for values built
/// through [`EstimatedRevenue::new`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct EstimatedRevenue {
    pub min: f64,
    pub max: f64,
}

impl EstimatedRevenue {
    pub fn new(a: f64, b: f64) -> Self {
        if a <= b {
            Self { min: a, max: b }
        } else {
            Self { min: b, max: a }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Theme {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub category: String,
    pub monetization_score: u8,
    pub market_size: f64,
    pub competition_level: CompetitionLevel,
    pub technical_difficulty: TechnicalDifficulty,
    pub estimated_revenue: EstimatedRevenue,
    pub data_sources: Vec<String>,
    /// Factor inputs behind `monetization_score`, when the pipeline stored them.
    pub factors: Option<MonetizationFactors>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CompetitorAnalysis {
    pub id: Uuid,
    pub theme_id: Uuid,
    pub competitor_name: String,
    pub competitor_url: Option<String>,
    pub pricing_model: Option<String>,
    pub estimated_revenue: Option<f64>,
    pub user_count: Option<i64>,
    #[serde(default)]
    pub features: Vec<String>,
    pub market_share: Option<f64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DemographicData {
    pub age_groups: BTreeMap<String, f64>,
    pub gender: BTreeMap<String, f64>,
    pub interests: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TrendData {
    pub id: Uuid,
    pub theme_id: Uuid,
    pub keyword: String,
    pub search_volume: i64,
    pub growth_rate: f64,
    pub timestamp: DateTime<Utc>,
    pub source: String,
    pub geographic_data: Option<BTreeMap<String, f64>>,
    pub demographic_data: Option<DemographicData>,
}

/// A historical monetization score for one theme.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScoreSnapshot {
    pub theme_id: Uuid,
    pub score: u8,
    pub factors: Option<MonetizationFactors>,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Trialing,
    PastDue,
    Canceled,
    Incomplete,
    IncompleteExpired,
    Unpaid,
    Paused,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Trialing => "trialing",
            SubscriptionStatus::PastDue => "past_due",
            SubscriptionStatus::Canceled => "canceled",
            SubscriptionStatus::Incomplete => "incomplete",
            SubscriptionStatus::IncompleteExpired => "incomplete_expired",
            SubscriptionStatus::Unpaid => "unpaid",
            SubscriptionStatus::Paused => "paused",
        }
    }

    /// Statuses that grant the subscription's tier.
    pub fn grants_access(&self) -> bool {
        matches!(self, SubscriptionStatus::Active | SubscriptionStatus::Trialing)
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubscriptionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(SubscriptionStatus::Active),
            "trialing" => Ok(SubscriptionStatus::Trialing),
            "past_due" => Ok(SubscriptionStatus::PastDue),
            "canceled" => Ok(SubscriptionStatus::Canceled),
            "incomplete" => Ok(SubscriptionStatus::Incomplete),
            "incomplete_expired" => Ok(SubscriptionStatus::IncompleteExpired),
            "unpaid" => Ok(SubscriptionStatus::Unpaid),
            "paused" => Ok(SubscriptionStatus::Paused),
            other => Err(format!("unknown subscription status: {other}")),
        }
    }
}

/// Mirror of a Stripe subscription. Only webhook handlers write these rows.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Subscription {
    pub id: Uuid,
    pub user_id: Uuid,
    pub stripe_subscription_id: String,
    pub stripe_customer_id: String,
    pub price_id: Option<String>,
    pub tier: Tier,
    pub status: SubscriptionStatus,
    pub current_period_start: Option<DateTime<Utc>>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub cancel_at_period_end: bool,
    pub canceled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Subscription {
    pub fn is_current(&self, now: DateTime<Utc>) -> bool {
        self.status.grants_access()
            && self.current_period_end.map_or(true, |end| end > now)
    }
}

/// Fields a webhook handler writes into the mirror table.
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionUpsert {
    pub user_id: Uuid,
    pub stripe_subscription_id: String,
    pub stripe_customer_id: String,
    pub price_id: Option<String>,
    pub tier: Tier,
    pub status: SubscriptionStatus,
    pub current_period_start: Option<DateTime<Utc>>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub cancel_at_period_end: bool,
    pub canceled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ProcessingJob {
    pub id: Uuid,
    pub operation: String,
    pub status: JobStatus,
    pub requested_by: Option<Uuid>,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

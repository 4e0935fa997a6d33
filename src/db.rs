// src/db.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::{
    CompetitorAnalysis, DemographicData, EstimatedRevenue, JobStatus, ProcessingJob, ScoreSnapshot,
    Subscription, SubscriptionUpsert, Theme, TrendData,
};
use crate::scoring::monetization::MonetizationFactors;
use crate::store::{BillingProfile, JobStore, StoreError, SubscriptionStore, ThemeStore};
use crate::tier::Tier;

const THEME_COLUMNS: &str = r#"id, title, description, category, monetization_score, market_size,
    competition_level, technical_difficulty, estimated_revenue_min, estimated_revenue_max,
    data_sources, factors, created_at, updated_at"#;

const SUBSCRIPTION_COLUMNS: &str = r#"id, user_id, stripe_subscription_id, stripe_customer_id,
    price_id, tier, status, current_period_start, current_period_end, cancel_at_period_end,
    canceled_at, created_at, updated_at"#;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn parse_column<T: std::str::FromStr<Err = String>>(
    table: &'static str,
    value: &str,
) -> Result<T, StoreError> {
    value
        .parse()
        .map_err(|detail| StoreError::Corrupt { table, detail })
}

fn score_from_db(table: &'static str, raw: i16) -> Result<u8, StoreError> {
    u8::try_from(raw)
        .ok()
        .filter(|s| *s <= 100)
        .ok_or_else(|| StoreError::Corrupt {
            table,
            detail: format!("score out of range: {raw}"),
        })
}

fn theme_from_row(r: &PgRow) -> Result<Theme, StoreError> {
    let competition: String = r.try_get("competition_level")?;
    let difficulty: String = r.try_get("technical_difficulty")?;
    let factors: Option<Json<MonetizationFactors>> = r.try_get("factors")?;

    Ok(Theme {
        id: r.try_get("id")?,
        title: r.try_get("title")?,
        description: r.try_get("description")?,
        category: r.try_get("category")?,
        monetization_score: score_from_db("themes", r.try_get("monetization_score")?)?,
        market_size: r.try_get("market_size")?,
        competition_level: parse_column("themes", &competition)?,
        technical_difficulty: parse_column("themes", &difficulty)?,
        estimated_revenue: EstimatedRevenue::new(
            r.try_get("estimated_revenue_min")?,
            r.try_get("estimated_revenue_max")?,
        ),
        data_sources: r.try_get("data_sources")?,
        factors: factors.map(|f| f.0),
        created_at: r.try_get("created_at")?,
        updated_at: r.try_get("updated_at")?,
    })
}

fn subscription_from_row(r: &PgRow) -> Result<Subscription, StoreError> {
    let tier: String = r.try_get("tier")?;
    let status: String = r.try_get("status")?;

    Ok(Subscription {
        id: r.try_get("id")?,
        user_id: r.try_get("user_id")?,
        stripe_subscription_id: r.try_get("stripe_subscription_id")?,
        stripe_customer_id: r.try_get("stripe_customer_id")?,
        price_id: r.try_get("price_id")?,
        tier: parse_column("subscriptions", &tier)?,
        status: parse_column("subscriptions", &status)?,
        current_period_start: r.try_get("current_period_start")?,
        current_period_end: r.try_get("current_period_end")?,
        cancel_at_period_end: r.try_get("cancel_at_period_end")?,
        canceled_at: r.try_get("canceled_at")?,
        created_at: r.try_get("created_at")?,
        updated_at: r.try_get("updated_at")?,
    })
}

fn job_from_row(r: &PgRow) -> Result<ProcessingJob, StoreError> {
    let status: String = r.try_get("status")?;
    let status = match status.as_str() {
        "completed" => JobStatus::Completed,
        "failed" => JobStatus::Failed,
        other => {
            return Err(StoreError::Corrupt {
                table: "processing_jobs",
                detail: format!("unknown job status: {other}"),
            })
        }
    };

    Ok(ProcessingJob {
        id: r.try_get("id")?,
        operation: r.try_get("operation")?,
        status,
        requested_by: r.try_get("requested_by")?,
        result: r.try_get("result")?,
        error: r.try_get("error")?,
        created_at: r.try_get("created_at")?,
    })
}

#[async_trait]
impl ThemeStore for PgStore {
    async fn list_themes(&self, limit: Option<usize>) -> Result<Vec<Theme>, StoreError> {
        let limit = limit.map(|l| l as i64);
        let rows = sqlx::query(&format!(
            r#"SELECT {THEME_COLUMNS}
               FROM themes
               ORDER BY monetization_score DESC, title ASC
               LIMIT $1"#
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(theme_from_row).collect()
    }

    async fn get_theme(&self, id: Uuid) -> Result<Option<Theme>, StoreError> {
        let row = sqlx::query(&format!("SELECT {THEME_COLUMNS} FROM themes WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(theme_from_row).transpose()
    }

    async fn score_history(&self, theme_id: Uuid) -> Result<Vec<ScoreSnapshot>, StoreError> {
        let rows = sqlx::query(
            r#"SELECT theme_id, score, factors, recorded_at
               FROM theme_score_history
               WHERE theme_id = $1
               ORDER BY recorded_at ASC"#,
        )
        .bind(theme_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|r| -> Result<ScoreSnapshot, StoreError> {
                let factors: Option<Json<MonetizationFactors>> = r.try_get("factors")?;
                Ok(ScoreSnapshot {
                    theme_id: r.try_get("theme_id")?,
                    score: score_from_db("theme_score_history", r.try_get("score")?)?,
                    factors: factors.map(|f| f.0),
                    recorded_at: r.try_get("recorded_at")?,
                })
            })
            .collect()
    }

    async fn competitors(&self, theme_id: Uuid) -> Result<Vec<CompetitorAnalysis>, StoreError> {
        let rows = sqlx::query(
            r#"SELECT id, theme_id, competitor_name, competitor_url, pricing_model,
                      estimated_revenue, user_count, features, market_share, created_at
               FROM competitor_analysis
               WHERE theme_id = $1
               ORDER BY competitor_name ASC"#,
        )
        .bind(theme_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|r| -> Result<CompetitorAnalysis, StoreError> {
                let features: Option<Vec<String>> = r.try_get("features")?;
                Ok(CompetitorAnalysis {
                    id: r.try_get("id")?,
                    theme_id: r.try_get("theme_id")?,
                    competitor_name: r.try_get("competitor_name")?,
                    competitor_url: r.try_get("competitor_url")?,
                    pricing_model: r.try_get("pricing_model")?,
                    estimated_revenue: r.try_get("estimated_revenue")?,
                    user_count: r.try_get("user_count")?,
                    features: features.unwrap_or_default(),
                    market_share: r.try_get("market_share")?,
                    created_at: r.try_get("created_at")?,
                })
            })
            .collect()
    }

    async fn trend_data(&self, theme_id: Uuid) -> Result<Vec<TrendData>, StoreError> {
        let rows = sqlx::query(
            r#"SELECT id, theme_id, keyword, search_volume, growth_rate, timestamp, source,
                      geographic_data, demographic_data
               FROM trend_data
               WHERE theme_id = $1
               ORDER BY timestamp ASC"#,
        )
        .bind(theme_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|r| -> Result<TrendData, StoreError> {
                let geographic: Option<Json<std::collections::BTreeMap<String, f64>>> =
                    r.try_get("geographic_data")?;
                let demographic: Option<Json<DemographicData>> = r.try_get("demographic_data")?;
                Ok(TrendData {
                    id: r.try_get("id")?,
                    theme_id: r.try_get("theme_id")?,
                    keyword: r.try_get("keyword")?,
                    search_volume: r.try_get("search_volume")?,
                    growth_rate: r.try_get("growth_rate")?,
                    timestamp: r.try_get("timestamp")?,
                    source: r.try_get("source")?,
                    geographic_data: geographic.map(|g| g.0),
                    demographic_data: demographic.map(|d| d.0),
                })
            })
            .collect()
    }
}

#[async_trait]
impl SubscriptionStore for PgStore {
    async fn upsert_subscription(
        &self,
        sub: &SubscriptionUpsert,
    ) -> Result<Subscription, StoreError> {
        let row = sqlx::query(&format!(
            r#"INSERT INTO subscriptions
                    (id, user_id, stripe_subscription_id, stripe_customer_id, price_id, tier, status,
                     current_period_start, current_period_end, cancel_at_period_end, canceled_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
               ON CONFLICT (stripe_subscription_id)
               DO UPDATE SET
                   user_id = EXCLUDED.user_id,
                   stripe_customer_id = EXCLUDED.stripe_customer_id,
                   price_id = EXCLUDED.price_id,
                   tier = EXCLUDED.tier,
                   status = EXCLUDED.status,
                   current_period_start = EXCLUDED.current_period_start,
                   current_period_end = EXCLUDED.current_period_end,
                   cancel_at_period_end = EXCLUDED.cancel_at_period_end,
                   canceled_at = EXCLUDED.canceled_at,
                   updated_at = NOW()
               RETURNING {SUBSCRIPTION_COLUMNS}"#
        ))
        .bind(Uuid::new_v4())
        .bind(sub.user_id)
        .bind(&sub.stripe_subscription_id)
        .bind(&sub.stripe_customer_id)
        .bind(sub.price_id.as_deref())
        .bind(sub.tier.as_str())
        .bind(sub.status.as_str())
        .bind(sub.current_period_start)
        .bind(sub.current_period_end)
        .bind(sub.cancel_at_period_end)
        .bind(sub.canceled_at)
        .fetch_one(&self.pool)
        .await?;

        sqlx::query(
            r#"INSERT INTO billing_profiles (user_id, stripe_customer_id)
               VALUES ($1, $2)
               ON CONFLICT (user_id)
               DO UPDATE SET stripe_customer_id = COALESCE(billing_profiles.stripe_customer_id, EXCLUDED.stripe_customer_id)"#,
        )
        .bind(sub.user_id)
        .bind(&sub.stripe_customer_id)
        .execute(&self.pool)
        .await?;

        subscription_from_row(&row)
    }

    async fn find_by_stripe_id(
        &self,
        stripe_subscription_id: &str,
    ) -> Result<Option<Subscription>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE stripe_subscription_id = $1"
        ))
        .bind(stripe_subscription_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(subscription_from_row).transpose()
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Subscription>, StoreError> {
        let rows = sqlx::query(&format!(
            r#"SELECT {SUBSCRIPTION_COLUMNS}
               FROM subscriptions
               WHERE user_id = $1
               ORDER BY created_at DESC"#
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(subscription_from_row).collect()
    }

    async fn billing_profile(&self, user_id: Uuid) -> Result<Option<BillingProfile>, StoreError> {
        let row = sqlx::query(
            r#"SELECT user_id, stripe_customer_id, subscription_tier
               FROM billing_profiles
               WHERE user_id = $1"#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| -> Result<BillingProfile, StoreError> {
            let tier: String = r.try_get("subscription_tier")?;
            Ok(BillingProfile {
                user_id: r.try_get("user_id")?,
                stripe_customer_id: r.try_get("stripe_customer_id")?,
                tier: parse_column("billing_profiles", &tier)?,
            })
        })
        .transpose()
    }

    async fn set_customer_id(&self, user_id: Uuid, customer_id: &str) -> Result<(), StoreError> {
        sqlx::query(
            r#"INSERT INTO billing_profiles (user_id, stripe_customer_id)
               VALUES ($1, $2)
               ON CONFLICT (user_id)
               DO UPDATE SET stripe_customer_id = EXCLUDED.stripe_customer_id, updated_at = NOW()"#,
        )
        .bind(user_id)
        .bind(customer_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn user_for_customer(&self, customer_id: &str) -> Result<Option<Uuid>, StoreError> {
        let row = sqlx::query("SELECT user_id FROM billing_profiles WHERE stripe_customer_id = $1")
            .bind(customer_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| r.try_get("user_id")).transpose()?)
    }

    async fn set_tier(&self, user_id: Uuid, tier: Tier) -> Result<(), StoreError> {
        sqlx::query(
            r#"INSERT INTO billing_profiles (user_id, subscription_tier)
               VALUES ($1, $2)
               ON CONFLICT (user_id)
               DO UPDATE SET subscription_tier = EXCLUDED.subscription_tier, updated_at = NOW()"#,
        )
        .bind(user_id)
        .bind(tier.as_str())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn event_seen(&self, event_id: &str) -> Result<bool, StoreError> {
        let row = sqlx::query("SELECT 1 AS seen FROM stripe_events WHERE event_id = $1")
            .bind(event_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.is_some())
    }

    async fn mark_event(&self, event_id: &str, event_type: &str) -> Result<(), StoreError> {
        sqlx::query(
            r#"INSERT INTO stripe_events (event_id, event_type)
               VALUES ($1, $2)
               ON CONFLICT (event_id) DO NOTHING"#,
        )
        .bind(event_id)
        .bind(event_type)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl JobStore for PgStore {
    async fn record_job(&self, job: &ProcessingJob) -> Result<(), StoreError> {
        sqlx::query(
            r#"INSERT INTO processing_jobs (id, operation, status, requested_by, result, error, created_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7)"#,
        )
        .bind(job.id)
        .bind(&job.operation)
        .bind(job.status.as_str())
        .bind(job.requested_by)
        .bind(job.result.as_ref())
        .bind(job.error.as_deref())
        .bind(job.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn recent_jobs(&self, limit: usize) -> Result<Vec<ProcessingJob>, StoreError> {
        let rows = sqlx::query(
            r#"SELECT id, operation, status, requested_by, result, error, created_at
               FROM processing_jobs
               ORDER BY created_at DESC
               LIMIT $1"#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(job_from_row).collect()
    }

    async fn last_update(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        let row = sqlx::query(
            "SELECT MAX(created_at) AS last_update FROM processing_jobs WHERE status = 'completed'",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(row.try_get("last_update")?)
    }
}

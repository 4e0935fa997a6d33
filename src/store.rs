// src/store.rs
//
// Persistence seams. `db::PgStore` is the production implementation; the
// in-memory `MemoryStore` backs local runs without DATABASE_URL and the tests.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    CompetitorAnalysis, JobStatus, ProcessingJob, ScoreSnapshot, Subscription, SubscriptionUpsert,
    Theme, TrendData,
};
use crate::tier::Tier;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("corrupt row in {table}: {detail}")]
    Corrupt { table: &'static str, detail: String },
}

/// Per-user billing state kept next to the subscription mirror.
#[derive(Debug, Clone, PartialEq)]
pub struct BillingProfile {
    pub user_id: Uuid,
    pub stripe_customer_id: Option<String>,
    pub tier: Tier,
}

#[async_trait]
pub trait ThemeStore: Send + Sync {
    async fn list_themes(&self, limit: Option<usize>) -> Result<Vec<Theme>, StoreError>;
    async fn get_theme(&self, id: Uuid) -> Result<Option<Theme>, StoreError>;
    /// Snapshots for one theme, oldest first.
    async fn score_history(&self, theme_id: Uuid) -> Result<Vec<ScoreSnapshot>, StoreError>;
    async fn competitors(&self, theme_id: Uuid) -> Result<Vec<CompetitorAnalysis>, StoreError>;
    async fn trend_data(&self, theme_id: Uuid) -> Result<Vec<TrendData>, StoreError>;
}

#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Inserts or updates the mirror row keyed by the Stripe subscription id.
    async fn upsert_subscription(
        &self,
        sub: &SubscriptionUpsert,
    ) -> Result<Subscription, StoreError>;
    async fn find_by_stripe_id(
        &self,
        stripe_subscription_id: &str,
    ) -> Result<Option<Subscription>, StoreError>;
    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Subscription>, StoreError>;

    async fn billing_profile(&self, user_id: Uuid) -> Result<Option<BillingProfile>, StoreError>;
    async fn set_customer_id(&self, user_id: Uuid, customer_id: &str) -> Result<(), StoreError>;
    async fn user_for_customer(&self, customer_id: &str) -> Result<Option<Uuid>, StoreError>;
    async fn set_tier(&self, user_id: Uuid, tier: Tier) -> Result<(), StoreError>;

    async fn event_seen(&self, event_id: &str) -> Result<bool, StoreError>;
    async fn mark_event(&self, event_id: &str, event_type: &str) -> Result<(), StoreError>;
}

#[async_trait]
pub trait JobStore: Send + Sync {
    async fn record_job(&self, job: &ProcessingJob) -> Result<(), StoreError>;
    /// Newest first.
    async fn recent_jobs(&self, limit: usize) -> Result<Vec<ProcessingJob>, StoreError>;
    /// Time of the most recent completed job.
    async fn last_update(&self) -> Result<Option<DateTime<Utc>>, StoreError>;
}

#[derive(Default)]
struct MemoryState {
    themes: Vec<Theme>,
    snapshots: Vec<ScoreSnapshot>,
    competitors: Vec<CompetitorAnalysis>,
    trends: Vec<TrendData>,
    subscriptions: HashMap<String, Subscription>,
    profiles: HashMap<Uuid, BillingProfile>,
    events: HashSet<String>,
    jobs: Vec<ProcessingJob>,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn insert_theme(&self, theme: Theme) {
        self.state().themes.push(theme);
    }

    pub fn insert_snapshot(&self, snapshot: ScoreSnapshot) {
        self.state().snapshots.push(snapshot);
    }

    pub fn insert_competitor(&self, competitor: CompetitorAnalysis) {
        self.state().competitors.push(competitor);
    }

    pub fn insert_trend(&self, trend: TrendData) {
        self.state().trends.push(trend);
    }

    pub fn subscription_count(&self) -> usize {
        self.state().subscriptions.len()
    }

    fn profile_mut(state: &mut MemoryState, user_id: Uuid) -> &mut BillingProfile {
        state.profiles.entry(user_id).or_insert_with(|| BillingProfile {
            user_id,
            stripe_customer_id: None,
            tier: Tier::Free,
        })
    }
}

#[async_trait]
impl ThemeStore for MemoryStore {
    async fn list_themes(&self, limit: Option<usize>) -> Result<Vec<Theme>, StoreError> {
        let mut themes = self.state().themes.clone();
        themes.sort_by(|a, b| {
            b.monetization_score
                .cmp(&a.monetization_score)
                .then_with(|| a.title.cmp(&b.title))
        });
        if let Some(limit) = limit {
            themes.truncate(limit);
        }
        Ok(themes)
    }

    async fn get_theme(&self, id: Uuid) -> Result<Option<Theme>, StoreError> {
        Ok(self.state().themes.iter().find(|t| t.id == id).cloned())
    }

    async fn score_history(&self, theme_id: Uuid) -> Result<Vec<ScoreSnapshot>, StoreError> {
        let mut history: Vec<ScoreSnapshot> = self
            .state()
            .snapshots
            .iter()
            .filter(|s| s.theme_id == theme_id)
            .cloned()
            .collect();
        history.sort_by_key(|s| s.recorded_at);
        Ok(history)
    }

    async fn competitors(&self, theme_id: Uuid) -> Result<Vec<CompetitorAnalysis>, StoreError> {
        Ok(self
            .state()
            .competitors
            .iter()
            .filter(|c| c.theme_id == theme_id)
            .cloned()
            .collect())
    }

    async fn trend_data(&self, theme_id: Uuid) -> Result<Vec<TrendData>, StoreError> {
        let mut trends: Vec<TrendData> = self
            .state()
            .trends
            .iter()
            .filter(|t| t.theme_id == theme_id)
            .cloned()
            .collect();
        trends.sort_by_key(|t| t.timestamp);
        Ok(trends)
    }
}

#[async_trait]
impl SubscriptionStore for MemoryStore {
    async fn upsert_subscription(
        &self,
        sub: &SubscriptionUpsert,
    ) -> Result<Subscription, StoreError> {
        let now = Utc::now();
        let mut state = self.state();
        let row = state
            .subscriptions
            .entry(sub.stripe_subscription_id.clone())
            .and_modify(|existing| {
                existing.user_id = sub.user_id;
                existing.stripe_customer_id = sub.stripe_customer_id.clone();
                existing.price_id = sub.price_id.clone();
                existing.tier = sub.tier;
                existing.status = sub.status;
                existing.current_period_start = sub.current_period_start;
                existing.current_period_end = sub.current_period_end;
                existing.cancel_at_period_end = sub.cancel_at_period_end;
                existing.canceled_at = sub.canceled_at;
                existing.updated_at = now;
            })
            .or_insert_with(|| Subscription {
                id: Uuid::new_v4(),
                user_id: sub.user_id,
                stripe_subscription_id: sub.stripe_subscription_id.clone(),
                stripe_customer_id: sub.stripe_customer_id.clone(),
                price_id: sub.price_id.clone(),
                tier: sub.tier,
                status: sub.status,
                current_period_start: sub.current_period_start,
                current_period_end: sub.current_period_end,
                cancel_at_period_end: sub.cancel_at_period_end,
                canceled_at: sub.canceled_at,
                created_at: now,
                updated_at: now,
            })
            .clone();

        let profile = Self::profile_mut(&mut state, sub.user_id);
        if profile.stripe_customer_id.is_none() {
            profile.stripe_customer_id = Some(sub.stripe_customer_id.clone());
        }
        Ok(row)
    }

    async fn find_by_stripe_id(
        &self,
        stripe_subscription_id: &str,
    ) -> Result<Option<Subscription>, StoreError> {
        Ok(self.state().subscriptions.get(stripe_subscription_id).cloned())
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Subscription>, StoreError> {
        let mut subs: Vec<Subscription> = self
            .state()
            .subscriptions
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        subs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(subs)
    }

    async fn billing_profile(&self, user_id: Uuid) -> Result<Option<BillingProfile>, StoreError> {
        Ok(self.state().profiles.get(&user_id).cloned())
    }

    async fn set_customer_id(&self, user_id: Uuid, customer_id: &str) -> Result<(), StoreError> {
        let mut state = self.state();
        Self::profile_mut(&mut state, user_id).stripe_customer_id = Some(customer_id.to_string());
        Ok(())
    }

    async fn user_for_customer(&self, customer_id: &str) -> Result<Option<Uuid>, StoreError> {
        Ok(self
            .state()
            .profiles
            .values()
            .find(|p| p.stripe_customer_id.as_deref() == Some(customer_id))
            .map(|p| p.user_id))
    }

    async fn set_tier(&self, user_id: Uuid, tier: Tier) -> Result<(), StoreError> {
        let mut state = self.state();
        Self::profile_mut(&mut state, user_id).tier = tier;
        Ok(())
    }

    async fn event_seen(&self, event_id: &str) -> Result<bool, StoreError> {
        Ok(self.state().events.contains(event_id))
    }

    async fn mark_event(&self, event_id: &str, _event_type: &str) -> Result<(), StoreError> {
        self.state().events.insert(event_id.to_string());
        Ok(())
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn record_job(&self, job: &ProcessingJob) -> Result<(), StoreError> {
        self.state().jobs.push(job.clone());
        Ok(())
    }

    async fn recent_jobs(&self, limit: usize) -> Result<Vec<ProcessingJob>, StoreError> {
        let mut jobs = self.state().jobs.clone();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        jobs.truncate(limit);
        Ok(jobs)
    }

    async fn last_update(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        Ok(self
            .state()
            .jobs
            .iter()
            .filter(|j| j.status == JobStatus::Completed)
            .map(|j| j.created_at)
            .max())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SubscriptionStatus;

    fn upsert(user_id: Uuid, status: SubscriptionStatus) -> SubscriptionUpsert {
        SubscriptionUpsert {
            user_id,
            stripe_subscription_id: "sub_123".to_string(),
            stripe_customer_id: "cus_123".to_string(),
            price_id: Some("price_basic".to_string()),
            tier: Tier::Basic,
            status,
            current_period_start: None,
            current_period_end: None,
            cancel_at_period_end: false,
            canceled_at: None,
        }
    }

    #[tokio::test]
    async fn upsert_updates_in_place() {
        let store = MemoryStore::new();
        let user_id = Uuid::new_v4();

        let first = store
            .upsert_subscription(&upsert(user_id, SubscriptionStatus::Active))
            .await
            .unwrap();
        let second = store
            .upsert_subscription(&upsert(user_id, SubscriptionStatus::PastDue))
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.status, SubscriptionStatus::PastDue);
        assert_eq!(store.subscription_count(), 1);
        assert_eq!(store.user_for_customer("cus_123").await.unwrap(), Some(user_id));
    }

    #[tokio::test]
    async fn last_update_ignores_failed_jobs() {
        let store = MemoryStore::new();
        let failed = ProcessingJob {
            id: Uuid::new_v4(),
            operation: "normalize".to_string(),
            status: JobStatus::Failed,
            requested_by: None,
            result: None,
            error: Some("boom".to_string()),
            created_at: Utc::now(),
        };
        store.record_job(&failed).await.unwrap();
        assert_eq!(store.last_update().await.unwrap(), None);
        assert_eq!(store.recent_jobs(10).await.unwrap().len(), 1);
    }
}

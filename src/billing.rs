// src/billing.rs

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::Subscription;
use crate::store::{StoreError, SubscriptionStore};
use crate::tier::Tier;

/// Highest tier among the subscriptions that currently grant access.
pub fn effective_tier(subscriptions: &[Subscription], now: DateTime<Utc>) -> Tier {
    subscriptions
        .iter()
        .filter(|s| s.is_current(now))
        .map(|s| s.tier)
        .max()
        .unwrap_or(Tier::Free)
}

/// Recomputes the user's tier from the mirror table and stores it on the
/// billing profile. Called after every webhook write.
pub async fn refresh_user_tier(
    store: &dyn SubscriptionStore,
    user_id: Uuid,
) -> Result<Tier, StoreError> {
    let subscriptions = store.list_for_user(user_id).await?;
    let tier = effective_tier(&subscriptions, Utc::now());
    store.set_tier(user_id, tier).await?;
    log::info!("tier refreshed user_id={} tier={}", user_id, tier);
    Ok(tier)
}

/// The tier a request is served at. Users without a profile are free.
pub async fn current_tier(store: &dyn SubscriptionStore, user_id: Uuid) -> Result<Tier, StoreError> {
    Ok(store
        .billing_profile(user_id)
        .await?
        .map(|p| p.tier)
        .unwrap_or_default())
}

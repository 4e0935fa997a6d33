// src/api/webhooks_stripe.rs

use actix_web::{post, web, HttpRequest, HttpResponse};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use uuid::Uuid;

use crate::api::stripe::{verify_signature, SignatureError, DEFAULT_TOLERANCE_SECS};
use crate::api::stripe_client::{StripeError, StripeSubscription};
use crate::billing;
use crate::error::{ApiError, ApiResult};
use crate::models::{SubscriptionStatus, SubscriptionUpsert};
use crate::store::StoreError;
use crate::tier::Tier;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct StripeEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: EventData,
}

#[derive(Debug, Deserialize)]
pub struct EventData {
    pub object: Value,
}

#[derive(Debug, Error)]
enum WebhookError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Stripe(#[from] StripeError),

    #[error("unexpected payload: {0}")]
    Payload(String),

    #[error("no user for stripe customer {0}")]
    UnknownUser(String),
}

#[derive(Debug, Deserialize)]
struct CheckoutSessionObject {
    #[serde(default)]
    mode: Option<String>,
    #[serde(default)]
    subscription: Option<String>,
    #[serde(default)]
    client_reference_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InvoiceObject {
    #[serde(default)]
    subscription: Option<String>,
    #[serde(default)]
    parent: Option<InvoiceParent>,
}

// Newer API versions report the subscription under `parent`.
#[derive(Debug, Deserialize)]
struct InvoiceParent {
    #[serde(default)]
    subscription_details: Option<InvoiceSubscriptionDetails>,
}

#[derive(Debug, Deserialize)]
struct InvoiceSubscriptionDetails {
    #[serde(default)]
    subscription: Option<String>,
}

impl InvoiceObject {
    fn subscription_id(self) -> Option<String> {
        self.subscription.or_else(|| {
            self.parent
                .and_then(|p| p.subscription_details)
                .and_then(|d| d.subscription)
        })
    }
}

fn decode<T: serde::de::DeserializeOwned>(object: Value) -> Result<T, WebhookError> {
    serde_json::from_value(object).map_err(|e| WebhookError::Payload(e.to_string()))
}

/// Writes Stripe's view of a subscription into the mirror table and returns
/// the owning user.
async fn mirror_subscription(
    state: &AppState,
    sub: &StripeSubscription,
    fallback_user: Option<Uuid>,
) -> Result<Uuid, WebhookError> {
    let user_id = match sub.user_id().or(fallback_user) {
        Some(id) => id,
        None => state
            .subscriptions
            .user_for_customer(&sub.customer)
            .await?
            .ok_or_else(|| WebhookError::UnknownUser(sub.customer.clone()))?,
    };

    let status: SubscriptionStatus = sub.status.parse().map_err(WebhookError::Payload)?;
    let price_id = sub.price_id().map(str::to_string);
    let tier = match price_id.as_deref().and_then(|p| state.prices.tier_for(p)) {
        Some(tier) => tier,
        None => {
            log::warn!(
                "stripe subscription with unknown price subscription_id={} price_id={:?}",
                sub.id,
                price_id
            );
            Tier::Free
        }
    };

    let row = state
        .subscriptions
        .upsert_subscription(&SubscriptionUpsert {
            user_id,
            stripe_subscription_id: sub.id.clone(),
            stripe_customer_id: sub.customer.clone(),
            price_id,
            tier,
            status,
            current_period_start: sub.period_start(),
            current_period_end: sub.period_end(),
            cancel_at_period_end: sub.cancel_at_period_end,
            canceled_at: sub.canceled_at(),
        })
        .await?;

    log::info!(
        "subscription mirrored user_id={} subscription_id={} status={} tier={}",
        row.user_id,
        row.stripe_subscription_id,
        row.status,
        row.tier
    );
    Ok(row.user_id)
}

/// Applies one event. Returns the user whose tier needs recomputing, if any.
async fn handle_event(state: &AppState, event: StripeEvent) -> Result<Option<Uuid>, WebhookError> {
    match event.event_type.as_str() {
        "checkout.session.completed" => {
            let session: CheckoutSessionObject = decode(event.data.object)?;
            if session.mode.as_deref() != Some("subscription") {
                return Ok(None);
            }
            let Some(subscription_id) = session.subscription else {
                return Ok(None);
            };
            let fallback = session
                .client_reference_id
                .as_deref()
                .and_then(|id| id.parse().ok());

            let sub = state.stripe.retrieve_subscription(&subscription_id).await?;
            mirror_subscription(state, &sub, fallback).await.map(Some)
        }
        "customer.subscription.created"
        | "customer.subscription.updated"
        | "customer.subscription.deleted" => {
            let sub: StripeSubscription = decode(event.data.object)?;
            mirror_subscription(state, &sub, None).await.map(Some)
        }
        // Events can arrive out of order, so the invoice only says which
        // subscription to re-read. Its status comes from Stripe.
        "invoice.payment_succeeded" | "invoice.payment_failed" => {
            let invoice: InvoiceObject = decode(event.data.object)?;
            let Some(subscription_id) = invoice.subscription_id() else {
                return Ok(None);
            };

            let sub = state.stripe.retrieve_subscription(&subscription_id).await?;
            mirror_subscription(state, &sub, None).await.map(Some)
        }
        other => {
            log::debug!("stripe event ignored type={}", other);
            Ok(None)
        }
    }
}

#[post("/api/webhooks/stripe")]
pub async fn stripe_webhook(
    req: HttpRequest,
    body: web::Bytes,
    state: web::Data<AppState>,
) -> ApiResult<HttpResponse> {
    let Some(header) = req
        .headers()
        .get("Stripe-Signature")
        .and_then(|h| h.to_str().ok())
    else {
        log::warn!("stripe webhook rejected: {}", SignatureError::MissingHeader);
        return Err(ApiError::invalid(
            "Stripe-Signature",
            SignatureError::MissingHeader.to_string(),
        ));
    };
    if let Err(e) = verify_signature(
        header,
        &body,
        &state.stripe_webhook_secret,
        Utc::now().timestamp(),
        DEFAULT_TOLERANCE_SECS,
    ) {
        log::warn!("stripe webhook rejected: {e}");
        return Err(ApiError::invalid("Stripe-Signature", e.to_string()));
    }

    let event: StripeEvent = serde_json::from_slice(&body)
        .map_err(|e| ApiError::invalid("body", format!("not a stripe event: {e}")))?;

    if state.subscriptions.event_seen(&event.id).await? {
        log::info!("stripe event replay ignored event_id={}", event.id);
        return Ok(HttpResponse::Ok().json(json!({"received": true, "duplicate": true})));
    }

    let event_id = event.id.clone();
    let event_type = event.event_type.clone();

    match handle_event(&state, event).await {
        Ok(user) => {
            if let Some(user_id) = user {
                if let Err(e) =
                    billing::refresh_user_tier(state.subscriptions.as_ref(), user_id).await
                {
                    log::error!("tier refresh error user_id={} error={}", user_id, e);
                    return Ok(HttpResponse::Ok().json(json!({"received": true})));
                }
            }
            if let Err(e) = state.subscriptions.mark_event(&event_id, &event_type).await {
                log::error!("mark stripe event error event_id={} error={}", event_id, e);
            }
        }
        // Left unmarked so a manual resend from the dashboard is processed.
        Err(e) => {
            log::error!(
                "stripe event handler error event_id={} type={} error={}",
                event_id,
                event_type,
                e
            );
        }
    }

    Ok(HttpResponse::Ok().json(json!({"received": true})))
}

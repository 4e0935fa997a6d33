// src/api/subscriptions.rs
//
// Subscription management for the signed-in user. These routes only talk to
// Stripe; the mirror table is written by the webhook when Stripe reports the
// change back.

use actix_web::{get, post, web, HttpResponse};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::api::auth::AuthUser;
use crate::api::stripe_client::CheckoutParams;
use crate::billing;
use crate::error::{ApiError, ApiResult};
use crate::models::Subscription;
use crate::tier::Tier;
use crate::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct SubscriptionsResponse {
    pub tier: Tier,
    pub subscriptions: Vec<Subscription>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CheckoutRequest {
    /// `basic` or `pro`.
    pub tier: String,
    pub success_url: Option<String>,
    pub cancel_url: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CheckoutResponse {
    pub session_id: String,
    pub url: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SubscriptionAction {
    /// Stripe subscription id (`sub_...`).
    pub subscription_id: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SubscriptionActionResponse {
    pub subscription_id: String,
    pub status: String,
    pub cancel_at_period_end: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PortalResponse {
    pub url: String,
}

#[utoipa::path(
    get,
    path = "/api/subscriptions",
    tag = "subscriptions",
    responses(
        (status = 200, description = "Mirrored subscriptions and current tier", body = SubscriptionsResponse),
        (status = 401, description = "Missing or invalid session")
    )
)]
#[get("/subscriptions")]
pub async fn list_subscriptions(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
) -> ApiResult<HttpResponse> {
    let subscriptions = state.subscriptions.list_for_user(user.id).await?;
    let tier = billing::current_tier(state.subscriptions.as_ref(), user.id).await?;

    Ok(HttpResponse::Ok().json(SubscriptionsResponse {
        tier,
        subscriptions,
    }))
}

fn same_origin(url: &Url, base: &Url) -> bool {
    url.scheme() == base.scheme()
        && url.host_str() == base.host_str()
        && url.port_or_known_default() == base.port_or_known_default()
        && url.username().is_empty()
        && url.password().is_none()
}

/// Redirect targets must stay on the app's own origin.
fn redirect_url(
    state: &AppState,
    field: &str,
    requested: Option<String>,
    default_path: &str,
) -> ApiResult<String> {
    let Some(requested) = requested else {
        return Ok(format!("{}{}", state.app_base_url, default_path));
    };
    let allowed = match (Url::parse(&requested), Url::parse(&state.app_base_url)) {
        (Ok(url), Ok(base)) => same_origin(&url, &base),
        _ => false,
    };
    if allowed {
        Ok(requested)
    } else {
        Err(ApiError::invalid(
            field,
            format!("must be a url on {}", state.app_base_url),
        ))
    }
}

#[utoipa::path(
    post,
    path = "/api/subscriptions/checkout",
    tag = "subscriptions",
    request_body = CheckoutRequest,
    responses(
        (status = 200, description = "Checkout session created", body = CheckoutResponse),
        (status = 400, description = "Unknown tier or foreign redirect"),
        (status = 401, description = "Missing or invalid session"),
        (status = 500, description = "Stripe failure")
    )
)]
#[post("/subscriptions/checkout")]
pub async fn create_checkout(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    body: web::Json<CheckoutRequest>,
) -> ApiResult<HttpResponse> {
    let body = body.into_inner();
    let tier: Tier = body
        .tier
        .parse()
        .map_err(|e: String| ApiError::invalid("tier", e))?;
    let price_id = state
        .prices
        .price_for(tier)
        .ok_or_else(|| ApiError::invalid("tier", "must be a paid tier"))?
        .to_string();
    let success_url = redirect_url(
        &state,
        "success_url",
        body.success_url,
        "/billing?checkout=success",
    )?;
    let cancel_url = redirect_url(&state, "cancel_url", body.cancel_url, "/pricing")?;

    let existing = state
        .subscriptions
        .billing_profile(user.id)
        .await?
        .and_then(|p| p.stripe_customer_id);
    let customer_id = match existing {
        Some(id) => id,
        None => {
            let customer = state
                .stripe
                .create_customer(user.email.as_deref(), user.id)
                .await?;
            state
                .subscriptions
                .set_customer_id(user.id, &customer.id)
                .await?;
            log::info!(
                "stripe customer created user_id={} customer_id={}",
                user.id,
                customer.id
            );
            customer.id
        }
    };

    let session = state
        .stripe
        .create_checkout_session(CheckoutParams {
            customer_id: &customer_id,
            price_id: &price_id,
            user_id: user.id,
            success_url: &success_url,
            cancel_url: &cancel_url,
        })
        .await?;

    log::info!(
        "checkout session created user_id={} tier={} session_id={}",
        user.id,
        tier,
        session.id
    );

    Ok(HttpResponse::Ok().json(CheckoutResponse {
        session_id: session.id,
        url: session.url,
    }))
}

/// Resolves a Stripe subscription id the caller owns. Someone else's
/// subscription is reported as missing.
async fn owned_subscription(
    state: &AppState,
    user: &AuthUser,
    action: &SubscriptionAction,
) -> ApiResult<Subscription> {
    if action.subscription_id.trim().is_empty() {
        return Err(ApiError::invalid("subscription_id", "is required"));
    }

    match state
        .subscriptions
        .find_by_stripe_id(&action.subscription_id)
        .await?
    {
        Some(sub) if sub.user_id == user.id => Ok(sub),
        _ => Err(ApiError::NotFound("subscription")),
    }
}

async fn set_cancel_flag(
    state: &AppState,
    user: &AuthUser,
    action: &SubscriptionAction,
    cancel: bool,
) -> ApiResult<HttpResponse> {
    let sub = owned_subscription(state, user, action).await?;
    let updated = state
        .stripe
        .set_cancel_at_period_end(&sub.stripe_subscription_id, cancel)
        .await?;

    log::info!(
        "subscription cancel_at_period_end={} user_id={} subscription_id={}",
        cancel,
        user.id,
        updated.id
    );

    Ok(HttpResponse::Ok().json(SubscriptionActionResponse {
        subscription_id: updated.id,
        status: updated.status,
        cancel_at_period_end: updated.cancel_at_period_end,
    }))
}

#[utoipa::path(
    post,
    path = "/api/subscriptions/cancel",
    tag = "subscriptions",
    request_body = SubscriptionAction,
    responses(
        (status = 200, description = "Cancels at period end", body = SubscriptionActionResponse),
        (status = 401, description = "Missing or invalid session"),
        (status = 404, description = "Not the caller's subscription")
    )
)]
#[post("/subscriptions/cancel")]
pub async fn cancel_subscription(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    body: web::Json<SubscriptionAction>,
) -> ApiResult<HttpResponse> {
    set_cancel_flag(&state, &user, &body, true).await
}

#[utoipa::path(
    post,
    path = "/api/subscriptions/reactivate",
    tag = "subscriptions",
    request_body = SubscriptionAction,
    responses(
        (status = 200, description = "Pending cancellation cleared", body = SubscriptionActionResponse),
        (status = 401, description = "Missing or invalid session"),
        (status = 404, description = "Not the caller's subscription")
    )
)]
#[post("/subscriptions/reactivate")]
pub async fn reactivate_subscription(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    body: web::Json<SubscriptionAction>,
) -> ApiResult<HttpResponse> {
    set_cancel_flag(&state, &user, &body, false).await
}

#[utoipa::path(
    post,
    path = "/api/subscriptions/portal",
    tag = "subscriptions",
    responses(
        (status = 200, description = "Billing portal URL", body = PortalResponse),
        (status = 401, description = "Missing or invalid session"),
        (status = 404, description = "User has no Stripe customer yet")
    )
)]
#[post("/subscriptions/portal")]
pub async fn create_portal(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
) -> ApiResult<HttpResponse> {
    let customer_id = state
        .subscriptions
        .billing_profile(user.id)
        .await?
        .and_then(|p| p.stripe_customer_id)
        .ok_or(ApiError::NotFound("billing customer"))?;

    let return_url = format!("{}/billing", state.app_base_url);
    let session = state
        .stripe
        .create_portal_session(&customer_id, &return_url)
        .await?;

    Ok(HttpResponse::Ok().json(PortalResponse { url: session.url }))
}

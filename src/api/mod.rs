pub mod auth;
pub mod functions_client;
pub mod process_data;
pub mod stripe;
pub mod stripe_client;
pub mod subscriptions;
pub mod themes;
pub mod webhooks_stripe;

use actix_web::web;

use crate::error::ApiError;

/// Registers every route. Public routes go first: the `/api` scope would
/// otherwise claim `/api/webhooks/stripe` and answer it with a 401.
pub fn configure(cfg: &mut web::ServiceConfig) {
    // Extractor rejections use the same JSON error body as handler errors.
    cfg.app_data(
        web::JsonConfig::default()
            .error_handler(|err, _req| ApiError::invalid("body", err.to_string()).into()),
    )
    .app_data(
        web::QueryConfig::default()
            .error_handler(|err, _req| ApiError::invalid("query", err.to_string()).into()),
    )
    .app_data(
        web::PathConfig::default()
            .error_handler(|err, _req| ApiError::invalid("path", err.to_string()).into()),
    )
    .service(webhooks_stripe::stripe_webhook)
        .service(crate::docs::openapi_json)
        .service(
            web::scope("/api")
                .wrap(auth::JwtMiddleware)
                .service(process_data::process_data)
                .service(process_data::processing_status)
                .service(subscriptions::list_subscriptions)
                .service(subscriptions::create_checkout)
                .service(subscriptions::cancel_subscription)
                .service(subscriptions::reactivate_subscription)
                .service(subscriptions::create_portal)
                .service(themes::list_themes)
                .service(themes::get_theme)
                .service(themes::theme_score)
                .service(themes::theme_trend)
                .service(themes::theme_revenue)
                .service(themes::theme_competitors),
        );
}

use actix_web::{get, HttpResponse};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::api::process_data::process_data,
        crate::api::process_data::processing_status,
        crate::api::subscriptions::list_subscriptions,
        crate::api::subscriptions::create_checkout,
        crate::api::subscriptions::cancel_subscription,
        crate::api::subscriptions::reactivate_subscription,
        crate::api::subscriptions::create_portal,
        crate::api::themes::list_themes,
        crate::api::themes::get_theme,
        crate::api::themes::theme_score,
        crate::api::themes::theme_trend,
        crate::api::themes::theme_revenue,
        crate::api::themes::theme_competitors
    ),
    components(
        schemas(
            crate::error::ErrorBody,
            crate::error::FieldError,
            crate::api::process_data::ProcessDataBody,
            crate::api::process_data::ProcessDataResponse,
            crate::api::process_data::ProcessingStatusResponse,
            crate::api::subscriptions::SubscriptionsResponse,
            crate::api::subscriptions::CheckoutRequest,
            crate::api::subscriptions::CheckoutResponse,
            crate::api::subscriptions::SubscriptionAction,
            crate::api::subscriptions::SubscriptionActionResponse,
            crate::api::subscriptions::PortalResponse,
            crate::api::themes::ThemeListResponse,
            crate::api::themes::ThemeDetailResponse,
            crate::api::themes::ThemeScoreResponse,
            crate::api::themes::ThemeTrendResponse
        )
    ),
    modifiers(&BearerAuth),
    security(("bearer" = [])),
    tags(
        (name = "processing", description = "Data pipeline operations"),
        (name = "subscriptions", description = "Plans and billing"),
        (name = "themes", description = "Theme discovery and analysis")
    )
)]
pub struct ApiDoc;

#[get("/api-docs/openapi.json")]
pub async fn openapi_json() -> HttpResponse {
    HttpResponse::Ok().json(ApiDoc::openapi())
}

// src/api/themes.rs
//
// Read-only theme routes. Analysis routes run the scoring functions over the
// stored records and are gated by the caller's tier.

use actix_web::{get, web, HttpResponse};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::api::auth::AuthUser;
use crate::billing;
use crate::error::{ApiError, ApiResult};
use crate::models::{Theme, TrendData};
use crate::scoring::{
    analyze_competitors, calculate_monetization_score, load_score_trend, project_revenue,
    MonetizationScore, ScoreTrend,
};
use crate::tier::{Feature, Tier};
use crate::AppState;

const TREND_UNAVAILABLE: &str = "Score trend is temporarily unavailable";

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ThemeListResponse {
    pub tier: Tier,
    pub themes: Vec<Theme>,
    /// Set when the tier's limit cut the list short.
    pub limited: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ThemeDetailResponse {
    pub theme: Theme,
    pub trends: Vec<TrendData>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ThemeScoreResponse {
    pub theme_id: Uuid,
    pub stored_score: u8,
    /// Recomputed from the stored factors; absent when none were recorded.
    pub computed: Option<MonetizationScore>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ThemeTrendResponse {
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trend: Option<ScoreTrend>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

async fn require(state: &AppState, user: &AuthUser, feature: Feature) -> ApiResult<Tier> {
    let tier = billing::current_tier(state.subscriptions.as_ref(), user.id).await?;
    if tier.can_use(feature) {
        Ok(tier)
    } else {
        log::debug!(
            "feature denied user_id={} tier={} feature={}",
            user.id,
            tier,
            feature.name()
        );
        Err(ApiError::TierRequired {
            feature: feature.name(),
            required: feature.required_tier(),
        })
    }
}

async fn load_theme(state: &AppState, id: Uuid) -> ApiResult<Theme> {
    state
        .themes
        .get_theme(id)
        .await?
        .ok_or(ApiError::NotFound("theme"))
}

#[utoipa::path(
    get,
    path = "/api/themes",
    tag = "themes",
    params(("limit" = Option<usize>, Query, description = "Maximum number of themes")),
    responses(
        (status = 200, description = "Themes by score, capped for the free tier", body = ThemeListResponse),
        (status = 401, description = "Missing or invalid session")
    )
)]
#[get("/themes")]
pub async fn list_themes(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    query: web::Query<ListQuery>,
) -> ApiResult<HttpResponse> {
    let tier = require(&state, &user, Feature::ThemeBrowse).await?;

    let cap = tier.theme_list_limit();
    let limit = match (query.limit, cap) {
        (Some(requested), Some(cap)) => Some(requested.min(cap)),
        (requested, cap) => requested.or(cap),
    };

    // One extra row tells whether the cap hid anything.
    let mut themes = state.themes.list_themes(limit.map(|l| l + 1)).await?;
    let limited = match (limit, cap) {
        (Some(l), Some(cap)) => themes.len() > l && l == cap,
        _ => false,
    };
    if let Some(l) = limit {
        themes.truncate(l);
    }

    Ok(HttpResponse::Ok().json(ThemeListResponse {
        tier,
        themes,
        limited,
    }))
}

#[utoipa::path(
    get,
    path = "/api/themes/{id}",
    tag = "themes",
    params(("id" = Uuid, Path, description = "Theme id")),
    responses(
        (status = 200, description = "Theme with its trend data", body = ThemeDetailResponse),
        (status = 404, description = "Unknown theme")
    )
)]
#[get("/themes/{id}")]
pub async fn get_theme(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> ApiResult<HttpResponse> {
    let theme = load_theme(&state, path.into_inner()).await?;
    let trends = state.themes.trend_data(theme.id).await?;

    Ok(HttpResponse::Ok().json(ThemeDetailResponse { theme, trends }))
}

#[utoipa::path(
    get,
    path = "/api/themes/{id}/score",
    tag = "themes",
    params(("id" = Uuid, Path, description = "Theme id")),
    responses(
        (status = 200, description = "Monetization score breakdown", body = ThemeScoreResponse),
        (status = 404, description = "Unknown theme")
    )
)]
#[get("/themes/{id}/score")]
pub async fn theme_score(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    path: web::Path<Uuid>,
) -> ApiResult<HttpResponse> {
    require(&state, &user, Feature::ScoreBreakdown).await?;
    let theme = load_theme(&state, path.into_inner()).await?;

    Ok(HttpResponse::Ok().json(ThemeScoreResponse {
        theme_id: theme.id,
        stored_score: theme.monetization_score,
        computed: theme.factors.as_ref().map(calculate_monetization_score),
    }))
}

#[utoipa::path(
    get,
    path = "/api/themes/{id}/trend",
    tag = "themes",
    params(("id" = Uuid, Path, description = "Theme id")),
    responses(
        (status = 200, description = "Score trend, or a message when history cannot be read", body = ThemeTrendResponse),
        (status = 403, description = "Basic plan required"),
        (status = 404, description = "Unknown theme")
    )
)]
#[get("/themes/{id}/trend")]
pub async fn theme_trend(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    path: web::Path<Uuid>,
) -> ApiResult<HttpResponse> {
    require(&state, &user, Feature::TrendAnalysis).await?;
    let theme = load_theme(&state, path.into_inner()).await?;

    let response = match load_score_trend(
        state.themes.as_ref(),
        theme.id,
        theme.monetization_score,
        theme.factors.as_ref(),
    )
    .await
    {
        Ok(trend) => ThemeTrendResponse {
            available: true,
            trend: Some(trend),
            message: None,
        },
        Err(e) => {
            log::error!("score history error theme_id={} error={}", theme.id, e);
            ThemeTrendResponse {
                available: false,
                trend: None,
                message: Some(TREND_UNAVAILABLE.to_string()),
            }
        }
    };

    Ok(HttpResponse::Ok().json(response))
}

#[utoipa::path(
    get,
    path = "/api/themes/{id}/revenue",
    tag = "themes",
    params(("id" = Uuid, Path, description = "Theme id")),
    responses(
        (status = 200, description = "Revenue projection", body = crate::scoring::RevenueProjection),
        (status = 403, description = "Pro plan required"),
        (status = 404, description = "Unknown theme")
    )
)]
#[get("/themes/{id}/revenue")]
pub async fn theme_revenue(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    path: web::Path<Uuid>,
) -> ApiResult<HttpResponse> {
    require(&state, &user, Feature::RevenueProjection).await?;
    let theme = load_theme(&state, path.into_inner()).await?;

    Ok(HttpResponse::Ok().json(project_revenue(&theme)))
}

#[utoipa::path(
    get,
    path = "/api/themes/{id}/competitors",
    tag = "themes",
    params(("id" = Uuid, Path, description = "Theme id")),
    responses(
        (status = 200, description = "Competitor saturation and recommendations", body = crate::scoring::CompetitorLandscape),
        (status = 403, description = "Basic plan required"),
        (status = 404, description = "Unknown theme")
    )
)]
#[get("/themes/{id}/competitors")]
pub async fn theme_competitors(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    path: web::Path<Uuid>,
) -> ApiResult<HttpResponse> {
    require(&state, &user, Feature::CompetitorAnalysis).await?;
    let theme = load_theme(&state, path.into_inner()).await?;
    let competitors = state.themes.competitors(theme.id).await?;

    Ok(HttpResponse::Ok().json(analyze_competitors(&competitors)))
}

use std::sync::Arc;

use actix_web::test::TestRequest;
use actix_web::{test, web, App};
use chrono::{Duration, Utc};
use httpmock::MockServer;
use serde_json::Value;
use uuid::Uuid;

use theme_discovery::api;
use theme_discovery::models::{ScoreSnapshot, TrendData};
use theme_discovery::store::{MemoryStore, SubscriptionStore};
use theme_discovery::tier::Tier;

mod support;

macro_rules! app {
    ($state:expr) => {{
        test::init_service(
            App::new()
                .app_data(web::Data::new($state))
                .configure(api::configure),
        )
        .await
    }};
}

async fn state_for(store: &Arc<MemoryStore>) -> theme_discovery::AppState {
    let stripe = MockServer::start_async().await;
    let functions = MockServer::start_async().await;
    support::build_state(store.clone(), &stripe, &functions)
}

async fn user_with_tier(store: &MemoryStore, tier: Tier) -> Uuid {
    let user_id = Uuid::new_v4();
    store.set_tier(user_id, tier).await.unwrap();
    user_id
}

fn get(uri: &str, user_id: Uuid) -> TestRequest {
    TestRequest::get()
        .uri(uri)
        .insert_header(support::bearer(user_id))
}

#[actix_web::test]
async fn free_tier_list_is_capped() {
    let store = Arc::new(MemoryStore::new());
    for score in 0..12u8 {
        store.insert_theme(support::sample_theme(50 + score, 1_000_000.0));
    }
    let app = app!(state_for(&store).await);

    let free = user_with_tier(&store, Tier::Free).await;
    let body: Value = test::call_and_read_body_json(&app, get("/api/themes", free).to_request()).await;
    assert_eq!(body["themes"].as_array().unwrap().len(), 10);
    assert_eq!(body["limited"], true);
    assert_eq!(body["tier"], "free");

    let pro = user_with_tier(&store, Tier::Pro).await;
    let body: Value = test::call_and_read_body_json(&app, get("/api/themes", pro).to_request()).await;
    assert_eq!(body["themes"].as_array().unwrap().len(), 12);
    assert_eq!(body["limited"], false);
}

#[actix_web::test]
async fn analysis_routes_are_gated_by_tier() {
    let store = Arc::new(MemoryStore::new());
    let theme = support::sample_theme(85, 2_500_000.0);
    let id = theme.id;
    store.insert_theme(theme);
    let app = app!(state_for(&store).await);

    let free = user_with_tier(&store, Tier::Free).await;
    let basic = user_with_tier(&store, Tier::Basic).await;

    for route in ["trend", "competitors", "revenue"] {
        let resp = test::call_service(&app, get(&format!("/api/themes/{id}/{route}"), free).to_request()).await;
        assert_eq!(resp.status(), 403, "free user on {route}");
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["code"], "TIER_REQUIRED");
    }

    let resp = test::call_service(&app, get(&format!("/api/themes/{id}/competitors"), basic).to_request()).await;
    assert_eq!(resp.status(), 200);
    let resp = test::call_service(&app, get(&format!("/api/themes/{id}/revenue"), basic).to_request()).await;
    assert_eq!(resp.status(), 403);

    let resp = test::call_service(&app, get(&format!("/api/themes/{id}/score"), free).to_request()).await;
    assert_eq!(resp.status(), 200);
}

#[actix_web::test]
async fn unknown_theme_is_not_found() {
    let store = Arc::new(MemoryStore::new());
    let app = app!(state_for(&store).await);
    let pro = user_with_tier(&store, Tier::Pro).await;

    let resp = test::call_service(&app, get(&format!("/api/themes/{}", Uuid::new_v4()), pro).to_request()).await;
    assert_eq!(resp.status(), 404);
    let resp =
        test::call_service(&app, get(&format!("/api/themes/{}/revenue", Uuid::new_v4()), pro).to_request()).await;
    assert_eq!(resp.status(), 404);
}

#[actix_web::test]
async fn malformed_theme_id_is_a_validation_error() {
    let store = Arc::new(MemoryStore::new());
    let app = app!(state_for(&store).await);
    let pro = user_with_tier(&store, Tier::Pro).await;

    let resp = test::call_service(&app, get("/api/themes/not-a-uuid", pro).to_request()).await;
    assert_eq!(resp.status(), 400);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert_eq!(body["fields"][0]["field"], "path");
}

#[actix_web::test]
async fn revenue_projection_end_to_end() {
    let store = Arc::new(MemoryStore::new());
    let theme = support::sample_theme(85, 2_500_000.0);
    let id = theme.id;
    store.insert_theme(theme);
    let app = app!(state_for(&store).await);
    let pro = user_with_tier(&store, Tier::Pro).await;

    let body: Value =
        test::call_and_read_body_json(&app, get(&format!("/api/themes/{id}/revenue"), pro).to_request()).await;

    let min = body["estimatedRevenue"]["min"].as_f64().unwrap();
    let max = body["estimatedRevenue"]["max"].as_f64().unwrap();
    assert!(min <= max);

    let conservative = body["scenarios"]["conservative"].as_f64().unwrap();
    let realistic = body["scenarios"]["realistic"].as_f64().unwrap();
    let optimistic = body["scenarios"]["optimistic"].as_f64().unwrap();
    assert!(conservative < realistic && realistic < optimistic);
    assert!(conservative >= 0.0);
}

#[actix_web::test]
async fn trend_reports_rising_history() {
    let store = Arc::new(MemoryStore::new());
    let theme = support::sample_theme(80, 1_000_000.0);
    let id = theme.id;
    store.insert_theme(theme);
    let now = Utc::now();
    for (days_ago, score) in [(30, 50u8), (20, 60), (10, 70)] {
        store.insert_snapshot(ScoreSnapshot {
            theme_id: id,
            score,
            factors: None,
            recorded_at: now - Duration::days(days_ago),
        });
    }
    let app = app!(state_for(&store).await);
    let basic = user_with_tier(&store, Tier::Basic).await;

    let body: Value =
        test::call_and_read_body_json(&app, get(&format!("/api/themes/{id}/trend"), basic).to_request()).await;
    assert_eq!(body["available"], true);
    assert_eq!(body["trend"]["trend"], "increasing");
    assert_eq!(body["trend"]["previousScore"], 70);
    assert!(body["trend"]["changePercentage"].as_f64().unwrap() > 0.0);
}

#[actix_web::test]
async fn trend_fails_soft_when_history_is_unreadable() {
    let store = Arc::new(MemoryStore::new());
    let theme = support::sample_theme(80, 1_000_000.0);
    let id = theme.id;
    store.insert_theme(theme);

    let mut state = state_for(&store).await;
    state.themes = Arc::new(support::BrokenHistory {
        inner: store.clone(),
    });
    let app = app!(state);
    let basic = user_with_tier(&store, Tier::Basic).await;

    let resp = test::call_service(&app, get(&format!("/api/themes/{id}/trend"), basic).to_request()).await;
    assert_eq!(resp.status(), 200);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["available"], false);
    assert!(body["message"].is_string());
    assert!(body.get("trend").is_none());
}

#[actix_web::test]
async fn competitors_classify_saturation() {
    let store = Arc::new(MemoryStore::new());
    let theme = support::sample_theme(70, 500_000.0);
    let id = theme.id;
    store.insert_theme(theme);
    for i in 0..7 {
        store.insert_competitor(support::competitor(id, &format!("rival-{i}"), &["AI recommendations"]));
    }
    let app = app!(state_for(&store).await);
    let basic = user_with_tier(&store, Tier::Basic).await;

    let body: Value =
        test::call_and_read_body_json(&app, get(&format!("/api/themes/{id}/competitors"), basic).to_request())
            .await;
    assert_eq!(body["competitorCount"], 7);
    assert_eq!(body["saturation"], "medium");
}

#[actix_web::test]
async fn openapi_document_is_public() {
    let store = Arc::new(MemoryStore::new());
    let app = app!(state_for(&store).await);

    let req = TestRequest::get().uri("/api-docs/openapi.json").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert!(body["paths"]["/api/process-data"].is_object());
}

#[actix_web::test]
async fn detail_includes_trend_samples() {
    let store = Arc::new(MemoryStore::new());
    let theme = support::sample_theme(64, 800_000.0);
    let id = theme.id;
    store.insert_theme(theme);
    store.insert_trend(TrendData {
        id: Uuid::new_v4(),
        theme_id: id,
        keyword: "meal planner app".to_string(),
        search_volume: 12_000,
        growth_rate: 0.18,
        timestamp: Utc::now(),
        source: "google_trends".to_string(),
        geographic_data: None,
        demographic_data: None,
    });
    let app = app!(state_for(&store).await);
    let free = user_with_tier(&store, Tier::Free).await;

    let body: Value =
        test::call_and_read_body_json(&app, get(&format!("/api/themes/{id}"), free).to_request())
            .await;
    assert_eq!(body["theme"]["monetizationScore"], 64);
    assert_eq!(body["trends"][0]["keyword"], "meal planner app");
}

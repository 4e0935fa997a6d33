use std::sync::Arc;

use actix_web::test::TestRequest;
use actix_web::{test, web, App};
use httpmock::Method::POST;
use httpmock::MockServer;
use serde_json::{json, Value};
use uuid::Uuid;

use theme_discovery::api;
use theme_discovery::models::JobStatus;
use theme_discovery::store::{JobStore, MemoryStore};

mod support;

macro_rules! app {
    ($store:expr, $functions:expr) => {{
        let stripe = MockServer::start_async().await;
        let state = web::Data::new(support::build_state($store.clone(), &stripe, &$functions));
        test::init_service(App::new().app_data(state).configure(api::configure)).await
    }};
}

#[actix_web::test]
async fn requires_a_session() {
    let store = Arc::new(MemoryStore::new());
    let functions = MockServer::start_async().await;
    let app = app!(store, functions);

    let req = TestRequest::post()
        .uri("/api/process-data")
        .set_json(json!({"operation": "realtime_sync", "data": {"sources": ["reddit"]}}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 401);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], "AUTH_ERROR");
}

#[actix_web::test]
async fn invalid_request_lists_field_errors() {
    let store = Arc::new(MemoryStore::new());
    let functions = MockServer::start_async().await;
    let app = app!(store, functions);

    let req = TestRequest::post()
        .uri("/api/process-data")
        .insert_header(support::bearer(Uuid::new_v4()))
        .set_json(json!({
            "operation": "analyze_themes",
            "data": {"theme_ids": []},
            "options": {"batch_size": 10_000}
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], "VALIDATION_ERROR");
    let fields: Vec<&str> = body["fields"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["field"].as_str().unwrap())
        .collect();
    assert_eq!(fields, vec!["options.batch_size", "data.theme_ids"]);
    assert!(store.recent_jobs(10).await.unwrap().is_empty());
}

#[actix_web::test]
async fn malformed_body_and_query_use_the_json_error_shape() {
    let store = Arc::new(MemoryStore::new());
    let functions = MockServer::start_async().await;
    let app = app!(store, functions);
    let user_id = Uuid::new_v4();

    let req = TestRequest::post()
        .uri("/api/process-data")
        .insert_header(support::bearer(user_id))
        .set_json(json!({"operation": 5}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert_eq!(body["fields"][0]["field"], "body");

    let req = TestRequest::get()
        .uri("/api/process-data?limit=abc")
        .insert_header(support::bearer(user_id))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert_eq!(body["fields"][0]["field"], "query");

    assert!(store.recent_jobs(10).await.unwrap().is_empty());
}

#[actix_web::test]
async fn proxies_to_the_function_and_records_the_job() {
    let store = Arc::new(MemoryStore::new());
    let functions = MockServer::start_async().await;
    let theme_id = Uuid::new_v4();

    let mock = functions
        .mock_async(|when, then| {
            when.method(POST)
                .path("/analyze-themes")
                .header("Authorization", format!("Bearer {}", support::FUNCTIONS_KEY))
                .json_body_partial(
                    json!({"operation": "analyze_themes", "data": {"theme_ids": [theme_id]}})
                        .to_string(),
                );
            then.status(200).json_body(json!({"analyzed": 1}));
        })
        .await;

    let app = app!(store, functions);
    let user_id = Uuid::new_v4();
    let req = TestRequest::post()
        .uri("/api/process-data")
        .insert_header(support::bearer(user_id))
        .set_json(json!({"operation": "analyze_themes", "data": {"theme_ids": [theme_id]}}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["operation"], "analyze_themes");
    assert_eq!(body["result"]["analyzed"], 1);
    assert!(body["timestamp"].is_string());
    mock.assert_async().await;

    let jobs = store.recent_jobs(10).await.unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].status, JobStatus::Completed);
    assert_eq!(jobs[0].requested_by, Some(user_id));

    let req = TestRequest::get()
        .uri("/api/process-data")
        .insert_header(support::bearer(user_id))
        .to_request();
    let status: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(status["jobs"].as_array().unwrap().len(), 1);
    assert!(status["last_update"].is_string());
}

#[actix_web::test]
async fn function_failure_is_a_generic_500_and_a_failed_job() {
    let store = Arc::new(MemoryStore::new());
    let functions = MockServer::start_async().await;
    functions
        .mock_async(|when, then| {
            when.method(POST).path("/normalize-data");
            then.status(502).body("upstream exploded: secret detail");
        })
        .await;

    let app = app!(store, functions);
    let req = TestRequest::post()
        .uri("/api/process-data")
        .insert_header(support::bearer(Uuid::new_v4()))
        .set_json(json!({
            "operation": "normalize",
            "data": {"source": "google_trends", "records": [{"keyword": "meal plan"}]}
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 500);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Internal server error");
    assert!(!body.to_string().contains("secret detail"));

    let jobs = store.recent_jobs(10).await.unwrap();
    assert_eq!(jobs[0].status, JobStatus::Failed);
    assert!(store.last_update().await.unwrap().is_none());
}

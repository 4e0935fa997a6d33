#![allow(dead_code)]

use std::env;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use httpmock::MockServer;
use sqlx::PgPool;
use tokio::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use theme_discovery::api::auth::issue_session_token;
use theme_discovery::api::stripe::signature_header;
use theme_discovery::config::{AppConfig, PriceTable};
use theme_discovery::models::{
    CompetitionLevel, CompetitorAnalysis, EstimatedRevenue, ScoreSnapshot, TechnicalDifficulty,
    Theme, TrendData,
};
use theme_discovery::scoring::MonetizationFactors;
use theme_discovery::store::{MemoryStore, StoreError, ThemeStore};
use theme_discovery::AppState;

pub const JWT_SECRET: &str = "test-jwt-secret";
pub const JWT_AUDIENCE: &str = "authenticated";
pub const WEBHOOK_SECRET: &str = "whsec_test";
pub const STRIPE_KEY: &str = "sk_test_123";
pub const FUNCTIONS_KEY: &str = "service-role-test";
pub const PRICE_BASIC: &str = "price_basic";
pub const PRICE_PRO: &str = "price_pro";
pub const APP_BASE_URL: &str = "http://app.test";

pub fn test_config(stripe_base: &str, functions_base: &str) -> AppConfig {
    AppConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        database_url: None,
        jwt_secret: JWT_SECRET.to_string(),
        jwt_audience: JWT_AUDIENCE.to_string(),
        stripe_secret_key: STRIPE_KEY.to_string(),
        stripe_webhook_secret: WEBHOOK_SECRET.to_string(),
        stripe_api_base: stripe_base.to_string(),
        prices: PriceTable {
            basic: PRICE_BASIC.to_string(),
            pro: PRICE_PRO.to_string(),
        },
        app_base_url: APP_BASE_URL.to_string(),
        functions_base_url: functions_base.to_string(),
        functions_service_key: FUNCTIONS_KEY.to_string(),
        batch_update_interval: None,
    }
}

/// State over a fresh in-memory store, with Stripe and the function runtime
/// pointed at the given mock servers.
pub fn build_state(store: Arc<MemoryStore>, stripe: &MockServer, functions: &MockServer) -> AppState {
    AppState::new(store, &test_config(&stripe.base_url(), &functions.base_url()))
}

pub fn token_for(user_id: Uuid) -> String {
    issue_session_token(
        JWT_SECRET,
        JWT_AUDIENCE,
        user_id,
        Some("user@example.com"),
        Duration::hours(1),
    )
    .expect("sign test token")
}

pub fn bearer(user_id: Uuid) -> (&'static str, String) {
    ("Authorization", format!("Bearer {}", token_for(user_id)))
}

pub fn stripe_signature(payload: &[u8]) -> (&'static str, String) {
    (
        "Stripe-Signature",
        signature_header(WEBHOOK_SECRET, Utc::now().timestamp(), payload),
    )
}

pub fn factors() -> MonetizationFactors {
    MonetizationFactors {
        market_size: 80.0,
        payment_willingness: 70.0,
        competition_level: 30.0,
        revenue_models: 60.0,
        customer_acquisition_cost: 40.0,
        customer_lifetime_value: 75.0,
    }
}

pub fn sample_theme(score: u8, market_size: f64) -> Theme {
    let now = Utc::now();
    Theme {
        id: Uuid::new_v4(),
        title: "AI meal planner".to_string(),
        description: "Personalised weekly meal plans".to_string(),
        category: "health".to_string(),
        monetization_score: score,
        market_size,
        competition_level: CompetitionLevel::Medium,
        technical_difficulty: TechnicalDifficulty::Intermediate,
        estimated_revenue: EstimatedRevenue::new(1_000.0, 10_000.0),
        data_sources: vec!["google_trends".to_string()],
        factors: Some(factors()),
        created_at: now,
        updated_at: now,
    }
}

pub fn competitor(theme_id: Uuid, name: &str, features: &[&str]) -> CompetitorAnalysis {
    CompetitorAnalysis {
        id: Uuid::new_v4(),
        theme_id,
        competitor_name: name.to_string(),
        competitor_url: None,
        pricing_model: Some("subscription".to_string()),
        estimated_revenue: None,
        user_count: None,
        features: features.iter().map(|f| f.to_string()).collect(),
        market_share: None,
        created_at: Utc::now(),
    }
}

/// Serves themes from memory but fails every history read.
pub struct BrokenHistory {
    pub inner: Arc<MemoryStore>,
}

#[async_trait]
impl ThemeStore for BrokenHistory {
    async fn list_themes(&self, limit: Option<usize>) -> Result<Vec<Theme>, StoreError> {
        self.inner.list_themes(limit).await
    }

    async fn get_theme(&self, id: Uuid) -> Result<Option<Theme>, StoreError> {
        self.inner.get_theme(id).await
    }

    async fn score_history(&self, _theme_id: Uuid) -> Result<Vec<ScoreSnapshot>, StoreError> {
        Err(StoreError::Corrupt {
            table: "theme_score_history",
            detail: "connection reset".to_string(),
        })
    }

    async fn competitors(&self, theme_id: Uuid) -> Result<Vec<CompetitorAnalysis>, StoreError> {
        self.inner.competitors(theme_id).await
    }

    async fn trend_data(&self, theme_id: Uuid) -> Result<Vec<TrendData>, StoreError> {
        self.inner.trend_data(theme_id).await
    }
}

fn split_db_url(url: &str) -> Result<(String, String), String> {
    let (base, query) = match url.split_once('?') {
        Some((base, query)) => (base.to_string(), Some(query)),
        None => (url.to_string(), None),
    };

    let db_start = base
        .rfind('/')
        .ok_or_else(|| "invalid database url".to_string())?;
    if db_start + 1 >= base.len() {
        return Err("database name is empty".to_string());
    }

    let db_name = base[db_start + 1..].to_string();
    let mut admin_url = format!("{}postgres", &base[..db_start + 1]);
    if let Some(query) = query {
        admin_url = format!("{admin_url}?{query}");
    }

    Ok((admin_url, db_name))
}

static TEST_DB_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

pub struct TestDb {
    pub pool: PgPool,
    _guard: MutexGuard<'static, ()>,
}

/// Recreates the database named by TEST_DATABASE_URL and runs migrations.
pub async fn init_test_db() -> TestDb {
    dotenvy::dotenv().ok();
    let test_url = env::var("TEST_DATABASE_URL").expect("TEST_DATABASE_URL must be set");
    let (admin_url, db_name) = split_db_url(&test_url).expect("invalid TEST_DATABASE_URL format");

    let lock = TEST_DB_LOCK.get_or_init(|| Mutex::new(()));
    let guard = lock.lock().await;

    let admin_pool = PgPool::connect(&admin_url).await.expect("connect admin db");
    let quoted = format!("\"{}\"", db_name.replace('"', "\"\""));
    sqlx::query(&format!("DROP DATABASE IF EXISTS {quoted} WITH (FORCE)"))
        .execute(&admin_pool)
        .await
        .expect("drop test db");
    sqlx::query(&format!("CREATE DATABASE {quoted}"))
        .execute(&admin_pool)
        .await
        .expect("create test db");
    admin_pool.close().await;

    let pool = PgPool::connect(&test_url).await.expect("connect test db");
    sqlx::migrate!().run(&pool).await.expect("migrations");
    TestDb { pool, _guard: guard }
}

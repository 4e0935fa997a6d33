pub mod api;
pub mod billing;
pub mod config;
pub mod db;
pub mod docs;
pub mod error;
pub mod models;
pub mod scheduler;
pub mod scoring;
pub mod store;
pub mod tier;

use std::sync::Arc;

use api::functions_client::FunctionsClient;
use api::stripe_client::StripeClient;
use config::{AppConfig, PriceTable};
use scheduler::TaskRegistry;
use store::{JobStore, SubscriptionStore, ThemeStore};

#[derive(Clone)]
pub struct AppState {
    pub themes: Arc<dyn ThemeStore>,
    pub subscriptions: Arc<dyn SubscriptionStore>,
    pub jobs: Arc<dyn JobStore>,
    pub stripe: StripeClient,
    pub functions: FunctionsClient,
    pub scheduler: Arc<TaskRegistry>,
    pub jwt_secret: String,
    pub jwt_audience: String,
    pub stripe_webhook_secret: String,
    pub prices: PriceTable,
    pub app_base_url: String,
}

impl AppState {
    /// Builds the state around a single store that serves every table.
    pub fn new<S>(store: Arc<S>, config: &AppConfig) -> Self
    where
        S: ThemeStore + SubscriptionStore + JobStore + 'static,
    {
        Self {
            themes: store.clone(),
            subscriptions: store.clone(),
            jobs: store,
            stripe: StripeClient::new(&config.stripe_api_base, &config.stripe_secret_key),
            functions: FunctionsClient::new(
                &config.functions_base_url,
                &config.functions_service_key,
            ),
            scheduler: Arc::new(TaskRegistry::new()),
            jwt_secret: config.jwt_secret.clone(),
            jwt_audience: config.jwt_audience.clone(),
            stripe_webhook_secret: config.stripe_webhook_secret.clone(),
            prices: config.prices.clone(),
            app_base_url: config.app_base_url.clone(),
        }
    }
}

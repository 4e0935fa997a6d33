// src/config.rs

use std::env;
use std::time::Duration;

use thiserror::Error;

use crate::tier::Tier;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Stripe price ids for the paid tiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceTable {
    pub basic: String,
    pub pro: String,
}

impl PriceTable {
    pub fn price_for(&self, tier: Tier) -> Option<&str> {
        match tier {
            Tier::Free => None,
            Tier::Basic => Some(&self.basic),
            Tier::Pro => Some(&self.pro),
        }
    }

    pub fn tier_for(&self, price_id: &str) -> Option<Tier> {
        if price_id == self.basic {
            Some(Tier::Basic)
        } else if price_id == self.pro {
            Some(Tier::Pro)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// Falls back to the in-memory store when unset.
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub jwt_audience: String,
    pub stripe_secret_key: String,
    pub stripe_webhook_secret: String,
    pub stripe_api_base: String,
    pub prices: PriceTable,
    pub app_base_url: String,
    pub functions_base_url: String,
    pub functions_service_key: String,
    pub batch_update_interval: Option<Duration>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let port = match env::var("PORT") {
            Ok(raw) => raw
                .parse()
                .map_err(|_| ConfigError::Invalid { name: "PORT", value: raw })?,
            Err(_) => 8080,
        };

        let batch_update_interval = match env::var("BATCH_UPDATE_INTERVAL_SECS") {
            Ok(raw) => {
                let secs: u64 = raw.parse().map_err(|_| ConfigError::Invalid {
                    name: "BATCH_UPDATE_INTERVAL_SECS",
                    value: raw.clone(),
                })?;
                if secs == 0 {
                    return Err(ConfigError::Invalid {
                        name: "BATCH_UPDATE_INTERVAL_SECS",
                        value: raw,
                    });
                }
                Some(Duration::from_secs(secs))
            }
            Err(_) => None,
        };

        let app_base_url =
            env::var("APP_BASE_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());
        if reqwest::Url::parse(&app_base_url).is_err() {
            return Err(ConfigError::Invalid {
                name: "APP_BASE_URL",
                value: app_base_url,
            });
        }

        Ok(Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port,
            database_url: env::var("DATABASE_URL").ok().filter(|v| !v.is_empty()),
            jwt_secret: required("SUPABASE_JWT_SECRET")?,
            jwt_audience: env::var("JWT_AUDIENCE").unwrap_or_else(|_| "authenticated".to_string()),
            stripe_secret_key: required("STRIPE_SECRET_KEY")?,
            stripe_webhook_secret: required("STRIPE_WEBHOOK_SECRET")?,
            stripe_api_base: env::var("STRIPE_API_BASE")
                .unwrap_or_else(|_| "https://api.stripe.com".to_string()),
            prices: PriceTable {
                basic: required("STRIPE_PRICE_BASIC")?,
                pro: required("STRIPE_PRICE_PRO")?,
            },
            app_base_url,
            functions_base_url: required("SUPABASE_FUNCTIONS_URL")?,
            functions_service_key: required("SUPABASE_SERVICE_ROLE_KEY")?,
            batch_update_interval,
        })
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::Missing(name))
}

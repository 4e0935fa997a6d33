// src/api/functions_client.rs
//
// Client for the hosted function runtime that does the heavy data work
// (normalization, batch score updates, source sync, theme analysis).

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FunctionsError {
    #[error("function http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("function {name} failed status={status} body={body}")]
    Failed {
        name: String,
        status: u16,
        body: String,
    },

    #[error("function {name} returned invalid json: {detail}")]
    InvalidResponse { name: String, detail: String },
}

#[derive(Clone)]
pub struct FunctionsClient {
    http: reqwest::Client,
    base_url: String,
    service_key: String,
}

impl FunctionsClient {
    pub fn new(base_url: impl Into<String>, service_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            service_key: service_key.into(),
        }
    }

    pub async fn invoke<B: Serialize + ?Sized>(
        &self,
        name: &str,
        body: &B,
    ) -> Result<Value, FunctionsError> {
        let resp = self
            .http
            .post(format!("{}/{}", self.base_url, name))
            .bearer_auth(&self.service_key)
            .json(body)
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            return Err(FunctionsError::Failed {
                name: name.to_string(),
                status: status.as_u16(),
                body: text,
            });
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&text).map_err(|e| FunctionsError::InvalidResponse {
            name: name.to_string(),
            detail: format!("{e}; body={text}"),
        })
    }
}

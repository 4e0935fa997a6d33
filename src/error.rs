// src/error.rs

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

use crate::api::functions_client::FunctionsError;
use crate::api::stripe_client::StripeError;
use crate::store::StoreError;
use crate::tier::Tier;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("validation failed")]
    Validation(Vec<FieldError>),

    #[error("authentication required")]
    Unauthorized,

    #[error("{required} plan required for {feature}")]
    TierRequired { feature: &'static str, required: Tier },

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Stripe(#[from] StripeError),

    #[error(transparent)]
    Functions(#[from] FunctionsError),
}

impl ApiError {
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        ApiError::Validation(vec![FieldError::new(field, message)])
    }
}

#[derive(Serialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
    pub code: &'static str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldError>,
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::TierRequired { .. } => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Store(_) | ApiError::Stripe(_) | ApiError::Functions(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let (code, error, fields) = match self {
            ApiError::Validation(fields) => ("VALIDATION_ERROR", self.to_string(), fields.clone()),
            ApiError::Unauthorized => ("AUTH_ERROR", self.to_string(), Vec::new()),
            ApiError::TierRequired { .. } => ("TIER_REQUIRED", self.to_string(), Vec::new()),
            ApiError::NotFound(_) => ("NOT_FOUND", self.to_string(), Vec::new()),
            ApiError::Store(_) | ApiError::Stripe(_) | ApiError::Functions(_) => {
                log::error!("upstream failure: {self}");
                ("INTERNAL_ERROR", "Internal server error".to_string(), Vec::new())
            }
        };

        HttpResponse::build(self.status_code()).json(ErrorBody {
            error,
            code,
            fields,
        })
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

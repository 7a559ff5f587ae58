//! HTTP error mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use checkout::CheckoutError;
use domain::DomainError;
use serde_json::json;
use store::StoreError;
use thiserror::Error;

/// Errors surfaced to HTTP clients.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Unavailable(String),

    #[error("internal server error")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<CheckoutError> for ApiError {
    fn from(e: CheckoutError) -> Self {
        match e {
            CheckoutError::NotFound { .. } => ApiError::NotFound(e.to_string()),
            CheckoutError::Business(msg) => ApiError::BadRequest(msg),
            CheckoutError::Retriable(msg) => ApiError::Unavailable(msg),
            CheckoutError::Domain(DomainError::InvalidTransition { .. }) => {
                ApiError::Conflict(e.to_string())
            }
            CheckoutError::Domain(_) => ApiError::BadRequest(e.to_string()),
            CheckoutError::Store(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound { .. } => ApiError::NotFound(e.to_string()),
            StoreError::Domain(_) => ApiError::BadRequest(e.to_string()),
            StoreError::DuplicateOrderKey { .. }
            | StoreError::DuplicatePaymentKey { .. }
            | StoreError::DuplicateOrderPayment { .. } => ApiError::Conflict(e.to_string()),
            StoreError::Database(e) => ApiError::Internal(e.to_string()),
        }
    }
}

//! HTTP handlers for quote-service.
//!
//! Handlers stay thin: extract the actor and body, call one engine operation, serialize the
//! result. Every error leaving a handler is counted by its stable code.

pub mod corrections;
pub mod documents;
pub mod health;
pub mod payments;
pub mod quotes;

use crate::services::record_error;
use axum::response::{IntoResponse, Response};
use service_core::error::AppError;

pub use health::{health_check, metrics, readiness_check};

/// `AppError` that has been recorded in the error counter.
#[derive(Debug)]
pub struct ApiError(AppError);

impl ApiError {
    pub fn inner(&self) -> &AppError {
        &self.0
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        record_error(err.code());
        if err.status_code().is_client_error() {
            tracing::warn!(code = err.code(), error = %err, "Request rejected");
        }
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.0.into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

//! HTTP API endpoints.
//!
//! Thin handlers over the settlement services: the order/payment surface
//! consumed by the orders controller, the admin refund surface, and the
//! inbound webhook endpoints.

pub mod orders;
pub mod refunds;
pub mod webhooks;

use crate::error::Error;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Stable machine-readable category.
    pub code: &'static str,
    /// Human-readable detail.
    pub error: String,
}

/// [`Error`] wrapper implementing [`IntoResponse`].
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self.0 {
            Error::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "validation"),
            Error::SoldOut { .. } => (StatusCode::UNPROCESSABLE_ENTITY, "sold_out"),
            Error::SeatUnavailable { .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, "seat_unavailable")
            }
            Error::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),
            Error::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
            Error::Authenticity(_) => (StatusCode::UNAUTHORIZED, "authenticity"),
            Error::Provider { .. } => (StatusCode::BAD_GATEWAY, "provider"),
            Error::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        };
        if status.is_server_error() {
            error!(error = %self.0, "request failed");
        }
        let body = ErrorBody {
            code,
            error: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Handler result alias.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::models::delivery::DeliveryStatus;

/// Failures raised by the domain model itself, independent of transport.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DomainError {
    #[error("invalid delivery status: {0}")]
    InvalidStatus(String),

    #[error("invalid staff status: {0}")]
    InvalidStaffStatus(String),

    #[error("delivery cannot move from {from} to {to}")]
    InvalidTransition {
        from: DeliveryStatus,
        to: DeliveryStatus,
    },

    #[error("invalid amount: {0}")]
    InvalidAmount(String),
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("staff {0} cannot accept more work")]
    StaffUnavailable(Uuid),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::StaffUnavailable(_) => (StatusCode::CONFLICT, self.to_string()),
            AppError::Domain(err @ DomainError::InvalidTransition { .. }) => {
                (StatusCode::CONFLICT, err.to_string())
            }
            AppError::Domain(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

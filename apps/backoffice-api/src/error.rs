//! Error types for the back office API.
//!
//! Every failure leaving a handler is an [`ApiError`]: a machine-readable
//! [`ErrorCode`] plus a message safe to show to the user. Storage details
//! are logged here and never returned.
//!
//! ```text
//! ValidationError ─┐
//! CoreError ───────┼──► ApiError { code, message } ──► HTTP status + JSON
//! DbError ─────────┤
//! GatewayError ────┘
//! ```

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use optica_core::{CoreError, ValidationError};
use optica_db::DbError;

use crate::gateway::GatewayError;

/// Error codes returned in the `code` field of error bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    NotFound,
    ValidationError,
    BusinessRule,
    Conflict,
    Unauthorized,
    DatabaseError,
    GatewayError,
    ServiceUnavailable,
    Internal,
}

impl ErrorCode {
    /// HTTP status for this code.
    pub fn http_status(&self) -> StatusCode {
        match self {
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::ValidationError => StatusCode::BAD_REQUEST,
            ErrorCode::BusinessRule => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorCode::Conflict => StatusCode::CONFLICT,
            ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorCode::DatabaseError => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorCode::GatewayError => StatusCode::BAD_GATEWAY,
            ErrorCode::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// API error: what the client sees.
#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
#[error("{code:?}: {message}")]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::NotFound, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::ValidationError, message)
    }

    pub fn business_rule(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::BusinessRule, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Conflict, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Unauthorized, message)
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::ServiceUnavailable, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Internal, message)
    }

    pub fn status(&self) -> StatusCode {
        self.code.http_status()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::bad_request(err.to_string())
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::NotFound { .. } => ApiError::not_found(err.to_string()),
            CoreError::Validation(inner) => inner.into(),
            CoreError::RegisterAlreadyOpen { .. } => ApiError::conflict(err.to_string()),
            CoreError::NoOpenRegister
            | CoreError::RegisterClosed { .. }
            | CoreError::OrderCancelled { .. }
            | CoreError::InvalidOrderTransition { .. }
            | CoreError::InvalidPaymentTransition { .. }
            | CoreError::InvalidCompensationTransition { .. }
            | CoreError::AmountExceedsBalance { .. }
            | CoreError::AmountExceedsDebt { .. }
            | CoreError::LaboratoryRequired
            | CoreError::LaboratoryInactive { .. }
            | CoreError::NotACheckPayment { .. }
            | CoreError::PaymentNotAllowed { .. } => ApiError::business_rule(err.to_string()),
        }
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { .. } => ApiError::not_found(err.to_string()),
            DbError::UniqueViolation { ref field, .. } if field == "cash_registers.status" => {
                ApiError::conflict("A cash register is already open")
            }
            DbError::UniqueViolation { .. } | DbError::Conflict(_) => {
                ApiError::conflict(err.to_string())
            }
            DbError::ForeignKeyViolation { .. } => {
                ApiError::business_rule("Referenced record does not exist or is still in use")
            }
            DbError::QueryFailed(ref msg) if msg.contains("CHECK constraint failed") => {
                warn!(error = %msg, "Constraint rejected write");
                ApiError::business_rule("Operation violates a data constraint")
            }
            DbError::ConnectionFailed(_) | DbError::PoolExhausted => {
                error!(error = %err, "Database unavailable");
                ApiError::service_unavailable("Database unavailable")
            }
            other => {
                error!(error = %other, "Database error");
                ApiError::new(ErrorCode::DatabaseError, "Database error")
            }
        }
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::NotConfigured => {
                ApiError::service_unavailable("Mercado Pago is not configured")
            }
            other => {
                error!(error = %other, "Mercado Pago request failed");
                ApiError::new(ErrorCode::GatewayError, "Payment gateway error")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

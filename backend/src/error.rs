//! Error handling for the stock ledger service
//!
//! Every failure a caller can see maps to a stable code, an HTTP status, and
//! where it helps, structured context (quantities, location name/capacity).

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;
use shared::LedgerError;
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Ledger rule violations
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    // Validation errors
    #[error("Validation error: {message}")]
    Validation { field: String, message: String },

    #[error("Duplicate entry: {0}")]
    DuplicateEntry(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Internal server error")]
    InternalError(#[from] anyhow::Error),
}

impl AppError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        AppError::NotFound(resource.into())
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Ledger(err) => err.code(),
            AppError::Validation { .. } => "VALIDATION_ERROR",
            AppError::DuplicateEntry(_) => "DUPLICATE_ENTRY",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::InvalidStateTransition(_) => "INVALID_STATE_TRANSITION",
            AppError::Configuration(_) => "CONFIGURATION_ERROR",
            AppError::DatabaseError(_) => "DATABASE_ERROR",
            AppError::Internal(_) | AppError::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Ledger(err) => match err {
                LedgerError::InvalidQuantity { .. }
                | LedgerError::MissingReason { .. }
                | LedgerError::InvalidMovement(_) => StatusCode::BAD_REQUEST,
                LedgerError::LocationOccupied { .. }
                | LedgerError::AlreadyReversed { .. }
                | LedgerError::StockNotEmpty { .. } => StatusCode::CONFLICT,
                LedgerError::InsufficientStock { .. }
                | LedgerError::LocationInactive { .. }
                | LedgerError::LocationCapacityExceeded { .. }
                | LedgerError::ExpiredBatch { .. }
                | LedgerError::BatchClosed { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            },
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,
            AppError::DuplicateEntry(_) => StatusCode::CONFLICT,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidStateTransition(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Configuration(_)
            | AppError::DatabaseError(_)
            | AppError::Internal(_)
            | AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Body detail; infrastructure errors do not leak their cause
    pub fn detail(&self) -> ErrorDetail {
        let (message, field, context) = match self {
            AppError::Ledger(err) => (err.to_string(), None, err.context()),
            AppError::Validation { field, message } => (message.clone(), Some(field.clone()), None),
            AppError::DuplicateEntry(field) => (
                format!("A record with this {} already exists", field),
                Some(field.clone()),
                None,
            ),
            AppError::NotFound(resource) => (format!("{} not found", resource), None, None),
            AppError::InvalidStateTransition(msg) => (msg.clone(), None, None),
            AppError::Configuration(msg) => (format!("Configuration error: {}", msg), None, None),
            AppError::DatabaseError(_) => ("A database error occurred".to_string(), None, None),
            AppError::Internal(msg) => (msg.clone(), None, None),
            AppError::InternalError(_) => {
                ("An internal server error occurred".to_string(), None, None)
            }
        };

        ErrorDetail {
            code: self.code().to_string(),
            message,
            field,
            context,
        }
    }
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize, Debug)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            tracing::error!("Error: {:?}", self);
        } else {
            tracing::debug!(code = self.code(), "Rejected request: {}", self);
        }

        (status, Json(ErrorResponse { error: self.detail() })).into_response()
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
        fields.sort_by_key(|(field, _)| *field);

        match fields.first() {
            Some((field, errs)) => {
                let message = errs
                    .first()
                    .and_then(|e| e.message.as_ref().map(|m| m.to_string()))
                    .unwrap_or_else(|| format!("{} is invalid", field));
                AppError::validation(*field, message)
            }
            None => AppError::validation("input", "invalid input"),
        }
    }
}

/// Map unique-constraint violations to `DuplicateEntry`, anything else to
/// `DatabaseError`
pub fn map_unique_violation(err: sqlx::Error, field: &str) -> AppError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            AppError::DuplicateEntry(field.to_string())
        }
        _ => AppError::DatabaseError(err),
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ledger_errors_map_to_business_statuses() {
        let err = AppError::from(LedgerError::InsufficientStock {
            bucket: "on_hand",
            current: 70,
            requested: 100,
        });
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let detail = err.detail();
        assert_eq!(detail.code, "INSUFFICIENT_STOCK");
        assert_eq!(detail.context.unwrap()["current"], 70);
    }

    #[test]
    fn test_occupied_location_is_a_conflict() {
        let err = AppError::from(LedgerError::LocationOccupied {
            location_id: uuid::Uuid::nil(),
            name: "A-07".to_string(),
            occupant: uuid::Uuid::nil(),
        });
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert!(err.detail().message.contains("A-07"));
    }

    #[test]
    fn test_not_found_message() {
        let detail = AppError::not_found("Stock record").detail();
        assert_eq!(detail.code, "NOT_FOUND");
        assert_eq!(detail.message, "Stock record not found");
    }
}

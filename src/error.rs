//! Structured error types for API responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use std::fmt;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors
    MissingRequiredField,
    InvalidFieldValue,
    NoFieldsToUpdate,

    // Caller identity
    Unauthorized,

    // Not found errors
    TaskNotFound,
    ColumnNotFound,
    RuleNotFound,

    // Internal errors
    DatabaseError,
    InternalError,
}

impl ErrorCode {
    pub fn status(&self) -> StatusCode {
        match self {
            ErrorCode::MissingRequiredField
            | ErrorCode::InvalidFieldValue
            | ErrorCode::NoFieldsToUpdate => StatusCode::BAD_REQUEST,
            ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorCode::TaskNotFound | ErrorCode::ColumnNotFound | ErrorCode::RuleNotFound => {
                StatusCode::NOT_FOUND
            }
            ErrorCode::DatabaseError | ErrorCode::InternalError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Structured error for API responses.
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            field: None,
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    // Convenience constructors

    pub fn missing_field(field: &str) -> Self {
        Self::new(
            ErrorCode::MissingRequiredField,
            format!("{} is required", field),
        )
        .with_field(field)
    }

    pub fn invalid_value(field: &str, reason: &str) -> Self {
        Self::new(ErrorCode::InvalidFieldValue, reason).with_field(field)
    }

    pub fn no_fields_to_update() -> Self {
        Self::new(ErrorCode::NoFieldsToUpdate, "No valid fields to update")
    }

    pub fn unauthorized() -> Self {
        Self::new(ErrorCode::Unauthorized, "Missing user identity")
    }

    pub fn task_not_found(task_id: &str) -> Self {
        Self::new(
            ErrorCode::TaskNotFound,
            format!("Task not found: {}", task_id),
        )
    }

    pub fn column_not_found(column_id: &str) -> Self {
        Self::new(
            ErrorCode::ColumnNotFound,
            format!("Column not found: {}", column_id),
        )
    }

    pub fn rule_not_found(rule_id: &str) -> Self {
        Self::new(
            ErrorCode::RuleNotFound,
            format!("Automation rule not found: {}", rule_id),
        )
    }

    pub fn database(err: impl fmt::Display) -> Self {
        Self::new(ErrorCode::DatabaseError, err.to_string())
    }

    pub fn internal(err: impl fmt::Display) -> Self {
        Self::new(ErrorCode::InternalError, err.to_string())
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ApiError {}

// Allow using ? with anyhow errors by converting them
impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<ApiError>() {
            Ok(api_err) => api_err,
            Err(err) if err.downcast_ref::<rusqlite::Error>().is_some() => ApiError::database(err),
            Err(err) => ApiError::internal(err),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.code.status();
        if status.is_server_error() {
            tracing::error!(code = ?self.code, message = %self.message, "Request failed");
        } else {
            tracing::debug!(code = ?self.code, message = %self.message, "Request rejected");
        }
        (status, Json(self)).into_response()
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

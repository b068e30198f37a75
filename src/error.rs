//! Error types for the library server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Machine-readable error codes carried in every error body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    Failure = 1,
    NotAuthorized = 2,
    DbFailure = 3,
    NotFound = 4,
    BadValue = 5,
    Duplicate = 6,
    BookNotAvailable = 7,
    StillReferenced = 8,
    InvalidState = 9,
}

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Authorization failed: {0}")]
    Authorization(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Unique value already taken (email, ISBN, category name)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Entity cannot be removed while other records depend on it
    #[error("Still referenced: {0}")]
    StillReferenced(String),

    /// Operation does not apply to the entity's current state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    /// A book requested for a loan is already out on an open loan
    #[error("Book not available: {0}")]
    BookNotAvailable(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// HTTP status, error code and client-facing message for this error
    pub fn parts(&self) -> (StatusCode, ErrorCode, String) {
        match self {
            AppError::Authentication(msg) => {
                (StatusCode::UNAUTHORIZED, ErrorCode::NotAuthorized, msg.clone())
            }
            AppError::Authorization(msg) => {
                (StatusCode::FORBIDDEN, ErrorCode::NotAuthorized, msg.clone())
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, ErrorCode::NotFound, msg.clone()),
            AppError::Validation(msg) | AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, ErrorCode::BadValue, msg.clone())
            }
            AppError::BookNotAvailable(title) => (
                StatusCode::BAD_REQUEST,
                ErrorCode::BookNotAvailable,
                format!("Book not available: {}", title),
            ),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, ErrorCode::Duplicate, msg.clone()),
            AppError::StillReferenced(msg) => {
                (StatusCode::CONFLICT, ErrorCode::StillReferenced, msg.clone())
            }
            AppError::InvalidState(msg) => {
                (StatusCode::CONFLICT, ErrorCode::InvalidState, msg.clone())
            }
            AppError::Database(sqlx::Error::RowNotFound) => (
                StatusCode::NOT_FOUND,
                ErrorCode::NotFound,
                "Resource not found".to_string(),
            ),
            AppError::Database(sqlx::Error::Database(db)) if db.is_unique_violation() => (
                StatusCode::CONFLICT,
                ErrorCode::Duplicate,
                db.message().to_string(),
            ),
            AppError::Database(sqlx::Error::Database(db)) if db.is_foreign_key_violation() => (
                StatusCode::CONFLICT,
                ErrorCode::StillReferenced,
                db.message().to_string(),
            ),
            AppError::Database(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorCode::DbFailure,
                e.to_string(),
            ),
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorCode::Failure,
                msg.clone(),
            ),
        }
    }
}

/// Error response body
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub code: u32,
    pub error: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();

        if status.is_server_error() {
            tracing::error!("{}", self);
        } else {
            tracing::debug!("Request rejected ({}): {}", status, message);
        }

        let body = Json(ErrorResponse {
            code: code as u32,
            error: format!("{:?}", code),
            message,
        });

        (status, body).into_response()
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut messages: Vec<String> = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| match &e.message {
                    Some(msg) => format!("{}: {}", field, msg),
                    None => format!("{}: invalid value ({})", field, e.code),
                })
            })
            .collect();
        messages.sort();

        if messages.is_empty() {
            // struct-level (schema) or nested failures
            messages.push(errors.to_string());
        }

        AppError::Validation(messages.join("; "))
    }
}

impl From<redis::RedisError> for AppError {
    fn from(e: redis::RedisError) -> Self {
        AppError::Internal(format!("Redis error: {}", e))
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (AppError::BadRequest("x".into()), StatusCode::BAD_REQUEST),
            (AppError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (AppError::BookNotAvailable("Dune".into()), StatusCode::BAD_REQUEST),
            (AppError::Authentication("x".into()), StatusCode::UNAUTHORIZED),
            (AppError::Authorization("x".into()), StatusCode::FORBIDDEN),
            (AppError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (AppError::Conflict("x".into()), StatusCode::CONFLICT),
            (AppError::StillReferenced("x".into()), StatusCode::CONFLICT),
            (AppError::InvalidState("x".into()), StatusCode::CONFLICT),
            (AppError::Internal("boom".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (AppError::Database(sqlx::Error::RowNotFound), StatusCode::NOT_FOUND),
            (AppError::Database(sqlx::Error::PoolTimedOut), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (error, expected) in cases {
            assert_eq!(error.parts().0, expected, "{:?}", error);
        }
    }

    #[test]
    fn test_internal_message_is_passed_through() {
        let (_, code, message) = AppError::Internal("disk on fire".into()).parts();
        assert_eq!(code, ErrorCode::Failure);
        assert_eq!(message, "disk on fire");
    }

    #[test]
    fn test_book_not_available_message() {
        let (_, code, message) = AppError::BookNotAvailable("Dune".into()).parts();
        assert_eq!(code, ErrorCode::BookNotAvailable);
        assert_eq!(message, "Book not available: Dune");
    }

    #[test]
    fn test_conflict_codes_follow_cause() {
        assert_eq!(AppError::Conflict("taken".into()).parts().1, ErrorCode::Duplicate);
        assert_eq!(
            AppError::StillReferenced("in use".into()).parts().1,
            ErrorCode::StillReferenced
        );
        assert_eq!(
            AppError::InvalidState("returned".into()).parts().1,
            ErrorCode::InvalidState
        );
    }
}

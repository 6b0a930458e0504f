//!
//! # Error Taxonomy
//!
//! `AppError` is the single error type flowing out of the service layer.
//! Handlers return `Result<_, AppError>`; the boundary maps every variant to
//! an HTTP status through one exhaustive match (`AppError::status`) and to a
//! client-visible message through `client_message`, which deliberately
//! replaces internal failure text with a generic message for 5xx errors.
//!
//! `From` conversions cover the fallible collaborators (`sqlx`, `validator`,
//! `bcrypt`) so service code can use `?` throughout.

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use std::fmt;
use validator::ValidationErrors;

use crate::response::{ApiResponse, ErrorDetail};

#[derive(Debug)]
pub enum AppError {
    /// Malformed or out-of-range input (HTTP 400).
    Validation(Vec<ErrorDetail>),
    /// Missing, invalid, or expired credentials (HTTP 401).
    Unauthorized(String),
    /// Missing resource, or an ownership mismatch presented identically (HTTP 404).
    NotFound(String),
    /// Uniqueness violation, e.g. a duplicate email (HTTP 400).
    Conflict(String, Vec<ErrorDetail>),
    /// Client exceeded its request allowance (HTTP 429).
    RateLimited(String),
    /// Store failure (HTTP 500). The message never reaches the client.
    Database(String),
    /// Any other unexpected failure (HTTP 500). The message never reaches the client.
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_, _) => StatusCode::BAD_REQUEST,
            AppError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The message placed in the envelope. Internal failure text stays in the
    /// logs; clients get a generic message for server-side errors.
    pub fn client_message(&self) -> String {
        match self {
            AppError::Validation(_) => "Validation failed".to_string(),
            AppError::Unauthorized(msg)
            | AppError::NotFound(msg)
            | AppError::RateLimited(msg)
            | AppError::Conflict(msg, _) => msg.clone(),
            AppError::Database(_) | AppError::Internal(_) => "Internal server error".to_string(),
        }
    }

    pub fn details(&self) -> Option<Vec<ErrorDetail>> {
        match self {
            AppError::Validation(details) | AppError::Conflict(_, details) => {
                Some(details.clone())
            }
            AppError::Database(_) | AppError::Internal(_) => Some(vec![ErrorDetail::kind(
                "internal_error",
                "An unexpected error occurred",
            )]),
            _ => None,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AppError::Validation(details) => write!(f, "Validation failed: {} errors", details.len()),
            AppError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not Found: {}", msg),
            AppError::Conflict(msg, _) => write!(f, "Conflict: {}", msg),
            AppError::RateLimited(msg) => write!(f, "Rate Limited: {}", msg),
            AppError::Database(msg) => write!(f, "Database Error: {}", msg),
            AppError::Internal(msg) => write!(f, "Internal Server Error: {}", msg),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        self.status()
    }

    /// Fallback rendering for errors that escape the request-id middleware
    /// (it rebuilds error bodies itself so the correlation id matches the
    /// request; this path only runs without that middleware in place).
    fn error_response(&self) -> HttpResponse {
        ApiResponse::failure("unknown", self.client_message(), self.details())
            .respond(self.status())
    }
}

/// `sqlx::Error` → `AppError`. A missing row is `NotFound`; a unique-index
/// violation on the users email column is the duplicate-registration
/// conflict; anything else is an opaque store failure.
impl From<sqlx::Error> for AppError {
    fn from(error: sqlx::Error) -> AppError {
        match &error {
            sqlx::Error::RowNotFound => AppError::NotFound("Record not found".to_string()),
            sqlx::Error::Database(db) if db.constraint() == Some("users_email_key") => {
                AppError::Conflict(
                    "Email already registered".to_string(),
                    vec![ErrorDetail::field("email", "EMAIL_ALREADY_EXISTS")],
                )
            }
            _ => AppError::Database(error.to_string()),
        }
    }
}

/// `validator::ValidationErrors` → `AppError::Validation`, one detail per
/// failed field carrying the validator's error code.
impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> AppError {
        let details = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, field_errors)| {
                field_errors
                    .iter()
                    .map(move |e| ErrorDetail::field(field, e.code.as_ref()))
            })
            .collect();
        AppError::Validation(details)
    }
}

impl From<bcrypt::BcryptError> for AppError {
    fn from(error: bcrypt::BcryptError) -> AppError {
        AppError::Internal(format!("Password hashing failed: {}", error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[derive(Validate)]
    struct Probe {
        #[validate(email)]
        email: String,
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(AppError::Validation(vec![]).status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::Unauthorized("no".into()).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(AppError::NotFound("gone".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::Conflict("dup".into(), vec![]).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::RateLimited("slow down".into()).status(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            AppError::Database("boom".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AppError::Internal("boom".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_internal_errors_never_leak_detail() {
        let error = AppError::Database("connection refused on 10.0.0.3:5432".into());
        assert_eq!(error.client_message(), "Internal server error");

        let error = AppError::Internal("stack trace here".into());
        assert_eq!(error.client_message(), "Internal server error");
    }

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        let error: AppError = sqlx::Error::RowNotFound.into();
        assert_eq!(error.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_validation_errors_carry_field_details() {
        let probe = Probe {
            email: "not-an-email".into(),
        };
        let error: AppError = probe.validate().unwrap_err().into();

        match error {
            AppError::Validation(details) => {
                assert_eq!(details.len(), 1);
                assert_eq!(details[0].field.as_deref(), Some("email"));
                assert_eq!(details[0].code.as_deref(), Some("email"));
            }
            other => panic!("Expected Validation, got {:?}", other),
        }
    }

    #[test]
    fn test_error_responses() {
        let error = AppError::Unauthorized("Invalid token".into());
        let response = error.error_response();
        assert_eq!(response.status(), 401);

        let error = AppError::NotFound("Task not found".into());
        let response = error.error_response();
        assert_eq!(response.status(), 404);

        let error = AppError::Internal("Server error".into());
        let response = error.error_response();
        assert_eq!(response.status(), 500);
    }
}

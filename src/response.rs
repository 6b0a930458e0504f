//!
//! # Standardized Response Envelope
//!
//! Every boundary-crossing result is wrapped in the same record: a success
//! flag, a human-readable message, an optional payload, a timestamp, the
//! request's correlation id, and an optional list of error details. Building
//! an envelope also emits a log entry (info for success, error for failure)
//! tagged with the same correlation id, so a response body can always be
//! matched to its log lines.
//!
//! The correlation id itself is minted by the request-id middleware (see
//! `crate::middleware::request_id`); envelopes never generate one.

use actix_web::{http::StatusCode, HttpResponse};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// A single entry in an envelope's `errors` list. Field-shaped entries carry
/// `field`/`code` (e.g. a validation failure on `email`), kind-shaped entries
/// carry `type`/`detail` (e.g. an internal failure category).
#[derive(Debug, Clone, Serialize)]
pub struct ErrorDetail {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ErrorDetail {
    pub fn field(field: &str, code: &str) -> Self {
        Self {
            field: Some(field.to_string()),
            code: Some(code.to_string()),
            kind: None,
            detail: None,
        }
    }

    pub fn kind(kind: &str, detail: &str) -> Self {
        Self {
            field: None,
            code: None,
            kind: Some(kind.to_string()),
            detail: Some(detail.to_string()),
        }
    }
}

/// The uniform response record returned by every endpoint.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub message: String,
    pub data: Option<T>,
    pub timestamp: DateTime<Utc>,
    pub request_id: String,
    pub errors: Option<Vec<ErrorDetail>>,
}

impl<T: Serialize> ApiResponse<T> {
    /// Builds a success envelope and logs it at info level.
    pub fn success(request_id: &str, message: &str, data: T) -> Self {
        log::info!("request_id={} success response: {}", request_id, message);
        Self {
            success: true,
            message: message.to_string(),
            data: Some(data),
            timestamp: Utc::now(),
            request_id: request_id.to_string(),
            errors: None,
        }
    }

    /// Renders the envelope as a JSON response with the given status.
    pub fn respond(self, status: StatusCode) -> HttpResponse {
        HttpResponse::build(status).json(self)
    }
}

impl ApiResponse<()> {
    /// Builds an error envelope and logs it at error level.
    pub fn failure(
        request_id: &str,
        message: impl Into<String>,
        errors: Option<Vec<ErrorDetail>>,
    ) -> Self {
        let message = message.into();
        log::error!("request_id={} error response: {}", request_id, message);
        Self {
            success: false,
            message,
            data: None,
            timestamp: Utc::now(),
            request_id: request_id.to_string(),
            errors,
        }
    }
}

/// Shorthand used by handlers: build a success envelope and render it.
pub fn success_response<T: Serialize>(
    request_id: &str,
    status: StatusCode,
    message: &str,
    data: T,
) -> HttpResponse {
    ApiResponse::success(request_id, message, data).respond(status)
}

/// Shorthand used by the boundary: build an error envelope and render it.
pub fn error_response(
    request_id: &str,
    status: StatusCode,
    message: impl Into<String>,
    errors: Option<Vec<ErrorDetail>>,
) -> HttpResponse {
    ApiResponse::failure(request_id, message, errors).respond(status)
}

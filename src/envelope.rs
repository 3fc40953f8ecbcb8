//! Uniform response envelope.
//!
//! Every pipeline endpoint answers with
//! `{success, data, error, timestamp, request_id}`. `data` is only set on
//! success, `error` only on failure.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::errors::AppError;

/// Error payload carried by a failed envelope.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Human-readable error message
    pub message: String,
    /// HTTP status code of the response
    pub code: u16,
    /// Optional structured details
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub details: Option<serde_json::Value>,
}

/// Response envelope shared by all API endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ResponseEnvelope {
    /// True iff the HTTP status is 2xx
    pub success: bool,
    /// Endpoint payload on success, null otherwise
    #[schema(value_type = Option<Object>)]
    pub data: Option<serde_json::Value>,
    /// Error payload on failure, null otherwise
    pub error: Option<ErrorBody>,
    /// UTC time the envelope was built (ISO 8601)
    pub timestamp: String,
    /// Correlation id of the request that produced this envelope
    pub request_id: String,
}

/// An envelope paired with the HTTP status it is sent with.
///
/// This is the unit stored in the response cache, so a cache hit replays
/// the original status, timestamp and request id.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub envelope: ResponseEnvelope,
}

impl IntoResponse for ApiResponse {
    fn into_response(self) -> Response {
        (self.status, Json(self.envelope)).into_response()
    }
}

fn now_iso8601() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Wrap a payload into a 200 success envelope.
///
/// A payload that fails to serialize becomes a 500 envelope.
pub fn build_success<T: Serialize>(data: &T, request_id: &str) -> ApiResponse {
    match serde_json::to_value(data) {
        Ok(value) => ApiResponse {
            status: StatusCode::OK,
            envelope: ResponseEnvelope {
                success: true,
                data: Some(value),
                error: None,
                timestamp: now_iso8601(),
                request_id: request_id.to_string(),
            },
        },
        Err(e) => {
            tracing::error!(request_id, "Failed to serialize response payload: {}", e);
            build_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                crate::errors::GENERIC_ERROR_MESSAGE,
                None,
                request_id,
            )
        }
    }
}

/// Build an error envelope for the given status.
pub fn build_error(
    status: StatusCode,
    message: &str,
    details: Option<serde_json::Value>,
    request_id: &str,
) -> ApiResponse {
    ApiResponse {
        status,
        envelope: ResponseEnvelope {
            success: status.is_success(),
            data: None,
            error: Some(ErrorBody {
                message: message.to_string(),
                code: status.as_u16(),
                details,
            }),
            timestamp: now_iso8601(),
            request_id: request_id.to_string(),
        },
    }
}

/// Build the error envelope for a pipeline failure.
pub fn build_error_from(err: &AppError, debug: bool, request_id: &str) -> ApiResponse {
    build_error(err.status(), &err.public_message(debug), None, request_id)
}

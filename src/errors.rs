use axum::http::StatusCode;

/// Message returned to callers for unexpected failures outside debug mode.
pub const GENERIC_ERROR_MESSAGE: &str = "An unexpected error occurred";

/// Closed set of failure kinds produced by the request pipeline.
///
/// The orchestrator switches on the kind to pick the HTTP status:
/// `InvalidInput` and `NotFound` are client errors (400), `Unavailable`
/// and `Internal` are server errors (500).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AppError {
    /// Malformed city name, coordinates or bulk payload. Raised before any upstream call.
    #[error("{0}")]
    InvalidInput(String),

    /// The provider reports that the location does not exist.
    #[error("{0}")]
    NotFound(String),

    /// Provider timeout, transport failure or unexpected provider status.
    #[error("{0}")]
    Unavailable(String),

    /// Anything else, e.g. a provider document missing required fields.
    #[error("{0}")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidInput(_) | AppError::NotFound(_) => StatusCode::BAD_REQUEST,
            AppError::Unavailable(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to hand to the caller. Internal details are only
    /// exposed in debug mode.
    pub fn public_message(&self, debug: bool) -> String {
        match self {
            AppError::Internal(msg) if debug => msg.clone(),
            AppError::Internal(_) => GENERIC_ERROR_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }

    pub fn is_client_error(&self) -> bool {
        self.status().is_client_error()
    }
}

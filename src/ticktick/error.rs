//! Error taxonomy for TickTick API calls.
//!
//! Per-call failures are surfaced to the invoking tool as structured errors;
//! none of these crosses the protocol boundary as a panic.

use thiserror::Error;

use crate::auth::AuthError;

/// Errors from TickTick API operations (official and unofficial)
#[derive(Debug, Error)]
pub enum ApiError {
    /// The remote service reports the target id doesn't exist
    #[error("not found: {0}")]
    NotFound(String),
    /// Required fields missing or malformed (checked client-side or reported
    /// by the provider)
    #[error("validation error: {0}")]
    Validation(String),
    /// Any other non-2xx response, carrying the provider's status and body
    #[error("TickTick API error {status}: {message}")]
    Remote { status: u16, message: String },
    /// The outbound call exceeded its bounded timeout. Retry policy belongs
    /// to the caller, not this client.
    #[error("request timed out: {0}")]
    Timeout(String),
    /// Transport-level failure before any response arrived
    #[error("request failed: {0}")]
    Transport(String),
    /// No valid bearer token could be obtained
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ApiError::Timeout(e.to_string())
        } else {
            ApiError::Transport(e.to_string())
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Map a non-success status and provider body onto the taxonomy.
pub(crate) fn classify_status(status: u16, path: &str, body: String) -> ApiError {
    let message = if body.is_empty() {
        path.to_string()
    } else {
        format!("{}: {}", path, body)
    };
    match status {
        404 => ApiError::NotFound(message),
        400 | 422 => ApiError::Validation(message),
        _ => ApiError::Remote { status, message },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_status() {
        assert!(matches!(
            classify_status(404, "/task/x", String::new()),
            ApiError::NotFound(_)
        ));
        assert!(matches!(
            classify_status(400, "/task", "title required".to_string()),
            ApiError::Validation(_)
        ));
        assert!(matches!(
            classify_status(422, "/task", String::new()),
            ApiError::Validation(_)
        ));
        match classify_status(500, "/project", "boom".to_string()) {
            ApiError::Remote { status, message } => {
                assert_eq!(status, 500);
                assert!(message.contains("boom"));
            }
            other => panic!("expected Remote, got {:?}", other),
        }
    }
}

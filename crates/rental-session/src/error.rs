//! Session error types.

use rental_api::{ApiError, NETWORK_ERROR_MESSAGE};
use rental_storage::StorageError;
use thiserror::Error;

/// Session error type.
#[derive(Error, Debug)]
pub enum SessionError {
    /// The service could not be reached
    #[error("Network error: {0}")]
    Network(ApiError),

    /// The service refused the request (bad credentials, revoked refresh token, ...)
    #[error("Authentication rejected: {0}")]
    AuthRejected(String),

    /// A login or registration is already in flight
    #[error("Another login or registration is already in progress")]
    ConcurrentOperation,

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Not logged in")]
    NotAuthenticated,

    /// Invalid state transition in the session FSM
    #[error("Invalid session state transition: {0}")]
    InvalidStateTransition(String),

    #[error("Session manager has been disposed")]
    Disposed,
}

impl SessionError {
    /// Categorise a remote failure. `fallback` is the user-facing text used
    /// when the service gave no usable message.
    pub(crate) fn from_api(error: ApiError, fallback: &str) -> Self {
        if error.is_network() {
            return SessionError::Network(error);
        }
        match error {
            ApiError::Rejected { message, .. } => SessionError::AuthRejected(message),
            other => {
                tracing::debug!(error = %other, "Treating unusable response as rejection");
                SessionError::AuthRejected(fallback.to_string())
            }
        }
    }

    /// Text suitable for showing to a user.
    pub fn user_message(&self) -> String {
        match self {
            SessionError::Network(_) => NETWORK_ERROR_MESSAGE.to_string(),
            SessionError::AuthRejected(message) => message.clone(),
            other => other.to_string(),
        }
    }
}

/// Result type alias using SessionError.
pub type SessionResult<T> = Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_failure_maps_to_network() {
        let err = SessionError::from_api(ApiError::NetworkUnavailable, "Login failed");
        assert!(matches!(err, SessionError::Network(_)));
        assert_eq!(err.user_message(), NETWORK_ERROR_MESSAGE);
    }

    #[test]
    fn test_rejection_keeps_server_message() {
        let err = SessionError::from_api(
            ApiError::Rejected {
                status: Some(401),
                message: "Invalid email or password".to_string(),
            },
            "Login failed",
        );
        assert_eq!(err.user_message(), "Invalid email or password");
    }

    #[test]
    fn test_malformed_response_uses_fallback() {
        let err = SessionError::from_api(
            ApiError::MalformedResponse("missing access token".to_string()),
            "Registration failed",
        );
        assert!(matches!(err, SessionError::AuthRejected(ref m) if m == "Registration failed"));
    }

    #[test]
    fn test_concurrent_operation_message() {
        assert_eq!(
            SessionError::ConcurrentOperation.user_message(),
            "Another login or registration is already in progress"
        );
    }
}

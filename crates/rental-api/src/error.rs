//! API error types.

use thiserror::Error;

/// Message shown to users when the service could not be reached.
pub const NETWORK_ERROR_MESSAGE: &str = "Network error. Please check your connection.";

/// Error returned by remote API calls.
#[derive(Error, Debug)]
pub enum ApiError {
    /// No response reached us (connection refused, DNS, timeout)
    #[error("Network unavailable")]
    NetworkUnavailable,

    /// Transport error that is not a plain connectivity failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered and reported failure
    #[error("{message}")]
    Rejected { status: Option<u16>, message: String },

    /// The service answered with a body we cannot interpret
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// URL parse error
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl ApiError {
    /// Returns true if the request never got an answer from the service.
    pub fn is_network(&self) -> bool {
        match self {
            ApiError::NetworkUnavailable => true,
            ApiError::Http(e) => e.is_connect() || e.is_timeout() || e.is_request(),
            _ => false,
        }
    }

    /// Returns true if this error is transient and the operation can be retried.
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::Rejected {
                status: Some(status), ..
            } => *status >= 500,
            _ => self.is_network(),
        }
    }

    /// Text suitable for showing to a user.
    ///
    /// Rejections carry the server's message, network failures a fixed hint,
    /// and everything else the caller's fallback.
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            ApiError::Rejected { message, .. } => message.clone(),
            e if e.is_network() => NETWORK_ERROR_MESSAGE.to_string(),
            _ => fallback.to_string(),
        }
    }
}

/// Result type alias using ApiError.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_unavailable_is_network_and_transient() {
        assert!(ApiError::NetworkUnavailable.is_network());
        assert!(ApiError::NetworkUnavailable.is_transient());
    }

    #[test]
    fn test_server_error_is_transient() {
        let err = ApiError::Rejected {
            status: Some(503),
            message: "down".to_string(),
        };
        assert!(err.is_transient());
        assert!(!err.is_network());
    }

    #[test]
    fn test_rejection_is_not_transient() {
        let err = ApiError::Rejected {
            status: Some(401),
            message: "Invalid credentials".to_string(),
        };
        assert!(!err.is_transient());
    }

    #[test]
    fn test_user_message() {
        let rejected = ApiError::Rejected {
            status: Some(401),
            message: "Invalid credentials".to_string(),
        };
        assert_eq!(rejected.user_message("Login failed"), "Invalid credentials");
        assert_eq!(
            ApiError::NetworkUnavailable.user_message("Login failed"),
            NETWORK_ERROR_MESSAGE
        );
        assert_eq!(
            ApiError::MalformedResponse("missing token".to_string()).user_message("Login failed"),
            "Login failed"
        );
    }
}

//! Client error types.

use plaza_core::{DeliveryError, ErrorCategory};
use thiserror::Error;

/// Invalid client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// URL could not be parsed
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    /// URL scheme is not usable for this endpoint
    #[error("unsupported url scheme: {0}")]
    UnsupportedScheme(String),

    /// Session token cannot be sent as a header
    #[error("invalid session token: {0}")]
    InvalidToken(String),

    /// HTTP client could not be built
    #[error("http client: {0}")]
    HttpClient(String),
}

/// Realtime transport errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Socket could not be opened
    #[error("connection failed: {0}")]
    Connection(String),

    /// Socket failed after opening
    #[error("stream error: {0}")]
    Stream(String),
}

impl TransportError {
    /// Transport failures are always worth a reconnect.
    pub fn is_transient(&self) -> bool {
        true
    }
}

/// REST call errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// Request never produced a response
    #[error("network error: {0}")]
    Network(String),

    /// Server answered with a non-success status
    #[error("HTTP {status}: {message}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Server-provided reason, or the canonical status text
        message: String,
    },

    /// Server answered 2xx with `success: false`
    #[error("{0}")]
    Rejected(String),

    /// Response body did not have the expected shape
    #[error("unexpected response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Whether retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Status { status, .. } => *status >= 500 || *status == 429,
            Self::Rejected(_) | Self::Decode(_) => false,
        }
    }

    /// UI surfacing policy.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Decode(_) => ErrorCategory::Malformed,
            Self::Rejected(_) => ErrorCategory::Business,
            Self::Status { .. } if !self.is_transient() => ErrorCategory::Business,
            Self::Network(_) | Self::Status { .. } => ErrorCategory::Connectivity,
        }
    }

    /// Message suitable for a toast.
    pub fn user_message(&self) -> String {
        match self {
            Self::Rejected(message) | Self::Status { message, .. } => message.clone(),
            Self::Network(_) => "Network error, please try again".to_string(),
            Self::Decode(_) => "Unexpected server response".to_string(),
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            Self::Status { status: status.as_u16(), message: err.to_string() }
        } else {
            Self::Network(err.to_string())
        }
    }
}

impl From<ApiError> for DeliveryError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Network(reason) => Self::Transport(reason),
            ApiError::Status { status, message } if status >= 500 => {
                Self::Transport(format!("HTTP {status}: {message}"))
            },
            ApiError::Status { message, .. } | ApiError::Rejected(message) => Self::Rejected(message),
            ApiError::Decode(reason) => Self::Malformed(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_are_business() {
        let err = ApiError::Status { status: 403, message: "Not a member".into() };
        assert!(!err.is_transient());
        assert_eq!(err.category(), ErrorCategory::Business);
        assert_eq!(err.user_message(), "Not a member");
        assert_eq!(DeliveryError::from(err), DeliveryError::Rejected("Not a member".into()));
    }

    #[test]
    fn server_errors_are_connectivity() {
        let err = ApiError::Status { status: 502, message: "Bad Gateway".into() };
        assert!(err.is_transient());
        assert_eq!(err.category(), ErrorCategory::Connectivity);
        assert!(matches!(DeliveryError::from(err), DeliveryError::Transport(_)));
    }

    #[test]
    fn decode_is_malformed() {
        let err = ApiError::Decode("missing field".into());
        assert_eq!(err.category(), ErrorCategory::Malformed);
        assert!(matches!(DeliveryError::from(err), DeliveryError::Malformed(_)));
    }
}

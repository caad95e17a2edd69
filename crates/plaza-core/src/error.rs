//! Error types for the realtime core.
//!
//! Two layers: connection errors (open, close, timeouts, authentication) and
//! delivery errors (sending, deleting, acknowledging). Every error maps to an
//! [`ErrorCategory`] that decides how the UI surfaces it.

use std::time::Duration;

use plaza_proto::ProtocolError;
use thiserror::Error;

/// How an error is surfaced to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Channel down or request timed out. Passive status indicator, fallback
    /// path or reconnect.
    Connectivity,
    /// Input rejected before any network call. Inline message or toast.
    Validation,
    /// Server refused the action. Toast with the server message, roll back.
    Business,
    /// Unparseable frame or unexpected response shape. Logged and dropped.
    Malformed,
}

/// Errors from the connection state machine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// Transport could not be opened
    #[error("open failed: {0}")]
    OpenFailed(String),

    /// Transport closed without the user asking
    #[error("connection closed: {0}")]
    Closed(String),

    /// Transport did not open in time
    #[error("open timeout after {elapsed:?}")]
    OpenTimeout {
        /// How long we waited
        elapsed: Duration,
    },

    /// No inbound frame for too long
    #[error("idle timeout after {elapsed:?}")]
    IdleTimeout {
        /// How long the connection was silent
        elapsed: Duration,
    },

    /// Server rejected the authentication token
    #[error("authentication rejected: {0}")]
    AuthRejected(String),

    /// Operation requires an open connection
    #[error("not connected")]
    NotConnected,

    /// Reconnect attempts exhausted for this page load
    #[error("realtime unavailable after {attempts} attempts")]
    Unavailable {
        /// Consecutive failures observed
        attempts: u32,
    },
}

impl ConnectionError {
    /// Returns true if this error is transient and may succeed on retry.
    ///
    /// Rejected credentials and an exhausted reconnect budget are not.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::OpenFailed(_)
                | Self::Closed(_)
                | Self::OpenTimeout { .. }
                | Self::IdleTimeout { .. }
                | Self::NotConnected
        )
    }

    /// UI surfacing policy.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::AuthRejected(_) => ErrorCategory::Business,
            _ => ErrorCategory::Connectivity,
        }
    }
}

/// Errors from message delivery.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// Input rejected before any network call
    #[error("{0}")]
    Validation(String),

    /// Acknowledgement did not arrive in time
    #[error("no acknowledgement after {elapsed:?}")]
    AckTimeout {
        /// Configured ack timeout
        elapsed: Duration,
    },

    /// Channel not connected
    #[error("realtime channel not connected")]
    NotConnected,

    /// Channel dropped while the request was pending
    #[error("connection lost before acknowledgement")]
    ConnectionLost,

    /// Server refused the request
    #[error("{0}")]
    Rejected(String),

    /// HTTP path failed at the network level
    #[error("request failed: {0}")]
    Transport(String),

    /// Reply could not be interpreted
    #[error("malformed reply: {0}")]
    Malformed(String),
}

impl DeliveryError {
    /// Returns true if the other delivery path may still succeed.
    ///
    /// Used to decide whether the HTTP fallback runs after a duplex failure.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::AckTimeout { .. } | Self::NotConnected | Self::ConnectionLost | Self::Transport(_)
        )
    }

    /// UI surfacing policy.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Validation(_) => ErrorCategory::Validation,
            Self::Rejected(_) => ErrorCategory::Business,
            Self::Malformed(_) => ErrorCategory::Malformed,
            Self::AckTimeout { .. } | Self::NotConnected | Self::ConnectionLost | Self::Transport(_) => {
                ErrorCategory::Connectivity
            },
        }
    }
}

impl From<ProtocolError> for DeliveryError {
    fn from(err: ProtocolError) -> Self {
        Self::Malformed(err.to_string())
    }
}

impl From<ConnectionError> for DeliveryError {
    fn from(err: ConnectionError) -> Self {
        match err {
            ConnectionError::NotConnected | ConnectionError::Unavailable { .. } => Self::NotConnected,
            other => Self::Transport(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connectivity_errors_are_transient() {
        assert!(ConnectionError::Closed("reset".into()).is_transient());
        assert!(ConnectionError::IdleTimeout { elapsed: Duration::from_secs(61) }.is_transient());
        assert!(ConnectionError::NotConnected.is_transient());
    }

    #[test]
    fn auth_and_exhaustion_are_fatal() {
        assert!(!ConnectionError::AuthRejected("bad token".into()).is_transient());
        assert!(!ConnectionError::Unavailable { attempts: 5 }.is_transient());
        assert_eq!(
            ConnectionError::AuthRejected("bad token".into()).category(),
            ErrorCategory::Business
        );
    }

    #[test]
    fn delivery_categories() {
        assert_eq!(DeliveryError::Validation("empty".into()).category(), ErrorCategory::Validation);
        assert_eq!(DeliveryError::Rejected("nope".into()).category(), ErrorCategory::Business);
        assert_eq!(
            DeliveryError::AckTimeout { elapsed: Duration::from_secs(8) }.category(),
            ErrorCategory::Connectivity
        );
        assert_eq!(DeliveryError::Malformed("x".into()).category(), ErrorCategory::Malformed);
    }

    #[test]
    fn rejection_does_not_fall_back() {
        assert!(!DeliveryError::Rejected("not a member".into()).is_transient());
        assert!(!DeliveryError::Validation("empty".into()).is_transient());
        assert!(DeliveryError::ConnectionLost.is_transient());
    }

    #[test]
    fn protocol_errors_are_malformed() {
        let err: DeliveryError = ProtocolError::MissingType.into();
        assert_eq!(err.category(), ErrorCategory::Malformed);
    }
}

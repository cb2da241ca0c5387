//! Error types for outbound delivery.
//!
//! Delivery failures never propagate past the dispatcher. Each one is
//! captured in the destination's outcome and mapped to the HTTP status the
//! caller sees for that destination.

use thiserror::Error;

/// Result type alias for delivery operations.
pub type Result<T> = std::result::Result<T, DeliveryError>;

/// Ways a single delivery can fail.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// Connection or transport failure.
    #[error("network connection failed: {message}")]
    NetworkError {
        /// Error message describing the network failure
        message: String,
    },

    /// Total request timeout exceeded.
    #[error("request timeout after {timeout_seconds}s")]
    Timeout {
        /// Configured total timeout
        timeout_seconds: u64,
    },

    /// Client could not be built or the request could not be formed.
    #[error("invalid delivery configuration: {message}")]
    ConfigurationError {
        /// Configuration error message
        message: String,
    },

    /// Unexpected failure, including a delivery task that panicked.
    #[error("internal delivery error: {message}")]
    InternalError {
        /// Internal error message
        message: String,
    },
}

impl DeliveryError {
    /// Creates a network error from a message.
    pub fn network(message: impl Into<String>) -> Self {
        Self::NetworkError { message: message.into() }
    }

    /// Creates a timeout error.
    pub fn timeout(timeout_seconds: u64) -> Self {
        Self::Timeout { timeout_seconds }
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::ConfigurationError { message: message.into() }
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::InternalError { message: message.into() }
    }

    /// HTTP status reported for this failure.
    ///
    /// Network-level failures are a bad gateway; everything else is an
    /// internal error.
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::NetworkError { .. } | Self::Timeout { .. } => 502,
            Self::ConfigurationError { .. } | Self::InternalError { .. } => 500,
        }
    }

    /// Whether the failure happened on the network path.
    pub const fn is_network(&self) -> bool {
        matches!(self, Self::NetworkError { .. } | Self::Timeout { .. })
    }
}

impl From<reqwest::Error> for DeliveryError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            return Self::network(format!("timed out: {e}"));
        }
        if e.is_connect() {
            return Self::network(format!("connection failed: {e}"));
        }
        if e.is_builder() {
            return Self::configuration(e.to_string());
        }
        if e.is_request() || e.is_body() || e.is_decode() {
            return Self::network(e.to_string());
        }
        Self::internal(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_failures_are_bad_gateway() {
        assert_eq!(DeliveryError::network("connection refused").status_code(), 502);
        assert_eq!(DeliveryError::timeout(10).status_code(), 502);
        assert!(DeliveryError::timeout(10).is_network());
    }

    #[test]
    fn other_failures_are_internal() {
        assert_eq!(DeliveryError::configuration("bad url").status_code(), 500);
        assert_eq!(DeliveryError::internal("task panicked").status_code(), 500);
        assert!(!DeliveryError::internal("task panicked").is_network());
    }

    #[test]
    fn error_display_format() {
        assert_eq!(DeliveryError::timeout(10).to_string(), "request timeout after 10s");
        assert_eq!(
            DeliveryError::network("refused").to_string(),
            "network connection failed: refused"
        );
    }
}

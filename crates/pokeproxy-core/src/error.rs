//! Error taxonomy for the proxy pipeline.
//!
//! Every error surfaced to a caller carries a stable code. `E1xxx` covers
//! rejected inbound requests, `E2xxx` delivery failures and `E3xxx` server
//! faults. The transport layer maps codes to HTTP statuses.

use thiserror::Error;

use crate::codec::DecodeError;

/// Result type alias using `ProxyError`.
pub type Result<T> = std::result::Result<T, ProxyError>;

/// Errors produced while handling an inbound request.
#[derive(Debug, Error)]
pub enum ProxyError {
    // Request errors (E1001-E1005)
    /// Signature header absent (E1001).
    #[error("[E1001] Missing signature: X-Grd-Signature header is required")]
    MissingSignature,

    /// HMAC did not verify (E1002).
    #[error("[E1002] Invalid signature: HMAC validation failed")]
    InvalidSignature,

    /// Payload could not be decoded (E1003).
    #[error("[E1003] {0}")]
    MalformedPayload(#[from] DecodeError),

    /// Payload exceeds the configured limit (E1004).
    #[error("[E1004] Payload too large: {size_bytes} bytes exceeds {limit_bytes} byte limit")]
    PayloadTooLarge {
        /// Size of the rejected body.
        size_bytes: usize,
        /// Configured maximum.
        limit_bytes: usize,
    },

    /// Caller exceeded its request quota (E1005).
    #[error("[E1005] Rate limited: retry after {retry_after_secs}s")]
    RateLimited {
        /// Seconds until another request would be admitted.
        retry_after_secs: u64,
    },

    // Delivery errors (E2001-E2002)
    /// Destination could not be reached (E2001).
    #[error("[E2001] Destination unavailable: {0}")]
    DestinationUnavailable(String),

    /// Destination did not answer in time (E2002).
    #[error("[E2002] Destination timeout: exceeded {timeout_ms}ms")]
    DestinationTimeout {
        /// Timeout that was exceeded in milliseconds.
        timeout_ms: u64,
    },

    // System errors (E3001-E3002)
    /// Server is misconfigured (E3001).
    #[error("[E3001] Configuration error: {0}")]
    Configuration(String),

    /// Unexpected internal failure (E3002).
    #[error("[E3002] Internal error: {0}")]
    Internal(String),

    /// Anything else.
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl ProxyError {
    /// Returns the stable error code.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::MissingSignature => "E1001",
            Self::InvalidSignature => "E1002",
            Self::MalformedPayload(_) => "E1003",
            Self::PayloadTooLarge { .. } => "E1004",
            Self::RateLimited { .. } => "E1005",
            Self::DestinationUnavailable(_) => "E2001",
            Self::DestinationTimeout { .. } => "E2002",
            Self::Configuration(_) => "E3001",
            Self::Internal(_) => "E3002",
            Self::Other(_) => "E9999",
        }
    }

    /// Whether the error was caused by the client's request.
    pub const fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::MissingSignature
                | Self::InvalidSignature
                | Self::MalformedPayload(_)
                | Self::PayloadTooLarge { .. }
                | Self::RateLimited { .. }
        )
    }
}

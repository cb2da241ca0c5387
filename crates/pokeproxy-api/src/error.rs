//! HTTP mapping for proxy errors.

use axum::{
    http::{header::RETRY_AFTER, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use pokeproxy_core::ProxyError;
use serde::{Deserialize, Serialize};
use tracing::error;

/// Error response with code and message.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error details including code and message
    pub error: ErrorDetail,
}

/// Detailed error information.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Error code from the taxonomy (E1001-E3002, E9999)
    pub code: String,
    /// Human-readable error description
    pub message: String,
}

/// A `ProxyError` on its way out as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub ProxyError);

impl ApiError {
    /// Status code for the wrapped error.
    pub fn status(&self) -> StatusCode {
        status_for(&self.0)
    }
}

impl From<ProxyError> for ApiError {
    fn from(error: ProxyError) -> Self {
        Self(error)
    }
}

/// Maps an error code to its HTTP status.
pub fn status_for(error: &ProxyError) -> StatusCode {
    match error {
        ProxyError::MissingSignature | ProxyError::InvalidSignature => StatusCode::UNAUTHORIZED,
        ProxyError::MalformedPayload(_) => StatusCode::BAD_REQUEST,
        ProxyError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        ProxyError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        ProxyError::DestinationUnavailable(_) | ProxyError::DestinationTimeout { .. } => {
            StatusCode::BAD_GATEWAY
        },
        ProxyError::Configuration(_) | ProxyError::Internal(_) | ProxyError::Other(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        },
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Internal and unclassified error details stay in logs.
        let message = match &self.0 {
            ProxyError::Internal(detail) => {
                error!(code = self.0.code(), detail = %detail, "Internal error");
                "[E3002] Internal error".to_string()
            },
            ProxyError::Other(e) => {
                error!(error = %e, "Unhandled error");
                "Internal server error".to_string()
            },
            other => other.to_string(),
        };

        let body = ErrorResponse { error: ErrorDetail { code: self.0.code().to_string(), message } };
        let mut response = (status, Json(body)).into_response();

        if let ProxyError::RateLimited { retry_after_secs } = self.0 {
            response.headers_mut().insert(RETRY_AFTER, HeaderValue::from(retry_after_secs));
        }

        response
    }
}

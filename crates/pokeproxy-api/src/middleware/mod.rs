//! HTTP middleware for request admission.
//!
//! Provides per-client rate limiting applied in front of the handlers.
pub mod rate_limit;

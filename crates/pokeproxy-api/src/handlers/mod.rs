//! HTTP request handlers for the proxy API.
//!
//! Handlers are grouped by functionality:
//! - `stream` - Signed record ingestion and routing
//! - `stats` - Per-destination metrics
//! - `health` - Health check
//! - `sink` - Built-in test destination
//!
//! Failures are returned as `{"error": {"code", "message"}}` bodies with
//! codes from the `ProxyError` taxonomy.

pub mod health;
pub mod sink;
pub mod stats;
pub mod stream;

pub use health::health_check;
pub use sink::test_destination;
pub use stats::get_stats;
pub use stream::stream;

//! Outbound delivery for routed records.
//!
//! Forwards a decoded record as JSON to the destinations selected by the
//! rule engine. Delivery to a single destination never fails as a Rust
//! error; the response or the failure is returned as a `DeliveryOutcome`.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use pokeproxy_core::models::Record;
//! use pokeproxy_delivery::{DeliveryClient, DeliveryError, DeliveryTarget};
//! use reqwest::header::HeaderMap;
//!
//! # async fn example() -> Result<(), DeliveryError> {
//! let client = DeliveryClient::with_defaults()?;
//! let targets = vec![
//!     DeliveryTarget::new("http://fire.example/hook", "fire types"),
//!     DeliveryTarget::new("http://audit.example/hook", "everything"),
//! ];
//!
//! let outcomes = client
//!     .deliver_all(&targets, Arc::new(Record::default()), Arc::new(HeaderMap::new()))
//!     .await;
//! assert_eq!(outcomes.len(), 2);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod outcome;

pub use client::{build_outbound_headers, ClientConfig, DeliveryClient, DeliveryTarget};
pub use error::{DeliveryError, Result};
pub use outcome::{DeliveryOutcome, DestinationResponse, OutcomeSummary};

/// Default total delivery timeout in seconds.
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 10;

/// Default connect timeout in seconds.
pub const DEFAULT_CONNECT_TIMEOUT_SECONDS: u64 = 5;

//! Test infrastructure shared across the workspace.
//!
//! Provides wiremock-backed destinations, record builders, signed payload
//! fixtures and rules-file helpers so integration tests in each crate set up
//! the same way.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod fixtures;
pub mod http;

pub use fixtures::{
    rule_json, sign, signed_payload, write_rules_file, RecordBuilder, SignedPayload, TEST_SECRET,
};
pub use http::{MockDestination, MockEndpoint, MockResponse};
pub use pokeproxy_core::{Clock, TestClock};

//! Core domain types for the routing proxy.
//!
//! Provides the record model and its wire codec, declarative routing rules,
//! per-destination statistics and the error taxonomy shared by the delivery
//! and API crates.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod codec;
pub mod error;
pub mod models;
pub mod rules;
pub mod stats;
pub mod time;

pub use codec::{decode_record, encode_record, normalize, DecodeError, RawRecord};
pub use error::{ProxyError, Result};
pub use models::{Field, FieldKind, FieldValue, Record};
pub use rules::{all_matches, first_match, Operator, Predicate, PredicateError, Rule, RuleConfig};
pub use stats::{DestinationMetrics, StatsStore};
pub use time::{Clock, RealClock, TestClock};

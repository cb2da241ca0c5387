//! Pokeproxy HTTP API.
//!
//! Accepts signed records on `/stream`, routes them through the rule engine
//! and forwards them to the selected destinations.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod crypto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod server;

pub use config::{load_rules, Config, MatchMode};
pub use error::{ApiError, ErrorResponse};
pub use server::{create_router, start_server, AppState};

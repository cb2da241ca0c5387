//! Per-destination delivery statistics.
//!
//! Counters are kept per destination URL in a concurrent map so that parallel
//! deliveries update disjoint entries without a global lock. Each entry keeps
//! a running total of response time rather than individual samples, so memory
//! stays constant per destination.

use std::{collections::BTreeMap, sync::Arc, time::Duration};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::time::{Clock, RealClock};

/// Raw counters for a single destination.
#[derive(Debug, Clone, Copy)]
struct Counters {
    requests: u64,
    responses: u64,
    errors: u64,
    bytes_in: u64,
    bytes_out: u64,
    total_response_time: Duration,
    first_seen: std::time::Instant,
}

impl Counters {
    fn new(first_seen: std::time::Instant) -> Self {
        Self {
            requests: 0,
            responses: 0,
            errors: 0,
            bytes_in: 0,
            bytes_out: 0,
            total_response_time: Duration::ZERO,
            first_seen,
        }
    }
}

/// Derived metrics for one destination, as reported by the stats endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DestinationMetrics {
    /// Deliveries attempted.
    pub request_count: u64,
    /// Deliveries that failed or got a non-2xx response.
    pub error_count: u64,
    /// Percentage of recorded responses that were errors.
    pub error_rate: f64,
    /// Bytes sent to the destination.
    pub bytes_in: u64,
    /// Bytes received from the destination.
    pub bytes_out: u64,
    /// Mean response time in milliseconds.
    pub avg_response_time_ms: f64,
    /// Seconds since the destination was first seen.
    pub uptime_seconds: f64,
}

/// Concurrent statistics store keyed by destination URL.
///
/// Updates to a single destination are atomic with respect to each other;
/// a snapshot never observes a half-applied response.
#[derive(Debug)]
pub struct StatsStore {
    entries: DashMap<String, Counters>,
    clock: Arc<dyn Clock>,
}

impl Default for StatsStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsStore {
    /// Creates an empty store using the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(RealClock))
    }

    /// Creates an empty store with an injected clock.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self { entries: DashMap::new(), clock }
    }

    /// Records an outbound delivery of `bytes_in` bytes.
    pub fn record_request(&self, destination: &str, bytes_in: u64) {
        let now = self.clock.now();
        let mut entry =
            self.entries.entry(destination.to_string()).or_insert_with(|| Counters::new(now));
        entry.requests += 1;
        entry.bytes_in = entry.bytes_in.saturating_add(bytes_in);
        trace!(destination, requests = entry.requests, "Recorded request");
    }

    /// Records the outcome of a delivery.
    pub fn record_response(
        &self,
        destination: &str,
        bytes_out: u64,
        elapsed: Duration,
        is_error: bool,
    ) {
        let now = self.clock.now();
        let mut entry =
            self.entries.entry(destination.to_string()).or_insert_with(|| Counters::new(now));
        entry.responses += 1;
        if is_error {
            entry.errors += 1;
        }
        entry.bytes_out = entry.bytes_out.saturating_add(bytes_out);
        entry.total_response_time = entry.total_response_time.saturating_add(elapsed);
        trace!(destination, responses = entry.responses, is_error, "Recorded response");
    }

    /// Metrics for one destination, or `None` if it has never been seen.
    pub fn snapshot(&self, destination: &str) -> Option<DestinationMetrics> {
        let now = self.clock.now();
        self.entries.get(destination).map(|entry| derive(&entry, now))
    }

    /// Metrics for every destination seen so far, ordered by URL.
    pub fn snapshot_all(&self) -> BTreeMap<String, DestinationMetrics> {
        let now = self.clock.now();
        self.entries.iter().map(|entry| (entry.key().clone(), derive(entry.value(), now))).collect()
    }

    /// Number of destinations tracked.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no destination has been recorded yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[allow(clippy::cast_precision_loss)]
fn derive(counters: &Counters, now: std::time::Instant) -> DestinationMetrics {
    let (error_rate, avg_response_time_ms) = if counters.responses == 0 {
        (0.0, 0.0)
    } else {
        let responses = counters.responses as f64;
        (
            counters.errors as f64 / responses * 100.0,
            counters.total_response_time.as_nanos() as f64 / responses / 1_000_000.0,
        )
    };

    DestinationMetrics {
        request_count: counters.requests,
        error_count: counters.errors,
        error_rate,
        bytes_in: counters.bytes_in,
        bytes_out: counters.bytes_out,
        avg_response_time_ms,
        uptime_seconds: now.saturating_duration_since(counters.first_seen).as_secs_f64(),
    }
}

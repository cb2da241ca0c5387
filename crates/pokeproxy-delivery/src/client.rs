//! HTTP client for record delivery with configurable timeouts.
//!
//! Converts a decoded record to JSON, forwards it with the caller's headers
//! and captures every outcome, successful or not, as data. Fan-out runs one
//! task per destination so total latency tracks the slowest destination.

use std::{sync::Arc, time::Duration};

use futures::future::join_all;
use pokeproxy_core::{models::Record, rules::Rule};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, info_span, warn, Instrument};

use crate::{
    error::{DeliveryError, Result},
    outcome::{render_headers, DeliveryOutcome, DestinationResponse},
};

/// Inbound header carrying the request signature. Never forwarded.
pub const SIGNATURE_HEADER: &str = "x-grd-signature";

/// Outbound header carrying the matching rule's reason.
pub const REASON_HEADER: &str = "x-grd-reason";

/// Configuration for the delivery client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Total timeout for one delivery.
    pub timeout: Duration,
    /// Timeout for establishing the connection.
    pub connect_timeout: Duration,
    /// User agent string for requests.
    pub user_agent: String,
    /// Maximum number of redirects to follow. Zero relays the redirect.
    pub max_redirects: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(5),
            user_agent: concat!("pokeproxy/", env!("CARGO_PKG_VERSION")).to_string(),
            max_redirects: 0,
        }
    }
}

/// A destination selected by a rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryTarget {
    /// Destination URL.
    pub url: String,
    /// Reason forwarded in the reason header.
    pub reason: String,
}

impl DeliveryTarget {
    /// Creates a target from a URL and reason.
    pub fn new(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self { url: url.into(), reason: reason.into() }
    }
}

impl From<&Rule> for DeliveryTarget {
    fn from(rule: &Rule) -> Self {
        Self::new(rule.url(), rule.reason())
    }
}

/// HTTP client for record delivery.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct DeliveryClient {
    client: reqwest::Client,
    config: ClientConfig,
}

impl DeliveryClient {
    /// Creates a new delivery client with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns `DeliveryError::ConfigurationError` if the HTTP client cannot
    /// be built with the provided settings.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let redirect = match config.max_redirects {
            0 => reqwest::redirect::Policy::none(),
            limit => reqwest::redirect::Policy::limited(limit),
        };

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(&config.user_agent)
            .redirect(redirect)
            .build()
            .map_err(|e| {
                DeliveryError::configuration(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self { client, config })
    }

    /// Creates a new delivery client with default configuration.
    pub fn with_defaults() -> Result<Self> {
        Self::new(ClientConfig::default())
    }

    /// Delivers a record to one destination.
    ///
    /// Never fails: network errors and timeouts become a 502 outcome, any
    /// other failure a 500 outcome.
    pub async fn deliver(
        &self,
        target: &DeliveryTarget,
        record: &Record,
        inbound_headers: &HeaderMap,
    ) -> DeliveryOutcome {
        let span = info_span!(
            "record_delivery",
            url = %target.url,
            reason = %target.reason,
            record = %record.name,
        );

        async move {
            let start_time = std::time::Instant::now();
            let result = self.send(target, record, inbound_headers).await;
            let elapsed = start_time.elapsed();

            match &result {
                Ok(response) if response.status_code < 400 => {
                    info!(
                        status = response.status_code,
                        duration_ms = elapsed.as_millis(),
                        "Record delivered"
                    );
                },
                Ok(response) => {
                    warn!(
                        status = response.status_code,
                        duration_ms = elapsed.as_millis(),
                        body = %String::from_utf8_lossy(&response.body),
                        "Destination returned error status"
                    );
                },
                Err(e) => {
                    warn!(duration_ms = elapsed.as_millis(), error = %e, "Delivery failed");
                },
            }

            DeliveryOutcome {
                url: target.url.clone(),
                reason: target.reason.clone(),
                elapsed,
                result,
            }
        }
        .instrument(span)
        .await
    }

    async fn send(
        &self,
        target: &DeliveryTarget,
        record: &Record,
        inbound_headers: &HeaderMap,
    ) -> Result<DestinationResponse> {
        let body = serde_json::to_vec(record)
            .map_err(|e| DeliveryError::internal(format!("failed to encode record: {e}")))?;
        let headers = build_outbound_headers(inbound_headers, &target.reason)?;

        debug!(size = body.len(), "Forwarding record");

        let response = self
            .client
            .post(&target.url)
            .headers(headers)
            .body(body)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status_code = response.status().as_u16();
        let headers = render_headers(response.headers());
        let body = response.bytes().await.map_err(|e| self.classify(e))?;

        debug!(status = status_code, size = body.len(), "Received response");

        Ok(DestinationResponse { status_code, headers, body })
    }

    fn classify(&self, e: reqwest::Error) -> DeliveryError {
        if e.is_timeout() && !e.is_connect() {
            return DeliveryError::timeout(self.config.timeout.as_secs());
        }
        DeliveryError::from(e)
    }

    /// Delivers a record to every target concurrently.
    ///
    /// Each destination runs in its own task. Outcomes are returned in the
    /// order of `targets` regardless of completion order. A task that panics
    /// yields an internal-error outcome for its destination only.
    pub async fn deliver_all(
        &self,
        targets: &[DeliveryTarget],
        record: Arc<Record>,
        inbound_headers: Arc<HeaderMap>,
    ) -> Vec<DeliveryOutcome> {
        let handles = targets.iter().cloned().map(|target| {
            let client = self.clone();
            let record = Arc::clone(&record);
            let headers = Arc::clone(&inbound_headers);
            tokio::spawn(async move { client.deliver(&target, &record, &headers).await })
        });

        join_all(handles)
            .await
            .into_iter()
            .zip(targets)
            .map(|(joined, target)| {
                joined.unwrap_or_else(|e| {
                    warn!(url = %target.url, error = %e, "Delivery task failed");
                    DeliveryOutcome {
                        url: target.url.clone(),
                        reason: target.reason.clone(),
                        elapsed: Duration::ZERO,
                        result: Err(DeliveryError::internal(format!("delivery task failed: {e}"))),
                    }
                })
            })
            .collect()
    }
}

/// Builds the headers sent to a destination.
///
/// Copies the inbound headers except the signature, managed hop-by-hop
/// headers and the inbound content type, then sets the reason header and
/// `Content-Type: application/json`.
///
/// # Errors
///
/// Returns `DeliveryError::ConfigurationError` if the reason is not a valid
/// header value.
pub fn build_outbound_headers(inbound: &HeaderMap, reason: &str) -> Result<HeaderMap> {
    let mut headers = HeaderMap::with_capacity(inbound.len() + 2);

    for (name, value) in inbound {
        if !is_managed_header(name.as_str()) {
            headers.append(name.clone(), value.clone());
        }
    }

    let reason = HeaderValue::from_str(reason).map_err(|e| {
        DeliveryError::configuration(format!("reason is not a valid header value: {e}"))
    })?;
    headers.insert(HeaderName::from_static(REASON_HEADER), reason);
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    Ok(headers)
}

/// Checks if a header is managed by the proxy and must not be copied from
/// the inbound request.
fn is_managed_header(header_name: &str) -> bool {
    let lowercase = header_name.to_ascii_lowercase();
    matches!(
        lowercase.as_str(),
        SIGNATURE_HEADER
            | REASON_HEADER
            | "content-type"
            | "content-length"
            | "host"
            | "connection"
            | "keep-alive"
            | "proxy-authenticate"
            | "proxy-authorization"
            | "te"
            | "trailer"
            | "transfer-encoding"
            | "upgrade"
    )
}

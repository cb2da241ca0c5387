//! Signed record ingestion and routing.
//!
//! Authenticates the raw body, decodes and normalizes the record, selects
//! destinations with the rule engine and forwards the record to them. Stats
//! are recorded around every delivery.

use std::sync::Arc;

use axum::{
    extract::{rejection::BytesRejection, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use pokeproxy_core::{
    codec::{decode_record, normalize},
    models::Record,
    rules::{all_matches, first_match, Rule},
    ProxyError,
};
use pokeproxy_delivery::{
    client::SIGNATURE_HEADER, DeliveryError, DeliveryOutcome, DeliveryTarget, OutcomeSummary,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};

use crate::{config::MatchMode, crypto::verify_signature, error::ApiError, AppState};

/// Response when no rule matches the record.
#[derive(Debug, Serialize, Deserialize)]
pub struct NoMatchResponse {
    /// Human-readable status.
    pub status: String,
}

/// Aggregate response in all-matches mode.
#[derive(Debug, Serialize)]
pub struct ForwardedResponse {
    /// Always `forwarded`.
    pub status: &'static str,
    /// Name of the routed record.
    pub pokemon_name: String,
    /// Number of rules that matched.
    pub matched_rules_count: usize,
    /// One entry per destination, in rule order.
    pub responses: Vec<OutcomeSummary>,
}

/// Receives a signed record and routes it.
///
/// # Errors
///
/// Returns appropriate HTTP status codes:
/// - 401: Missing or invalid signature
/// - 400: Body is not a valid record
/// - 413: Body exceeds the configured limit
/// - 500: Secret not configured or internal failure
/// - 502: Destination unreachable in first-match mode
#[instrument(
    name = "stream",
    skip_all,
    fields(
        content_length = headers.get("content-length").and_then(|v| v.to_str().ok()).unwrap_or("unknown"),
        mode = ?state.match_mode,
    )
)]
pub async fn stream(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    match route_record(&state, headers, body).await {
        Ok(response) => response,
        Err(e) => {
            if e.is_client_error() {
                warn!(code = e.code(), error = %e, "Rejected stream request");
            } else {
                error!(code = e.code(), error = %e, "Failed to route record");
            }
            ApiError(e).into_response()
        },
    }
}

async fn route_record(
    state: &AppState,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<Response, ProxyError> {
    let body = body.map_err(|rejection| body_error(&rejection, &headers, state.max_payload_bytes))?;

    let secret = state
        .secret
        .as_deref()
        .ok_or_else(|| ProxyError::Configuration("ENC_SECRET is not set".to_string()))?;

    let signature = headers.get(SIGNATURE_HEADER).ok_or(ProxyError::MissingSignature)?;
    let signature = signature.to_str().map_err(|_| ProxyError::InvalidSignature)?;
    if !verify_signature(signature, &body, secret) {
        return Err(ProxyError::InvalidSignature);
    }

    let record = normalize(&decode_record(&body)?);

    info!(
        name = %record.name,
        number = record.number,
        type_one = %record.type_one,
        type_two = %record.type_two,
        hit_points = record.hit_points,
        attack = record.attack,
        defense = record.defense,
        generation = record.generation,
        legendary = record.legendary,
        "Received record"
    );

    match state.match_mode {
        MatchMode::First => forward_first(state, record, &headers, body.len()).await,
        MatchMode::All => forward_all(state, record, headers, body.len()).await,
    }
}

async fn forward_first(
    state: &AppState,
    record: Record,
    headers: &HeaderMap,
    inbound_bytes: usize,
) -> Result<Response, ProxyError> {
    let Some(rule) = first_match(&record, &state.rules) else {
        return Ok(no_match(&record));
    };
    info!(url = rule.url(), reason = rule.reason(), "Matched rule");

    let target = DeliveryTarget::from(rule);
    state.stats.record_request(&target.url, inbound_bytes as u64);
    let outcome = state.client.deliver(&target, &record, headers).await;
    record_outcome(state, &outcome);

    match outcome.result {
        Ok(response) => Ok(passthrough(response.status_code, &response.headers, response.body)),
        Err(e) => Err(delivery_error(e)),
    }
}

async fn forward_all(
    state: &AppState,
    record: Record,
    headers: HeaderMap,
    inbound_bytes: usize,
) -> Result<Response, ProxyError> {
    let matched: Vec<&Rule> = all_matches(&record, &state.rules);
    if matched.is_empty() {
        return Ok(no_match(&record));
    }
    info!(count = matched.len(), "Matched rules");

    let targets: Vec<DeliveryTarget> = matched.into_iter().map(DeliveryTarget::from).collect();
    for target in &targets {
        state.stats.record_request(&target.url, inbound_bytes as u64);
    }

    let pokemon_name = record.name.clone();
    let outcomes = state.client.deliver_all(&targets, Arc::new(record), Arc::new(headers)).await;
    for outcome in &outcomes {
        record_outcome(state, outcome);
    }

    Ok(Json(ForwardedResponse {
        status: "forwarded",
        pokemon_name,
        matched_rules_count: outcomes.len(),
        responses: outcomes.iter().map(DeliveryOutcome::summary).collect(),
    })
    .into_response())
}

fn record_outcome(state: &AppState, outcome: &DeliveryOutcome) {
    state.stats.record_response(
        &outcome.url,
        outcome.response_bytes(),
        outcome.elapsed,
        outcome.is_error(),
    );
}

fn no_match(record: &Record) -> Response {
    warn!(name = %record.name, "No matching rule");
    Json(NoMatchResponse { status: format!("No matching rule(s) found for {}", record.name) })
        .into_response()
}

/// Relays a destination response to the caller.
fn passthrough(
    status: u16,
    headers: &std::collections::BTreeMap<String, String>,
    body: Bytes,
) -> Response {
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
    let mut response = (status, body).into_response();

    for (name, value) in headers {
        if is_hop_by_hop(name) {
            continue;
        }
        match (HeaderName::try_from(name.as_str()), HeaderValue::try_from(value.as_str())) {
            (Ok(name), Ok(value)) => {
                response.headers_mut().insert(name, value);
            },
            _ => debug!(header = %name, "Dropping unrepresentable response header"),
        }
    }

    response
}

fn is_hop_by_hop(name: &str) -> bool {
    matches!(
        name.to_ascii_lowercase().as_str(),
        "content-length" | "transfer-encoding" | "connection" | "keep-alive" | "upgrade" | "te"
    )
}

fn delivery_error(error: DeliveryError) -> ProxyError {
    match error {
        DeliveryError::Timeout { timeout_seconds } => {
            ProxyError::DestinationTimeout { timeout_ms: timeout_seconds.saturating_mul(1000) }
        },
        DeliveryError::NetworkError { message } => ProxyError::DestinationUnavailable(message),
        other => ProxyError::Internal(other.to_string()),
    }
}

fn body_error(rejection: &BytesRejection, headers: &HeaderMap, limit_bytes: usize) -> ProxyError {
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        let size_bytes = headers
            .get("content-length")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .unwrap_or(limit_bytes.saturating_add(1));
        return ProxyError::PayloadTooLarge { size_bytes, limit_bytes };
    }
    ProxyError::Internal(format!("failed to read request body: {rejection}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_failures_map_to_gateway_errors() {
        assert_eq!(delivery_error(DeliveryError::network("refused")).code(), "E2001");
        assert_eq!(delivery_error(DeliveryError::timeout(10)).code(), "E2002");
        assert_eq!(delivery_error(DeliveryError::internal("panic")).code(), "E3002");
    }

    #[test]
    fn passthrough_keeps_status_and_headers() {
        let headers = std::collections::BTreeMap::from([
            ("x-destination".to_string(), "yes".to_string()),
            ("content-length".to_string(), "999".to_string()),
        ]);

        let response = passthrough(201, &headers, Bytes::from_static(b"created"));

        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()["x-destination"], "yes");
        assert_ne!(
            response.headers().get("content-length").map(HeaderValue::as_bytes),
            Some(b"999".as_slice())
        );
    }

    #[test]
    fn no_match_message_names_record() {
        let record = Record { name: "Magikarp".into(), ..Record::default() };
        let response = no_match(&record);
        assert_eq!(response.status(), StatusCode::OK);
    }
}

//! Shared setup for API integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, Response},
};
use pokeproxy_api::{AppState, Config, MatchMode};
use pokeproxy_core::{rules::Rule, StatsStore};
use pokeproxy_testing::{SignedPayload, TEST_SECRET};
use serde_json::Value;

/// Configuration with the test secret and generous quotas.
pub fn test_config(match_mode: MatchMode) -> Config {
    Config {
        enc_secret: Some(TEST_SECRET.to_string()),
        match_mode,
        delivery_timeout_seconds: 2,
        delivery_connect_timeout_seconds: 1,
        stream_rate_limit: "1000/minute".to_string(),
        default_rate_limit: "1000/minute".to_string(),
        ..Config::default()
    }
}

/// State built from `config` and `rules` with a fresh stats store.
pub fn state_with(config: &Config, rules: Vec<Rule>) -> AppState {
    AppState::from_config(config, rules, Arc::new(StatsStore::new())).unwrap()
}

/// State in the given mode with the test secret.
pub fn test_state(match_mode: MatchMode, rules: Vec<Rule>) -> AppState {
    state_with(&test_config(match_mode), rules)
}

/// A signed POST to `/stream`.
pub fn stream_request(payload: &SignedPayload) -> Request<Body> {
    Request::post("/stream")
        .header("x-grd-signature", &payload.signature)
        .header("content-type", "application/octet-stream")
        .body(Body::from(payload.body.clone()))
        .unwrap()
}

/// A GET for `path` with an empty body.
pub fn get(path: &str) -> Request<Body> {
    Request::get(path).body(Body::empty()).unwrap()
}

/// Reads a response body as JSON.
pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

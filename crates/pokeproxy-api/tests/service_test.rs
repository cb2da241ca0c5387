//! Integration tests for the health, stats and test destination endpoints.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use common::{body_json, get, stream_request, test_state};
use pokeproxy_api::{create_router, MatchMode};
use pokeproxy_core::rules::Rule;
use pokeproxy_testing::{signed_payload, MockDestination, RecordBuilder};
use serde_json::json;
use tower::ServiceExt;

#[tokio::test]
async fn health_reports_version_and_rules() {
    let rules = vec![
        Rule::new("http://a.test/hook", "a", ["number>0"]),
        Rule::new("http://b.test/hook", "b", ["legendary==true"]),
    ];
    let app = create_router(test_state(MatchMode::First, rules));

    let response = app.oneshot(get("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let request_id = response.headers().get("x-request-id").unwrap().to_str().unwrap();
    assert!(uuid::Uuid::parse_str(request_id).is_ok());

    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(body["rules_loaded"], 2);
}

#[tokio::test]
async fn stats_start_empty() {
    let app = create_router(test_state(MatchMode::First, Vec::new()));

    let response = app.oneshot(get("/stats")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({}));
}

#[tokio::test]
async fn stats_track_each_destination() {
    let destination = MockDestination::start().await;
    destination.mock_json("/hook", json!({"ok": true})).await;
    let url = destination.endpoint_url("/hook");

    let rules = vec![Rule::new(url.clone(), "fire", ["type_one==Fire"])];
    let app = create_router(test_state(MatchMode::First, rules));

    let payload = signed_payload(&RecordBuilder::charizard().build());
    for _ in 0..3 {
        let response = app.clone().oneshot(stream_request(&payload)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let stats = body_json(app.oneshot(get("/stats")).await.unwrap()).await;
    let entry = &stats[url.as_str()];
    assert_eq!(entry["request_count"], 3);
    assert_eq!(entry["error_count"], 0);
    assert_eq!(entry["error_rate"], 0.0);
    assert_eq!(entry["bytes_in"], 3 * payload.body.len() as u64);
    assert_eq!(entry["bytes_out"], 3 * br#"{"ok":true}"#.len() as u64);
    assert!(entry["avg_response_time_ms"].as_f64().unwrap() > 0.0);
    assert!(entry["uptime_seconds"].as_f64().unwrap() >= 0.0);
}

#[tokio::test]
async fn test_destination_echoes_forwarded_record() {
    let app = create_router(test_state(MatchMode::First, Vec::new()));

    let request = Request::post("/test-destination")
        .header("content-type", "application/json")
        .header("x-grd-reason", "local wiring")
        .body(Body::from(r#"{"name":"Mew","number":151,"legendary":true,"speed":100}"#))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["pokemon_received"], "Mew");
    assert_eq!(body["reason"], "local wiring");
    assert_eq!(
        body["received_data_sample"],
        json!({"name": "Mew", "number": 151, "legendary": true})
    );
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let app = create_router(test_state(MatchMode::First, Vec::new()));

    let response = app.oneshot(get("/ingest")).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

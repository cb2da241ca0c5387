//! Built-in destination for local wiring.
//!
//! Rules can point at `/test-destination` on the proxy itself. The sink
//! accepts anything and echoes what it understood, so it never fails a
//! delivery.

use axum::{
    http::{header::CONTENT_TYPE, HeaderMap},
    Json,
};
use bytes::Bytes;
use serde_json::{json, Map, Value};
use tracing::{debug, info, instrument, warn};

const SAMPLE_FIELDS: [&str; 4] = ["name", "number", "type_one", "legendary"];
const RAW_PREVIEW_CHARS: usize = 100;

/// Echoes a summary of the received record.
#[instrument(name = "test_destination", skip_all)]
pub async fn test_destination(headers: HeaderMap, body: Bytes) -> Json<Value> {
    debug!(?headers, "Test destination received headers");

    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("Not specified");

    let received = if content_type.to_ascii_lowercase().contains("application/json") {
        match serde_json::from_slice::<Value>(&body) {
            Ok(Value::Object(map)) => map,
            Ok(other) => Map::from_iter([("value".to_string(), other)]),
            Err(e) => {
                warn!(error = %e, "Test destination could not parse JSON");
                return Json(json!({
                    "status": "error",
                    "message": "Failed to parse JSON",
                    "error": e.to_string(),
                }));
            },
        }
    } else {
        warn!(content_type, "Non-JSON content type received");
        Map::from_iter([("raw_content".to_string(), Value::String(raw_preview(&body)))])
    };

    let reason = headers
        .get("x-grd-reason")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("No reason provided");
    let pokemon = received.get("name").and_then(Value::as_str).unwrap_or("Unknown");

    info!(pokemon, reason, "Test destination received record");

    let sample: Map<String, Value> = received
        .iter()
        .filter(|(key, _)| SAMPLE_FIELDS.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    Json(json!({
        "status": "ok",
        "message": "Test destination received the request",
        "pokemon_received": pokemon,
        "reason": reason,
        "received_data_sample": sample,
    }))
}

fn raw_preview(body: &[u8]) -> String {
    match std::str::from_utf8(body) {
        Ok(text) if text.chars().count() > RAW_PREVIEW_CHARS => {
            let mut preview: String = text.chars().take(RAW_PREVIEW_CHARS).collect();
            preview.push_str("...");
            preview
        },
        Ok(text) => text.to_string(),
        Err(_) => "Binary data (not shown)".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn json_headers(reason: Option<&str>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(reason) = reason {
            headers.insert("x-grd-reason", HeaderValue::from_str(reason).unwrap());
        }
        headers
    }

    #[tokio::test]
    async fn echoes_sample_of_json_record() {
        let body = Bytes::from(
            r#"{"name":"Pikachu","number":25,"type_one":"Electric","attack":55,"legendary":false}"#,
        );

        let Json(reply) = test_destination(json_headers(Some("electric")), body).await;

        assert_eq!(reply["status"], "ok");
        assert_eq!(reply["pokemon_received"], "Pikachu");
        assert_eq!(reply["reason"], "electric");
        assert_eq!(reply["received_data_sample"]["number"], 25);
        assert!(reply["received_data_sample"].get("attack").is_none());
    }

    #[tokio::test]
    async fn reports_invalid_json() {
        let Json(reply) = test_destination(json_headers(None), Bytes::from_static(b"{oops")).await;

        assert_eq!(reply["status"], "error");
        assert_eq!(reply["message"], "Failed to parse JSON");
    }

    #[tokio::test]
    async fn reports_non_json_bodies() {
        let Json(reply) =
            test_destination(HeaderMap::new(), Bytes::from_static(b"plain text")).await;

        assert_eq!(reply["status"], "ok");
        assert_eq!(reply["pokemon_received"], "Unknown");
        assert_eq!(reply["reason"], "No reason provided");
    }

    #[test]
    fn raw_preview_truncates_and_hides_binary() {
        let long = "a".repeat(150);
        assert_eq!(raw_preview(long.as_bytes()).len(), RAW_PREVIEW_CHARS + 3);
        assert_eq!(raw_preview(&[0xff, 0xfe]), "Binary data (not shown)");
    }
}

//! Per-destination delivery results.

use std::{collections::BTreeMap, time::Duration};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use reqwest::header::HeaderMap;
use serde::Serialize;
use serde_json::Value;

use crate::error::DeliveryError;

/// Response received from a destination.
#[derive(Debug, Clone)]
pub struct DestinationResponse {
    /// HTTP status returned by the destination.
    pub status_code: u16,
    /// Response headers rendered as text.
    pub headers: BTreeMap<String, String>,
    /// Raw response body.
    pub body: Bytes,
}

impl DestinationResponse {
    /// Body as a JSON value.
    ///
    /// Parsed JSON when possible, otherwise the body as a string, otherwise
    /// the body base64-encoded. Always representable.
    pub fn content(&self) -> Value {
        decode_content(&self.body)
    }
}

/// Result of delivering one record to one destination.
#[derive(Debug, Clone)]
pub struct DeliveryOutcome {
    /// Destination URL.
    pub url: String,
    /// Reason of the rule that selected the destination.
    pub reason: String,
    /// Wall time from sending the request to reading the full response.
    pub elapsed: Duration,
    /// Destination response, or the failure that prevented one.
    pub result: Result<DestinationResponse, DeliveryError>,
}

impl DeliveryOutcome {
    /// Status reported for this destination.
    pub fn status_code(&self) -> u16 {
        match &self.result {
            Ok(response) => response.status_code,
            Err(e) => e.status_code(),
        }
    }

    /// Whether the delivery counts as an error in statistics.
    pub fn is_error(&self) -> bool {
        self.status_code() >= 400
    }

    /// Bytes received back from the destination.
    pub fn response_bytes(&self) -> u64 {
        self.result.as_ref().map_or(0, |response| response.body.len() as u64)
    }

    /// Serializable view used in aggregate responses.
    pub fn summary(&self) -> OutcomeSummary {
        let (content, headers, error) = match &self.result {
            Ok(response) => (Some(response.content()), Some(response.headers.clone()), None),
            Err(e) => (None, None, Some(e.to_string())),
        };

        OutcomeSummary {
            url: self.url.clone(),
            reason: self.reason.clone(),
            status_code: self.status_code(),
            content,
            headers,
            error,
        }
    }
}

/// JSON shape of a single destination result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutcomeSummary {
    /// Destination URL.
    pub url: String,
    /// Rule reason.
    pub reason: String,
    /// Destination status, or 502/500 on failure.
    pub status_code: u16,
    /// Decoded response body.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<Value>,
    /// Response headers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,
    /// Failure message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Decodes a response body: JSON, then UTF-8 text, then base64.
pub fn decode_content(body: &[u8]) -> Value {
    if let Ok(json) = serde_json::from_slice::<Value>(body) {
        return json;
    }
    match std::str::from_utf8(body) {
        Ok(text) => Value::String(text.to_string()),
        Err(_) => Value::String(STANDARD.encode(body)),
    }
}

/// Renders headers as text, joining repeated names with `", "`.
pub fn render_headers(header_map: &HeaderMap) -> BTreeMap<String, String> {
    let mut headers: BTreeMap<String, String> = BTreeMap::new();

    for (key, value) in header_map {
        let value = String::from_utf8_lossy(value.as_bytes());
        headers
            .entry(key.to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert_with(|| value.into_owned());
    }

    headers
}

#[cfg(test)]
mod tests {
    use reqwest::header::HeaderValue;
    use serde_json::json;

    use super::*;

    fn outcome(result: Result<DestinationResponse, DeliveryError>) -> DeliveryOutcome {
        DeliveryOutcome {
            url: "http://dest.test".into(),
            reason: "test".into(),
            elapsed: Duration::from_millis(5),
            result,
        }
    }

    #[test]
    fn content_prefers_json_then_text_then_base64() {
        assert_eq!(decode_content(br#"{"ok": true}"#), json!({"ok": true}));
        assert_eq!(decode_content(b"plain text"), json!("plain text"));
        assert_eq!(decode_content(&[0xff, 0xfe, 0x00]), json!("//4A"));
        assert_eq!(decode_content(b""), json!(""));
    }

    #[test]
    fn headers_rendered_lossily_and_joined() {
        let mut map = HeaderMap::new();
        map.append("x-multi", HeaderValue::from_static("a"));
        map.append("x-multi", HeaderValue::from_static("b"));
        map.insert("x-bytes", HeaderValue::from_bytes(&[b'o', 0xff, b'k']).unwrap());

        let headers = render_headers(&map);

        assert_eq!(headers["x-multi"], "a, b");
        assert_eq!(headers["x-bytes"], "o\u{fffd}k");
    }

    #[test]
    fn failed_outcome_reports_error_status() {
        let failed = outcome(Err(DeliveryError::network("refused")));

        assert_eq!(failed.status_code(), 502);
        assert!(failed.is_error());
        assert_eq!(failed.response_bytes(), 0);

        let summary = serde_json::to_value(failed.summary()).unwrap();
        assert_eq!(summary["status_code"], 502);
        assert!(summary.get("content").is_none());
        assert!(summary["error"].as_str().unwrap().contains("refused"));
    }

    #[test]
    fn successful_outcome_carries_content() {
        let ok = outcome(Ok(DestinationResponse {
            status_code: 201,
            headers: BTreeMap::from([("x-id".to_string(), "7".to_string())]),
            body: Bytes::from_static(br#"{"id": 7}"#),
        }));

        assert!(!ok.is_error());
        assert_eq!(ok.response_bytes(), 9);

        let summary = serde_json::to_value(ok.summary()).unwrap();
        assert_eq!(summary["content"], json!({"id": 7}));
        assert_eq!(summary["headers"]["x-id"], "7");
        assert!(summary.get("error").is_none());
    }

    #[test]
    fn client_error_status_counts_as_error() {
        let rejected = outcome(Ok(DestinationResponse {
            status_code: 404,
            headers: BTreeMap::new(),
            body: Bytes::new(),
        }));
        assert!(rejected.is_error());
    }
}

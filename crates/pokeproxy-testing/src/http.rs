//! Mock destinations for delivery testing.

use std::{collections::HashMap, time::Duration};

use bytes::Bytes;
use http::StatusCode;
use serde_json::Value;
use wiremock::{
    matchers::{header, method, path},
    Mock, MockServer, Request, ResponseTemplate,
};

/// A wiremock server standing in for a routing destination.
pub struct MockDestination {
    server: MockServer,
}

impl MockDestination {
    /// Starts a new destination on a random port.
    pub async fn start() -> Self {
        Self { server: MockServer::start().await }
    }

    /// Base URL of the destination.
    pub fn url(&self) -> String {
        self.server.uri()
    }

    /// Full URL for a path on this destination.
    pub fn endpoint_url(&self, path: &str) -> String {
        format!("{}{path}", self.server.uri())
    }

    /// Configures an endpoint to return a specific response.
    pub async fn mock_endpoint(&self, endpoint: MockEndpoint) {
        let response = match endpoint.response {
            MockResponse::Success { status, body } => {
                ResponseTemplate::new(status.as_u16()).set_body_bytes(body.to_vec())
            },
            MockResponse::Json { status, body } => {
                ResponseTemplate::new(status.as_u16()).set_body_json(body)
            },
            MockResponse::Failure { status } => ResponseTemplate::new(status.as_u16()),
        };
        let response = match endpoint.delay {
            Some(delay) => response.set_delay(delay),
            None => response,
        };

        let mut mock = Mock::given(method("POST")).and(path(endpoint.path.clone()));

        for (key, value) in &endpoint.expected_headers {
            mock = mock.and(header(key.as_str(), value.as_str()));
        }

        mock.respond_with(response).mount(&self.server).await;
    }

    /// Shorthand for a JSON 200 endpoint.
    pub async fn mock_json(&self, path: &str, body: Value) {
        self.mock_endpoint(MockEndpoint::json(path, body)).await;
    }

    /// Returns all requests received by the destination.
    pub async fn received_requests(&self) -> Vec<Request> {
        self.server.received_requests().await.unwrap_or_default()
    }

    /// Asserts that exactly `expected` requests were received.
    pub async fn assert_request_count(&self, expected: usize) {
        let requests = self.received_requests().await;
        assert_eq!(
            requests.len(),
            expected,
            "Expected {} requests, received {}",
            expected,
            requests.len()
        );
    }

    /// Parsed JSON body of the last received request.
    pub async fn last_json_body(&self) -> Option<Value> {
        let requests = self.received_requests().await;
        requests.last().and_then(|request| serde_json::from_slice(&request.body).ok())
    }
}

/// Configuration for a mock endpoint.
pub struct MockEndpoint {
    /// Request path to match.
    pub path: String,
    /// Headers the request must carry.
    pub expected_headers: HashMap<String, String>,
    /// Response to return.
    pub response: MockResponse,
    /// Delay before responding.
    pub delay: Option<Duration>,
}

impl MockEndpoint {
    /// An endpoint returning an empty 200.
    pub fn success(path: impl Into<String>) -> Self {
        Self::with_response(path, MockResponse::Success { status: StatusCode::OK, body: Bytes::new() })
    }

    /// An endpoint returning a JSON 200.
    pub fn json(path: impl Into<String>, body: Value) -> Self {
        Self::with_response(path, MockResponse::Json { status: StatusCode::OK, body })
    }

    /// An endpoint returning an error status.
    pub fn failure(path: impl Into<String>, status: StatusCode) -> Self {
        Self::with_response(path, MockResponse::Failure { status })
    }

    fn with_response(path: impl Into<String>, response: MockResponse) -> Self {
        Self { path: path.into(), expected_headers: HashMap::new(), response, delay: None }
    }

    /// Adds an expected header to the mock.
    #[must_use]
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.expected_headers.insert(key.into(), value.into());
        self
    }

    /// Overrides the response status.
    #[must_use]
    pub fn with_status(mut self, new_status: StatusCode) -> Self {
        self.response = match self.response {
            MockResponse::Success { body, .. } => MockResponse::Success { status: new_status, body },
            MockResponse::Json { body, .. } => MockResponse::Json { status: new_status, body },
            MockResponse::Failure { .. } => MockResponse::Failure { status: new_status },
        };
        self
    }

    /// Delays the response.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

/// Types of mock responses.
pub enum MockResponse {
    /// Raw body with a status.
    Success {
        /// Response status.
        status: StatusCode,
        /// Response body.
        body: Bytes,
    },
    /// JSON body with a status.
    Json {
        /// Response status.
        status: StatusCode,
        /// Response body.
        body: Value,
    },
    /// Status only.
    Failure {
        /// Response status.
        status: StatusCode,
    },
}

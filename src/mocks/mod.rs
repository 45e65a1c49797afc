//! Mock implementations for testing.
//!
//! [`MockTransport`] replays queued responses and records every request with
//! the (tokio) instant it was sent, so tests running on a paused clock can
//! assert the exact backoff schedule.

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

use crate::codec;
use crate::transport::{HttpMethod, HttpRequest, HttpResponse, HttpTransport, TransportError};

/// Token endpoint path used by the default region table.
pub const TOKEN_PATH: &str = "/auth/o2/token";

/// A recorded request.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// HTTP method.
    pub method: HttpMethod,
    /// Absolute request URL.
    pub url: String,
    /// Request headers.
    pub headers: HashMap<String, String>,
    /// Request body.
    pub body: Option<Vec<u8>>,
    /// When the request reached the transport.
    pub at: Instant,
}

impl RecordedRequest {
    /// Looks up a header, ignoring case.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Parses the body as JSON.
    pub fn body_json(&self) -> Option<Value> {
        self.body
            .as_deref()
            .and_then(|body| serde_json::from_slice(body).ok())
    }

    /// Body as text.
    pub fn body_text(&self) -> Option<String> {
        self.body
            .as_deref()
            .map(|body| String::from_utf8_lossy(body).into_owned())
    }

    /// Returns true if this request went to the token endpoint.
    pub fn is_token_request(&self) -> bool {
        self.url.contains(TOKEN_PATH)
    }
}

/// A mock response.
#[derive(Debug, Clone)]
pub struct MockResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers.
    pub headers: HashMap<String, String>,
    /// Response body.
    pub body: Vec<u8>,
    /// Simulated latency before the response is returned.
    pub delay: Option<Duration>,
}

impl MockResponse {
    /// Creates an empty response with the given status.
    pub fn status(status: u16) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: Vec::new(),
            delay: None,
        }
    }

    /// Creates a successful JSON response.
    pub fn json<T: serde::Serialize>(value: &T) -> Self {
        Self::status(200)
            .with_header("content-type", "application/json")
            .with_body(serde_json::to_vec(value).unwrap_or_default())
    }

    /// Creates a JSON response from raw text, preserving number literals as written.
    pub fn raw_json(body: &str) -> Self {
        Self::status(200)
            .with_header("content-type", "application/json")
            .with_body(body.as_bytes().to_vec())
    }

    /// Creates a gzip-encoded JSON response.
    pub fn gzip_json(body: &str) -> Self {
        Self::raw_json(body)
            .with_header("content-encoding", "gzip")
            .with_body(codec::gzip(body.as_bytes()).unwrap_or_default())
    }

    /// Creates an API error response in the `{code, details}` shape.
    pub fn error(status: u16, details: &str) -> Self {
        Self::json(&serde_json::json!({
            "code": status.to_string(),
            "details": details,
        }))
        .with_status(status)
    }

    /// Creates a successful token endpoint response.
    pub fn token(access_token: &str) -> Self {
        Self::json(&serde_json::json!({
            "access_token": access_token,
            "refresh_token": "Atzr|unchanged",
            "token_type": "bearer",
            "expires_in": 3600,
        }))
    }

    /// Creates a 307 redirect.
    pub fn redirect(location: &str) -> Self {
        Self::status(307).with_header("location", location)
    }

    /// Sets the status.
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// Adds a header.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_string(), value.to_string());
        self
    }

    /// Replaces the body.
    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    /// Delays the response.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

struct Queued {
    url_fragment: Option<String>,
    outcome: Result<MockResponse, TransportError>,
}

/// Mock HTTP transport for testing.
///
/// Responses are consumed in FIFO order. A response queued with
/// [`queue_for`](Self::queue_for) only answers requests whose URL contains
/// the given fragment, which keeps token and API traffic apart.
#[derive(Default)]
pub struct MockTransport {
    responses: Mutex<Vec<Queued>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockTransport {
    /// Creates a new mock transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a response for any request.
    pub fn queue(&self, response: MockResponse) {
        self.push(None, Ok(response));
    }

    /// Queues a response for requests whose URL contains `url_fragment`.
    pub fn queue_for(&self, url_fragment: &str, response: MockResponse) {
        self.push(Some(url_fragment.to_string()), Ok(response));
    }

    /// Queues a JSON response.
    pub fn queue_json<T: serde::Serialize>(&self, value: &T) {
        self.queue(MockResponse::json(value));
    }

    /// Queues a token endpoint response.
    pub fn queue_token(&self, access_token: &str) {
        self.queue_for(TOKEN_PATH, MockResponse::token(access_token));
    }

    /// Queues a transport failure.
    pub fn queue_transport_error(&self, error: TransportError) {
        self.push(None, Err(error));
    }

    fn push(&self, url_fragment: Option<String>, outcome: Result<MockResponse, TransportError>) {
        lock(&self.responses).push(Queued {
            url_fragment,
            outcome,
        });
    }

    /// Gets all recorded requests.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock(&self.requests).clone()
    }

    /// Gets recorded requests that did not go to the token endpoint.
    pub fn api_requests(&self) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| !r.is_token_request())
            .collect()
    }

    /// Number of token endpoint requests.
    pub fn token_request_count(&self) -> usize {
        lock(&self.requests)
            .iter()
            .filter(|r| r.is_token_request())
            .count()
    }

    /// Gets the last recorded request.
    pub fn last_request(&self) -> Option<RecordedRequest> {
        lock(&self.requests).last().cloned()
    }

    /// Returns the number of requests made.
    pub fn request_count(&self) -> usize {
        lock(&self.requests).len()
    }

    /// Number of queued responses not yet consumed.
    pub fn pending(&self) -> usize {
        lock(&self.responses).len()
    }

    fn next_outcome(&self, url: &str) -> Result<MockResponse, TransportError> {
        let mut responses = lock(&self.responses);
        // Routed responses take precedence over catch-all ones.
        let position = responses
            .iter()
            .position(|queued| {
                queued
                    .url_fragment
                    .as_deref()
                    .is_some_and(|fragment| url.contains(fragment))
            })
            .or_else(|| responses.iter().position(|queued| queued.url_fragment.is_none()));

        match position {
            Some(index) => responses.remove(index).outcome,
            None => Ok(MockResponse::error(500, &format!("No mock response configured for {url}"))),
        }
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        lock(&self.requests).push(RecordedRequest {
            method: request.method,
            url: request.url.clone(),
            headers: request.headers.clone(),
            body: request.body.clone(),
            at: Instant::now(),
        });

        let response = self.next_outcome(&request.url)?;
        if let Some(delay) = response.delay {
            tokio::time::sleep(delay).await;
        }

        Ok(HttpResponse {
            status: response.status,
            headers: response.headers,
            body: Bytes::from(response.body),
        })
    }
}

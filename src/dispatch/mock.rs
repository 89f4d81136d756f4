//! Mock search backend for testing
//!
//! Records every request and answers from a script keyed by the `q`
//! parameter. Delays use `tokio::time::sleep`, so tests running with paused
//! time stay deterministic.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::time::Instant;
use url::Url;

use super::backend::SearchBackend;
use crate::error::{LookupError, Result};

/// Scripted answer
#[derive(Debug, Clone)]
pub enum MockResponse {
    Json(Value),
    Fail(LookupError),
    /// Answer after a delay
    Delayed(Duration, Box<MockResponse>),
    /// Never answer (until the caller gives up)
    Hang,
}

/// One recorded request
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub url: Url,
    pub query: Option<String>,
    pub limit: Option<usize>,
    pub at: Instant,
}

/// Mock backend with scripted responses
#[derive(Debug)]
pub struct MockBackend {
    responses: Mutex<HashMap<String, MockResponse>>,
    default: Mutex<MockResponse>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    /// Answers `[]` to everything until scripted otherwise
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(HashMap::new()),
            default: Mutex::new(MockResponse::Json(json!([]))),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Answer for queries without a specific script
    pub fn with_default(self, response: MockResponse) -> Self {
        *self.default.lock() = response;
        self
    }

    /// Answer `body` when `q == query`
    pub fn respond(&self, query: &str, body: Value) {
        self.script(query, MockResponse::Json(body));
    }

    /// Answer `body` after `delay` when `q == query`
    pub fn respond_after(&self, query: &str, delay: Duration, body: Value) {
        self.script(
            query,
            MockResponse::Delayed(delay, Box::new(MockResponse::Json(body))),
        );
    }

    /// Fail when `q == query`
    pub fn fail(&self, query: &str, error: LookupError) {
        self.script(query, MockResponse::Fail(error));
    }

    pub fn script(&self, query: &str, response: MockResponse) {
        self.responses.lock().insert(query.to_string(), response);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// `q` values in request order
    pub fn queries(&self) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .map(|c| c.query.clone().unwrap_or_default())
            .collect()
    }

    fn response_for(&self, query: &str) -> MockResponse {
        self.responses
            .lock()
            .get(query)
            .cloned()
            .unwrap_or_else(|| self.default.lock().clone())
    }
}

#[async_trait]
impl SearchBackend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    async fn search(&self, url: &Url) -> Result<Value> {
        let mut query = None;
        let mut limit = None;
        for (k, v) in url.query_pairs() {
            match k.as_ref() {
                "q" => query = Some(v.into_owned()),
                "limit" => limit = v.parse().ok(),
                _ => {}
            }
        }

        self.calls.lock().push(RecordedCall {
            url: url.clone(),
            query: query.clone(),
            limit,
            at: Instant::now(),
        });

        let mut response = self.response_for(query.as_deref().unwrap_or_default());
        loop {
            match response {
                MockResponse::Json(body) => return Ok(body),
                MockResponse::Fail(err) => return Err(err),
                MockResponse::Delayed(delay, inner) => {
                    tokio::time::sleep(delay).await;
                    response = *inner;
                }
                MockResponse::Hang => std::future::pending::<()>().await,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(q: &str) -> Url {
        let mut url = Url::parse("http://mock/api/lookup/items").unwrap();
        url.query_pairs_mut().append_pair("q", q).append_pair("limit", "5");
        url
    }

    #[tokio::test]
    async fn test_records_calls() {
        let mock = MockBackend::new();
        mock.respond("a", json!([{"id": 1}]));

        let body = mock.search(&url("a")).await.unwrap();
        assert_eq!(body, json!([{"id": 1}]));

        let calls = mock.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].query.as_deref(), Some("a"));
        assert_eq!(calls[0].limit, Some(5));
    }

    #[tokio::test]
    async fn test_default_response() {
        let mock = MockBackend::new().with_default(MockResponse::Json(json!({"items": []})));
        let body = mock.search(&url("zzz")).await.unwrap();
        assert_eq!(body, json!({"items": []}));
    }

    #[tokio::test]
    async fn test_scripted_failure() {
        let mock = MockBackend::new();
        mock.fail(
            "x",
            LookupError::HttpStatus {
                url: "u".into(),
                status: 503,
            },
        );
        let err = mock.search(&url("x")).await.unwrap_err();
        assert_eq!(err.code(), "LOOKUP-021");
    }

    #[tokio::test(start_paused = true)]
    async fn test_delayed_response_waits() {
        let mock = MockBackend::new();
        mock.respond_after("slow", Duration::from_millis(300), json!([]));

        let start = Instant::now();
        mock.search(&url("slow")).await.unwrap();
        assert_eq!(start.elapsed(), Duration::from_millis(300));
    }
}

//! Search backends
//!
//! [`SearchBackend`] is the seam between the dispatcher and the network.
//! [`HttpBackend`] talks to the real endpoints; tests use
//! [`MockBackend`](super::MockBackend).

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use serde_json::Value;
use tracing::{debug, instrument};
use url::Url;

use crate::config::EngineConfig;
use crate::error::{LookupError, Result};
use crate::util::constants::{REDIRECT_LIMIT, USER_AGENT};

/// Executes one search request and returns the raw JSON body
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Backend name for logs
    fn name(&self) -> &str;

    /// GET `url` (query string already attached)
    async fn search(&self, url: &Url) -> Result<Value>;
}

/// Build the final request URL: `?q={text}&limit={n}`
///
/// Empty text omits `q`, zero limit omits `limit`.
pub fn search_url(base: &Url, text: &str, limit: usize) -> Url {
    let mut url = base.clone();
    {
        let mut pairs = url.query_pairs_mut();
        if !text.is_empty() {
            pairs.append_pair("q", text);
        }
        if limit > 0 {
            pairs.append_pair("limit", &limit.to_string());
        }
    }
    if url.query() == Some("") {
        url.set_query(None);
    }
    url
}

/// HTTP backend with a shared, pooled reqwest client
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    timeout_ms: u64,
}

impl HttpBackend {
    pub fn new(config: &EngineConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.search_timeout())
            .connect_timeout(config.connect_timeout())
            .redirect(reqwest::redirect::Policy::limited(REDIRECT_LIMIT))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| LookupError::ConfigError {
                reason: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            timeout_ms: config.search_timeout_ms,
        })
    }
}

#[async_trait]
impl SearchBackend for HttpBackend {
    fn name(&self) -> &str {
        "http"
    }

    #[instrument(skip(self), fields(url = %url))]
    async fn search(&self, url: &Url) -> Result<Value> {
        debug!("Sending search request");

        let response = self
            .client
            .get(url.clone())
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LookupError::Timeout {
                        url: url.to_string(),
                        timeout_ms: self.timeout_ms,
                    }
                } else {
                    LookupError::Transport {
                        url: url.to_string(),
                        reason: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(LookupError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await.map_err(|e| LookupError::Transport {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        serde_json::from_slice(&bytes).map_err(|e| LookupError::MalformedBody {
            url: url.to_string(),
            details: e.to_string(),
        })
    }
}

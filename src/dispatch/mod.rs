//! # Query Dispatcher
//!
//! Turns "binding + text" into rows:
//!
//! 1. Text shorter than the binding's minimum → [`QueryOutcome::TooShort`],
//!    no cache, no network.
//! 2. Local pool → in-memory, case-insensitive substring filter.
//! 3. Cache hit (`Ready`) → rows; cache hit (`Pending`) → join the shared fetch.
//! 4. Miss → start a fetch, store it as `Pending` so concurrent callers with
//!    the same key share it.
//! 5. Every fetch runs under a hard timeout.
//! 6. Rows are cached; failures evict the key so the next keystroke retries.
//!
//! Per binding, a [`QuerySlot`] marks the previous search stale when a new
//! one starts and cancels it once the new one has claimed its cache key, so a
//! slow stale response can never overwrite a fresher one.
//! Cancellation is reported as [`QueryOutcome::Cancelled`], never as an error.

mod backend;
mod mock;

pub use backend::{search_url, HttpBackend, SearchBackend};
pub use mock::{MockBackend, MockResponse, RecordedCall};

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

use crate::binding::BindingConfig;
use crate::cache::{CacheKey, Claim, FetchOutcome, LookupCache, PendingQuery};
use crate::entity::EntityResolver;
use crate::error::LookupError;
use crate::event::{EventEmitter, EventKind};
use crate::page::ElementId;
use crate::row::{parse_rows, ResultRow, Rows};

/// Result of one query
#[derive(Debug, Clone)]
pub enum QueryOutcome {
    /// Text below the binding's minimum; close the panel
    TooShort,
    Rows(Rows),
    /// Transient failure, already logged; shown as zero rows
    Failed(LookupError),
    /// Superseded or aborted; apply nothing
    Cancelled,
}

impl QueryOutcome {
    /// Rows to display (empty for everything but `Rows`)
    pub fn rows(&self) -> Rows {
        match self {
            Self::Rows(rows) => Arc::clone(rows),
            _ => Vec::new().into(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Handle for one query issued through a [`QuerySlot`]
#[derive(Debug, Clone)]
pub struct QueryTicket {
    generation: u64,
    token: CancellationToken,
    /// Query this one replaces; cancelled once this one holds its cache entry
    previous: Option<CancellationToken>,
}

impl QueryTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Cancel the query this ticket replaced
    pub fn supersede_previous(&self) {
        if let Some(previous) = &self.previous {
            previous.cancel();
        }
    }
}

/// Per-binding "latest query wins" slot
///
/// Every ticket is a child of the binding's lifetime token, so cancelling
/// the parent (unbind) cancels whatever is in flight.
#[derive(Debug)]
pub struct QuerySlot {
    parent: CancellationToken,
    current: Mutex<Option<CancellationToken>>,
    generation: AtomicU64,
}

impl QuerySlot {
    pub fn new(parent: CancellationToken) -> Self {
        Self {
            parent,
            current: Mutex::new(None),
            generation: AtomicU64::new(0),
        }
    }

    /// Start a new query
    ///
    /// The previous query stops being current at once but keeps running
    /// until the new one calls [`QueryTicket::supersede_previous`]. A search
    /// for the same key can therefore join the old fetch instead of
    /// dropping it.
    pub fn begin(&self) -> QueryTicket {
        let token = self.parent.child_token();
        let previous = self.current.lock().replace(token.clone());
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        QueryTicket {
            generation,
            token,
            previous,
        }
    }

    /// Whether `ticket` is still the latest query
    pub fn is_current(&self, ticket: &QueryTicket) -> bool {
        self.generation.load(Ordering::SeqCst) == ticket.generation
            && !ticket.token.is_cancelled()
    }

    /// Cancel the in-flight query without starting another
    pub fn cancel(&self) {
        if let Some(token) = self.current.lock().take() {
            token.cancel();
        }
        self.generation.fetch_add(1, Ordering::SeqCst);
    }
}

/// Decrements the waiter count; the last waiter to leave without a result
/// removes the pending entry, which drops the request.
struct WaiterGuard<'a> {
    cache: &'a LookupCache,
    key: &'a CacheKey,
    pending: &'a PendingQuery,
    settled: bool,
}

impl<'a> WaiterGuard<'a> {
    /// Takes over the waiter count `claim` registered under the cache lock
    fn adopt(cache: &'a LookupCache, key: &'a CacheKey, pending: &'a PendingQuery) -> Self {
        Self {
            cache,
            key,
            pending,
            settled: false,
        }
    }
}

impl Drop for WaiterGuard<'_> {
    fn drop(&mut self) {
        let left = self.pending.waiters.fetch_sub(1, Ordering::SeqCst) - 1;
        if !self.settled
            && left == 0
            && self.cache.remove_pending(self.key, self.pending.generation)
        {
            debug!(key = %self.key, "Abandoned search dropped");
        }
    }
}

/// Dispatches queries through the cache to a search backend
#[derive(Clone)]
pub struct Dispatcher {
    cache: Arc<LookupCache>,
    backend: Arc<dyn SearchBackend>,
    resolver: Arc<EntityResolver>,
    timeout: Duration,
    emitter: Arc<dyn EventEmitter>,
}

impl Dispatcher {
    pub fn new(
        cache: Arc<LookupCache>,
        backend: Arc<dyn SearchBackend>,
        resolver: Arc<EntityResolver>,
        timeout: Duration,
        emitter: Arc<dyn EventEmitter>,
    ) -> Self {
        Self {
            cache,
            backend,
            resolver,
            timeout,
            emitter,
        }
    }

    pub fn cache(&self) -> &Arc<LookupCache> {
        &self.cache
    }

    pub fn resolver(&self) -> &Arc<EntityResolver> {
        &self.resolver
    }

    /// Query on behalf of a binding
    ///
    /// `ticket` comes from the binding's [`QuerySlot::begin`]; cancelling it
    /// (newer query, unbind) ends this call with `Cancelled`. The query the
    /// ticket replaced is cancelled once this one has claimed its cache key,
    /// or right away when no fetch is needed.
    pub async fn query(
        &self,
        element: &ElementId,
        config: &BindingConfig,
        text: &str,
        ticket: &QueryTicket,
    ) -> QueryOutcome {
        let text = text.trim();
        if text.chars().count() < config.min_chars {
            ticket.supersede_previous();
            return QueryOutcome::TooShort;
        }

        if let Some(pool) = &config.pool {
            ticket.supersede_previous();
            return QueryOutcome::Rows(filter_pool(pool, text, config.limit));
        }

        let key = CacheKey::new(
            config.entity.as_str(),
            config.endpoint.as_deref(),
            text,
            config.limit,
        );
        let base = match self
            .resolver
            .search_url(&config.entity, config.endpoint.as_deref())
        {
            Ok(url) => url,
            Err(err) => {
                ticket.supersede_previous();
                warn!(element = %element, error = %err, "Cannot build search URL");
                return QueryOutcome::Failed(err);
            }
        };

        self.resolve(
            key,
            search_url(&base, text, config.limit),
            Some(element.clone()),
            ticket.token().clone(),
            || ticket.supersede_previous(),
        )
        .await
    }

    /// Raw search through the cache without a binding
    pub async fn fetch_only(
        &self,
        entity: &str,
        text: &str,
        limit: usize,
        endpoint: Option<&str>,
    ) -> QueryOutcome {
        let entity = self.resolver.normalize(entity);
        let text = text.trim();
        let endpoint = endpoint.filter(|e| !e.trim().is_empty());
        let base = match self.resolver.search_url(&entity, endpoint) {
            Ok(url) => url,
            Err(err) => {
                warn!(entity = %entity, error = %err, "Cannot build search URL");
                return QueryOutcome::Failed(err);
            }
        };
        let key = CacheKey::new(entity, endpoint, text, limit);

        self.resolve(
            key,
            search_url(&base, text, limit),
            None,
            CancellationToken::new(),
            || {},
        )
        .await
    }

    async fn resolve(
        &self,
        key: CacheKey,
        url: Url,
        element: Option<ElementId>,
        cancel: CancellationToken,
        after_claim: impl FnOnce(),
    ) -> QueryOutcome {
        let claim = self.cache.claim(&key, |generation| self.start_fetch(generation, url));
        after_claim();
        let pending = match claim {
            Claim::Ready(rows) => {
                debug!(key = %key, rows = rows.len(), "Lookup cache hit");
                return QueryOutcome::Rows(rows);
            }
            Claim::Joined(pending) => {
                debug!(key = %key, "Joining in-flight search");
                pending
            }
            Claim::Started(pending) => {
                self.emitter.emit(EventKind::SearchIssued {
                    element: element.clone(),
                    key: key.to_string(),
                });
                pending
            }
        };

        let mut guard = WaiterGuard::adopt(&self.cache, &key, &pending);
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            outcome = pending.fetch.clone() => Some(outcome),
        };

        match outcome {
            None => QueryOutcome::Cancelled,
            Some(FetchOutcome::Rows(rows)) => {
                guard.settled = true;
                self.cache
                    .complete_pending(&key, pending.generation, Arc::clone(&rows));
                QueryOutcome::Rows(rows)
            }
            Some(FetchOutcome::Failed(err)) => {
                guard.settled = true;
                // Only the waiter that evicts the entry reports the failure
                if self.cache.remove_pending(&key, pending.generation) {
                    warn!(key = %key, code = err.code(), error = %err, "Search failed");
                    self.emitter.emit(EventKind::SearchFailed {
                        element,
                        key: key.to_string(),
                        code: err.code().to_string(),
                        error: err.to_string(),
                    });
                }
                QueryOutcome::Failed(err)
            }
        }
    }

    fn start_fetch(&self, generation: u64, url: Url) -> PendingQuery {
        let backend = Arc::clone(&self.backend);
        let timeout = self.timeout;

        let fetch = async move {
            match tokio::time::timeout(timeout, backend.search(&url)).await {
                Ok(Ok(body)) => FetchOutcome::Rows(parse_rows(body).into()),
                Ok(Err(err)) => FetchOutcome::Failed(err),
                Err(_) => FetchOutcome::Failed(LookupError::Timeout {
                    url: url.to_string(),
                    timeout_ms: timeout.as_millis() as u64,
                }),
            }
        }
        .boxed()
        .shared();

        PendingQuery {
            generation,
            fetch,
            waiters: Arc::new(AtomicUsize::new(0)),
        }
    }
}

/// Case-insensitive substring match across whole records, first `limit` rows
pub fn filter_pool(pool: &[ResultRow], text: &str, limit: usize) -> Rows {
    let needle = text.to_lowercase();
    let take = if limit == 0 { usize::MAX } else { limit };
    pool.iter()
        .filter(|row| row.matches(&needle))
        .take(take)
        .cloned()
        .collect::<Vec<_>>()
        .into()
}

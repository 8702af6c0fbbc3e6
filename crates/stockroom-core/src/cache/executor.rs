//! Query executor: resolves keys through the cache, fetching on miss.
//!
//! A started fetch runs on its own tokio task, so the caller gets a handle
//! back immediately and the fetch completes even if every handle is dropped.
//! Its result is offered to the cache with the sequence it was started under;
//! the cache decides whether it still applies.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
use rand::Rng;
use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::api::{ApiError, Transport};

use super::key::{KeyPattern, QueryKey};
use super::store::{CacheEntry, CommitOutcome, FetchDecision, QueryCache, QueryStatus};

/// Default number of read retries for network and server failures.
pub const DEFAULT_READ_RETRIES: u32 = 2;

/// Default delay before the first read retry, doubled on each attempt.
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 250;

/// Bounded retry for reads. Only network and server failures are retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff: Duration,
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            initial_backoff: Duration::ZERO,
        }
    }

    /// Exponential backoff with up to 50% random jitter.
    fn backoff_for(&self, attempt: u32) -> Duration {
        let base = self
            .initial_backoff
            .saturating_mul(2u32.saturating_pow(attempt));
        let jitter_max = (base.as_millis() / 2) as u64;
        let jitter = if jitter_max > 0 {
            rand::thread_rng().gen_range(0..=jitter_max)
        } else {
            0
        };
        base + Duration::from_millis(jitter)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_READ_RETRIES,
            initial_backoff: Duration::from_millis(DEFAULT_RETRY_BACKOFF_MS),
        }
    }
}

/// A caller's view of one key after `resolve`.
pub struct QueryHandle {
    key: QueryKey,
    receiver: watch::Receiver<CacheEntry>,
    task: Option<JoinHandle<()>>,
}

impl QueryHandle {
    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    /// Snapshot of the entry right now.
    pub fn current(&self) -> CacheEntry {
        self.receiver.borrow().clone()
    }

    /// Whether this resolve issued the network request (as opposed to hitting
    /// the cache or joining someone else's fetch).
    pub fn started_fetch(&self) -> bool {
        self.task.is_some()
    }

    /// Wait until the entry is no longer loading and return it.
    pub async fn settled(&mut self) -> CacheEntry {
        let settled = self
            .receiver
            .wait_for(|entry| entry.status != QueryStatus::Loading)
            .await
            .map(|entry| entry.clone());
        settled.unwrap_or_else(|_| self.current())
    }

    /// Wait for the next published change. `None` once the entry is evicted.
    pub async fn changed(&mut self) -> Option<CacheEntry> {
        self.receiver.changed().await.ok()?;
        Some(self.receiver.borrow_and_update().clone())
    }

    /// Wait for the fetch this handle started, if any, to finish and offer
    /// its result, whether or not the cache kept it.
    pub async fn wait_for_fetch(&mut self) {
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(key = %self.key, error = %e, "Fetch task failed");
            }
        }
    }
}

/// Issues and deduplicates reads, writing results into the shared cache.
pub struct QueryExecutor {
    cache: Arc<QueryCache>,
    retry: RetryPolicy,
}

impl QueryExecutor {
    pub fn new(cache: Arc<QueryCache>, retry: RetryPolicy) -> Self {
        Self { cache, retry }
    }

    pub fn cache(&self) -> &Arc<QueryCache> {
        &self.cache
    }

    /// Resolve `key`: serve fresh cached data, follow an in-flight fetch, or
    /// start a new one with `fetcher`. Must be called inside a tokio runtime.
    pub fn resolve<F, Fut>(&self, key: QueryKey, fetcher: F) -> QueryHandle
    where
        F: Fn(QueryKey) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ApiError>> + Send + 'static,
    {
        match self.cache.begin_fetch(&key) {
            FetchDecision::Hit(receiver) | FetchDecision::Join(receiver) => QueryHandle {
                key,
                receiver,
                task: None,
            },
            FetchDecision::Start { sequence, receiver } => {
                let cache = Arc::clone(&self.cache);
                let retry = self.retry.clone();
                let task_key = key.clone();
                let task = tokio::spawn(async move {
                    let result = fetch_with_retry(&task_key, &fetcher, &retry).await;
                    if cache.commit(&task_key, sequence, result) == CommitOutcome::Discarded {
                        debug!(key = %task_key, sequence, "Fetch superseded");
                    }
                });
                QueryHandle {
                    key,
                    receiver,
                    task: Some(task),
                }
            }
        }
    }

    /// Resolve `key` with a GET through `transport`.
    pub fn resolve_remote(&self, key: QueryKey, transport: Arc<dyn Transport>) -> QueryHandle {
        self.resolve(key, transport_fetcher(transport))
    }

    /// Invalidate `key` and resolve it again, superseding any fetch in flight.
    pub fn refetch<F, Fut>(&self, key: QueryKey, fetcher: F) -> QueryHandle
    where
        F: Fn(QueryKey) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ApiError>> + Send + 'static,
    {
        self.cache.invalidate(&KeyPattern::Exact(key.clone()));
        self.resolve(key, fetcher)
    }
}

/// Fetcher that issues the key's GET request through a transport.
pub fn transport_fetcher(
    transport: Arc<dyn Transport>,
) -> impl Fn(QueryKey) -> BoxFuture<'static, Result<Value, ApiError>> + Send + Sync + 'static {
    move |key: QueryKey| {
        let transport = Arc::clone(&transport);
        async move { transport.send(key.to_request()).await }.boxed()
    }
}

async fn fetch_with_retry<F, Fut>(
    key: &QueryKey,
    fetcher: &F,
    retry: &RetryPolicy,
) -> Result<Value, ApiError>
where
    F: Fn(QueryKey) -> Fut,
    Fut: Future<Output = Result<Value, ApiError>>,
{
    let mut attempt = 0;
    loop {
        match fetcher(key.clone()).await {
            Err(e) if e.is_retryable() && attempt < retry.max_retries => {
                let backoff = retry.backoff_for(attempt);
                attempt += 1;
                warn!(
                    key = %key,
                    retry = attempt,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %e,
                    "Read failed, backing off"
                );
                tokio::time::sleep(backoff).await;
            }
            result => return result,
        }
    }
}

//! Client-side query cache.
//!
//! This module provides:
//! - `QueryKey` / `KeyPattern`: the cache address space and invalidation sets
//! - `QueryCache`: keyed entries with status, sequence and invalidation state
//! - `QueryExecutor`: deduplicated reads with stale-response rejection
//!
//! Responses for one key are applied in the order their fetches started, not
//! the order they arrive.

pub mod executor;
pub mod key;
pub mod store;

pub use executor::{transport_fetcher, QueryExecutor, QueryHandle, RetryPolicy};
pub use key::{KeyPattern, QueryKey, QueryScope};
pub use store::{CacheEntry, CommitOutcome, FetchDecision, QueryCache, QueryStatus};

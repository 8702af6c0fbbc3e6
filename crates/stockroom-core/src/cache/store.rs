// Keyed store of fetch results with status and staleness tracking.
//
// All map mutations go through one mutex that is never held across an
// await point. Each entry is published on its own watch channel, so readers
// take snapshots without touching the lock.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::Value;
use tokio::sync::watch;
use tracing::debug;

use crate::api::ApiError;

use super::key::{KeyPattern, QueryKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    Idle,
    Loading,
    Success,
    Error,
}

/// Cached state for one query key.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: QueryKey,
    /// Last successful payload. Kept through later failures and invalidation.
    pub data: Option<Arc<Value>>,
    pub status: QueryStatus,
    pub error: Option<ApiError>,
    /// Sequence assigned to the most recent fetch started for this key
    /// (0 if none has started).
    pub fetched_at_sequence: u64,
    /// Set by invalidation; the next resolve refetches instead of serving `data`.
    pub invalidated: bool,
}

impl CacheEntry {
    fn idle(key: QueryKey) -> Self {
        Self {
            key,
            data: None,
            status: QueryStatus::Idle,
            error: None,
            fetched_at_sequence: 0,
            invalidated: false,
        }
    }

    /// A successful entry nobody has invalidated since.
    pub fn is_fresh(&self) -> bool {
        self.status == QueryStatus::Success && !self.invalidated
    }

    pub fn is_loading(&self) -> bool {
        self.status == QueryStatus::Loading
    }
}

/// What `begin_fetch` decided for a key.
#[derive(Debug)]
pub enum FetchDecision {
    /// Fresh data is cached; no request needed.
    Hit(watch::Receiver<CacheEntry>),
    /// A fetch is already in flight; follow it.
    Join(watch::Receiver<CacheEntry>),
    /// The caller must fetch and then `commit` with this sequence.
    Start {
        sequence: u64,
        receiver: watch::Receiver<CacheEntry>,
    },
}

/// Outcome of offering a fetch result to the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed,
    /// A newer fetch for the key has started, or the key was evicted.
    Discarded,
}

struct Slot {
    tx: watch::Sender<CacheEntry>,
    /// Most recently started fetch.
    latest_sequence: u64,
    /// Most recently committed fetch.
    committed_sequence: u64,
}

impl Slot {
    fn new(key: QueryKey) -> Self {
        let (tx, _rx) = watch::channel(CacheEntry::idle(key));
        Self {
            tx,
            latest_sequence: 0,
            committed_sequence: 0,
        }
    }
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<QueryKey, Slot>,
    last_sequence: u64,
}

impl CacheState {
    fn slot(&mut self, key: &QueryKey) -> &mut Slot {
        self.entries
            .entry(key.clone())
            .or_insert_with(|| Slot::new(key.clone()))
    }
}

/// The cache context's key→entry map.
///
/// Constructed once at application start and shared by `Arc` with the query
/// executor and the mutation coordinator.
#[derive(Default)]
pub struct QueryCache {
    state: Mutex<CacheState>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, CacheState> {
        // Nothing panics while holding the lock, so a poisoned map is still consistent.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Current entry for a key, if one exists.
    pub fn snapshot(&self, key: &QueryKey) -> Option<CacheEntry> {
        self.state()
            .entries
            .get(key)
            .map(|slot| slot.tx.borrow().clone())
    }

    /// Follow a key's entry, creating it in the idle state on first read.
    pub fn subscribe(&self, key: &QueryKey) -> watch::Receiver<CacheEntry> {
        self.state().slot(key).tx.subscribe()
    }

    /// Decide whether a read is a hit, joins an in-flight fetch, or must start
    /// a new fetch. Starting marks the entry loading and hands out the next
    /// sequence number.
    pub fn begin_fetch(&self, key: &QueryKey) -> FetchDecision {
        let mut state = self.state();
        let next_sequence = state.last_sequence + 1;
        let slot = state.slot(key);
        let receiver = slot.tx.subscribe();

        let (status, invalidated) = {
            let entry = slot.tx.borrow();
            (entry.status, entry.invalidated)
        };

        match (status, invalidated) {
            (QueryStatus::Success, false) => {
                debug!(key = %key, "Cache hit");
                FetchDecision::Hit(receiver)
            }
            (QueryStatus::Loading, false) => {
                debug!(key = %key, sequence = slot.latest_sequence, "Joining in-flight fetch");
                FetchDecision::Join(receiver)
            }
            _ => {
                slot.latest_sequence = next_sequence;
                slot.tx.send_modify(|entry| {
                    entry.status = QueryStatus::Loading;
                    entry.fetched_at_sequence = next_sequence;
                    entry.invalidated = false;
                });
                state.last_sequence = next_sequence;
                debug!(key = %key, sequence = next_sequence, "Fetch started");
                FetchDecision::Start {
                    sequence: next_sequence,
                    receiver,
                }
            }
        }
    }

    /// Offer the result of fetch `sequence` for `key`.
    ///
    /// Results are applied in sequence order, not arrival order: if a newer
    /// fetch has started since, this result is dropped. A failure keeps the
    /// previous data alongside the new error.
    pub fn commit(
        &self,
        key: &QueryKey,
        sequence: u64,
        result: Result<Value, ApiError>,
    ) -> CommitOutcome {
        let mut state = self.state();
        let Some(slot) = state.entries.get_mut(key) else {
            debug!(key = %key, sequence, "Discarding result for evicted key");
            return CommitOutcome::Discarded;
        };

        if sequence < slot.latest_sequence || sequence < slot.committed_sequence {
            debug!(
                key = %key,
                sequence,
                latest = slot.latest_sequence,
                "Discarding stale response"
            );
            return CommitOutcome::Discarded;
        }

        slot.committed_sequence = sequence;
        slot.tx.send_modify(|entry| match result {
            Ok(data) => {
                entry.data = Some(Arc::new(data));
                entry.status = QueryStatus::Success;
                entry.error = None;
            }
            Err(error) => {
                entry.status = QueryStatus::Error;
                entry.error = Some(error);
            }
        });
        debug!(key = %key, sequence, "Committed fetch result");
        CommitOutcome::Committed
    }

    /// Mark every cached key matching `pattern` as needing a refetch.
    /// Data is kept. Returns how many entries were marked.
    pub fn invalidate(&self, pattern: &KeyPattern) -> usize {
        let state = self.state();
        let mut marked = 0;
        for (key, slot) in state.entries.iter() {
            if pattern.matches(key) {
                slot.tx.send_modify(|entry| entry.invalidated = true);
                marked += 1;
            }
        }
        debug!(pattern = %pattern, marked, "Invalidated cache entries");
        marked
    }

    /// Evict one key. A fetch still in flight for it will be discarded.
    pub fn remove(&self, key: &QueryKey) -> bool {
        self.state().entries.remove(key).is_some()
    }

    /// Evict everything. Used at context teardown.
    pub fn clear(&self) {
        self.state().entries.clear();
    }

    pub fn len(&self) -> usize {
        self.state().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn keys(&self) -> Vec<QueryKey> {
        let mut keys: Vec<QueryKey> = self.state().entries.keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ResourceId, ResourceKind};
    use crate::pagination::PageRequest;
    use serde_json::json;

    fn item(id: i64) -> QueryKey {
        QueryKey::item(ResourceKind::Inventories, ResourceId::Number(id))
    }

    fn start(cache: &QueryCache, key: &QueryKey) -> u64 {
        match cache.begin_fetch(key) {
            FetchDecision::Start { sequence, .. } => sequence,
            other => panic!("expected Start, got {:?}", other),
        }
    }

    #[test]
    fn test_first_read_starts_fetch() {
        let cache = QueryCache::new();
        let key = item(1);
        let sequence = start(&cache, &key);
        assert_eq!(sequence, 1);

        let entry = cache.snapshot(&key).expect("entry should exist");
        assert_eq!(entry.status, QueryStatus::Loading);
        assert_eq!(entry.fetched_at_sequence, 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_loading_key_is_joined() {
        let cache = QueryCache::new();
        let key = item(1);
        start(&cache, &key);
        assert!(matches!(cache.begin_fetch(&key), FetchDecision::Join(_)));
    }

    #[test]
    fn test_fresh_success_is_a_hit() {
        let cache = QueryCache::new();
        let key = item(1);
        let seq = start(&cache, &key);
        assert_eq!(cache.commit(&key, seq, Ok(json!({"quantity": 3}))), CommitOutcome::Committed);

        match cache.begin_fetch(&key) {
            FetchDecision::Hit(rx) => {
                let entry = rx.borrow().clone();
                assert_eq!(entry.data.as_deref(), Some(&json!({"quantity": 3})));
            }
            other => panic!("expected Hit, got {:?}", other),
        }
    }

    #[test]
    fn test_older_response_cannot_overwrite_newer() {
        let cache = QueryCache::new();
        let key = item(7);

        let a = start(&cache, &key);
        cache.invalidate(&KeyPattern::Exact(key.clone()));
        let b = start(&cache, &key);
        assert!(b > a);

        assert_eq!(cache.commit(&key, b, Ok(json!("X"))), CommitOutcome::Committed);
        assert_eq!(cache.commit(&key, a, Ok(json!("Y"))), CommitOutcome::Discarded);

        let entry = cache.snapshot(&key).unwrap();
        assert_eq!(entry.data.as_deref(), Some(&json!("X")));
        assert_eq!(entry.status, QueryStatus::Success);
    }

    #[test]
    fn test_superseded_response_is_dropped_even_if_first() {
        let cache = QueryCache::new();
        let key = item(7);

        let a = start(&cache, &key);
        cache.invalidate(&KeyPattern::Exact(key.clone()));
        let b = start(&cache, &key);

        assert_eq!(cache.commit(&key, a, Ok(json!("Y"))), CommitOutcome::Discarded);
        assert!(cache.snapshot(&key).unwrap().is_loading());
        assert_eq!(cache.commit(&key, b, Ok(json!("X"))), CommitOutcome::Committed);
    }

    #[test]
    fn test_error_preserves_previous_data() {
        let cache = QueryCache::new();
        let key = item(2);
        let first = start(&cache, &key);
        cache.commit(&key, first, Ok(json!({"quantity": 10})));

        cache.invalidate(&KeyPattern::Exact(key.clone()));
        let second = start(&cache, &key);
        cache.commit(&key, second, Err(ApiError::Server("down".to_string())));

        let entry = cache.snapshot(&key).unwrap();
        assert_eq!(entry.status, QueryStatus::Error);
        assert_eq!(entry.error, Some(ApiError::Server("down".to_string())));
        assert_eq!(entry.data.as_deref(), Some(&json!({"quantity": 10})));
    }

    #[test]
    fn test_error_entry_is_refetched() {
        let cache = QueryCache::new();
        let key = item(2);
        let seq = start(&cache, &key);
        cache.commit(&key, seq, Err(ApiError::Network("reset".to_string())));
        assert!(matches!(cache.begin_fetch(&key), FetchDecision::Start { .. }));
    }

    #[test]
    fn test_invalidation_keeps_data_and_forces_refetch() {
        let cache = QueryCache::new();
        let list = QueryKey::list(ResourceKind::Inventories, PageRequest::default());
        let seq = start(&cache, &list);
        cache.commit(&list, seq, Ok(json!({"data": []})));

        assert_eq!(cache.invalidate(&KeyPattern::Collection(ResourceKind::Inventories)), 1);
        let entry = cache.snapshot(&list).unwrap();
        assert!(entry.invalidated);
        assert!(entry.data.is_some());
        assert!(matches!(cache.begin_fetch(&list), FetchDecision::Start { .. }));
    }

    #[test]
    fn test_invalidation_only_touches_matching_keys() {
        let cache = QueryCache::new();
        let mine = item(5);
        let theirs = QueryKey::item(ResourceKind::Warehouses, ResourceId::Number(5));
        for key in [&mine, &theirs] {
            let seq = start(&cache, key);
            cache.commit(key, seq, Ok(json!({})));
        }

        cache.invalidate(&KeyPattern::Exact(mine.clone()));
        assert!(cache.snapshot(&mine).unwrap().invalidated);
        assert!(cache.snapshot(&theirs).unwrap().is_fresh());
    }

    #[test]
    fn test_invalidated_during_flight_stays_invalidated() {
        let cache = QueryCache::new();
        let key = item(3);
        let seq = start(&cache, &key);
        cache.invalidate(&KeyPattern::Exact(key.clone()));
        cache.commit(&key, seq, Ok(json!({"quantity": 1})));

        let entry = cache.snapshot(&key).unwrap();
        assert_eq!(entry.status, QueryStatus::Success);
        assert!(entry.invalidated);
    }

    #[test]
    fn test_sequences_increase_across_keys() {
        let cache = QueryCache::new();
        let a = start(&cache, &item(1));
        let b = start(&cache, &item(2));
        let c = start(&cache, &item(3));
        assert!(a < b && b < c);
    }

    #[test]
    fn test_commit_after_eviction_is_discarded() {
        let cache = QueryCache::new();
        let key = item(4);
        let seq = start(&cache, &key);
        assert!(cache.remove(&key));
        assert_eq!(cache.commit(&key, seq, Ok(json!(1))), CommitOutcome::Discarded);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_subscribe_creates_idle_entry() {
        let cache = QueryCache::new();
        let key = item(9);
        let rx = cache.subscribe(&key);
        assert_eq!(rx.borrow().status, QueryStatus::Idle);
        assert_eq!(cache.keys(), vec![key]);
    }
}

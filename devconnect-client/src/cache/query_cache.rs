use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::cache::query_key::QueryKey;
use crate::cache::retry::RetryPolicy;
use crate::error::ClientResult;

/// Freshness and retention of a cached query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryOptions {
    /// How long data is served without refetching.
    pub stale_time: Duration,
    /// How long an unused entry is kept before `gc` drops it.
    pub gc_time: Duration,
}

impl QueryOptions {
    /// Five minutes fresh, thirty minutes retained.
    pub const DEFAULT: QueryOptions = QueryOptions {
        stale_time: Duration::from_secs(5 * 60),
        gc_time: Duration::from_secs(30 * 60),
    };

    /// Notification inbox.
    pub const NOTIFICATIONS: QueryOptions = QueryOptions {
        stale_time: Duration::from_secs(2 * 60),
        gc_time: Duration::from_secs(30 * 60),
    };

    /// Unread notification counter.
    pub const UNREAD_COUNT: QueryOptions = QueryOptions {
        stale_time: Duration::from_secs(60),
        gc_time: Duration::from_secs(30 * 60),
    };
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    updated_at: Instant,
    last_access: Instant,
    invalidated: bool,
    options: QueryOptions,
}

impl Entry {
    fn is_stale(&self, now: Instant) -> bool {
        self.invalidated || now.saturating_duration_since(self.updated_at) >= self.options.stale_time
    }

    fn is_expired(&self, now: Instant) -> bool {
        let last_used = self.updated_at.max(self.last_access);
        now.saturating_duration_since(last_used) > self.options.gc_time
    }
}

/// Saved state of every entry under a prefix, used to roll back optimistic updates.
#[derive(Debug, Clone)]
pub struct CacheSnapshot {
    prefix: QueryKey,
    entries: Vec<(QueryKey, Entry)>,
}

#[derive(Debug, Default)]
struct State {
    entries: HashMap<QueryKey, Entry>,
    // Bumped by every invalidation.
    generation: u64,
    // Prefixes invalidated while fetches were in flight, oldest first. A fetch
    // whose key falls under one logged after it started stores its result as
    // already invalidated.
    invalidations: Vec<(u64, QueryKey)>,
    // Start generation of each running fetch, with how many share it.
    in_flight: BTreeMap<u64, usize>,
}

impl State {
    fn begin_fetch(&mut self) -> u64 {
        *self.in_flight.entry(self.generation).or_default() += 1;
        self.generation
    }

    fn end_fetch(&mut self, started: u64) {
        if let Some(count) = self.in_flight.get_mut(&started) {
            *count -= 1;
            if *count == 0 {
                self.in_flight.remove(&started);
            }
        }
        // Only fetches still running can be affected by logged prefixes.
        match self.in_flight.keys().next().copied() {
            Some(oldest) => self
                .invalidations
                .retain(|(generation, _)| *generation > oldest),
            None => self.invalidations.clear(),
        }
    }

    fn invalidated_since(&self, started: u64, key: &QueryKey) -> bool {
        self.invalidations
            .iter()
            .any(|(generation, prefix)| *generation > started && prefix.is_prefix_of(key))
    }

    fn log_invalidation(&mut self, prefix: &QueryKey) {
        self.generation += 1;
        if !self.in_flight.is_empty() {
            self.invalidations.push((self.generation, prefix.clone()));
        }
    }
}

/// Unregisters a running fetch, also when it fails or is dropped.
struct FetchGuard<'a> {
    state: &'a Mutex<State>,
    started: u64,
}

impl Drop for FetchGuard<'_> {
    fn drop(&mut self) {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .end_fetch(self.started);
    }
}

/// In-memory query cache keyed by [`QueryKey`], storing JSON values.
///
/// Fresh entries are served without a request; stale or invalidated ones are
/// refetched. Concurrent fetches of the same key share one request.
#[derive(Debug)]
pub struct QueryCache {
    state: Mutex<State>,
    gates: Mutex<HashMap<QueryKey, Arc<tokio::sync::Mutex<()>>>>,
    retry: RetryPolicy,
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new(RetryPolicy::QUERY)
    }
}

impl QueryCache {
    /// Creates an empty cache whose fetches use `retry`.
    pub fn new(retry: RetryPolicy) -> Self {
        Self {
            state: Mutex::new(State::default()),
            gates: Mutex::new(HashMap::new()),
            retry,
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn gate(&self, key: &QueryKey) -> Arc<tokio::sync::Mutex<()>> {
        let mut gates = self.gates.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(gates.entry(key.clone()).or_default())
    }

    /// Returns cached data for `key` when fresh, otherwise runs `fetcher`
    /// (with retries) and stores the result.
    pub async fn fetch<T, F, Fut>(
        &self,
        key: &QueryKey,
        options: QueryOptions,
        fetcher: F,
    ) -> ClientResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnMut() -> Fut,
        Fut: Future<Output = ClientResult<T>>,
    {
        if let Some(value) = self.fresh_at(key, Instant::now()) {
            return Ok(value);
        }

        let gate = self.gate(key);
        let _guard = gate.lock().await;

        // Another caller may have filled the entry while we waited.
        if let Some(value) = self.fresh_at(key, Instant::now()) {
            return Ok(value);
        }

        let fetch = FetchGuard {
            state: &self.state,
            started: self.state().begin_fetch(),
        };
        debug!(%key, "fetching query");
        let value = self.retry.run(fetcher).await?;

        let encoded = serde_json::to_value(&value)?;
        let now = Instant::now();
        let mut state = self.state();
        let invalidated = state.invalidated_since(fetch.started, key);
        state.entries.insert(
            key.clone(),
            Entry {
                value: encoded,
                updated_at: now,
                last_access: now,
                invalidated,
                options,
            },
        );
        drop(state);
        drop(fetch);
        Ok(value)
    }

    fn fresh_at<T: DeserializeOwned>(&self, key: &QueryKey, now: Instant) -> Option<T> {
        let mut state = self.state();
        let entry = state.entries.get_mut(key)?;
        if entry.is_stale(now) {
            return None;
        }
        entry.last_access = now;
        decode(key, &entry.value)
    }

    /// Cached data for `key` regardless of freshness.
    pub fn get<T: DeserializeOwned>(&self, key: &QueryKey) -> Option<T> {
        let mut state = self.state();
        let entry = state.entries.get_mut(key)?;
        entry.last_access = Instant::now();
        decode(key, &entry.value)
    }

    /// Stores `value` under `key` as freshly fetched data.
    pub fn set<T: Serialize>(
        &self,
        key: &QueryKey,
        value: &T,
        options: QueryOptions,
    ) -> ClientResult<()> {
        self.set_at(key, value, options, Instant::now())
    }

    fn set_at<T: Serialize>(
        &self,
        key: &QueryKey,
        value: &T,
        options: QueryOptions,
        now: Instant,
    ) -> ClientResult<()> {
        let value = serde_json::to_value(value)?;
        self.state().entries.insert(
            key.clone(),
            Entry {
                value,
                updated_at: now,
                last_access: now,
                invalidated: false,
                options,
            },
        );
        Ok(())
    }

    /// Whether `key` would be refetched on next access. Missing keys are stale.
    pub fn is_stale(&self, key: &QueryKey) -> bool {
        self.is_stale_at(key, Instant::now())
    }

    fn is_stale_at(&self, key: &QueryKey, now: Instant) -> bool {
        self.state()
            .entries
            .get(key)
            .is_none_or(|entry| entry.is_stale(now))
    }

    /// Marks every entry under `prefix` as stale. Returns how many were hit.
    pub fn invalidate(&self, prefix: &QueryKey) -> usize {
        let mut state = self.state();
        state.log_invalidation(prefix);
        let mut hit = 0;
        for (key, entry) in state.entries.iter_mut() {
            if prefix.is_prefix_of(key) {
                entry.invalidated = true;
                hit += 1;
            }
        }
        debug!(%prefix, hit, "invalidated queries");
        hit
    }

    /// Rewrites every entry under `prefix` that decodes as `T`.
    /// Entries holding another shape are left untouched.
    pub fn update_matching<T, F>(&self, prefix: &QueryKey, mut update: F) -> ClientResult<usize>
    where
        T: Serialize + DeserializeOwned,
        F: FnMut(&mut T),
    {
        let mut state = self.state();
        let mut updated = 0;
        for (key, entry) in state.entries.iter_mut() {
            if !prefix.is_prefix_of(key) {
                continue;
            }
            let Some(mut data) = decode::<T>(key, &entry.value) else {
                continue;
            };
            update(&mut data);
            entry.value = serde_json::to_value(&data)?;
            updated += 1;
        }
        Ok(updated)
    }

    /// Copies every entry under `prefix`.
    pub fn snapshot(&self, prefix: &QueryKey) -> CacheSnapshot {
        let state = self.state();
        let entries = state
            .entries
            .iter()
            .filter(|(key, _)| prefix.is_prefix_of(key))
            .map(|(key, entry)| (key.clone(), entry.clone()))
            .collect();
        CacheSnapshot {
            prefix: prefix.clone(),
            entries,
        }
    }

    /// Puts the entries of `snapshot` back; entries created under its
    /// prefix after the snapshot are removed.
    pub fn restore(&self, snapshot: CacheSnapshot) {
        let mut state = self.state();
        state
            .entries
            .retain(|key, _| !snapshot.prefix.is_prefix_of(key));
        state.entries.extend(snapshot.entries);
    }

    /// Drops entries unused for longer than their gc time. Returns how many went.
    pub fn gc(&self) -> usize {
        self.gc_at(Instant::now())
    }

    fn gc_at(&self, now: Instant) -> usize {
        let removed = {
            let mut state = self.state();
            let before = state.entries.len();
            state.entries.retain(|_, entry| !entry.is_expired(now));
            before - state.entries.len()
        };

        // Gates nobody is waiting on can go too.
        self.gates
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|_, gate| Arc::strong_count(gate) > 1);

        if removed > 0 {
            debug!(removed, "garbage collected queries");
        }
        removed
    }

    /// Forgets everything.
    pub fn clear(&self) {
        let mut state = self.state();
        state.entries.clear();
        // The empty key is a prefix of every key.
        state.log_invalidation(&QueryKey::new(Vec::<String>::new()));
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.state().entries.len()
    }

    /// Whether the cache holds nothing.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn decode<T: DeserializeOwned>(key: &QueryKey, value: &Value) -> Option<T> {
    match T::deserialize(value) {
        Ok(data) => Some(data),
        Err(err) => {
            debug!(%key, error = %err, "cached value has a different shape");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::{Duration, Instant};

    use tokio::sync::Notify;

    use super::{QueryCache, QueryOptions};
    use crate::cache::query_key::{QueryKey, keys};
    use crate::cache::retry::RetryPolicy;
    use crate::error::ClientError;

    fn counting_fetch(
        calls: Arc<AtomicU32>,
        value: i64,
    ) -> impl FnMut() -> std::future::Ready<Result<i64, ClientError>> {
        move || {
            calls.fetch_add(1, Ordering::SeqCst);
            std::future::ready(Ok(value))
        }
    }

    #[tokio::test]
    async fn fresh_entries_are_served_from_cache() {
        let cache = QueryCache::default();
        let calls = Arc::new(AtomicU32::new(0));
        let key = keys::follower_count(1);

        let first: i64 = cache
            .fetch(&key, QueryOptions::DEFAULT, counting_fetch(Arc::clone(&calls), 5))
            .await
            .expect("fetch");
        let second: i64 = cache
            .fetch(&key, QueryOptions::DEFAULT, counting_fetch(Arc::clone(&calls), 6))
            .await
            .expect("fetch");

        assert_eq!((first, second), (5, 5));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn invalidated_entries_are_refetched() {
        let cache = QueryCache::default();
        let calls = Arc::new(AtomicU32::new(0));
        let key = keys::notifications(7);

        let _: i64 = cache
            .fetch(&key, QueryOptions::NOTIFICATIONS, counting_fetch(Arc::clone(&calls), 1))
            .await
            .expect("fetch");
        assert_eq!(cache.invalidate(&keys::notifications_root()), 1);
        assert!(cache.is_stale(&key));

        let value: i64 = cache
            .fetch(&key, QueryOptions::NOTIFICATIONS, counting_fetch(Arc::clone(&calls), 2))
            .await
            .expect("fetch");
        assert_eq!(value, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(!cache.is_stale(&key));
    }

    /// Fetches `key` and invalidates `prefix` while the request is running.
    async fn invalidate_during_fetch(key: QueryKey, prefix: QueryKey) -> Arc<QueryCache> {
        let cache = Arc::new(QueryCache::default());
        let started = Arc::new(Notify::new());
        let proceed = Arc::new(Notify::new());

        let task = {
            let cache = Arc::clone(&cache);
            let started = Arc::clone(&started);
            let proceed = Arc::clone(&proceed);
            tokio::spawn(async move {
                cache
                    .fetch(&key, QueryOptions::DEFAULT, || {
                        let started = Arc::clone(&started);
                        let proceed = Arc::clone(&proceed);
                        async move {
                            started.notify_one();
                            proceed.notified().await;
                            Ok::<_, ClientError>(1_i64)
                        }
                    })
                    .await
            })
        };

        started.notified().await;
        cache.invalidate(&prefix);
        proceed.notify_one();
        task.await.expect("join").expect("fetch");
        cache
    }

    #[tokio::test]
    async fn unrelated_invalidation_during_fetch_keeps_result_fresh() {
        let cache = invalidate_during_fetch(keys::topics(), keys::notifications(7)).await;

        assert!(!cache.is_stale(&keys::topics()));
        assert!(cache.state().invalidations.is_empty());
        assert!(cache.state().in_flight.is_empty());
    }

    #[tokio::test]
    async fn matching_invalidation_during_fetch_stores_result_stale() {
        let cache =
            invalidate_during_fetch(keys::notifications(7), keys::notifications_root()).await;

        assert_eq!(cache.get::<i64>(&keys::notifications(7)), Some(1));
        assert!(cache.is_stale(&keys::notifications(7)));
    }

    #[test]
    fn invalidations_are_not_logged_without_running_fetches() {
        let cache = QueryCache::default();
        cache.invalidate(&keys::posts());
        cache.clear();
        assert!(cache.state().invalidations.is_empty());
    }

    #[tokio::test]
    async fn concurrent_fetches_share_one_request() {
        let cache = Arc::new(QueryCache::default());
        let calls = Arc::new(AtomicU32::new(0));
        let key = keys::profile("neo");

        let mut handles = Vec::new();
        for _ in 0..4 {
            let cache = Arc::clone(&cache);
            let calls = Arc::clone(&calls);
            let key = key.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .fetch(&key, QueryOptions::DEFAULT, || {
                        let calls = Arc::clone(&calls);
                        async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(20)).await;
                            Ok::<_, ClientError>(9_i64)
                        }
                    })
                    .await
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.expect("join").expect("fetch"), 9);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn entries_go_stale_after_their_stale_time() {
        let cache = QueryCache::default();
        let key = keys::unread_notification_count(1);
        let start = Instant::now();
        cache
            .set_at(&key, &3_i64, QueryOptions::UNREAD_COUNT, start)
            .expect("set");

        assert!(!cache.is_stale_at(&key, start + Duration::from_secs(59)));
        assert!(cache.is_stale_at(&key, start + Duration::from_secs(60)));
    }

    #[test]
    fn gc_drops_only_long_unused_entries() {
        let cache = QueryCache::default();
        let start = Instant::now();
        cache
            .set_at(&keys::posts(), &1_i64, QueryOptions::DEFAULT, start)
            .expect("set");
        cache
            .set_at(
                &keys::topics(),
                &2_i64,
                QueryOptions::DEFAULT,
                start + Duration::from_secs(20 * 60),
            )
            .expect("set");

        assert_eq!(cache.gc_at(start + Duration::from_secs(31 * 60)), 1);
        assert!(cache.get::<i64>(&keys::posts()).is_none());
        assert_eq!(cache.get::<i64>(&keys::topics()), Some(2));
    }

    #[test]
    fn snapshot_restore_undoes_updates_under_prefix() {
        let cache = QueryCache::default();
        cache
            .set(&keys::post_detail(1), &10_i64, QueryOptions::DEFAULT)
            .expect("set");
        cache
            .set(&keys::followed_users(1), &20_i64, QueryOptions::DEFAULT)
            .expect("set");

        let snapshot = cache.snapshot(&keys::post_details());
        let updated = cache
            .update_matching::<i64, _>(&keys::post_details(), |value| *value += 1)
            .expect("update");
        assert_eq!(updated, 1);
        cache
            .set(&keys::post_detail(2), &30_i64, QueryOptions::DEFAULT)
            .expect("set");

        cache.restore(snapshot);
        assert_eq!(cache.get::<i64>(&keys::post_detail(1)), Some(10));
        assert_eq!(cache.get::<i64>(&keys::post_detail(2)), None);
        assert_eq!(cache.get::<i64>(&keys::followed_users(1)), Some(20));
    }

    #[test]
    fn update_matching_skips_other_shapes() {
        let cache = QueryCache::default();
        cache
            .set(&keys::posts(), &"text", QueryOptions::DEFAULT)
            .expect("set");
        let updated = cache
            .update_matching::<i64, _>(&keys::posts(), |value| *value += 1)
            .expect("update");
        assert_eq!(updated, 0);
        assert_eq!(cache.get::<String>(&keys::posts()).as_deref(), Some("text"));
    }

    #[tokio::test]
    async fn failed_fetch_leaves_cache_untouched() {
        let cache = QueryCache::new(RetryPolicy::MUTATION);
        let result: Result<i64, _> = cache
            .fetch(&keys::posts(), QueryOptions::DEFAULT, || async {
                Err(ClientError::NotFound)
            })
            .await;

        assert!(matches!(result, Err(ClientError::NotFound)));
        assert!(cache.is_empty());
    }

    #[test]
    fn clear_empties_the_cache() {
        let cache = QueryCache::default();
        cache
            .set(&keys::posts(), &1_i64, QueryOptions::DEFAULT)
            .expect("set");
        cache.clear();
        assert!(cache.is_empty());
    }
}

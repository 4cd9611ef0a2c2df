//! Keyed query cache
//!
//! Read results are cached under a resource scope plus the canonical JSON of
//! their parameters. Writes invalidate whole scopes; the next read of an
//! invalidated entry goes back to the backend. Concurrent reads of the same
//! key share one request.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::ClientResult;
use crate::storage::lock;

/// Cache key: resource scope plus serialized parameters
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    scope: String,
    params: String,
}

impl QueryKey {
    /// Key for `scope` and `params`; object keys are serialized in sorted order
    pub fn new<P: Serialize + ?Sized>(scope: impl Into<String>, params: &P) -> Self {
        let params = serde_json::to_value(params)
            .map(|v| sorted(v).to_string())
            .unwrap_or_else(|_| "null".to_string());
        Self {
            scope: scope.into(),
            params,
        }
    }

    /// Key for a single entity under `scope`
    pub fn detail(scope: impl Into<String>, id: &str) -> Self {
        Self::new(scope, &serde_json::json!({ "id": id }))
    }

    /// Key for a parameterless query
    pub fn scope(scope: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            params: "null".to_string(),
        }
    }

    pub fn scope_name(&self) -> &str {
        &self.scope
    }

    pub fn params(&self) -> &str {
        &self.params
    }
}

fn sorted(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(entries.into_iter().map(|(k, v)| (k, sorted(v))).collect())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sorted).collect()),
        other => other,
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[\"{}\", {}]", self.scope, self.params)
    }
}

/// Freshness and retry policy for one query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryOptions {
    /// How long a result is served from cache before refetching
    pub stale_time: Duration,
    /// Extra attempts after a retryable failure
    pub retry: u32,
    pub retry_delay: Duration,
    /// Background refetch period for polled queries
    pub refetch_interval: Option<Duration>,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            stale_time: Duration::ZERO,
            retry: 0,
            retry_delay: Duration::from_millis(500),
            refetch_interval: None,
        }
    }
}

impl QueryOptions {
    pub const fn fresh_for(stale_time: Duration) -> Self {
        Self {
            stale_time,
            retry: 0,
            retry_delay: Duration::from_millis(500),
            refetch_interval: None,
        }
    }

    pub const fn with_retry(mut self, retry: u32, delay: Duration) -> Self {
        self.retry = retry;
        self.retry_delay = delay;
        self
    }

    pub const fn with_refetch_interval(mut self, interval: Duration) -> Self {
        self.refetch_interval = Some(interval);
        self
    }
}

pub const fn minutes(n: u64) -> Duration {
    Duration::from_secs(n * 60)
}

struct Entry {
    value: Arc<dyn Any + Send + Sync>,
    fetched_at: Instant,
    stale: bool,
}

#[derive(Default)]
struct Slot {
    entry: Option<Entry>,
    /// Bumped on every invalidation so in-flight fetches know they are outdated
    epoch: u64,
    gate: Arc<tokio::sync::Mutex<()>>,
}

#[derive(Default)]
struct Slots {
    map: HashMap<QueryKey, Slot>,
    /// Bumped on `clear`
    generation: u64,
}

/// Generation and slot epoch observed when a fetch started
type Stamp = (u64, u64);

/// Shared query cache
#[derive(Clone, Default)]
pub struct QueryCache {
    slots: Arc<Mutex<Slots>>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached value for `key` if fresh, otherwise run `fetcher`.
    pub async fn fetch<T, F, Fut>(
        &self,
        key: &QueryKey,
        options: &QueryOptions,
        fetcher: F,
    ) -> ClientResult<Arc<T>>
    where
        T: Send + Sync + 'static,
        F: Fn() -> Fut,
        Fut: Future<Output = ClientResult<T>>,
    {
        let requested_at = Instant::now();
        if let Some(hit) = self.fresh::<T>(key, options.stale_time, None) {
            tracing::debug!(%key, "Query cache hit");
            return Ok(hit);
        }

        let gate = self.gate(key);
        let _guard = gate.lock().await;

        // Another caller may have fetched while we waited
        if let Some(hit) = self.fresh::<T>(key, options.stale_time, Some(requested_at)) {
            tracing::debug!(%key, "Query coalesced with in-flight fetch");
            return Ok(hit);
        }

        tracing::debug!(%key, "Query cache miss, fetching");
        let stamp = self.stamp(key);
        match Self::run_with_retry(key, options, &fetcher).await {
            Ok(value) => {
                let value = Arc::new(value);
                self.store(key, value.clone(), stamp);
                Ok(value)
            }
            Err(e) => {
                self.discard_if_unused(key, &gate);
                Err(e)
            }
        }
    }

    async fn run_with_retry<T, F, Fut>(
        key: &QueryKey,
        options: &QueryOptions,
        fetcher: &F,
    ) -> ClientResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = ClientResult<T>>,
    {
        let mut attempt = 0;
        loop {
            match fetcher().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < options.retry && e.is_retryable() => {
                    attempt += 1;
                    tracing::debug!(%key, attempt, "Retrying query after error: {}", e);
                    tokio::time::sleep(options.retry_delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Cached value regardless of freshness
    pub fn get<T: Send + Sync + 'static>(&self, key: &QueryKey) -> Option<Arc<T>> {
        let slots = lock(&self.slots);
        let entry = slots.map.get(key)?.entry.as_ref()?;
        entry.value.clone().downcast::<T>().ok()
    }

    /// True when the entry is missing or has been invalidated
    pub fn is_stale(&self, key: &QueryKey) -> bool {
        lock(&self.slots)
            .map
            .get(key)
            .and_then(|slot| slot.entry.as_ref())
            .map(|entry| entry.stale)
            .unwrap_or(true)
    }

    pub fn contains(&self, key: &QueryKey) -> bool {
        lock(&self.slots)
            .map
            .get(key)
            .map(|slot| slot.entry.is_some())
            .unwrap_or(false)
    }

    /// Mark every entry under `scope` stale; returns how many entries were hit
    pub fn invalidate(&self, scope: &str) -> usize {
        let mut slots = lock(&self.slots);
        let mut count = 0;
        for (key, slot) in slots.map.iter_mut() {
            if key.scope == scope {
                Self::mark_stale(slot);
                count += 1;
            }
        }
        tracing::debug!(scope, count, "Invalidated queries");
        count
    }

    pub fn invalidate_key(&self, key: &QueryKey) {
        if let Some(slot) = lock(&self.slots).map.get_mut(key) {
            Self::mark_stale(slot);
        }
    }

    /// Drop everything, e.g. when the session or tenant changes
    pub fn clear(&self) {
        let mut slots = lock(&self.slots);
        slots.map.clear();
        slots.generation += 1;
    }

    pub fn len(&self) -> usize {
        lock(&self.slots)
            .map
            .values()
            .filter(|slot| slot.entry.is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fetch now and then every `options.refetch_interval` in the background.
    ///
    /// Results are published on the returned subscription; dropping it stops
    /// the background task.
    pub fn poll<T, F, Fut>(
        &self,
        key: QueryKey,
        options: QueryOptions,
        fetcher: F,
    ) -> QuerySubscription<T>
    where
        T: Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ClientResult<T>> + Send + 'static,
    {
        let (sender, receiver) = watch::channel(QueryState::Loading);
        let cache = self.clone();

        let handle = tokio::spawn(async move {
            loop {
                let state = match cache.fetch(&key, &options, &fetcher).await {
                    Ok(value) => QueryState::Ready(value),
                    Err(e) => QueryState::Failed(e),
                };
                if sender.send(state).is_err() {
                    break;
                }

                let Some(period) = options.refetch_interval else {
                    break;
                };
                tokio::time::sleep(period).await;
                cache.invalidate_key(&key);
            }
        });

        QuerySubscription { receiver, handle }
    }

    fn fresh<T: Send + Sync + 'static>(
        &self,
        key: &QueryKey,
        stale_time: Duration,
        fetched_since: Option<Instant>,
    ) -> Option<Arc<T>> {
        let slots = lock(&self.slots);
        let entry = slots.map.get(key)?.entry.as_ref()?;
        if entry.stale {
            return None;
        }
        let within_window = entry.fetched_at.elapsed() < stale_time;
        let fetched_while_waiting = fetched_since
            .map(|since| entry.fetched_at >= since)
            .unwrap_or(false);
        if !(within_window || fetched_while_waiting) {
            return None;
        }
        entry.value.clone().downcast::<T>().ok()
    }

    fn gate(&self, key: &QueryKey) -> Arc<tokio::sync::Mutex<()>> {
        lock(&self.slots)
            .map
            .entry(key.clone())
            .or_default()
            .gate
            .clone()
    }

    /// Drop a slot that never got a value once no other caller is waiting on it
    fn discard_if_unused(&self, key: &QueryKey, gate: &Arc<tokio::sync::Mutex<()>>) {
        let mut slots = lock(&self.slots);
        let unused = slots.map.get(key).is_some_and(|slot| {
            // One reference in the map, one held by the failed caller
            slot.entry.is_none() && Arc::ptr_eq(&slot.gate, gate) && Arc::strong_count(gate) == 2
        });
        if unused {
            slots.map.remove(key);
        }
    }

    fn stamp(&self, key: &QueryKey) -> Stamp {
        let slots = lock(&self.slots);
        let epoch = slots.map.get(key).map(|s| s.epoch).unwrap_or(0);
        (slots.generation, epoch)
    }

    fn store<T: Send + Sync + 'static>(&self, key: &QueryKey, value: Arc<T>, stamp: Stamp) {
        let mut slots = lock(&self.slots);
        if slots.generation != stamp.0 {
            // Cleared while the request was in flight; the data may belong to
            // another session or tenant
            return;
        }
        let slot = slots.map.entry(key.clone()).or_default();
        // Invalidated while the request was in flight: keep the data, but stale
        let stale = slot.epoch != stamp.1;
        slot.entry = Some(Entry {
            value,
            fetched_at: Instant::now(),
            stale,
        });
    }

    fn mark_stale(slot: &mut Slot) {
        slot.epoch += 1;
        if let Some(entry) = slot.entry.as_mut() {
            entry.stale = true;
        }
    }
}

/// Latest result of a polled query
#[derive(Debug)]
pub enum QueryState<T> {
    Loading,
    Ready(Arc<T>),
    Failed(crate::error::ClientError),
}

impl<T> Clone for QueryState<T> {
    fn clone(&self) -> Self {
        match self {
            QueryState::Loading => QueryState::Loading,
            QueryState::Ready(value) => QueryState::Ready(value.clone()),
            QueryState::Failed(e) => QueryState::Failed(e.clone()),
        }
    }
}

impl<T> QueryState<T> {
    pub fn data(&self) -> Option<&Arc<T>> {
        match self {
            QueryState::Ready(value) => Some(value),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&crate::error::ClientError> {
        match self {
            QueryState::Failed(e) => Some(e),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, QueryState::Loading)
    }
}

/// Handle to a background-refetched query
pub struct QuerySubscription<T> {
    receiver: watch::Receiver<QueryState<T>>,
    handle: JoinHandle<()>,
}

impl<T> QuerySubscription<T> {
    pub fn current(&self) -> QueryState<T> {
        self.receiver.borrow().clone()
    }

    /// Wait for the next published state; None once the poller has stopped
    pub async fn next(&mut self) -> Option<QueryState<T>> {
        self.receiver.changed().await.ok()?;
        Some(self.receiver.borrow_and_update().clone())
    }
}

impl<T> Drop for QuerySubscription<T> {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClientError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_key_is_canonical() {
        #[derive(Serialize)]
        struct A {
            page: u32,
            limit: u32,
        }
        let a = QueryKey::new("patients", &A { page: 2, limit: 10 });
        let b = QueryKey::new("patients", &serde_json::json!({ "limit": 10, "page": 2 }));
        assert_eq!(a, b);
        assert_eq!(a.to_string(), r#"["patients", {"limit":10,"page":2}]"#);
    }

    #[tokio::test]
    async fn test_fresh_hit_and_invalidation() {
        let cache = QueryCache::new();
        let calls = AtomicUsize::new(0);
        let key = QueryKey::scope("patients");
        let options = QueryOptions::fresh_for(minutes(5));
        let fetch = || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, ClientError>(42u32)
        };

        assert_eq!(*cache.fetch(&key, &options, fetch).await.unwrap(), 42);
        assert_eq!(*cache.fetch(&key, &options, fetch).await.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!cache.is_stale(&key));

        assert_eq!(cache.invalidate("patients"), 1);
        assert!(cache.is_stale(&key));
        cache.fetch(&key, &options, fetch).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(!cache.is_stale(&key));
    }

    #[tokio::test]
    async fn test_zero_stale_time_always_refetches() {
        let cache = QueryCache::new();
        let calls = AtomicUsize::new(0);
        let key = QueryKey::scope("leads");
        let options = QueryOptions::default();
        let fetch = || async {
            Ok::<_, ClientError>(calls.fetch_add(1, Ordering::SeqCst))
        };

        cache.fetch(&key, &options, fetch).await.unwrap();
        cache.fetch(&key, &options, fetch).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failed_fetch_keeps_previous_value() {
        let cache = QueryCache::new();
        let key = QueryKey::scope("inventory");
        let options = QueryOptions::default();

        cache
            .fetch(&key, &options, || async { Ok::<_, ClientError>(7u8) })
            .await
            .unwrap();
        let err = cache
            .fetch(&key, &options, || async {
                Err::<u8, _>(ClientError::NotFound("inventory".into()))
            })
            .await
            .unwrap_err();
        assert_eq!(err, ClientError::NotFound("inventory".into()));
        assert_eq!(cache.get::<u8>(&key).as_deref(), Some(&7));
    }

    #[tokio::test]
    async fn test_failed_one_off_queries_leave_no_slots() {
        let cache = QueryCache::new();
        let options = QueryOptions::default();

        for term in ["ada", "grace", "hopper"] {
            let key = QueryKey::new("patients", &serde_json::json!({ "search": term }));
            let result = cache
                .fetch(&key, &options, || async {
                    Err::<u8, _>(ClientError::Server {
                        status: 500,
                        message: "boom".into(),
                    })
                })
                .await;
            assert!(result.is_err());
        }

        assert_eq!(lock(&cache.slots).map.len(), 0);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_retry_only_retryable_errors() {
        let cache = QueryCache::new();
        let calls = AtomicUsize::new(0);
        let options = QueryOptions::default().with_retry(3, Duration::from_millis(1));

        let result = cache
            .fetch(&QueryKey::scope("health"), &options, || async {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(ClientError::Network("connection refused".into()))
                } else {
                    Ok("ok")
                }
            })
            .await;
        assert_eq!(result.as_deref(), Ok(&"ok"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        calls.store(0, Ordering::SeqCst);
        let result = cache
            .fetch(&QueryKey::scope("other"), &options, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<u8, _>(ClientError::Forbidden("no".into()))
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_reads_coalesce() {
        let cache = QueryCache::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let key = QueryKey::scope("appointments");
        let options = QueryOptions::default();

        let fetch = || {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok::<_, ClientError>(1u8)
            }
        };

        let (a, b) = tokio::join!(
            cache.fetch(&key, &options, fetch),
            cache.fetch(&key, &options, fetch)
        );
        assert!(a.is_ok() && b.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_poll_publishes_and_stops_on_drop() {
        let cache = QueryCache::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let options = QueryOptions::default().with_refetch_interval(Duration::from_millis(20));

        let counter = calls.clone();
        let mut subscription = cache.poll(QueryKey::scope("dashboard"), options, move || {
            let counter = counter.clone();
            async move { Ok::<_, ClientError>(counter.fetch_add(1, Ordering::SeqCst)) }
        });

        let first = *subscription.next().await.unwrap().data().cloned().unwrap();
        let second = *subscription.next().await.unwrap().data().cloned().unwrap();
        assert!(second > first);

        drop(subscription);
        tokio::time::sleep(Duration::from_millis(60)).await;
        let after_drop = calls.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(calls.load(Ordering::SeqCst), after_drop);
    }
}

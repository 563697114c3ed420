use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, warn};

use super::read::ReadHandle;
use crate::api::ApiError;

/// Resolves a cache key to a payload.
pub type Fetcher =
    Arc<dyn Fn(String) -> BoxFuture<'static, Result<Value, ApiError>> + Send + Sync>;

/// Wrap an async function as a `Fetcher`.
pub fn fetcher<F, Fut>(f: F) -> Fetcher
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, ApiError>> + Send + 'static,
{
    Arc::new(move |key| f(key).boxed())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheOptions {
    /// Revalidate observed keys when the viewing surface regains focus
    pub revalidate_on_focus: bool,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            revalidate_on_focus: true,
        }
    }
}

/// State of one key, published to every observer of that key.
#[derive(Debug, Clone, Default)]
pub(crate) struct Snapshot {
    pub data: Option<Arc<Value>>,
    pub error: Option<Arc<ApiError>>,
    pub in_flight: usize,
    pub updated_at: Option<DateTime<Utc>>,
}

struct Entry {
    tx: Arc<watch::Sender<Snapshot>>,
    /// Explicit fetchers of the live reads on this key, by observer id
    observers: Vec<(u64, Fetcher)>,
}

impl Entry {
    fn new() -> Self {
        let (tx, _) = watch::channel(Snapshot::default());
        Self {
            tx: Arc::new(tx),
            observers: Vec::new(),
        }
    }

    fn is_observed(&self) -> bool {
        self.tx.receiver_count() > 0
    }

    /// Fetcher of the most recent live read that supplied one
    fn observer_fetcher(&self) -> Option<Fetcher> {
        self.observers.last().map(|(_, fetcher)| Arc::clone(fetcher))
    }
}

struct Inner {
    entries: Mutex<HashMap<String, Entry>>,
    default_fetcher: Option<Fetcher>,
    options: CacheOptions,
    next_observer: AtomicU64,
}

/// In-memory revalidation cache.
///
/// Entries are keyed by request identity (normally the resource path). Reads
/// of a key that already has a request pending join that request instead of
/// issuing another. Consumers never write entries; they change only when a
/// request settles. Requests run on the ambient tokio runtime.
///
/// Clone is cheap and shares the same store.
#[derive(Clone)]
pub struct CacheManager {
    inner: Arc<Inner>,
}

impl fmt::Debug for CacheManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheManager")
            .field("options", &self.inner.options)
            .field("entries", &self.entries().len())
            .field("default_fetcher", &self.inner.default_fetcher.is_some())
            .finish()
    }
}

impl CacheManager {
    pub fn new(options: CacheOptions) -> Self {
        Self::build(options, None)
    }

    pub fn with_fetcher(options: CacheOptions, fetcher: Fetcher) -> Self {
        Self::build(options, Some(fetcher))
    }

    fn build(options: CacheOptions, default_fetcher: Option<Fetcher>) -> Self {
        Self {
            inner: Arc::new(Inner {
                entries: Mutex::new(HashMap::new()),
                default_fetcher,
                options,
                next_observer: AtomicU64::new(0),
            }),
        }
    }

    pub fn options(&self) -> CacheOptions {
        self.inner.options
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        // Entries stay consistent across a panicking holder, so poison is ignored
        self.inner
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Start a live read of `key` using the default fetcher. `None` reads nothing.
    pub fn read(&self, key: Option<&str>) -> ReadHandle {
        ReadHandle::new(self.clone(), key, None)
    }

    /// Start a live read of `key` resolved by `fetcher` instead of the default.
    pub fn read_with(&self, key: Option<&str>, fetcher: Fetcher) -> ReadHandle {
        ReadHandle::new(self.clone(), key, Some(fetcher))
    }

    pub(crate) fn next_observer_id(&self) -> u64 {
        self.inner.next_observer.fetch_add(1, Ordering::Relaxed)
    }

    /// Observe `key`, starting a request unless one is already pending.
    /// `fetcher` belongs to this observer only and is released by `unsubscribe`.
    pub(crate) fn subscribe(
        &self,
        key: &str,
        observer: u64,
        fetcher: Option<&Fetcher>,
    ) -> watch::Receiver<Snapshot> {
        let mut entries = self.entries();
        let entry = entries.entry(key.to_string()).or_insert_with(Entry::new);
        if let Some(fetcher) = fetcher {
            entry.observers.push((observer, Arc::clone(fetcher)));
        }

        let pending = entry.tx.borrow().in_flight > 0;
        if pending {
            debug!(key = %key, "Joining in-flight request");
        } else {
            self.start_request(key, entry, fetcher.cloned());
        }
        // Subscribed after the request starts so the pending state counts as seen
        entry.tx.subscribe()
    }

    pub(crate) fn unsubscribe(&self, key: &str, observer: u64) {
        if let Some(entry) = self.entries().get_mut(key) {
            entry.observers.retain(|(id, _)| *id != observer);
        }
    }

    /// Re-issue `key` on behalf of one observer, with its own fetcher if it has one.
    pub(crate) fn revalidate(&self, key: &str, fetcher: Option<&Fetcher>) -> bool {
        let entries = self.entries();
        entries
            .get(key)
            .is_some_and(|entry| self.start_request(key, entry, fetcher.cloned()))
    }

    fn start_request(&self, key: &str, entry: &Entry, fetcher: Option<Fetcher>) -> bool {
        let fetcher = match fetcher.or_else(|| self.inner.default_fetcher.clone()) {
            Some(fetcher) => fetcher,
            None => {
                warn!(key = %key, "No fetcher configured, skipping request");
                return false;
            }
        };

        entry.tx.send_modify(|snapshot| snapshot.in_flight += 1);
        let tx = Arc::clone(&entry.tx);
        let key = key.to_string();
        debug!(key = %key, "Starting request");

        tokio::spawn(async move {
            let result = fetcher(key.clone()).await;
            tx.send_modify(|snapshot| {
                snapshot.in_flight = snapshot.in_flight.saturating_sub(1);
                snapshot.updated_at = Some(Utc::now());
                match result {
                    Ok(data) => {
                        snapshot.data = Some(Arc::new(data));
                        snapshot.error = None;
                    }
                    Err(e) => {
                        debug!(key = %key, error = %e, "Request failed");
                        snapshot.error = Some(Arc::new(e));
                    }
                }
            });
        });
        true
    }

    /// Re-issue the request for `key` if anything is observing it.
    /// Returns whether a request was started.
    pub fn invalidate(&self, key: &str) -> bool {
        let entries = self.entries();
        match entries.get(key) {
            Some(entry) if entry.is_observed() => {
                self.start_request(key, entry, entry.observer_fetcher())
            }
            Some(_) => {
                // The next read of this key fetches anyway
                debug!(key = %key, "Invalidated key has no observers");
                false
            }
            None => false,
        }
    }

    /// Re-issue the request for every observed key. Returns the number started.
    pub fn invalidate_all(&self) -> usize {
        let entries = self.entries();
        let mut started = 0;
        for (key, entry) in entries.iter().filter(|(_, entry)| entry.is_observed()) {
            if self.start_request(key, entry, entry.observer_fetcher()) {
                started += 1;
            }
        }
        started
    }

    /// Focus returned to the viewing surface.
    pub fn notify_focus(&self) -> usize {
        if !self.inner.options.revalidate_on_focus {
            debug!("Focus regained, revalidation on focus disabled");
            return 0;
        }
        self.invalidate_all()
    }

    /// Last successful payload stored for `key`
    pub fn get(&self, key: &str) -> Option<Arc<Value>> {
        let entries = self.entries();
        let entry = entries.get(key)?;
        let data = entry.tx.borrow().data.clone();
        data
    }

    pub fn is_pending(&self, key: &str) -> bool {
        self.entries()
            .get(key)
            .is_some_and(|entry| entry.tx.borrow().in_flight > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;
    use tokio::sync::Semaphore;

    use crate::cache::ReadStatus;

    /// Fetcher that blocks until the test releases a permit, counting calls.
    fn gated_fetcher(calls: Arc<AtomicUsize>, gate: Arc<Semaphore>) -> Fetcher {
        fetcher(move |key| {
            let calls = Arc::clone(&calls);
            let gate = Arc::clone(&gate);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                gate.acquire().await.unwrap().forget();
                if key.starts_with("/fail") {
                    Err(ApiError::InvalidConfig(format!("cannot load {}", key)))
                } else {
                    Ok(json!({ "key": key }))
                }
            }
        })
    }

    fn setup(options: CacheOptions) -> (CacheManager, Arc<AtomicUsize>, Arc<Semaphore>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let gate = Arc::new(Semaphore::new(0));
        let cache =
            CacheManager::with_fetcher(options, gated_fetcher(Arc::clone(&calls), Arc::clone(&gate)));
        (cache, calls, gate)
    }

    #[tokio::test]
    async fn test_concurrent_reads_share_one_request() {
        let (cache, calls, gate) = setup(CacheOptions::default());

        let mut first = cache.read(Some("/items"));
        let mut second = cache.read(Some("/items"));
        assert!(first.state().is_loading);
        assert!(second.state().is_loading);

        gate.add_permits(1);
        let a = first.settled().await;
        let b = second.settled().await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(a.data, b.data);
        assert_eq!(a.data.as_deref(), Some(&json!({"key": "/items"})));
        assert_eq!(a.status(), ReadStatus::Success);
    }

    #[tokio::test]
    async fn test_concurrent_reads_share_error() {
        let (cache, calls, gate) = setup(CacheOptions::default());

        let mut first = cache.read(Some("/fail"));
        let mut second = cache.read(Some("/fail"));
        gate.add_permits(1);

        let a = first.settled().await;
        let b = second.settled().await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(a.error.as_ref().unwrap(), b.error.as_ref().unwrap()));
        assert_eq!(a.status(), ReadStatus::Error);
        assert!(a.data.is_none());
    }

    #[tokio::test]
    async fn test_focus_does_not_revalidate_when_disabled() {
        let (cache, calls, gate) = setup(CacheOptions {
            revalidate_on_focus: false,
        });
        gate.add_permits(10);

        let mut handle = cache.read(Some("/items"));
        handle.settled().await;

        for _ in 0..5 {
            assert_eq!(cache.notify_focus(), 0);
        }
        tokio::task::yield_now().await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!cache.is_pending("/items"));
    }

    #[tokio::test]
    async fn test_focus_revalidates_observed_keys_when_enabled() {
        let (cache, calls, gate) = setup(CacheOptions::default());
        gate.add_permits(10);

        let mut handle = cache.read(Some("/items"));
        handle.settled().await;

        assert_eq!(cache.notify_focus(), 1);
        handle.settled().await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_invalidate_refetches_only_observed_keys() {
        let (cache, calls, gate) = setup(CacheOptions::default());
        gate.add_permits(10);

        let mut observed = cache.read(Some("/observed"));
        observed.settled().await;
        let mut dropped = cache.read(Some("/dropped"));
        dropped.settled().await;
        drop(dropped);

        assert!(cache.invalidate("/observed"));
        assert!(!cache.invalidate("/dropped"));
        assert!(!cache.invalidate("/unknown"));
        observed.settled().await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(cache.get("/dropped").is_some());
    }

    #[tokio::test]
    async fn test_stale_data_served_while_revalidating() {
        let (cache, _calls, gate) = setup(CacheOptions::default());
        gate.add_permits(1);

        let mut first = cache.read(Some("/items"));
        first.settled().await;
        drop(first);

        let second = cache.read(Some("/items"));
        let state = second.state();
        assert!(state.is_validating);
        assert!(!state.is_loading);
        assert_eq!(state.status(), ReadStatus::Success);
    }

    #[tokio::test]
    async fn test_read_without_fetcher_stays_idle() {
        let cache = CacheManager::new(CacheOptions::default());
        let handle = cache.read(Some("/items"));
        let state = handle.state();
        assert!(!state.is_loading);
        assert_eq!(state.status(), ReadStatus::Idle);
        assert!(!cache.is_pending("/items"));
    }

    #[tokio::test]
    async fn test_explicit_fetcher_overrides_default() {
        let cache = CacheManager::with_fetcher(
            CacheOptions::default(),
            fetcher(|_| async { Ok(json!("default")) }),
        );

        let mut handle = cache.read_with(
            Some("/items"),
            fetcher(|key| async move { Ok(json!(format!("explicit {}", key))) }),
        );
        let state = handle.settled().await;
        assert_eq!(state.data.as_deref(), Some(&json!("explicit /items")));
    }

    fn default_and_explicit() -> (CacheManager, Fetcher) {
        let cache = CacheManager::with_fetcher(
            CacheOptions::default(),
            fetcher(|_| async { Ok(json!("default")) }),
        );
        (cache, fetcher(|_| async { Ok(json!("explicit")) }))
    }

    #[tokio::test]
    async fn test_explicit_fetcher_not_reused_by_later_reads() {
        let (cache, explicit) = default_and_explicit();

        let mut first = cache.read_with(Some("/items"), explicit);
        assert_eq!(first.settled().await.data.as_deref(), Some(&json!("explicit")));
        drop(first);

        let mut second = cache.read(Some("/items"));
        assert_eq!(second.settled().await.data.as_deref(), Some(&json!("default")));

        assert!(cache.invalidate("/items"));
        assert_eq!(second.settled().await.data.as_deref(), Some(&json!("default")));
    }

    #[tokio::test]
    async fn test_invalidate_uses_live_observer_fetcher() {
        let (cache, explicit) = default_and_explicit();

        let mut plain = cache.read(Some("/items"));
        plain.settled().await;
        let mut custom = cache.read_with(Some("/items"), explicit);
        custom.settled().await;

        assert_eq!(cache.invalidate_all(), 1);
        assert_eq!(plain.settled().await.data.as_deref(), Some(&json!("explicit")));

        custom.set_key(None);
        assert!(cache.invalidate("/items"));
        assert_eq!(plain.settled().await.data.as_deref(), Some(&json!("default")));
    }

    #[tokio::test]
    async fn test_handle_revalidates_with_its_own_fetcher() {
        let (cache, explicit) = default_and_explicit();

        let mut custom = cache.read_with(Some("/items"), explicit);
        custom.settled().await;
        let mut plain = cache.read(Some("/items"));
        assert_eq!(plain.settled().await.data.as_deref(), Some(&json!("default")));

        assert!(custom.revalidate());
        assert_eq!(custom.settled().await.data.as_deref(), Some(&json!("explicit")));

        assert!(plain.revalidate());
        assert_eq!(plain.settled().await.data.as_deref(), Some(&json!("default")));
    }

    #[tokio::test]
    async fn test_new_read_joins_request_of_dropped_read() {
        let (cache, calls, gate) = setup(CacheOptions::default());

        let first = cache.read(Some("/items"));
        drop(first);
        assert!(cache.is_pending("/items"));

        let mut second = cache.read(Some("/items"));
        assert!(second.state().is_loading);

        gate.add_permits(1);
        let state = second.settled().await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(state.data.as_deref(), Some(&json!({"key": "/items"})));
    }
}

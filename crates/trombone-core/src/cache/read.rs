use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::watch;

use super::manager::{CacheManager, Fetcher, Snapshot};
use crate::api::ApiError;

/// Lifecycle of a read: `Idle` without a key, `Loading` until the first
/// result for the key arrives, then `Success` or `Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStatus {
    Idle,
    Loading,
    Success,
    Error,
}

/// Point-in-time view of a read.
#[derive(Debug, Clone, Default)]
pub struct ReadState {
    pub key: Option<String>,
    pub data: Option<Arc<Value>>,
    pub error: Option<Arc<ApiError>>,
    /// A request is pending and there is no payload to show yet
    pub is_loading: bool,
    /// A request is pending
    pub is_validating: bool,
    pub updated_at: Option<DateTime<Utc>>,
}

impl ReadState {
    fn from_snapshot(key: &str, snapshot: &Snapshot) -> Self {
        let is_validating = snapshot.in_flight > 0;
        Self {
            key: Some(key.to_string()),
            data: snapshot.data.clone(),
            error: snapshot.error.clone(),
            is_loading: is_validating && snapshot.data.is_none(),
            is_validating,
            updated_at: snapshot.updated_at,
        }
    }

    pub fn status(&self) -> ReadStatus {
        if self.key.is_none() {
            ReadStatus::Idle
        } else if self.is_loading {
            ReadStatus::Loading
        } else if self.error.is_some() {
            ReadStatus::Error
        } else if self.data.is_some() {
            ReadStatus::Success
        } else {
            // Key present but nothing was ever requested (no fetcher)
            ReadStatus::Idle
        }
    }

    /// Decode the payload into `T`
    pub fn data_as<T: DeserializeOwned>(&self) -> Result<Option<T>, ApiError> {
        self.data
            .as_deref()
            .map(|data| T::deserialize(data).map_err(ApiError::from))
            .transpose()
    }
}

/// Live read of one cache key.
///
/// Dropping the handle, or moving it to another key, detaches it from the
/// previous key: responses for a key it no longer observes never reach it.
pub struct ReadHandle {
    cache: CacheManager,
    id: u64,
    fetcher: Option<Fetcher>,
    key: Option<String>,
    rx: Option<watch::Receiver<Snapshot>>,
}

impl ReadHandle {
    pub(crate) fn new(cache: CacheManager, key: Option<&str>, fetcher: Option<Fetcher>) -> Self {
        let mut handle = Self {
            id: cache.next_observer_id(),
            cache,
            fetcher,
            key: None,
            rx: None,
        };
        handle.set_key(key);
        handle
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn state(&self) -> ReadState {
        match (&self.key, &self.rx) {
            (Some(key), Some(rx)) => ReadState::from_snapshot(key, &rx.borrow()),
            _ => ReadState::default(),
        }
    }

    /// Point the read at another key. `None` or an empty key returns it to idle.
    pub fn set_key(&mut self, key: Option<&str>) {
        let key = key.filter(|key| !key.is_empty());
        if self.key.as_deref() == key {
            return;
        }

        self.detach();
        self.key = key.map(str::to_string);
        if let Some(key) = key {
            self.rx = Some(self.cache.subscribe(key, self.id, self.fetcher.as_ref()));
        }
    }

    fn detach(&mut self) {
        self.rx = None;
        if let Some(key) = self.key.as_deref() {
            self.cache.unsubscribe(key, self.id);
        }
    }

    /// Wait for the next change to this read. Never resolves while idle.
    pub async fn changed(&mut self) -> ReadState {
        let Some(rx) = self.rx.as_mut() else {
            return std::future::pending().await;
        };
        // The sender lives in the cache entry, which outlives this handle
        let _ = rx.changed().await;
        self.state()
    }

    /// Wait until no request is pending for the current key.
    pub async fn settled(&mut self) -> ReadState {
        if let Some(rx) = self.rx.as_mut() {
            let _ = rx.wait_for(|snapshot| snapshot.in_flight == 0).await;
        }
        self.state()
    }

    /// Re-issue the request for the current key with this read's fetcher.
    pub fn revalidate(&self) -> bool {
        self.key
            .as_deref()
            .is_some_and(|key| self.cache.revalidate(key, self.fetcher.as_ref()))
    }
}

impl Drop for ReadHandle {
    fn drop(&mut self) {
        self.detach();
    }
}

impl std::fmt::Debug for ReadHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadHandle")
            .field("key", &self.key)
            .field("state", &self.state().status())
            .finish_non_exhaustive()
    }
}

// ── Device state cache ──
//
// Last known value per (device, metric). Reads answer from memory and
// kick off a background refresh through the request queue; writes land
// in the cache first and are confirmed (or corrected) when the backend
// answers. Each entry lives in its own `watch` channel, so an update is
// one atomic replace under that channel's lock.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::CoreError;
use crate::model::{CacheKey, Call, MetricValue};
use crate::queue::RequestQueue;
use crate::stream::MetricStream;

/// Callback fired whenever a cached value changes.
pub type Observer = Arc<dyn Fn(&CacheKey, &MetricValue) + Send + Sync>;

/// One cached metric.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub value: MetricValue,
    /// When a refresh or write last landed. `None` means the value is
    /// still the caller-supplied default.
    pub last_updated: Option<DateTime<Utc>>,
    pub refresh_in_flight: bool,
    /// Optimistic writes applied so far. A backend answer for a call
    /// queued before the latest write is dropped.
    pub writes: u64,
}

impl CacheEntry {
    fn new(key: CacheKey, value: MetricValue) -> Self {
        Self {
            key,
            value,
            last_updated: None,
            refresh_in_flight: false,
            writes: 0,
        }
    }

    /// No refresh or write has completed yet.
    pub fn is_stale(&self) -> bool {
        self.last_updated.is_none()
    }
}

/// Backend confirmation of an optimistic write.
///
/// The cache already holds the written value; awaiting this only tells
/// whether the box accepted it. Dropping it is fine.
#[derive(Debug)]
pub struct PendingWrite {
    handle: Option<JoinHandle<Result<(), CoreError>>>,
}

impl PendingWrite {
    pub(crate) fn local() -> Self {
        Self { handle: None }
    }

    pub(crate) fn spawned(handle: JoinHandle<Result<(), CoreError>>) -> Self {
        Self {
            handle: Some(handle),
        }
    }

    /// Wait for the backend to answer.
    pub async fn confirmed(self) -> Result<(), CoreError> {
        match self.handle {
            None => Ok(()),
            Some(handle) => handle
                .await
                .map_err(|e| CoreError::Internal(format!("write task failed: {e}")))?,
        }
    }
}

// ── DeviceStateCache ─────────────────────────────────────────────────

/// Per-device, per-metric read-through cache. Cheaply cloneable.
#[derive(Clone)]
pub struct DeviceStateCache {
    pub(super) inner: Arc<CacheInner>,
}

pub(super) struct CacheInner {
    pub(super) entries: DashMap<CacheKey, Arc<watch::Sender<CacheEntry>>>,
    pub(super) observers: DashMap<CacheKey, Vec<Observer>>,
    pub(super) queue: RequestQueue,
}

impl DeviceStateCache {
    pub fn new(queue: RequestQueue) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                entries: DashMap::new(),
                observers: DashMap::new(),
                queue,
            }),
        }
    }

    /// Create `key` with `default` unless it already exists.
    pub fn seed(&self, key: &CacheKey, default: MetricValue) {
        self.slot(key, default);
    }

    /// Current value of `key`, scheduling a refresh.
    ///
    /// Never waits on the network. A missing entry is created holding
    /// `default`, which is also what gets returned. No second refresh is
    /// scheduled while one for the same key is still running.
    pub fn read(&self, key: &CacheKey, default: MetricValue) -> MetricValue {
        let sender = self.slot(key, default);

        let mut claimed = false;
        sender.send_if_modified(|entry| {
            if !entry.refresh_in_flight {
                entry.refresh_in_flight = true;
                claimed = true;
            }
            false
        });

        let value = sender.borrow().value.clone();
        if claimed {
            self.spawn_refresh(key.clone(), sender);
        }
        value
    }

    /// Current value of `key` without scheduling anything.
    pub fn peek(&self, key: &CacheKey) -> Option<MetricValue> {
        self.inner
            .entries
            .get(key)
            .map(|sender| sender.borrow().value.clone())
    }

    /// Full entry for `key`, including freshness.
    pub fn entry(&self, key: &CacheKey) -> Option<CacheEntry> {
        self.inner
            .entries
            .get(key)
            .map(|sender| sender.borrow().clone())
    }

    /// Store `value` now and send the matching setter to the box.
    ///
    /// Fails with [`CoreError::ReadOnly`] if the metric has no setter.
    pub fn write(&self, key: &CacheKey, value: MetricValue) -> Result<PendingWrite, CoreError> {
        let call = key.metric.write_call(&key.device, &value).ok_or_else(|| {
            CoreError::ReadOnly {
                characteristic: key.metric.to_string(),
            }
        })?;
        Ok(self.write_with(key, value, Some(call)))
    }

    /// Store `value` now and, if given, enqueue `call` to persist it.
    ///
    /// The call is queued before this returns. Its decoded answer
    /// overwrites the entry when it arrives unless another write came
    /// after it. Refreshes queued before this write never overwrite it.
    pub fn write_with(&self, key: &CacheKey, value: MetricValue, call: Option<Call>) -> PendingWrite {
        let sender = self.slot(key, value.clone());
        let seq = self.apply(key, &sender, value);

        match call {
            Some(call) => self.spawn_write(key.clone(), sender, call, seq),
            None => PendingWrite::local(),
        }
    }

    /// Register `callback` for changes of `key`.
    pub fn observe(&self, key: &CacheKey, callback: Observer) {
        self.inner
            .observers
            .entry(key.clone())
            .or_default()
            .push(callback);
    }

    /// Subscribe to the entry for `key`, creating it with `default`.
    pub fn subscribe(&self, key: &CacheKey, default: MetricValue) -> MetricStream {
        MetricStream::new(self.slot(key, default).subscribe())
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }

    // ── Internals ────────────────────────────────────────────────────

    pub(super) fn slot(&self, key: &CacheKey, default: MetricValue) -> Arc<watch::Sender<CacheEntry>> {
        let sender = self
            .inner
            .entries
            .entry(key.clone())
            .or_insert_with(|| {
                let (tx, _) = watch::channel(CacheEntry::new(key.clone(), default));
                Arc::new(tx)
            });
        Arc::clone(sender.value())
    }

    /// Store a written value, notifying observers if it changed.
    ///
    /// Returns the entry's write sequence number after the write.
    pub(super) fn apply(
        &self,
        key: &CacheKey,
        sender: &watch::Sender<CacheEntry>,
        value: MetricValue,
    ) -> u64 {
        let mut changed = false;
        let mut seq = 0;
        sender.send_modify(|entry| {
            changed = entry.value != value;
            entry.value = value.clone();
            entry.last_updated = Some(Utc::now());
            entry.writes += 1;
            seq = entry.writes;
        });
        if changed {
            self.notify(key, &value);
        }
        seq
    }

    pub(super) fn notify(&self, key: &CacheKey, value: &MetricValue) {
        // clone out so callbacks may touch the cache
        let observers: Vec<Observer> = match self.inner.observers.get(key) {
            Some(list) => list.clone(),
            None => return,
        };
        for observer in observers {
            observer(key, value);
        }
    }
}

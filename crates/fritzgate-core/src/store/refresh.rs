// ── Refresh and write completion ──
//
// Background tasks that carry a queued call to completion and fold the
// answer back into the cache. Failures end here as warnings; readers keep
// seeing the last good value.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, warn};

use super::cache::{CacheEntry, DeviceStateCache, PendingWrite};
use crate::error::CoreError;
use crate::model::{CacheKey, Call, MetricValue};

impl DeviceStateCache {
    /// Run the read call for `key`. The caller has already set
    /// `refresh_in_flight`; this task clears it.
    pub(super) fn spawn_refresh(&self, key: CacheKey, sender: Arc<watch::Sender<CacheEntry>>) {
        let seq = sender.borrow().writes;
        let handle = self.inner.queue.call(key.read_call());
        let cache = self.clone();
        tokio::spawn(async move {
            let result = handle.await;
            if let Err(e) = cache.complete(&key, &sender, result, true, seq) {
                warn!(key = %key, error = %e, "refresh failed");
            }
        });
    }

    /// Run `call` for an optimistic write of `key`.
    pub(super) fn spawn_write(
        &self,
        key: CacheKey,
        sender: Arc<watch::Sender<CacheEntry>>,
        call: Call,
        seq: u64,
    ) -> PendingWrite {
        debug!(key = %key, call = %call, "write queued");
        let handle = self.inner.queue.call(call);
        let cache = self.clone();
        PendingWrite::spawned(tokio::spawn(async move {
            let result = handle.await;
            cache
                .complete(&key, &sender, result, false, seq)
                .inspect_err(|e| warn!(key = %key, error = %e, "write failed"))
        }))
    }

    /// Refresh `key` now and wait for the answer.
    ///
    /// Unlike [`read`](Self::read) this always issues a call and reports
    /// its failure to the caller.
    pub async fn refresh(
        &self,
        key: &CacheKey,
        default: MetricValue,
    ) -> Result<MetricValue, CoreError> {
        let sender = self.slot(key, default);
        let seq = sender.borrow().writes;
        let result = self.inner.queue.call(key.read_call()).await;
        self.complete(key, &sender, result, false, seq)?;
        let value = sender.borrow().value.clone();
        Ok(value)
    }

    /// Decode a finished call into the entry and notify on change.
    ///
    /// Decoding happens inside the entry's lock, so answers that depend
    /// on the previous value see the one they replace. `seq` is the
    /// entry's write count when the call was queued; a value decoded
    /// after a newer write is dropped, errors are still reported.
    fn complete(
        &self,
        key: &CacheKey,
        sender: &watch::Sender<CacheEntry>,
        result: Result<Value, CoreError>,
        clears_flight: bool,
        seq: u64,
    ) -> Result<(), CoreError> {
        let mut outcome: Result<Option<MetricValue>, CoreError> = Ok(None);
        sender.send_if_modified(|entry| {
            if clears_flight {
                entry.refresh_in_flight = false;
            }
            let decoded = result
                .as_ref()
                .map_err(Clone::clone)
                .and_then(|raw| key.metric.decode(raw, &entry.value));
            match decoded {
                Ok(_) if entry.writes != seq => {
                    debug!(key = %key, "answer superseded by a newer write");
                    false
                }
                Ok(value) => {
                    let changed = entry.value != value;
                    entry.value = value.clone();
                    entry.last_updated = Some(Utc::now());
                    if changed {
                        outcome = Ok(Some(value));
                    }
                    true
                }
                Err(e) => {
                    outcome = Err(e);
                    false
                }
            }
        });

        if let Some(value) = outcome? {
            self.notify(key, &value);
        }
        Ok(())
    }
}

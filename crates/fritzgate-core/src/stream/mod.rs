// ── Reactive metric streams ──
//
// Subscription to a single cache entry, for consumers that prefer to
// await changes over registering callbacks.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::store::CacheEntry;

/// A subscription to one cache entry.
///
/// Provides point-in-time access and change notification via
/// [`changed()`](Self::changed) or by converting into a `Stream`.
pub struct MetricStream {
    current: CacheEntry,
    receiver: watch::Receiver<CacheEntry>,
}

impl MetricStream {
    pub(crate) fn new(receiver: watch::Receiver<CacheEntry>) -> Self {
        let current = receiver.borrow().clone();
        Self { current, receiver }
    }

    /// The entry as it was when last observed through this stream.
    pub fn current(&self) -> &CacheEntry {
        &self.current
    }

    /// The entry as it is now.
    pub fn latest(&self) -> CacheEntry {
        self.receiver.borrow().clone()
    }

    /// Wait for the next refresh or write to land.
    /// Returns `None` once the cache is gone.
    pub async fn changed(&mut self) -> Option<CacheEntry> {
        self.receiver.changed().await.ok()?;
        let entry = self.receiver.borrow_and_update().clone();
        self.current = entry.clone();
        Some(entry)
    }

    /// Convert into a `Stream` for use with `StreamExt` combinators.
    pub fn into_stream(self) -> MetricWatchStream {
        MetricWatchStream {
            inner: WatchStream::new(self.receiver),
        }
    }
}

/// `Stream` adapter yielding the entry each time it changes,
/// starting with its current state.
pub struct MetricWatchStream {
    inner: WatchStream<CacheEntry>,
}

impl Stream for MetricWatchStream {
    type Item = CacheEntry;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

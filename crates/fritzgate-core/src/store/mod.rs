// ── Device state cache ──
//
// Read-through metric storage with push-based change notification.

mod cache;
mod refresh;

pub use cache::{CacheEntry, DeviceStateCache, Observer, PendingWrite};

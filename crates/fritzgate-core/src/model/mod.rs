// ── Domain model ──
//
// Devices as discovered, the metrics the cache tracks for them, and the
// calls that read and write those metrics.

pub mod ain;
pub mod device;
pub mod metric;

pub use ain::{Ain, BOX_DEVICE};
pub use device::{Capability, Device, DeviceButton};
pub use metric::{
    CacheKey, Call, ContactState, HeatingCoolingState, MAX_TARGET_TEMPERATURE, Metric, MetricValue,
    TargetMode,
};

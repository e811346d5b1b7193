//! Gateway layer between `fritzgate-api` and an accessory host (or the CLI).
//!
//! This crate owns session handling, request dispatch, the state cache and
//! the accessory model:
//!
//! - **[`Gateway`]**: Central facade: [`start()`](Gateway::start) logs in,
//!   discovers devices, builds accessories and spawns their pollers.
//!   [`Gateway::oneshot()`](Gateway::oneshot) runs a single CLI operation
//!   without pollers.
//!
//! - **[`SessionManager`]**: Holds the one session id and collapses
//!   concurrent renewals into a single login.
//!
//! - **[`RequestQueue`]**: Every backend call goes through its worker:
//!   serialized (default) or bounded-concurrent dispatch, one renewal and
//!   retry on session expiry, fixed-delay retries on transient failures.
//!
//! - **[`DeviceStateCache`]**: Per-device, per-metric values that answer
//!   reads immediately and refresh in the background. Writes are
//!   optimistic. Changes are pushed to observers and [`MetricStream`]s.
//!
//! - **[`AccessoryController`]**: One per host accessory, composed from
//!   cache-backed features; derived characteristics are computed from
//!   cached values only.
//!
//! - **[`DiscoveryService`]**: Startup device listing and accessory planning.

pub mod accessory;
pub mod config;
pub mod discovery;
pub mod error;
pub mod gateway;
pub mod model;
pub mod queue;
pub mod session;
pub mod store;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use accessory::{
    AccessoryController, AccessoryInformation, AccessoryKind, Characteristic,
    CharacteristicObserver, ServiceDescriptor, ServiceKind,
};
pub use config::{
    Credentials, DeviceOverride, DeviceOverrides, DispatchPolicy, GatewayConfig, RetryPolicy,
    TlsVerification, WifiOptions,
};
pub use discovery::{AccessoryPlan, Discovery, DiscoveryService};
pub use error::CoreError;
pub use gateway::Gateway;
pub use queue::{CallHandle, RequestQueue};
pub use session::{Session, SessionManager};
pub use store::{CacheEntry, DeviceStateCache, Observer, PendingWrite};
pub use stream::MetricStream;

pub use model::{
    Ain, CacheKey, Call, Capability, ContactState, Device, DeviceButton, HeatingCoolingState,
    Metric, MetricValue, TargetMode,
};

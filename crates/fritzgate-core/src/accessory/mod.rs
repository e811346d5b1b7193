// ── Accessories ──
//
// Host-facing accessories composed from cache-backed features.

mod controller;
mod kind;

pub use controller::{AccessoryController, CharacteristicObserver, heating_cooling_state};
pub use kind::{
    AccessoryInformation, AccessoryKind, Characteristic, DEFAULT_TEMPERATURE, Feature,
    LOW_BATTERY_THRESHOLD, ServiceDescriptor, ServiceKind,
};

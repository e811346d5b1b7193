// ── Runtime gateway configuration ──
//
// These types describe *how* to talk to a box and which accessories to
// expose. They carry credentials and tuning, but never touch disk.
// fritzgate-config (or a test) constructs a `GatewayConfig` and hands it in.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use fritzgate_api::{TlsMode, TransportConfig};
use secrecy::SecretString;
use url::Url;

use crate::model::Ain;

/// Default guest WLAN accessory name.
pub const DEFAULT_WIFI_NAME: &str = "Guest WLAN";

/// Login credentials for the box.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
}

/// How the request queue hands calls to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchPolicy {
    /// One call at a time, strictly in enqueue order.
    #[default]
    Serialized,
    /// Calls start in enqueue order, at most `max_in_flight` at once.
    Concurrent { max_in_flight: usize },
}

/// Retry behaviour for transient backend failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per call, the first one included.
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(3),
        }
    }
}

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    #[default]
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(PathBuf),
    /// Skip verification (self-signed remote-access certificates).
    DangerAcceptInvalid,
}

/// Per-device visibility and feature switches.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct DeviceOverride {
    /// Expose the device at all.
    pub display: bool,
    /// Add a temperature service to outlets that measure temperature.
    pub temperature_sensor: bool,
    /// Expose alarm-capable devices as contact sensors.
    pub contact_sensor: bool,
    /// Flip the contact sensor state.
    pub invert: bool,
    /// Replace the name reported by the box.
    pub name: Option<String>,
}

impl Default for DeviceOverride {
    fn default() -> Self {
        Self {
            display: true,
            temperature_sensor: true,
            contact_sensor: true,
            invert: false,
            name: None,
        }
    }
}

/// Overrides keyed by AIN. Devices without an entry use the defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceOverrides(BTreeMap<Ain, DeviceOverride>);

impl DeviceOverrides {
    pub fn new(map: BTreeMap<Ain, DeviceOverride>) -> Self {
        Self(map)
    }

    pub fn get(&self, ain: &Ain) -> DeviceOverride {
        self.0.get(ain).cloned().unwrap_or_default()
    }

    pub fn insert(&mut self, ain: Ain, entry: DeviceOverride) {
        self.0.insert(ain, entry);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Guest WLAN meta accessory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WifiOptions {
    pub display: bool,
    pub name: String,
}

impl Default for WifiOptions {
    fn default() -> Self {
        Self {
            display: true,
            name: DEFAULT_WIFI_NAME.into(),
        }
    }
}

/// Configuration for one gateway instance.
///
/// Built by the CLI, passed to `Gateway`; core never reads config files.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Box URL (e.g., `http://fritz.box`).
    pub url: Url,
    pub credentials: Credentials,
    /// Accessory poll interval.
    pub poll_interval: Duration,
    pub dispatch: DispatchPolicy,
    pub retry: RetryPolicy,
    pub tls: TlsVerification,
    /// HTTP request timeout.
    pub timeout: Duration,
    pub devices: DeviceOverrides,
    pub wifi: WifiOptions,
}

impl GatewayConfig {
    pub fn new(url: Url, credentials: Credentials) -> Self {
        Self {
            url,
            credentials,
            poll_interval: Duration::from_secs(60),
            dispatch: DispatchPolicy::default(),
            retry: RetryPolicy::default(),
            tls: TlsVerification::default(),
            timeout: Duration::from_secs(30),
            devices: DeviceOverrides::default(),
            wifi: WifiOptions::default(),
        }
    }

    /// Transport settings for the HTTP client.
    pub fn transport(&self) -> TransportConfig {
        let tls = match &self.tls {
            TlsVerification::SystemDefaults => TlsMode::System,
            TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
            TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
        };
        TransportConfig {
            tls,
            timeout: self.timeout,
        }
    }
}

//! Configuration file for fritzgate.
//!
//! TOML settings, credential resolution (env + keyring + plaintext),
//! and translation to `fritzgate_core::GatewayConfig`. The CLI applies its
//! flag overrides to a loaded [`Config`] before translating it.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;
use url::Url;

use fritzgate_core::{
    Ain, Credentials, DeviceOverride, DeviceOverrides, DispatchPolicy, GatewayConfig, RetryPolicy,
    TlsVerification, WifiOptions,
};

/// Keyring service name. The account is the box user name.
pub const KEYRING_SERVICE: &str = "fritzgate";

/// Box address used when the file sets none.
pub const DEFAULT_URL: &str = "http://fritz.box";

const ENV_PREFIX: &str = "FRITZGATE_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no password configured for user '{username}'")]
    NoCredentials { username: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// Box base URL.
    #[serde(default = "default_url")]
    pub url: String,

    /// Box user. Empty for boxes that only ask for a password.
    #[serde(default)]
    pub username: String,

    /// Password (plaintext; prefer keyring or env var).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Environment variable name containing the password.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_env: Option<String>,

    /// Accessory poll interval in seconds.
    #[serde(default = "default_interval")]
    pub interval: u64,

    #[serde(default)]
    pub dispatch: DispatchMode,

    /// Older boolean switch for `dispatch`; wins when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concurrent: Option<bool>,

    /// Parallel calls under concurrent dispatch.
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,

    /// HTTP timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Accept invalid TLS certificates.
    #[serde(default)]
    pub insecure: bool,

    /// Path to a custom CA certificate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_cert: Option<PathBuf>,

    #[serde(default)]
    pub retry: RetrySection,

    #[serde(default)]
    pub wifi: WifiSection,

    /// Per-device settings keyed by AIN (spaces allowed).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub devices: BTreeMap<String, DeviceSection>,

    /// Deprecated device blacklist, superseded by `devices.<AIN>.display`.
    #[serde(default, skip_serializing)]
    pub hide: Option<toml::Value>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            url: default_url(),
            username: String::new(),
            password: None,
            password_env: None,
            interval: default_interval(),
            dispatch: DispatchMode::default(),
            concurrent: None,
            max_in_flight: default_max_in_flight(),
            timeout: default_timeout(),
            insecure: false,
            ca_cert: None,
            retry: RetrySection::default(),
            wifi: WifiSection::default(),
            devices: BTreeMap::new(),
            hide: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchMode {
    #[default]
    Serialized,
    Concurrent,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RetrySection {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_retry_delay")]
    pub delay_secs: u64,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            delay_secs: default_retry_delay(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct WifiSection {
    #[serde(default = "default_true")]
    pub display: bool,

    #[serde(default = "default_wifi_name")]
    pub name: String,
}

impl Default for WifiSection {
    fn default() -> Self {
        Self {
            display: true,
            name: default_wifi_name(),
        }
    }
}

/// Settings for one device.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct DeviceSection {
    #[serde(default = "default_true")]
    pub display: bool,

    #[serde(
        default = "default_true",
        rename = "TemperatureSensor",
        alias = "temperature_sensor"
    )]
    pub temperature_sensor: bool,

    #[serde(
        default = "default_true",
        rename = "ContactSensor",
        alias = "contact_sensor"
    )]
    pub contact_sensor: bool,

    #[serde(default)]
    pub invert: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl From<&DeviceSection> for DeviceOverride {
    fn from(section: &DeviceSection) -> Self {
        Self {
            display: section.display,
            temperature_sensor: section.temperature_sensor,
            contact_sensor: section.contact_sensor,
            invert: section.invert,
            name: section.name.clone().filter(|n| !n.trim().is_empty()),
        }
    }
}

fn default_url() -> String {
    DEFAULT_URL.into()
}
fn default_interval() -> u64 {
    60
}
fn default_max_in_flight() -> usize {
    4
}
fn default_timeout() -> u64 {
    30
}
fn default_max_attempts() -> u32 {
    3
}
fn default_retry_delay() -> u64 {
    3
}
fn default_true() -> bool {
    true
}
fn default_wifi_name() -> String {
    WifiOptions::default().name
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "fritzgate", "fritzgate").map_or_else(
        || dirs_fallback().join("config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("fritzgate");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the config from the canonical path + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from `path` + environment. A missing file yields the defaults.
///
/// Nested keys in the environment use a double underscore:
/// `FRITZGATE_RETRY__MAX_ATTEMPTS=5`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let config: Config = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<PathBuf, ConfigError> {
    let path = config_path();
    save_config_to(&path, cfg)?;
    Ok(path)
}

pub fn save_config_to(path: &Path, cfg: &Config) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credentials ─────────────────────────────────────────────────────

fn keyring_account(username: &str) -> &str {
    if username.is_empty() { "default" } else { username }
}

/// Store the box password in the system keyring.
pub fn store_password(username: &str, password: &str) -> Result<(), ConfigError> {
    keyring::Entry::new(KEYRING_SERVICE, keyring_account(username))?.set_password(password)?;
    Ok(())
}

impl Config {
    /// Resolve the password: `password_env`, then keyring, then plaintext.
    pub fn resolve_password(&self) -> Result<SecretString, ConfigError> {
        if let Some(val) = self
            .password_env
            .as_deref()
            .and_then(|name| std::env::var(name).ok())
        {
            return Ok(SecretString::from(val));
        }

        if let Ok(pw) = keyring::Entry::new(KEYRING_SERVICE, keyring_account(&self.username))
            .and_then(|entry| entry.get_password())
        {
            return Ok(SecretString::from(pw));
        }

        if let Some(ref pw) = self.password {
            return Ok(SecretString::from(pw.clone()));
        }

        Err(ConfigError::NoCredentials {
            username: keyring_account(&self.username).to_owned(),
        })
    }

    pub fn resolve_credentials(&self) -> Result<Credentials, ConfigError> {
        Ok(Credentials {
            username: self.username.clone(),
            password: self.resolve_password()?,
        })
    }

    // ── Translation ─────────────────────────────────────────────────

    /// Parse `url`, trimming one trailing slash.
    pub fn parse_url(&self) -> Result<Url, ConfigError> {
        let raw = self.url.trim();
        let raw = raw.strip_suffix('/').unwrap_or(raw);
        if !(raw.starts_with("http://") || raw.starts_with("https://")) {
            warn!(url = raw, "invalid FRITZ!Box url, forgot http(s)://?");
        }
        Url::parse(raw).map_err(|e| ConfigError::Validation {
            field: "url".into(),
            reason: format!("{raw}: {e}"),
        })
    }

    pub fn dispatch_policy(&self) -> Result<DispatchPolicy, ConfigError> {
        let concurrent = self
            .concurrent
            .unwrap_or(self.dispatch == DispatchMode::Concurrent);
        if !concurrent {
            return Ok(DispatchPolicy::Serialized);
        }
        if self.max_in_flight == 0 {
            return Err(ConfigError::Validation {
                field: "max_in_flight".into(),
                reason: "must be at least 1".into(),
            });
        }
        Ok(DispatchPolicy::Concurrent {
            max_in_flight: self.max_in_flight,
        })
    }

    pub fn tls(&self) -> TlsVerification {
        if self.insecure {
            TlsVerification::DangerAcceptInvalid
        } else if let Some(ref ca_path) = self.ca_cert {
            TlsVerification::CustomCa(ca_path.clone())
        } else {
            TlsVerification::SystemDefaults
        }
    }

    pub fn device_overrides(&self) -> DeviceOverrides {
        DeviceOverrides::new(
            self.devices
                .iter()
                .map(|(ain, section)| (Ain::new(ain), DeviceOverride::from(section)))
                .collect(),
        )
    }

    /// Build a `GatewayConfig`, resolving credentials on the way.
    pub fn to_gateway_config(&self) -> Result<GatewayConfig, ConfigError> {
        if self.hide.is_some() {
            warn!("deprecated `hide` setting is ignored, use `devices` instead");
        }
        if self.interval == 0 {
            return Err(ConfigError::Validation {
                field: "interval".into(),
                reason: "must be at least 1 second".into(),
            });
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Validation {
                field: "retry.max_attempts".into(),
                reason: "must be at least 1".into(),
            });
        }

        let url = self.parse_url()?;
        let dispatch = self.dispatch_policy()?;
        let credentials = self.resolve_credentials()?;

        let mut config = GatewayConfig::new(url, credentials);
        config.poll_interval = Duration::from_secs(self.interval);
        config.dispatch = dispatch;
        config.retry = RetryPolicy {
            max_attempts: self.retry.max_attempts,
            delay: Duration::from_secs(self.retry.delay_secs),
        };
        config.tls = self.tls();
        config.timeout = Duration::from_secs(self.timeout);
        config.devices = self.device_overrides();
        config.wifi = WifiOptions {
            display: self.wifi.display,
            name: self.wifi.name.clone(),
        };
        Ok(config)
    }
}

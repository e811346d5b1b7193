// ── Metrics and cached values ──
//
// A metric is one backend-observable quantity of a device. Each metric
// knows which procedure refreshes it and how to turn the raw JSON answer
// into a `MetricValue`, so the cache never needs per-device code.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use serde_json::{Value, json};
use strum::{Display, EnumString, IntoStaticStr};

use fritzgate_api::Procedure;

use super::ain::Ain;
use crate::error::CoreError;

/// Highest setpoint the box accepts; reported for the "on" (valve open) state.
pub const MAX_TARGET_TEMPERATURE: f64 = 28.0;

// ── MetricValue ─────────────────────────────────────────────────────

/// A cached scalar.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetricValue {
    Bool(bool),
    Number(f64),
    Enum(String),
    Text(String),
}

impl MetricValue {
    pub fn enum_of(variant: impl Into<&'static str>) -> Self {
        Self::Enum(variant.into().to_owned())
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Enum(s) | Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Parse an `Enum` value into its typed form.
    pub fn parse_enum<T: FromStr>(&self) -> Option<T> {
        match self {
            Self::Enum(s) => s.parse().ok(),
            _ => None,
        }
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::Enum(s) | Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<bool> for MetricValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<f64> for MetricValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

// ── Thermostat modes ────────────────────────────────────────────────

/// Requested heating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, IntoStaticStr, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TargetMode {
    Off,
    Heat,
    Cool,
    Auto,
}

/// What the thermostat is doing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, IntoStaticStr, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum HeatingCoolingState {
    Off,
    Heat,
    Cool,
}

/// Contact sensor reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, IntoStaticStr, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ContactState {
    Detected,
    NotDetected,
}

// ── Call ────────────────────────────────────────────────────────────

/// A procedure plus its positional arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub procedure: Procedure,
    pub args: Vec<Value>,
}

impl Call {
    pub fn new(procedure: Procedure, args: Vec<Value>) -> Self {
        Self { procedure, args }
    }
}

impl fmt::Display for Call {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let args: Vec<String> = self.args.iter().map(Value::to_string).collect();
        write!(f, "{} ({})", self.procedure, args.join(","))
    }
}

// ── Metric ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    On,
    PowerUsage,
    EnergyConsumption,
    CurrentTemperature,
    TargetTemperature,
    TargetMode,
    ComfortTemperature,
    NightTemperature,
    BatteryLevel,
    Humidity,
    AlertState,
    /// Unix seconds of the last press of the button at this index.
    LastPressed(u8),
    GuestWifi,
    OsVersion,
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::On => "on",
            Self::PowerUsage => "power_usage",
            Self::EnergyConsumption => "energy_consumption",
            Self::CurrentTemperature => "current_temperature",
            Self::TargetTemperature => "target_temperature",
            Self::TargetMode => "target_mode",
            Self::ComfortTemperature => "comfort_temperature",
            Self::NightTemperature => "night_temperature",
            Self::BatteryLevel => "battery_level",
            Self::Humidity => "humidity",
            Self::AlertState => "alert_state",
            Self::LastPressed(index) => return write!(f, "last_pressed[{index}]"),
            Self::GuestWifi => "guest_wifi",
            Self::OsVersion => "os_version",
        };
        f.write_str(name)
    }
}

impl Metric {
    /// The call that fetches this metric for `device`.
    pub fn read_call(self, device: &Ain) -> Call {
        let ain = || vec![json!(device.as_str())];
        let filtered = || vec![json!({ "identifier": device.as_str() })];
        match self {
            Self::On => Call::new(Procedure::GetSwitchState, ain()),
            Self::PowerUsage => Call::new(Procedure::GetSwitchPower, ain()),
            Self::EnergyConsumption => Call::new(Procedure::GetSwitchEnergy, ain()),
            Self::CurrentTemperature => Call::new(Procedure::GetTemperature, ain()),
            Self::TargetTemperature | Self::TargetMode => {
                Call::new(Procedure::GetTempTarget, ain())
            }
            Self::ComfortTemperature => Call::new(Procedure::GetTempComfort, ain()),
            Self::NightTemperature => Call::new(Procedure::GetTempNight, ain()),
            Self::BatteryLevel => Call::new(Procedure::GetBatteryCharge, ain()),
            Self::Humidity | Self::AlertState | Self::LastPressed(_) => {
                Call::new(Procedure::GetDeviceListFiltered, filtered())
            }
            Self::GuestWifi => Call::new(Procedure::GetGuestWlan, Vec::new()),
            Self::OsVersion => Call::new(Procedure::GetOsVersion, Vec::new()),
        }
    }

    /// The call that pushes `value` to the box, for metrics that map
    /// directly onto a setter. Thermostat modes are composed by the
    /// accessory instead.
    pub fn write_call(self, device: &Ain, value: &MetricValue) -> Option<Call> {
        match (self, value) {
            (Self::On, MetricValue::Bool(on)) => Some(Call::new(
                if *on {
                    Procedure::SetSwitchOn
                } else {
                    Procedure::SetSwitchOff
                },
                vec![json!(device.as_str())],
            )),
            (Self::TargetTemperature, MetricValue::Number(t)) => Some(Call::new(
                Procedure::SetTempTarget,
                vec![json!(device.as_str()), json!(t)],
            )),
            (Self::GuestWifi, MetricValue::Bool(on)) => {
                Some(Call::new(Procedure::SetGuestWlan, vec![json!(on)]))
            }
            _ => None,
        }
    }

    /// Turn a raw procedure result into a cache value.
    ///
    /// `previous` is the value currently cached; some answers only make
    /// sense relative to it (`getTempTarget` saying "off" leaves the
    /// setpoint where it was).
    pub fn decode(self, raw: &Value, previous: &MetricValue) -> Result<MetricValue, CoreError> {
        let invalid = || CoreError::InvalidValue {
            message: format!("unexpected {self} value {raw}"),
        };

        match self {
            Self::On | Self::GuestWifi => raw.as_bool().map(MetricValue::Bool).ok_or_else(invalid),
            Self::PowerUsage | Self::CurrentTemperature => {
                raw.as_f64().map(MetricValue::Number).ok_or_else(invalid)
            }
            // Wh on the wire, kWh in the cache
            Self::EnergyConsumption => raw
                .as_f64()
                .map(|wh| MetricValue::Number(wh / 1000.0))
                .ok_or_else(invalid),
            Self::TargetTemperature | Self::ComfortTemperature | Self::NightTemperature => {
                match raw {
                    Value::String(s) if s == "off" => Ok(previous.clone()),
                    Value::String(s) if s == "on" => {
                        Ok(MetricValue::Number(MAX_TARGET_TEMPERATURE))
                    }
                    _ => raw.as_f64().map(MetricValue::Number).ok_or_else(invalid),
                }
            }
            Self::TargetMode => {
                if raw.as_str() == Some("off") {
                    return Ok(MetricValue::enum_of(TargetMode::Off));
                }
                if raw.as_f64().is_none() && raw.as_str() != Some("on") {
                    return Err(invalid());
                }
                // a numeric setpoint only says "not off"
                match previous.parse_enum::<TargetMode>() {
                    Some(TargetMode::Off) | None => Ok(MetricValue::enum_of(TargetMode::Auto)),
                    Some(_) => Ok(previous.clone()),
                }
            }
            Self::BatteryLevel => match raw {
                Value::Null => Ok(previous.clone()),
                _ => raw.as_f64().map(MetricValue::Number).ok_or_else(invalid),
            },
            Self::Humidity => first_device(raw)
                .and_then(|d| d.get("humidity"))
                .and_then(Value::as_f64)
                .map(MetricValue::Number)
                .ok_or_else(invalid),
            Self::AlertState => first_device(raw)
                .and_then(|d| d.pointer("/alert/state"))
                .and_then(Value::as_bool)
                .map(MetricValue::Bool)
                .ok_or_else(invalid),
            Self::LastPressed(index) => {
                let button = first_device(raw)
                    .and_then(|d| d.get("buttons"))
                    .and_then(|b| b.get(usize::from(index)))
                    .ok_or_else(invalid)?;
                Ok(button
                    .get("last_pressed")
                    .and_then(Value::as_f64)
                    .map_or_else(|| previous.clone(), MetricValue::Number))
            }
            Self::OsVersion => raw
                .as_str()
                .map(|s| MetricValue::Text(s.to_owned()))
                .ok_or_else(invalid),
        }
    }
}

fn first_device(raw: &Value) -> Option<&Value> {
    raw.as_array().and_then(|devices| devices.first())
}

// ── CacheKey ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    pub device: Ain,
    pub metric: Metric,
}

impl CacheKey {
    pub fn new(device: Ain, metric: Metric) -> Self {
        Self { device, metric }
    }

    pub fn read_call(&self) -> Call {
        self.metric.read_call(&self.device)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.device, self.metric)
    }
}

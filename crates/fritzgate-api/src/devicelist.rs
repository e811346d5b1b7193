// Device list models
//
// `getdevicelistinfos` returns one XML document describing every device
// and group. The raw `*Xml` structs mirror that document (leaf values are
// kept as strings because the box sends empty elements for unknown state);
// `DeviceInfo` is the cleaned-up, JSON-serializable view callers consume.

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Raw `hkr` temperature encoding for "valve closed".
const HKR_OFF: u16 = 253;
/// Raw `hkr` temperature encoding for "valve fully open".
const HKR_ON: u16 = 254;

// ── Thermostat setpoints ─────────────────────────────────────────────

/// A thermostat setpoint: a temperature or one of the two special states.
///
/// Serializes to JSON as `"off"`, `"on"`, or a number in °C.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(into = "serde_json::Value", try_from = "serde_json::Value")]
pub enum TempSetting {
    Off,
    On,
    Celsius(f64),
}

impl TempSetting {
    /// Decode the box's half-degree encoding (`16..=56`, `253`, `254`).
    pub fn from_raw(raw: u16) -> Self {
        match raw {
            HKR_OFF => Self::Off,
            HKR_ON => Self::On,
            n => Self::Celsius(f64::from(n) / 2.0),
        }
    }

    /// Encode for `sethkrtsoll`: 8..=28 °C in 0.5 steps, clamped.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::as_conversions
    )]
    pub fn to_raw(self) -> u16 {
        match self {
            Self::Off => HKR_OFF,
            Self::On => HKR_ON,
            // always within 16..=56 after the clamp
            Self::Celsius(c) => (c.clamp(8.0, 28.0) * 2.0).round() as u16,
        }
    }
}

impl From<TempSetting> for serde_json::Value {
    fn from(value: TempSetting) -> Self {
        match value {
            TempSetting::Off => Self::from("off"),
            TempSetting::On => Self::from("on"),
            TempSetting::Celsius(c) => Self::from(c),
        }
    }
}

impl TryFrom<serde_json::Value> for TempSetting {
    type Error = Error;

    fn try_from(value: serde_json::Value) -> Result<Self, Self::Error> {
        match &value {
            serde_json::Value::String(s) if s == "off" => Ok(Self::Off),
            serde_json::Value::String(s) if s == "on" => Ok(Self::On),
            serde_json::Value::String(s) => s
                .parse::<f64>()
                .map(Self::Celsius)
                .map_err(|_| Error::InvalidArgument(format!("invalid temperature {s:?}"))),
            serde_json::Value::Number(n) => n
                .as_f64()
                .map(Self::Celsius)
                .ok_or_else(|| Error::InvalidArgument(format!("invalid temperature {n}"))),
            other => Err(Error::InvalidArgument(format!(
                "invalid temperature {other}"
            ))),
        }
    }
}

// ── Cleaned-up view ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// AIN as the box reports it (may contain a space).
    pub identifier: String,
    pub id: String,
    pub function_bitmask: u32,
    pub name: String,
    pub manufacturer: String,
    pub product_name: String,
    pub fw_version: String,
    pub present: bool,
    pub is_group: bool,
    pub switch: Option<SwitchInfo>,
    pub power_meter: Option<PowerMeterInfo>,
    pub temperature: Option<f64>,
    pub thermostat: Option<ThermostatInfo>,
    pub alert: Option<AlertInfo>,
    pub battery: Option<u8>,
    pub battery_low: bool,
    pub humidity: Option<f64>,
    #[serde(default)]
    pub buttons: Vec<ButtonInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitchInfo {
    pub on: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerMeterInfo {
    /// Watts.
    pub power: f64,
    /// Watt hours since first use.
    pub energy: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThermostatInfo {
    pub current: Option<f64>,
    pub target: Option<TempSetting>,
    pub comfort: Option<TempSetting>,
    pub night: Option<TempSetting>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertInfo {
    /// `true` while the sensor reports an alarm (window open, smoke, ...).
    pub state: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ButtonInfo {
    pub identifier: String,
    pub name: String,
    /// Unix seconds of the last press.
    pub last_pressed: Option<i64>,
}

// ── Raw XML ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct DeviceListXml {
    #[serde(rename = "device", default)]
    devices: Vec<DeviceXml>,
    #[serde(rename = "group", default)]
    groups: Vec<DeviceXml>,
}

#[derive(Debug, Deserialize)]
struct DeviceXml {
    #[serde(rename = "@identifier")]
    identifier: String,
    #[serde(rename = "@id", default)]
    id: String,
    #[serde(rename = "@functionbitmask", default)]
    functionbitmask: u32,
    #[serde(rename = "@fwversion", default)]
    fwversion: String,
    #[serde(rename = "@manufacturer", default)]
    manufacturer: String,
    #[serde(rename = "@productname", default)]
    productname: String,
    #[serde(default)]
    present: Option<String>,
    #[serde(default)]
    name: String,
    #[serde(default)]
    battery: Option<String>,
    #[serde(default)]
    batterylow: Option<String>,
    switch: Option<SwitchXml>,
    powermeter: Option<PowerMeterXml>,
    temperature: Option<TemperatureXml>,
    hkr: Option<HkrXml>,
    alert: Option<AlertXml>,
    humidity: Option<HumidityXml>,
    #[serde(rename = "button", default)]
    buttons: Vec<ButtonXml>,
}

#[derive(Debug, Deserialize)]
struct SwitchXml {
    state: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PowerMeterXml {
    power: Option<String>,
    energy: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TemperatureXml {
    celsius: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HkrXml {
    tist: Option<String>,
    tsoll: Option<String>,
    komfort: Option<String>,
    absenk: Option<String>,
    batterylow: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AlertXml {
    state: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HumidityXml {
    rel_humidity: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ButtonXml {
    #[serde(rename = "@identifier", default)]
    identifier: String,
    #[serde(default)]
    name: String,
    lastpressedtimestamp: Option<String>,
}

// ── Parsing ──────────────────────────────────────────────────────────

/// Parse a `getdevicelistinfos` document. Devices come first, in the order
/// the box lists them, followed by groups.
pub fn parse_device_list(body: &str) -> Result<Vec<DeviceInfo>, Error> {
    let list: DeviceListXml = quick_xml::de::from_str(body).map_err(|e| {
        let preview: String = body.chars().take(200).collect();
        Error::Deserialization {
            message: format!("{e} (body preview: {preview:?})"),
            body: body.to_owned(),
        }
    })?;

    let devices = list.devices.into_iter().map(|d| convert(d, false));
    let groups = list.groups.into_iter().map(|d| convert(d, true));
    Ok(devices.chain(groups).collect())
}

fn convert(raw: DeviceXml, is_group: bool) -> DeviceInfo {
    let thermostat = raw.hkr.as_ref().map(|h| ThermostatInfo {
        current: number(h.tist.as_deref()).map(|v| v / 2.0),
        target: setting(h.tsoll.as_deref()),
        comfort: setting(h.komfort.as_deref()),
        night: setting(h.absenk.as_deref()),
    });

    let battery_low = flag(raw.batterylow.as_deref())
        .or_else(|| raw.hkr.as_ref().and_then(|h| flag(h.batterylow.as_deref())))
        .unwrap_or(false);

    DeviceInfo {
        identifier: raw.identifier,
        id: raw.id,
        function_bitmask: raw.functionbitmask,
        name: raw.name,
        manufacturer: raw.manufacturer,
        product_name: raw.productname,
        fw_version: raw.fwversion,
        present: flag(raw.present.as_deref()).unwrap_or(false),
        is_group,
        switch: raw.switch.map(|s| SwitchInfo {
            on: flag(s.state.as_deref()),
        }),
        power_meter: raw.powermeter.map(|p| PowerMeterInfo {
            power: number(p.power.as_deref()).map_or(0.0, |mw| mw / 1000.0),
            energy: number(p.energy.as_deref()).unwrap_or(0.0),
        }),
        // `celsius` already has the user-configured offset applied
        temperature: raw
            .temperature
            .and_then(|t| number(t.celsius.as_deref()))
            .map(|v| v / 10.0),
        thermostat,
        alert: raw.alert.map(|a| AlertInfo {
            state: flag(a.state.as_deref()),
        }),
        battery: raw
            .battery
            .as_deref()
            .and_then(|b| b.trim().parse::<u8>().ok()),
        battery_low,
        humidity: raw
            .humidity
            .and_then(|h| number(h.rel_humidity.as_deref())),
        buttons: raw
            .buttons
            .into_iter()
            .map(|b| ButtonInfo {
                identifier: b.identifier,
                name: b.name,
                last_pressed: b
                    .lastpressedtimestamp
                    .as_deref()
                    .and_then(|t| t.trim().parse().ok()),
            })
            .collect(),
    }
}

fn number(raw: Option<&str>) -> Option<f64> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| s.parse().ok())
}

fn flag(raw: Option<&str>) -> Option<bool> {
    match raw.map(str::trim) {
        Some("1") => Some(true),
        Some("0") => Some(false),
        _ => None,
    }
}

fn setting(raw: Option<&str>) -> Option<TempSetting> {
    raw.map(str::trim)
        .and_then(|s| s.parse::<u16>().ok())
        .map(TempSetting::from_raw)
}

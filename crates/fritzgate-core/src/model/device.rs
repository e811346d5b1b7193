// ── Device domain types ──

use std::collections::BTreeSet;

use serde::Serialize;
use strum::{Display, EnumString};

use fritzgate_api::DeviceInfo;

use super::ain::Ain;

// Function bitmask bits from the AHA interface description.
const BIT_ALERT: u32 = 1 << 4;
const BIT_BUTTON: u32 = 1 << 5;
const BIT_THERMOSTAT: u32 = 1 << 6;
const BIT_POWER_METER: u32 = 1 << 7;
const BIT_TEMPERATURE: u32 = 1 << 8;
const BIT_OUTLET: u32 = 1 << 9;
const BIT_HUMIDITY: u32 = 1 << 20;

/// What a device can do, as far as accessory planning is concerned.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString, Serialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Outlet,
    PowerMeter,
    Thermostat,
    Temperature,
    Alert,
    Button,
    Humidity,
}

impl Capability {
    /// Decode the box's `functionbitmask`.
    pub fn from_bitmask(mask: u32) -> BTreeSet<Self> {
        [
            (BIT_OUTLET, Self::Outlet),
            (BIT_POWER_METER, Self::PowerMeter),
            (BIT_THERMOSTAT, Self::Thermostat),
            (BIT_TEMPERATURE, Self::Temperature),
            (BIT_ALERT, Self::Alert),
            (BIT_BUTTON, Self::Button),
            (BIT_HUMIDITY, Self::Humidity),
        ]
        .into_iter()
        .filter(|(bit, _)| mask & bit != 0)
        .map(|(_, cap)| cap)
        .collect()
    }
}

/// A physical button on a device (FRITZ!DECT 440, 400).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceButton {
    pub index: u8,
    pub name: String,
}

/// Immutable snapshot of one device as discovered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Device {
    pub ain: Ain,
    pub capabilities: BTreeSet<Capability>,
    pub display_name: String,
    pub manufacturer: Option<String>,
    pub product_name: Option<String>,
    pub firmware_version: Option<String>,
    pub present: bool,
    pub is_group: bool,
    pub buttons: Vec<DeviceButton>,
}

impl Device {
    pub fn has(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() { None } else { Some(s) }
}

impl From<DeviceInfo> for Device {
    fn from(info: DeviceInfo) -> Self {
        let ain = Ain::new(&info.identifier);
        let mut capabilities = Capability::from_bitmask(info.function_bitmask);

        // Older firmware leaves bits unset for sections it does report.
        if info.switch.is_some() {
            capabilities.insert(Capability::Outlet);
        }
        if info.thermostat.is_some() {
            capabilities.insert(Capability::Thermostat);
        }
        if info.alert.is_some() {
            capabilities.insert(Capability::Alert);
        }
        if info.humidity.is_some() {
            capabilities.insert(Capability::Humidity);
        }
        if info.buttons.is_empty() {
            capabilities.remove(&Capability::Button);
        } else {
            capabilities.insert(Capability::Button);
        }

        let display_name = non_empty(info.name).unwrap_or_else(|| ain.to_string());

        Self {
            capabilities,
            display_name,
            manufacturer: non_empty(info.manufacturer),
            product_name: non_empty(info.product_name),
            firmware_version: non_empty(info.fw_version),
            present: info.present,
            is_group: info.is_group,
            buttons: info
                .buttons
                .into_iter()
                .zip(0u8..)
                .map(|(b, index)| DeviceButton {
                    index,
                    name: b.name,
                })
                .collect(),
            ain,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(identifier: &str, mask: u32) -> DeviceInfo {
        DeviceInfo {
            identifier: identifier.into(),
            id: "1".into(),
            function_bitmask: mask,
            name: String::new(),
            manufacturer: "AVM".into(),
            product_name: String::new(),
            fw_version: "04.16".into(),
            present: true,
            is_group: false,
            switch: None,
            power_meter: None,
            temperature: None,
            thermostat: None,
            alert: None,
            battery: None,
            battery_low: false,
            humidity: None,
            buttons: Vec::new(),
        }
    }

    #[test]
    fn decodes_bitmask() {
        // FRITZ!DECT 200
        let caps = Capability::from_bitmask(35712);
        assert!(caps.contains(&Capability::Outlet));
        assert!(caps.contains(&Capability::PowerMeter));
        assert!(caps.contains(&Capability::Temperature));
        assert!(!caps.contains(&Capability::Thermostat));

        // Comet DECT
        let caps = Capability::from_bitmask(320);
        assert_eq!(
            caps,
            BTreeSet::from([Capability::Thermostat, Capability::Temperature])
        );
    }

    #[test]
    fn converts_device_info() {
        let device = Device::from(info("08761 0000434", 35712));
        assert_eq!(device.ain.as_str(), "087610000434");
        // empty name falls back to the AIN
        assert_eq!(device.display_name, "087610000434");
        assert_eq!(device.manufacturer.as_deref(), Some("AVM"));
        assert_eq!(device.product_name, None);
        assert!(device.has(Capability::Outlet));
    }

    #[test]
    fn button_capability_follows_button_list() {
        // bit set, but no buttons reported
        let device = Device::from(info("1", BIT_BUTTON));
        assert!(!device.has(Capability::Button));
    }
}

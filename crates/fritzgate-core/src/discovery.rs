// ── Device discovery ──
//
// Lists devices once at startup and decides which accessories to build.
// Planning runs in fixed phases (outlets, thermostats, temperature
// sensors, alarms, buttons); a device claimed by an earlier phase is not
// turned into a second accessory by the temperature or button phases.

use std::collections::BTreeSet;

use fritzgate_api::{DeviceInfo, Procedure};
use serde::Serialize;
use tracing::{error, info};

use crate::accessory::AccessoryKind;
use crate::config::{DeviceOverrides, WifiOptions};
use crate::error::CoreError;
use crate::model::{Ain, Capability, Device};
use crate::queue::RequestQueue;

/// One accessory to build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessoryPlan {
    pub kind: AccessoryKind,
    /// The backing device; `None` for meta accessories.
    pub device: Option<Device>,
    pub name: String,
}

impl AccessoryPlan {
    /// AIN the accessory's cache entries live under.
    pub fn ain(&self) -> Ain {
        self.device
            .as_ref()
            .map_or_else(Ain::fritzbox, |d| d.ain.clone())
    }
}

/// Discovery result. `degraded` carries the listing failure, if any.
#[derive(Debug, Clone)]
pub struct Discovery {
    pub devices: Vec<Device>,
    pub plans: Vec<AccessoryPlan>,
    pub degraded: Option<CoreError>,
}

pub struct DiscoveryService {
    queue: RequestQueue,
    overrides: DeviceOverrides,
    wifi: WifiOptions,
}

impl DiscoveryService {
    pub fn new(queue: RequestQueue, overrides: DeviceOverrides, wifi: WifiOptions) -> Self {
        Self {
            queue,
            overrides,
            wifi,
        }
    }

    /// List devices in the order the box reports them, one per AIN.
    pub async fn discover(&self) -> Result<Vec<Device>, CoreError> {
        let raw = self.queue.invoke(Procedure::GetDeviceList, Vec::new()).await?;
        let infos: Vec<DeviceInfo> =
            serde_json::from_value(raw).map_err(|e| CoreError::Internal(e.to_string()))?;

        let mut seen = BTreeSet::new();
        Ok(infos
            .into_iter()
            .map(Device::from)
            .filter(|d| seen.insert(d.ain.clone()))
            .collect())
    }

    /// Discover and plan. A failed listing leaves only the meta accessories.
    pub async fn run(&self) -> Discovery {
        info!("discovering accessories");
        match self.discover().await {
            Ok(devices) => {
                let plans = self.plan(&devices);
                info!(devices = devices.len(), accessories = plans.len(), "discovery complete");
                Discovery {
                    devices,
                    plans,
                    degraded: None,
                }
            }
            Err(e) => {
                error!(
                    error = %e,
                    "could not get devices from the box; check that it supports the smart home \
                     interface and that the user has sufficient privileges"
                );
                Discovery {
                    devices: Vec::new(),
                    plans: self.plan(&[]),
                    degraded: Some(CoreError::DiscoveryDegraded {
                        message: e.to_string(),
                    }),
                }
            }
        }
    }

    /// Decide which accessories `devices` become.
    pub fn plan(&self, devices: &[Device]) -> Vec<AccessoryPlan> {
        let mut plans = Vec::new();
        let mut claimed: BTreeSet<Ain> = BTreeSet::new();

        if self.wifi.display {
            plans.push(AccessoryPlan {
                kind: AccessoryKind::GuestWifi,
                device: None,
                name: self.wifi.name.clone(),
            });
        }

        // Groups are switched through their members.
        let devices: Vec<&Device> = devices.iter().filter(|d| !d.is_group).collect();

        let mut found = Vec::new();
        for device in devices.iter().filter(|d| d.has(Capability::Outlet)) {
            claimed.insert(device.ain.clone());
            found.push(device.ain.to_string());
            let cfg = self.overrides.get(&device.ain);
            if cfg.display {
                let kind = AccessoryKind::Outlet {
                    temperature_sensor: cfg.temperature_sensor
                        && device.has(Capability::Temperature),
                };
                plans.push(self.device_plan(kind, device));
            }
        }
        info!("outlets found: {}", listing(&found));

        let mut found = Vec::new();
        for device in devices.iter().filter(|d| d.has(Capability::Thermostat)) {
            if !claimed.insert(device.ain.clone()) {
                continue;
            }
            found.push(device.ain.to_string());
            if self.overrides.get(&device.ain).display {
                plans.push(self.device_plan(AccessoryKind::Thermostat, device));
            }
        }
        info!("thermostats found: {}", listing(&found));

        let mut found = Vec::new();
        for device in devices.iter().filter(|d| d.has(Capability::Temperature)) {
            if !claimed.insert(device.ain.clone()) {
                continue;
            }
            found.push(device.ain.to_string());
            let cfg = self.overrides.get(&device.ain);
            if cfg.display && cfg.temperature_sensor {
                let kind = if device.has(Capability::Humidity) {
                    AccessoryKind::ClimateSensor
                } else {
                    AccessoryKind::TemperatureSensor
                };
                plans.push(self.device_plan(kind, device));
            }
        }
        info!("sensors found: {}", listing(&found));

        let mut found = Vec::new();
        for device in devices.iter().filter(|d| d.has(Capability::Alert)) {
            claimed.insert(device.ain.clone());
            found.push(device.ain.to_string());
            let cfg = self.overrides.get(&device.ain);
            if cfg.display && cfg.contact_sensor {
                let kind = AccessoryKind::AlarmSensor { invert: cfg.invert };
                plans.push(self.device_plan(kind, device));
            }
        }
        info!("alarm sensors found: {}", listing(&found));

        let mut found = Vec::new();
        for device in devices.iter().filter(|d| d.has(Capability::Button)) {
            if !claimed.insert(device.ain.clone()) {
                continue;
            }
            found.push(device.ain.to_string());
            let cfg = self.overrides.get(&device.ain);
            if !cfg.display {
                continue;
            }
            let base = cfg.name.as_deref().unwrap_or(&device.display_name);
            for button in &device.buttons {
                let name = if button.name.trim().is_empty() {
                    format!("{base} {}", u16::from(button.index) + 1)
                } else {
                    button.name.clone()
                };
                plans.push(AccessoryPlan {
                    kind: AccessoryKind::Button {
                        index: button.index,
                        name: name.clone(),
                    },
                    device: Some((*device).clone()),
                    name,
                });
            }
        }
        info!("buttons found: {}", listing(&found));

        plans
    }

    fn device_plan(&self, kind: AccessoryKind, device: &Device) -> AccessoryPlan {
        let name = self
            .overrides
            .get(&device.ain)
            .name
            .unwrap_or_else(|| device.display_name.clone());
        AccessoryPlan {
            kind,
            device: Some(device.clone()),
            name,
        }
    }
}

fn listing(found: &[String]) -> String {
    if found.is_empty() {
        "none".into()
    } else {
        found.join(",")
    }
}

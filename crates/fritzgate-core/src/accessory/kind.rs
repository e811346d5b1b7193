// ── Accessory kinds ──
//
// Each kind is a fixed set of features decided at construction. A feature
// owns some cache metrics (with their seed values) and answers for some
// characteristics; kinds differ only in which features they combine and
// how those are grouped into services.

use serde::Serialize;
use strum::{Display, EnumString, IntoStaticStr};

use crate::model::{Metric, MetricValue, TargetMode};

/// Default room temperature before the first refresh.
pub const DEFAULT_TEMPERATURE: f64 = 20.0;
/// Battery percentage below which the low-battery flag is raised.
pub const LOW_BATTERY_THRESHOLD: f64 = 20.0;

// ── Characteristics and services ─────────────────────────────────────

/// A host-visible value on an accessory.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString, IntoStaticStr,
    Serialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Characteristic {
    On,
    OutletInUse,
    PowerUsage,
    EnergyConsumption,
    CurrentTemperature,
    TargetTemperature,
    CurrentHeatingCoolingState,
    TargetHeatingCoolingState,
    TemperatureDisplayUnits,
    BatteryLevel,
    StatusLowBattery,
    ChargingState,
    CurrentRelativeHumidity,
    ContactSensorState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ServiceKind {
    Outlet,
    Switch,
    Thermostat,
    TemperatureSensor,
    HumiditySensor,
    Battery,
    ContactSensor,
}

/// One host service and the characteristics it carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceDescriptor {
    pub kind: ServiceKind,
    pub characteristics: Vec<Characteristic>,
}

impl ServiceDescriptor {
    fn new(kind: ServiceKind, characteristics: &[Characteristic]) -> Self {
        Self {
            kind,
            characteristics: characteristics.to_vec(),
        }
    }
}

/// The AccessoryInformation block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessoryInformation {
    pub name: String,
    pub serial: String,
    pub manufacturer: String,
    pub model: String,
    pub firmware: Option<String>,
}

// ── Features ─────────────────────────────────────────────────────────

/// A reusable slice of accessory behaviour backed by cache metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feature {
    Switch,
    PowerMeter,
    Temperature,
    Thermostat,
    Battery,
    Humidity,
    Contact { invert: bool },
    Button { index: u8 },
    GuestWifi,
}

impl Feature {
    /// Metrics this feature keeps in the cache, with their seed values.
    pub fn metrics(self) -> Vec<(Metric, MetricValue)> {
        match self {
            Self::Switch => vec![(Metric::On, MetricValue::Bool(false))],
            Self::PowerMeter => vec![
                (Metric::PowerUsage, MetricValue::Number(0.0)),
                (Metric::EnergyConsumption, MetricValue::Number(0.0)),
            ],
            Self::Temperature => vec![(
                Metric::CurrentTemperature,
                MetricValue::Number(DEFAULT_TEMPERATURE),
            )],
            Self::Thermostat => vec![
                (
                    Metric::TargetTemperature,
                    MetricValue::Number(DEFAULT_TEMPERATURE),
                ),
                (Metric::TargetMode, MetricValue::enum_of(TargetMode::Auto)),
                (
                    Metric::ComfortTemperature,
                    MetricValue::Number(DEFAULT_TEMPERATURE),
                ),
                (
                    Metric::NightTemperature,
                    MetricValue::Number(DEFAULT_TEMPERATURE),
                ),
            ],
            Self::Battery => vec![(Metric::BatteryLevel, MetricValue::Number(100.0))],
            Self::Humidity => vec![(Metric::Humidity, MetricValue::Number(0.0))],
            // alert state: true = alarm raised
            Self::Contact { .. } => vec![(Metric::AlertState, MetricValue::Bool(false))],
            Self::Button { index } => vec![(Metric::LastPressed(index), MetricValue::Number(0.0))],
            Self::GuestWifi => vec![
                (Metric::GuestWifi, MetricValue::Bool(false)),
                (Metric::OsVersion, MetricValue::Text(String::new())),
            ],
        }
    }

    /// Characteristics this feature answers for.
    pub fn characteristics(self) -> &'static [Characteristic] {
        use Characteristic as C;
        match self {
            Self::Switch | Self::Button { .. } | Self::GuestWifi => &[C::On],
            Self::PowerMeter => &[C::OutletInUse, C::PowerUsage, C::EnergyConsumption],
            Self::Temperature => &[C::CurrentTemperature, C::TemperatureDisplayUnits],
            Self::Thermostat => &[
                C::TargetTemperature,
                C::CurrentHeatingCoolingState,
                C::TargetHeatingCoolingState,
                C::TemperatureDisplayUnits,
            ],
            Self::Battery => &[C::BatteryLevel, C::StatusLowBattery, C::ChargingState],
            Self::Humidity => &[C::CurrentRelativeHumidity],
            Self::Contact { .. } => &[C::ContactSensorState],
        }
    }
}

// ── AccessoryKind ────────────────────────────────────────────────────

/// What an accessory is, decided once from the device's capabilities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AccessoryKind {
    Outlet { temperature_sensor: bool },
    Thermostat,
    TemperatureSensor,
    ClimateSensor,
    AlarmSensor { invert: bool },
    Button { index: u8, name: String },
    GuestWifi,
}

impl AccessoryKind {
    /// Short label used in identifiers and logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Outlet { .. } => "outlet",
            Self::Thermostat => "thermostat",
            Self::TemperatureSensor => "temperature_sensor",
            Self::ClimateSensor => "climate_sensor",
            Self::AlarmSensor { .. } => "alarm_sensor",
            Self::Button { .. } => "button",
            Self::GuestWifi => "guest_wifi",
        }
    }

    pub fn features(&self) -> Vec<Feature> {
        match self {
            Self::Outlet { temperature_sensor } => {
                let mut features = vec![Feature::Switch, Feature::PowerMeter];
                if *temperature_sensor {
                    features.push(Feature::Temperature);
                }
                features
            }
            Self::Thermostat => vec![Feature::Temperature, Feature::Thermostat, Feature::Battery],
            Self::TemperatureSensor => vec![Feature::Temperature],
            Self::ClimateSensor => vec![Feature::Temperature, Feature::Humidity, Feature::Battery],
            Self::AlarmSensor { invert } => vec![Feature::Contact { invert: *invert }],
            Self::Button { index, .. } => vec![Feature::Button { index: *index }],
            Self::GuestWifi => vec![Feature::GuestWifi],
        }
    }

    /// Services exposed to the host, in registration order.
    pub fn services(&self) -> Vec<ServiceDescriptor> {
        use Characteristic as C;
        let temperature = ServiceDescriptor::new(
            ServiceKind::TemperatureSensor,
            &[C::CurrentTemperature, C::TemperatureDisplayUnits],
        );
        let battery = ServiceDescriptor::new(
            ServiceKind::Battery,
            &[C::BatteryLevel, C::StatusLowBattery, C::ChargingState],
        );

        match self {
            Self::Outlet { temperature_sensor } => {
                let mut services = vec![ServiceDescriptor::new(
                    ServiceKind::Outlet,
                    &[C::On, C::OutletInUse, C::PowerUsage, C::EnergyConsumption],
                )];
                if *temperature_sensor {
                    services.push(temperature);
                }
                services
            }
            Self::Thermostat => vec![
                ServiceDescriptor::new(
                    ServiceKind::Thermostat,
                    &[
                        C::CurrentTemperature,
                        C::TargetTemperature,
                        C::CurrentHeatingCoolingState,
                        C::TargetHeatingCoolingState,
                        C::TemperatureDisplayUnits,
                    ],
                ),
                battery,
            ],
            Self::TemperatureSensor => vec![temperature],
            Self::ClimateSensor => vec![
                temperature,
                ServiceDescriptor::new(ServiceKind::HumiditySensor, &[C::CurrentRelativeHumidity]),
                battery,
            ],
            Self::AlarmSensor { .. } => vec![ServiceDescriptor::new(
                ServiceKind::ContactSensor,
                &[C::ContactSensorState],
            )],
            Self::Button { .. } | Self::GuestWifi => {
                vec![ServiceDescriptor::new(ServiceKind::Switch, &[C::On])]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn services_cover_feature_characteristics() {
        let kinds = [
            AccessoryKind::Outlet {
                temperature_sensor: true,
            },
            AccessoryKind::Thermostat,
            AccessoryKind::TemperatureSensor,
            AccessoryKind::ClimateSensor,
            AccessoryKind::AlarmSensor { invert: false },
            AccessoryKind::Button {
                index: 1,
                name: "bottom".into(),
            },
            AccessoryKind::GuestWifi,
        ];

        for kind in kinds {
            let exposed: Vec<Characteristic> = kind
                .services()
                .into_iter()
                .flat_map(|s| s.characteristics)
                .collect();
            for feature in kind.features() {
                for ch in feature.characteristics() {
                    assert!(exposed.contains(ch), "{} hides {ch}", kind.label());
                }
            }
        }
    }

    #[test]
    fn outlet_temperature_is_optional() {
        let plain = AccessoryKind::Outlet {
            temperature_sensor: false,
        };
        assert_eq!(plain.services().len(), 1);
        assert!(!plain.features().contains(&Feature::Temperature));
    }

    #[test]
    fn thermostat_seeds_reference_defaults() {
        let seeds = Feature::Thermostat.metrics();
        assert!(seeds.contains(&(Metric::TargetMode, MetricValue::enum_of(TargetMode::Auto))));
        assert!(seeds.contains(&(
            Metric::TargetTemperature,
            MetricValue::Number(DEFAULT_TEMPERATURE)
        )));
        assert_eq!(
            Feature::Battery.metrics(),
            vec![(Metric::BatteryLevel, MetricValue::Number(100.0))]
        );
    }
}

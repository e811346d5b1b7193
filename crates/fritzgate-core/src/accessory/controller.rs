// ── Accessory controller ──
//
// Binds one accessory's characteristics to cache entries. Reads answer
// from the cache (scheduling refreshes), writes go through the cache's
// optimistic path, and derived characteristics are computed from cached
// values without touching the network.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use serde_json::json;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use fritzgate_api::Procedure;

use super::kind::{
    AccessoryInformation, AccessoryKind, Characteristic, Feature, LOW_BATTERY_THRESHOLD,
    ServiceDescriptor,
};
use crate::discovery::AccessoryPlan;
use crate::error::CoreError;
use crate::model::{
    Ain, CacheKey, Call, ContactState, HeatingCoolingState, Metric, MetricValue, TargetMode,
};
use crate::store::{DeviceStateCache, PendingWrite};

const AVM: &str = "AVM";
const BOX_MODEL: &str = "FRITZ!Box";
const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Callback fired when a characteristic's value changes.
pub type CharacteristicObserver = Arc<dyn Fn(Characteristic, &MetricValue) + Send + Sync>;

/// One host accessory backed by the shared cache. Cheaply cloneable.
#[derive(Clone)]
pub struct AccessoryController {
    inner: Arc<AccessoryInner>,
}

struct AccessoryInner {
    kind: AccessoryKind,
    ain: Ain,
    name: String,
    features: Vec<Feature>,
    defaults: BTreeMap<Metric, MetricValue>,
    information: AccessoryInformation,
    cache: DeviceStateCache,
    poll_interval: Duration,
}

impl AccessoryController {
    /// Build the accessory and seed a cache entry for every metric it owns.
    pub fn new(plan: &AccessoryPlan, cache: DeviceStateCache, poll_interval: Duration) -> Self {
        let ain = plan.ain();
        let features = plan.kind.features();
        let defaults: BTreeMap<Metric, MetricValue> = features
            .iter()
            .flat_map(|f| f.metrics())
            .collect();

        for (metric, default) in &defaults {
            cache.seed(&CacheKey::new(ain.clone(), *metric), default.clone());
        }

        let device = plan.device.as_ref();
        let information = AccessoryInformation {
            name: plan.name.clone(),
            serial: ain.to_string(),
            manufacturer: device
                .and_then(|d| d.manufacturer.clone())
                .unwrap_or_else(|| AVM.into()),
            model: device
                .and_then(|d| d.product_name.clone())
                .unwrap_or_else(|| BOX_MODEL.into()),
            firmware: device.and_then(|d| d.firmware_version.clone()),
        };

        debug!(kind = plan.kind.label(), ain = %ain, name = %plan.name, "accessory created");

        Self {
            inner: Arc::new(AccessoryInner {
                kind: plan.kind.clone(),
                ain,
                name: plan.name.clone(),
                features,
                defaults,
                information,
                cache,
                poll_interval,
            }),
        }
    }

    pub fn kind(&self) -> &AccessoryKind {
        &self.inner.kind
    }

    pub fn ain(&self) -> &Ain {
        &self.inner.ain
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn services(&self) -> Vec<ServiceDescriptor> {
        self.inner.kind.services()
    }

    /// Every characteristic this accessory answers for.
    pub fn characteristics(&self) -> Vec<Characteristic> {
        let mut all: Vec<Characteristic> = self
            .inner
            .features
            .iter()
            .flat_map(|f| f.characteristics().iter().copied())
            .collect();
        all.sort();
        all.dedup();
        all
    }

    /// Stable identifier for host registration.
    pub fn uuid_base(&self) -> String {
        match &self.inner.kind {
            AccessoryKind::Button { index, .. } => {
                format!("{}-{}-{index}", self.inner.kind.label(), self.inner.ain)
            }
            kind => format!("{}-{}", kind.label(), self.inner.ain),
        }
    }

    /// The information block. The box's own firmware comes from the cache.
    pub fn information(&self) -> AccessoryInformation {
        let mut info = self.inner.information.clone();
        if info.firmware.is_none() {
            info.firmware = self
                .peek_metric(Metric::OsVersion)
                .and_then(|v| v.as_str().map(String::from))
                .filter(|v| !v.is_empty());
        }
        info
    }

    // ── Host handlers ────────────────────────────────────────────────

    /// Current value of `characteristic`, straight from the cache.
    ///
    /// Schedules a refresh of every metric the value depends on.
    pub fn get(&self, characteristic: Characteristic) -> Result<MetricValue, CoreError> {
        self.feature_for(characteristic)?;
        Ok(self.compute(characteristic, |metric| {
            self.inner.cache.read(&self.key(metric), self.default(metric))
        }))
    }

    /// Like [`get`](Self::get) but without scheduling refreshes.
    pub fn peek(&self, characteristic: Characteristic) -> Result<MetricValue, CoreError> {
        self.feature_for(characteristic)?;
        Ok(self.compute(characteristic, |metric| {
            self.peek_metric(metric)
                .unwrap_or_else(|| self.default(metric))
        }))
    }

    /// Set `characteristic` to `value`.
    ///
    /// The cache reflects the new value before this returns; the returned
    /// handle resolves once the box has answered.
    pub fn set(
        &self,
        characteristic: Characteristic,
        value: MetricValue,
    ) -> Result<PendingWrite, CoreError> {
        let feature = self.feature_for(characteristic)?;
        let cache = &self.inner.cache;

        match (feature, characteristic) {
            (Feature::Switch, Characteristic::On) => {
                let on = expect_bool(characteristic, &value)?;
                cache.write(&self.key(Metric::On), MetricValue::Bool(on))
            }
            (Feature::GuestWifi, Characteristic::On) => {
                let on = expect_bool(characteristic, &value)?;
                cache.write(&self.key(Metric::GuestWifi), MetricValue::Bool(on))
            }
            (Feature::Thermostat, Characteristic::TargetTemperature) => {
                let target = value.as_number().ok_or_else(|| invalid(characteristic, &value))?;
                let pending = cache.write(
                    &self.key(Metric::TargetTemperature),
                    MetricValue::Number(target),
                )?;
                // a manual setpoint means automatic mode
                cache.write_with(
                    &self.key(Metric::TargetMode),
                    MetricValue::enum_of(TargetMode::Auto),
                    None,
                );
                Ok(pending)
            }
            (Feature::Thermostat, Characteristic::TargetHeatingCoolingState) => {
                let mode = value
                    .as_str()
                    .and_then(|s| s.parse::<TargetMode>().ok())
                    .ok_or_else(|| invalid(characteristic, &value))?;
                Ok(self.set_mode(mode))
            }
            _ => Err(CoreError::ReadOnly {
                characteristic: characteristic.to_string(),
            }),
        }
    }

    /// Schedule a refresh of every metric this accessory owns.
    pub fn refresh_all(&self) {
        for (metric, default) in &self.inner.defaults {
            self.inner
                .cache
                .read(&self.key(*metric), default.clone());
        }
    }

    /// Refresh every metric this accessory owns and wait for the answers.
    pub async fn refresh_now(&self) -> Result<(), CoreError> {
        let refreshes = self
            .inner
            .defaults
            .iter()
            .map(|(metric, default)| {
                let cache = self.inner.cache.clone();
                let key = self.key(*metric);
                let default = default.clone();
                async move { cache.refresh(&key, default).await }
            });
        for result in join_all(refreshes).await {
            result?;
        }
        Ok(())
    }

    /// Call `callback` whenever `characteristic` changes.
    pub fn observe(
        &self,
        characteristic: Characteristic,
        callback: CharacteristicObserver,
    ) -> Result<(), CoreError> {
        let last = Arc::new(Mutex::new(self.peek(characteristic)?));

        for metric in self.sources(characteristic) {
            let accessory = Arc::downgrade(&self.inner);
            let callback = Arc::clone(&callback);
            let last = Arc::clone(&last);
            self.inner.cache.observe(
                &self.key(metric),
                Arc::new(move |_: &CacheKey, _: &MetricValue| {
                    let Some(inner) = accessory.upgrade() else {
                        return;
                    };
                    let Ok(value) = AccessoryController { inner }.peek(characteristic) else {
                        return;
                    };
                    let mut last = last.lock().expect("observer lock poisoned");
                    if *last != value {
                        last.clone_from(&value);
                        drop(last);
                        callback(characteristic, &value);
                    }
                }),
            );
        }
        Ok(())
    }

    /// Spawn the periodic refresh for this accessory.
    ///
    /// The first round runs immediately.
    pub fn spawn_poller(&self, cancel: CancellationToken) -> JoinHandle<()> {
        let accessory = self.clone();
        let period = self.inner.poll_interval.max(MIN_POLL_INTERVAL);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    _ = interval.tick() => accessory.refresh_all(),
                }
            }
        })
    }

    // ── Internals ────────────────────────────────────────────────────

    fn key(&self, metric: Metric) -> CacheKey {
        CacheKey::new(self.inner.ain.clone(), metric)
    }

    fn default(&self, metric: Metric) -> MetricValue {
        self.inner
            .defaults
            .get(&metric)
            .cloned()
            .unwrap_or(MetricValue::Number(0.0))
    }

    fn peek_metric(&self, metric: Metric) -> Option<MetricValue> {
        self.inner.cache.peek(&self.key(metric))
    }

    fn feature_for(&self, characteristic: Characteristic) -> Result<Feature, CoreError> {
        self.inner
            .features
            .iter()
            .copied()
            .find(|f| f.characteristics().contains(&characteristic))
            .ok_or_else(|| CoreError::UnknownCharacteristic {
                characteristic: characteristic.to_string(),
            })
    }

    /// Cache metrics `characteristic` is computed from.
    fn sources(&self, characteristic: Characteristic) -> Vec<Metric> {
        use Characteristic as C;
        match characteristic {
            C::On => match self.feature_for(characteristic) {
                Ok(Feature::Button { index }) => vec![Metric::LastPressed(index)],
                Ok(Feature::GuestWifi) => vec![Metric::GuestWifi],
                _ => vec![Metric::On],
            },
            C::OutletInUse | C::PowerUsage => vec![Metric::PowerUsage],
            C::EnergyConsumption => vec![Metric::EnergyConsumption],
            C::CurrentTemperature => vec![Metric::CurrentTemperature],
            C::TargetTemperature => vec![Metric::TargetTemperature],
            C::TargetHeatingCoolingState => vec![Metric::TargetMode],
            C::CurrentHeatingCoolingState => vec![
                Metric::TargetMode,
                Metric::CurrentTemperature,
                Metric::TargetTemperature,
            ],
            C::BatteryLevel | C::StatusLowBattery => vec![Metric::BatteryLevel],
            C::CurrentRelativeHumidity => vec![Metric::Humidity],
            C::ContactSensorState => vec![Metric::AlertState],
            C::TemperatureDisplayUnits | C::ChargingState => Vec::new(),
        }
    }

    /// Compute `characteristic` from metric values supplied by `value_of`.
    fn compute(
        &self,
        characteristic: Characteristic,
        value_of: impl Fn(Metric) -> MetricValue,
    ) -> MetricValue {
        use Characteristic as C;
        let number = |metric| value_of(metric).as_number().unwrap_or_default();

        match characteristic {
            C::On => match self.feature_for(characteristic) {
                Ok(Feature::Button { index }) => {
                    MetricValue::Bool(self.recently_pressed(number(Metric::LastPressed(index))))
                }
                _ => self.sources(characteristic).first().map_or(
                    MetricValue::Bool(false),
                    |metric| value_of(*metric),
                ),
            },
            C::OutletInUse => MetricValue::Bool(number(Metric::PowerUsage) > 0.0),
            C::CurrentHeatingCoolingState => {
                let mode = value_of(Metric::TargetMode)
                    .parse_enum::<TargetMode>()
                    .unwrap_or(TargetMode::Auto);
                MetricValue::enum_of(heating_cooling_state(
                    mode,
                    number(Metric::CurrentTemperature),
                    number(Metric::TargetTemperature),
                ))
            }
            C::TemperatureDisplayUnits => MetricValue::Enum("celsius".into()),
            C::StatusLowBattery => {
                MetricValue::Bool(number(Metric::BatteryLevel) < LOW_BATTERY_THRESHOLD)
            }
            C::ChargingState => MetricValue::Enum("not_chargeable".into()),
            C::ContactSensorState => {
                let invert = self
                    .inner
                    .features
                    .iter()
                    .any(|f| matches!(f, Feature::Contact { invert: true }));
                let alarm = value_of(Metric::AlertState).as_bool().unwrap_or(false);
                MetricValue::enum_of(if alarm != invert {
                    ContactState::NotDetected
                } else {
                    ContactState::Detected
                })
            }
            C::PowerUsage
            | C::EnergyConsumption
            | C::CurrentTemperature
            | C::TargetTemperature
            | C::TargetHeatingCoolingState
            | C::BatteryLevel
            | C::CurrentRelativeHumidity => self
                .sources(characteristic)
                .first()
                .map_or(MetricValue::Number(0.0), |metric| value_of(*metric)),
        }
    }

    #[allow(clippy::cast_precision_loss, clippy::as_conversions)]
    fn recently_pressed(&self, last_pressed: f64) -> bool {
        if last_pressed <= 0.0 {
            return false;
        }
        let now = Utc::now().timestamp() as f64;
        now - last_pressed < self.inner.poll_interval.as_secs_f64()
    }

    /// Switch thermostat mode. Off closes the valve; the other modes send
    /// the setpoint they stand for.
    fn set_mode(&self, mode: TargetMode) -> PendingWrite {
        let cache = &self.inner.cache;
        let number = |metric| {
            self.peek_metric(metric)
                .and_then(|v| v.as_number())
                .unwrap_or_else(|| self.default(metric).as_number().unwrap_or_default())
        };

        let setpoint = match mode {
            TargetMode::Off => json!("off"),
            TargetMode::Auto => json!(number(Metric::TargetTemperature)),
            TargetMode::Heat | TargetMode::Cool => {
                let source = if mode == TargetMode::Heat {
                    Metric::ComfortTemperature
                } else {
                    Metric::NightTemperature
                };
                let target = number(source);
                cache.write_with(
                    &self.key(Metric::TargetTemperature),
                    MetricValue::Number(target),
                    None,
                );
                json!(target)
            }
        };

        let call = Call::new(
            Procedure::SetTempTarget,
            vec![json!(self.inner.ain.as_str()), setpoint],
        );
        cache.write_with(
            &self.key(Metric::TargetMode),
            MetricValue::enum_of(mode),
            Some(call),
        )
    }
}

/// What the thermostat is doing, derived from cached values only.
pub fn heating_cooling_state(mode: TargetMode, current: f64, target: f64) -> HeatingCoolingState {
    match mode {
        TargetMode::Off => HeatingCoolingState::Off,
        TargetMode::Cool => HeatingCoolingState::Cool,
        TargetMode::Heat | TargetMode::Auto => {
            if current <= target {
                HeatingCoolingState::Heat
            } else {
                HeatingCoolingState::Off
            }
        }
    }
}

fn expect_bool(characteristic: Characteristic, value: &MetricValue) -> Result<bool, CoreError> {
    value.as_bool().ok_or_else(|| invalid(characteristic, value))
}

fn invalid(characteristic: Characteristic, value: &MetricValue) -> CoreError {
    CoreError::InvalidValue {
        message: format!("{value} is not a valid {characteristic}"),
    }
}

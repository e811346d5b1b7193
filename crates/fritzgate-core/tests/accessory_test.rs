#![allow(clippy::unwrap_used)]
// Accessory controllers over the shared cache.

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use fritzgate_api::{ButtonInfo, Procedure};
use fritzgate_core::{
    AccessoryController, AccessoryKind, AccessoryPlan, Ain, CacheKey, Characteristic,
    ContactState, CoreError, HeatingCoolingState, Metric, MetricValue, ServiceKind, TargetMode,
};

use common::{DECT_200, DECT_301, DECT_350, DECT_400, MockBackend, settle};

const POLL: Duration = Duration::from_secs(60);

fn thermostat(backend: MockBackend) -> (Arc<MockBackend>, AccessoryController) {
    let (backend, cache) = common::cache(backend);
    let plan = common::plan(
        AccessoryKind::Thermostat,
        common::device("123456", "Living room", DECT_301),
    );
    (backend, AccessoryController::new(&plan, cache, POLL))
}

fn outlet(backend: MockBackend) -> (Arc<MockBackend>, AccessoryController) {
    let (backend, cache) = common::cache(backend);
    let plan = common::plan(
        AccessoryKind::Outlet {
            temperature_sensor: false,
        },
        common::device("11657 0272633", "Coffee", DECT_200),
    );
    (backend, AccessoryController::new(&plan, cache, POLL))
}

// ── Thermostat ──────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_battery_answers_default_then_refreshed_value() {
    let (backend, thermostat) =
        thermostat(MockBackend::new().answer(Procedure::GetBatteryCharge, json!(15)));

    assert_eq!(
        thermostat.get(Characteristic::BatteryLevel).unwrap(),
        MetricValue::Number(100.0)
    );
    assert_eq!(
        thermostat.get(Characteristic::StatusLowBattery).unwrap(),
        MetricValue::Bool(false)
    );
    settle().await;

    assert_eq!(
        thermostat.peek(Characteristic::BatteryLevel).unwrap(),
        MetricValue::Number(15.0)
    );
    assert_eq!(
        thermostat.peek(Characteristic::StatusLowBattery).unwrap(),
        MetricValue::Bool(true)
    );
    assert_eq!(backend.calls_to(Procedure::GetBatteryCharge).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_thermostat_target_then_off() {
    let (backend, thermostat) = thermostat(MockBackend::new());

    thermostat
        .set(Characteristic::TargetTemperature, MetricValue::Number(21.0))
        .unwrap()
        .confirmed()
        .await
        .unwrap();
    assert_eq!(
        thermostat.peek(Characteristic::TargetHeatingCoolingState).unwrap(),
        MetricValue::enum_of(TargetMode::Auto)
    );

    thermostat
        .set(
            Characteristic::TargetHeatingCoolingState,
            MetricValue::enum_of(TargetMode::Off),
        )
        .unwrap()
        .confirmed()
        .await
        .unwrap();

    let sent: Vec<_> = backend
        .calls_to(Procedure::SetTempTarget)
        .into_iter()
        .map(|c| c.args)
        .collect();
    assert_eq!(
        sent,
        vec![
            vec![json!("123456"), json!(21.0)],
            vec![json!("123456"), json!("off")],
        ]
    );
    assert_eq!(
        thermostat.peek(Characteristic::TargetHeatingCoolingState).unwrap(),
        MetricValue::enum_of(TargetMode::Off)
    );
    assert_eq!(
        thermostat.peek(Characteristic::CurrentHeatingCoolingState).unwrap(),
        MetricValue::enum_of(HeatingCoolingState::Off)
    );
    assert_eq!(
        thermostat.peek(Characteristic::TargetTemperature).unwrap(),
        MetricValue::Number(21.0)
    );
}

#[tokio::test(start_paused = true)]
async fn test_heat_mode_sends_comfort_temperature() {
    let (backend, thermostat) = thermostat(
        MockBackend::new()
            .answer(Procedure::GetTemperature, json!(20.0))
            .answer(Procedure::GetTempTarget, json!(19.0))
            .answer(Procedure::GetTempComfort, json!(22.5))
            .answer(Procedure::GetTempNight, json!(16.0))
            .answer(Procedure::GetBatteryCharge, json!(80)),
    );
    thermostat.refresh_now().await.unwrap();

    thermostat
        .set(
            Characteristic::TargetHeatingCoolingState,
            MetricValue::enum_of(TargetMode::Heat),
        )
        .unwrap()
        .confirmed()
        .await
        .unwrap();

    let sent = backend.calls_to(Procedure::SetTempTarget);
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].args, vec![json!("123456"), json!(22.5)]);
    assert_eq!(
        thermostat.peek(Characteristic::TargetTemperature).unwrap(),
        MetricValue::Number(22.5)
    );
    assert_eq!(
        thermostat.peek(Characteristic::TargetHeatingCoolingState).unwrap(),
        MetricValue::enum_of(TargetMode::Heat)
    );
    assert_eq!(
        thermostat.peek(Characteristic::CurrentHeatingCoolingState).unwrap(),
        MetricValue::enum_of(HeatingCoolingState::Heat)
    );
}

#[tokio::test(start_paused = true)]
async fn test_box_reporting_off_switches_mode_off() {
    let (_backend, thermostat) = thermostat(
        MockBackend::new()
            .answer(Procedure::GetTemperature, json!(18.0))
            .answer(Procedure::GetTempTarget, json!("off"))
            .answer(Procedure::GetTempComfort, json!(21.0))
            .answer(Procedure::GetTempNight, json!(16.0))
            .answer(Procedure::GetBatteryCharge, json!(null)),
    );

    thermostat.refresh_now().await.unwrap();

    assert_eq!(
        thermostat.peek(Characteristic::TargetHeatingCoolingState).unwrap(),
        MetricValue::enum_of(TargetMode::Off)
    );
    // "off" carries no setpoint and a missing battery keeps the old level
    assert_eq!(
        thermostat.peek(Characteristic::TargetTemperature).unwrap(),
        MetricValue::Number(20.0)
    );
    assert_eq!(
        thermostat.peek(Characteristic::BatteryLevel).unwrap(),
        MetricValue::Number(100.0)
    );
}

#[tokio::test(start_paused = true)]
async fn test_invalid_mode_is_rejected_locally() {
    let (backend, thermostat) = thermostat(MockBackend::new());

    let result = thermostat.set(
        Characteristic::TargetHeatingCoolingState,
        MetricValue::Enum("eco".into()),
    );

    assert!(matches!(result, Err(CoreError::InvalidValue { .. })));
    settle().await;
    assert!(backend.started().is_empty());
}

// ── Outlet ──────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_outlet_switch_and_derived_values() {
    let (backend, outlet) = outlet(
        MockBackend::new()
            .answer(Procedure::GetSwitchState, json!(false))
            .answer(Procedure::GetSwitchPower, json!(3.5))
            .answer(Procedure::GetSwitchEnergy, json!(2_500)),
    );

    outlet.refresh_now().await.unwrap();
    assert_eq!(
        outlet.peek(Characteristic::OutletInUse).unwrap(),
        MetricValue::Bool(true)
    );
    assert_eq!(
        outlet.peek(Characteristic::EnergyConsumption).unwrap(),
        MetricValue::Number(2.5)
    );

    outlet
        .set(Characteristic::On, MetricValue::Bool(true))
        .unwrap()
        .confirmed()
        .await
        .unwrap();
    let calls = backend.calls_to(Procedure::SetSwitchOn);
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].args, vec![json!("116570272633")]);
    assert_eq!(outlet.peek(Characteristic::On).unwrap(), MetricValue::Bool(true));
}

#[tokio::test(start_paused = true)]
async fn test_outlet_rejects_unknown_and_read_only_characteristics() {
    let (_backend, outlet) = outlet(MockBackend::new());

    assert!(matches!(
        outlet.set(Characteristic::PowerUsage, MetricValue::Number(1.0)),
        Err(CoreError::ReadOnly { .. })
    ));
    assert!(matches!(
        outlet.get(Characteristic::CurrentRelativeHumidity),
        Err(CoreError::UnknownCharacteristic { .. })
    ));
    assert!(matches!(
        outlet.set(Characteristic::On, MetricValue::Number(1.0)),
        Err(CoreError::InvalidValue { .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn test_outlet_services_and_identity() {
    let (_backend, outlet) = outlet(MockBackend::new());

    let kinds: Vec<ServiceKind> = outlet.services().into_iter().map(|s| s.kind).collect();
    assert_eq!(kinds, vec![ServiceKind::Outlet]);
    assert_eq!(outlet.uuid_base(), "outlet-116570272633");
    assert_eq!(outlet.name(), "Coffee");

    let info = outlet.information();
    assert_eq!(info.serial, "116570272633");
    assert_eq!(info.manufacturer, "AVM");
    assert_eq!(info.firmware.as_deref(), Some("04.25"));
}

#[tokio::test(start_paused = true)]
async fn test_observer_sees_characteristic_changes() {
    let (_backend, outlet) =
        outlet(MockBackend::new().answer(Procedure::GetSwitchState, json!(true)));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    outlet
        .observe(
            Characteristic::On,
            Arc::new(move |ch: Characteristic, v: &MetricValue| {
                sink.lock().unwrap().push((ch, v.clone()));
            }),
        )
        .unwrap();

    assert_eq!(outlet.get(Characteristic::On).unwrap(), MetricValue::Bool(false));
    settle().await;

    let seen = seen.lock().unwrap().clone();
    assert_eq!(seen, vec![(Characteristic::On, MetricValue::Bool(true))]);
}

#[tokio::test(start_paused = true)]
async fn test_poller_refreshes_every_interval() {
    let (backend, outlet) =
        outlet(MockBackend::new().answer(Procedure::GetSwitchState, json!(true)));
    let cancel = CancellationToken::new();
    let poller = outlet.spawn_poller(cancel.clone());

    settle().await;
    assert_eq!(backend.calls_to(Procedure::GetSwitchState).len(), 1);

    tokio::time::sleep(POLL).await;
    assert_eq!(backend.calls_to(Procedure::GetSwitchState).len(), 2);

    cancel.cancel();
    poller.await.unwrap();
    tokio::time::sleep(POLL * 2).await;
    assert_eq!(backend.calls_to(Procedure::GetSwitchState).len(), 2);
}

// ── Sensors ─────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_alarm_contact_state_honours_invert() {
    let (_backend, cache) = common::cache(
        MockBackend::new().answer(
            Procedure::GetDeviceListFiltered,
            json!([{ "identifier": "0", "alert": { "state": true } }]),
        ),
    );
    let plain = AccessoryController::new(
        &common::plan(
            AccessoryKind::AlarmSensor { invert: false },
            common::device("1", "Window", DECT_350),
        ),
        cache.clone(),
        POLL,
    );
    let inverted = AccessoryController::new(
        &common::plan(
            AccessoryKind::AlarmSensor { invert: true },
            common::device("2", "Door", DECT_350),
        ),
        cache,
        POLL,
    );

    plain.refresh_now().await.unwrap();
    inverted.refresh_now().await.unwrap();

    assert_eq!(
        plain.peek(Characteristic::ContactSensorState).unwrap(),
        MetricValue::enum_of(ContactState::NotDetected)
    );
    assert_eq!(
        inverted.peek(Characteristic::ContactSensorState).unwrap(),
        MetricValue::enum_of(ContactState::Detected)
    );
}

#[tokio::test(start_paused = true)]
async fn test_button_is_on_only_after_a_recent_press() {
    let now = chrono::Utc::now().timestamp();
    let (_backend, cache) = common::cache(MockBackend::new().answer(
        Procedure::GetDeviceListFiltered,
        json!([{ "buttons": [
            { "last_pressed": now - 5 },
            { "last_pressed": now - 3600 },
        ] }]),
    ));
    let mut info = common::device("09995 0000001", "Remote", DECT_400);
    info.buttons = ["top", "bottom"]
        .iter()
        .enumerate()
        .map(|(i, name)| ButtonInfo {
            identifier: format!("09995 0000001-{i}"),
            name: (*name).to_owned(),
            last_pressed: None,
        })
        .collect();
    let device = fritzgate_core::Device::from(info);
    let button = |index: u8| {
        let plan = AccessoryPlan {
            kind: AccessoryKind::Button {
                index,
                name: device.buttons[usize::from(index)].name.clone(),
            },
            device: Some(device.clone()),
            name: device.buttons[usize::from(index)].name.clone(),
        };
        AccessoryController::new(&plan, cache.clone(), POLL)
    };
    let top = button(0);
    let bottom = button(1);

    assert_eq!(top.get(Characteristic::On).unwrap(), MetricValue::Bool(false));
    bottom.get(Characteristic::On).unwrap();
    settle().await;

    assert_eq!(top.peek(Characteristic::On).unwrap(), MetricValue::Bool(true));
    assert_eq!(bottom.peek(Characteristic::On).unwrap(), MetricValue::Bool(false));
    assert_eq!(top.uuid_base(), "button-099950000001-0");
    assert_eq!(bottom.uuid_base(), "button-099950000001-1");
}

// ── Guest Wi-Fi ─────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_guest_wifi_toggles_and_reports_box_firmware() {
    let (backend, cache) = common::cache(
        MockBackend::new()
            .answer(Procedure::GetGuestWlan, json!(false))
            .answer(Procedure::GetOsVersion, json!("7.57")),
    );
    let plan = AccessoryPlan {
        kind: AccessoryKind::GuestWifi,
        device: None,
        name: "Guest WLAN".into(),
    };
    let wifi = AccessoryController::new(&plan, cache.clone(), POLL);
    assert_eq!(wifi.ain(), &Ain::fritzbox());

    wifi.refresh_now().await.unwrap();
    let info = wifi.information();
    assert_eq!(info.model, "FRITZ!Box");
    assert_eq!(info.firmware.as_deref(), Some("7.57"));

    wifi.set(Characteristic::On, MetricValue::Bool(true))
        .unwrap()
        .confirmed()
        .await
        .unwrap();
    let calls = backend.calls_to(Procedure::SetGuestWlan);
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].args, vec![json!(true)]);
    assert_eq!(
        cache.peek(&CacheKey::new(Ain::fritzbox(), Metric::GuestWifi)),
        Some(MetricValue::Bool(true))
    );
}

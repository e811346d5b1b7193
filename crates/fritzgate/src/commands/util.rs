//! Shared helpers for command handlers.

use std::collections::BTreeMap;
use std::future::Future;

use serde::Serialize;
use tabled::Tabled;
use tracing::warn;

use fritzgate_core::{
    AccessoryController, AccessoryKind, Ain, Characteristic, Gateway, GatewayConfig, MetricValue,
};

use crate::cli::OutputFormat;
use crate::error::CliError;
use crate::output;

/// Run `f` against a started gateway without pollers, then log out.
pub async fn with_gateway<F, Fut, T>(config: GatewayConfig, f: F) -> Result<T, CliError>
where
    F: FnOnce(Gateway) -> Fut,
    Fut: Future<Output = Result<T, CliError>>,
{
    Gateway::oneshot(config, |gateway| async move { Ok(f(gateway).await) }).await?
}

/// The accessory of `ain` whose kind satisfies `wanted`.
pub async fn find_accessory(
    gateway: &Gateway,
    ain: &Ain,
    resource_type: &str,
    wanted: impl Fn(&AccessoryKind) -> bool,
) -> Result<AccessoryController, CliError> {
    gateway
        .accessories_for(ain)
        .await
        .into_iter()
        .find(|accessory| wanted(accessory.kind()))
        .ok_or_else(|| CliError::NotFound {
            resource_type: resource_type.into(),
            identifier: ain.to_string(),
            list_command: "devices".into(),
        })
}

/// Fetch fresh values, keeping the cached ones if the box does not answer.
pub async fn refresh(accessory: &AccessoryController) {
    if let Err(e) = accessory.refresh_now().await {
        warn!(accessory = %accessory.uuid_base(), error = %e, "refresh failed, showing cached values");
    }
}

// ── Accessory status ────────────────────────────────────────────────

/// An accessory with its current characteristic values.
#[derive(Debug, Serialize)]
pub struct AccessoryStatus {
    pub uuid: String,
    pub kind: &'static str,
    pub ain: String,
    pub name: String,
    pub values: BTreeMap<Characteristic, MetricValue>,
}

impl AccessoryStatus {
    pub fn of(accessory: &AccessoryController) -> Self {
        Self {
            uuid: accessory.uuid_base(),
            kind: accessory.kind().label(),
            ain: accessory.ain().to_string(),
            name: accessory.name().to_owned(),
            values: accessory
                .characteristics()
                .into_iter()
                .filter_map(|c| accessory.peek(c).ok().map(|v| (c, v)))
                .collect(),
        }
    }
}

#[derive(Tabled)]
struct ValueRow {
    #[tabled(rename = "Accessory")]
    name: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Characteristic")]
    characteristic: String,
    #[tabled(rename = "Value")]
    value: String,
}

fn value_rows(statuses: &[AccessoryStatus]) -> Vec<ValueRow> {
    statuses
        .iter()
        .flat_map(|status| {
            status.values.iter().map(|(characteristic, value)| ValueRow {
                name: status.name.clone(),
                kind: status.kind.to_owned(),
                characteristic: characteristic.to_string(),
                value: value.to_string(),
            })
        })
        .collect()
}

/// One row per characteristic; JSON keeps accessories nested.
pub fn render_statuses(
    format: OutputFormat,
    statuses: &[AccessoryStatus],
) -> Result<String, CliError> {
    Ok(match format {
        OutputFormat::Table => output::render_table(&value_rows(statuses)),
        OutputFormat::Json => serde_json::to_string_pretty(statuses)?,
        OutputFormat::Plain => statuses
            .iter()
            .flat_map(|status| {
                status
                    .values
                    .iter()
                    .map(|(c, v)| format!("{}\t{c}\t{v}", status.uuid))
            })
            .collect::<Vec<_>>()
            .join("\n"),
    })
}

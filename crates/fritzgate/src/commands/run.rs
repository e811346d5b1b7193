//! Bridge mode: keep every accessory polled and report changes until
//! Ctrl-C.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use fritzgate_core::{AccessoryController, Characteristic, Gateway, MetricValue};

use crate::cli::{GlobalOpts, OutputFormat};
use crate::error::CliError;
use crate::{config, output};

/// One characteristic change, as printed.
#[derive(Debug, Serialize)]
struct Change<'a> {
    accessory: &'a str,
    name: &'a str,
    characteristic: Characteristic,
    value: &'a MetricValue,
}

fn render_change(format: OutputFormat, change: &Change<'_>) -> String {
    match format {
        OutputFormat::Table => format!(
            "{} ({}): {} = {}",
            change.name, change.accessory, change.characteristic, change.value
        ),
        OutputFormat::Json => serde_json::to_string(change).unwrap_or_else(|e| {
            warn!(error = %e, "could not encode change");
            String::new()
        }),
        OutputFormat::Plain => format!(
            "{}\t{}\t{}",
            change.accessory, change.characteristic, change.value
        ),
    }
}

fn report_changes(accessory: &AccessoryController, format: OutputFormat, quiet: bool) {
    let uuid: Arc<str> = accessory.uuid_base().into();
    let name: Arc<str> = accessory.name().into();

    for characteristic in accessory.characteristics() {
        let (change_uuid, change_name) = (Arc::clone(&uuid), Arc::clone(&name));
        let observed = accessory.observe(
            characteristic,
            Arc::new(move |characteristic: Characteristic, value: &MetricValue| {
                let change = Change {
                    accessory: &change_uuid,
                    name: &change_name,
                    characteristic,
                    value,
                };
                output::print_output(&render_change(format, &change), quiet);
            }),
        );
        if let Err(e) = observed {
            warn!(accessory = %uuid, %characteristic, error = %e, "cannot observe characteristic");
        }
    }
}

pub async fn handle(global: &GlobalOpts) -> Result<(), CliError> {
    let gateway = Gateway::connect(config::gateway_config(global)?)?;

    if let Err(e) = gateway.start().await {
        gateway.shutdown().await;
        return Err(e.into());
    }
    if let Some(err) = gateway.degraded().await {
        warn!(error = %err, "running with the guest WLAN accessory only");
    }

    let accessories = gateway.accessories().await;
    for accessory in &accessories {
        report_changes(accessory, global.output, global.quiet);
    }
    info!(
        accessories = accessories.len(),
        interval = ?gateway.config().poll_interval,
        "bridge running, Ctrl-C to stop"
    );

    let stopped = tokio::signal::ctrl_c().await;
    info!("shutting down");
    gateway.shutdown().await;
    stopped?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_changes_per_format() {
        let value = MetricValue::Number(21.5);
        let change = Change {
            accessory: "thermostat-119590171328",
            name: "Bath",
            characteristic: Characteristic::CurrentTemperature,
            value: &value,
        };

        assert_eq!(
            render_change(OutputFormat::Table, &change),
            "Bath (thermostat-119590171328): current_temperature = 21.5"
        );
        assert_eq!(
            render_change(OutputFormat::Plain, &change),
            "thermostat-119590171328\tcurrent_temperature\t21.5"
        );
        assert_eq!(
            render_change(OutputFormat::Json, &change),
            r#"{"accessory":"thermostat-119590171328","name":"Bath","characteristic":"current_temperature","value":21.5}"#
        );
    }
}

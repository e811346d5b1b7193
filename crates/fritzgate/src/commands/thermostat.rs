//! Thermostat setpoint and mode.

use fritzgate_core::{AccessoryKind, Ain, Characteristic, MetricValue, TargetMode};

use crate::cli::{GlobalOpts, ThermostatArgs};
use crate::error::CliError;
use crate::{config, output};

use super::util::{self, AccessoryStatus};

const MIN_TARGET: f64 = 8.0;
const MAX_TARGET: f64 = 28.0;

fn validate(args: &ThermostatArgs) -> Result<(), CliError> {
    if args.target.is_none() && args.mode.is_none() {
        return Err(CliError::Validation {
            field: "thermostat".into(),
            reason: "give --target, --mode or both".into(),
        });
    }
    if let Some(target) = args.target {
        if !(MIN_TARGET..=MAX_TARGET).contains(&target) {
            return Err(CliError::Validation {
                field: "target".into(),
                reason: format!("{target} °C is outside {MIN_TARGET}..{MAX_TARGET}"),
            });
        }
    }
    Ok(())
}

pub async fn handle(args: ThermostatArgs, global: &GlobalOpts) -> Result<(), CliError> {
    validate(&args)?;
    let gateway_config = config::gateway_config(global)?;
    let ain = Ain::new(&args.ain);
    let (target, mode) = (args.target, args.mode.map(TargetMode::from));

    let status = util::with_gateway(gateway_config, |g| async move {
        let thermostat = util::find_accessory(&g, &ain, "thermostat", |kind| {
            *kind == AccessoryKind::Thermostat
        })
        .await?;
        // heat and cool resolve to the comfort and night temperatures
        thermostat.refresh_now().await?;

        if let Some(target) = target {
            thermostat
                .set(Characteristic::TargetTemperature, MetricValue::Number(target))?
                .confirmed()
                .await?;
        }
        if let Some(mode) = mode {
            thermostat
                .set(
                    Characteristic::TargetHeatingCoolingState,
                    MetricValue::enum_of(mode),
                )?
                .confirmed()
                .await?;
        }
        Ok(AccessoryStatus::of(&thermostat))
    })
    .await?;

    let out = util::render_statuses(global.output, std::slice::from_ref(&status))?;
    output::print_output(&out, global.quiet);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::ModeArg;

    fn args(target: Option<f64>, mode: Option<ModeArg>) -> ThermostatArgs {
        ThermostatArgs {
            ain: "11959 0171328".into(),
            target,
            mode,
        }
    }

    #[test]
    fn needs_target_or_mode() {
        assert!(matches!(
            validate(&args(None, None)),
            Err(CliError::Validation { .. })
        ));
        assert!(validate(&args(None, Some(ModeArg::Heat))).is_ok());
        assert!(validate(&args(Some(21.5), None)).is_ok());
    }

    #[test]
    fn target_outside_box_range_is_rejected() {
        assert!(validate(&args(Some(7.5), None)).is_err());
        assert!(validate(&args(Some(28.5), None)).is_err());
        assert!(validate(&args(Some(28.0), None)).is_ok());
    }
}

//! Guest WLAN state.

use tracing::info;

use fritzgate_core::{AccessoryKind, Ain, Characteristic, MetricValue};

use crate::cli::{GlobalOpts, GuestWifiArgs};
use crate::error::CliError;
use crate::{config, output};

use super::util::{self, AccessoryStatus};

pub async fn handle(args: GuestWifiArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let mut gateway_config = config::gateway_config(global)?;
    // hidden from hosts is not hidden from the command line
    gateway_config.wifi.display = true;

    let status = util::with_gateway(gateway_config, |g| async move {
        let wifi = util::find_accessory(&g, &Ain::fritzbox(), "guest WLAN", |kind| {
            *kind == AccessoryKind::GuestWifi
        })
        .await?;

        if let Some(state) = args.state {
            wifi.set(Characteristic::On, MetricValue::Bool(state.is_on()))?
                .confirmed()
                .await?;
            info!(on = state.is_on(), "guest WLAN switched");
        }
        util::refresh(&wifi).await;
        Ok(AccessoryStatus::of(&wifi))
    })
    .await?;

    let out = util::render_statuses(global.output, std::slice::from_ref(&status))?;
    output::print_output(&out, global.quiet);
    Ok(())
}

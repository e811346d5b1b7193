//! Outlet switching.

use tracing::info;

use fritzgate_core::{AccessoryKind, Ain, Characteristic, MetricValue};

use crate::cli::{GlobalOpts, SwitchArgs};
use crate::error::CliError;
use crate::{config, output};

use super::util::{self, AccessoryStatus};

pub async fn handle(args: SwitchArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let gateway_config = config::gateway_config(global)?;
    let ain = Ain::new(&args.ain);
    let on = args.state.is_on();

    let status = util::with_gateway(gateway_config, |g| async move {
        let outlet = util::find_accessory(&g, &ain, "outlet", |kind| {
            matches!(kind, AccessoryKind::Outlet { .. })
        })
        .await?;

        outlet
            .set(Characteristic::On, MetricValue::Bool(on))?
            .confirmed()
            .await?;
        info!(ain = %ain, on, "outlet switched");

        util::refresh(&outlet).await;
        Ok(AccessoryStatus::of(&outlet))
    })
    .await?;

    let out = util::render_statuses(global.output, std::slice::from_ref(&status))?;
    output::print_output(&out, global.quiet);
    Ok(())
}

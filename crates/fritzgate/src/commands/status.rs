//! Accessory status after one refresh round.

use tracing::warn;

use fritzgate_core::Ain;

use crate::cli::{GlobalOpts, StatusArgs};
use crate::error::CliError;
use crate::{config, output};

use super::util::{self, AccessoryStatus};

pub async fn handle(args: StatusArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let gateway_config = config::gateway_config(global)?;
    let filter = args.ain.map(Ain::new);

    let statuses = util::with_gateway(gateway_config, |g| async move {
        if let Some(err) = g.degraded().await {
            warn!(error = %err, "device list unavailable");
        }
        let accessories = match &filter {
            Some(ain) => g.accessories_for(ain).await,
            None => g.accessories().await,
        };
        if let (Some(ain), true) = (&filter, accessories.is_empty()) {
            return Err(CliError::NotFound {
                resource_type: "device".into(),
                identifier: ain.to_string(),
                list_command: "devices".into(),
            });
        }

        for accessory in &accessories {
            util::refresh(accessory).await;
        }
        Ok(accessories.iter().map(AccessoryStatus::of).collect::<Vec<_>>())
    })
    .await?;

    let out = util::render_statuses(global.output, &statuses)?;
    output::print_output(&out, global.quiet);
    Ok(())
}

//! Device listing.

use tabled::Tabled;

use fritzgate_core::Device;

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::{config, output};

use super::util;

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "AIN")]
    ain: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Product")]
    product: String,
    #[tabled(rename = "Capabilities")]
    capabilities: String,
    #[tabled(rename = "Present")]
    present: String,
    #[tabled(rename = "Firmware")]
    firmware: String,
}

fn device_row(d: &Device) -> DeviceRow {
    let mut capabilities: Vec<String> = d.capabilities.iter().map(ToString::to_string).collect();
    if d.is_group {
        capabilities.insert(0, "group".into());
    }
    DeviceRow {
        ain: d.ain.to_string(),
        name: d.display_name.clone(),
        product: d.product_name.clone().unwrap_or_default(),
        capabilities: capabilities.join(", "),
        present: if d.present { "yes" } else { "no" }.into(),
        firmware: d.firmware_version.clone().unwrap_or_else(|| "-".into()),
    }
}

pub async fn handle(global: &GlobalOpts) -> Result<(), CliError> {
    let gateway_config = config::gateway_config(global)?;

    let (devices, degraded) = util::with_gateway(gateway_config, |g| async move {
        Ok((g.devices().await, g.degraded().await))
    })
    .await?;
    if let Some(err) = degraded {
        return Err(err.into());
    }

    let out = output::render_list(global.output, &devices, device_row, |d| d.ain.to_string())?;
    output::print_output(&out, global.quiet);
    Ok(())
}

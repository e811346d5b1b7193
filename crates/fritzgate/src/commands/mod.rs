//! Command handlers.
//!
//! Everything except `run` and `config` logs in, does one thing without
//! pollers and logs out again.

pub mod config_cmd;
mod devices;
mod guest_wifi;
mod run;
mod status;
mod switch;
mod thermostat;
mod util;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

pub async fn dispatch(cmd: Command, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Run => run::handle(global).await,
        Command::Devices => devices::handle(global).await,
        Command::Status(args) => status::handle(args, global).await,
        Command::Switch(args) => switch::handle(args, global).await,
        Command::Thermostat(args) => thermostat::handle(args, global).await,
        Command::GuestWifi(args) => guest_wifi::handle(args, global).await,
        Command::Config(args) => config_cmd::handle(args, global),
    }
}

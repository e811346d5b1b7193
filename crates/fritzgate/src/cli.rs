//! Clap derive structures for the `fritzgate` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use fritzgate_core::TargetMode;

// ── Top-Level CLI ────────────────────────────────────────────────────

/// fritzgate -- FRITZ!Box smart-home gateway
#[derive(Debug, Parser)]
#[command(
    name = "fritzgate",
    version,
    about = "Bridge FRITZ!Box smart-home devices to home-automation accessories",
    long_about = "Talks to the AHA smart-home interface of a FRITZ!Box.\n\n\
        `run` keeps every accessory polled and prints characteristic changes;\n\
        the other commands log in, do one thing and log out again.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Config file (defaults to the platform config directory)
    #[arg(long, env = "FRITZGATE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Box URL (overrides config)
    #[arg(long, env = "FRITZGATE_URL", global = true)]
    pub url: Option<String>,

    /// Box user name (overrides config)
    #[arg(long, short = 'u', env = "FRITZGATE_USERNAME", global = true)]
    pub username: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "FRITZGATE_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', env = "FRITZGATE_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds (overrides config)
    #[arg(long, env = "FRITZGATE_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Plain text, one value per line (scripting)
    Plain,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the gateway: poll every accessory and print changes until Ctrl-C
    Run,

    /// List the devices the box reports
    #[command(alias = "dev")]
    Devices,

    /// Show accessories with freshly polled values
    #[command(alias = "st")]
    Status(StatusArgs),

    /// Switch an outlet on or off
    Switch(SwitchArgs),

    /// Set a thermostat's target temperature or mode
    #[command(alias = "hkr")]
    Thermostat(ThermostatArgs),

    /// Show or toggle the guest WLAN
    GuestWifi(GuestWifiArgs),

    /// Manage the configuration file and stored password
    Config(ConfigArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Toggle {
    On,
    Off,
}

impl Toggle {
    pub fn is_on(self) -> bool {
        self == Self::On
    }
}

#[derive(Debug, Args)]
pub struct StatusArgs {
    /// Only accessories of this device
    pub ain: Option<String>,
}

#[derive(Debug, Args)]
pub struct SwitchArgs {
    /// Outlet AIN (spaces optional)
    pub ain: String,

    pub state: Toggle,
}

#[derive(Debug, Args)]
pub struct ThermostatArgs {
    /// Thermostat AIN (spaces optional)
    pub ain: String,

    /// Target temperature in °C (8 to 28, 0.5 steps)
    #[arg(long, short = 't')]
    pub target: Option<f64>,

    /// Heating mode
    #[arg(long, short = 'm')]
    pub mode: Option<ModeArg>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    /// Valve closed
    Off,
    /// Comfort temperature
    Heat,
    /// Night temperature
    Cool,
    /// Keep the current setpoint
    Auto,
}

impl From<ModeArg> for TargetMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Off => Self::Off,
            ModeArg::Heat => Self::Heat,
            ModeArg::Cool => Self::Cool,
            ModeArg::Auto => Self::Auto,
        }
    }
}

#[derive(Debug, Args)]
pub struct GuestWifiArgs {
    /// New state; omit to show the current one
    pub state: Option<Toggle>,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file location
    Path,

    /// Show the effective configuration (password masked)
    Show,

    /// Store the box password in the system keyring
    SetPassword,
}

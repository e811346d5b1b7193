//! CLI configuration: the shared file layer plus `GlobalOpts` overrides
//! (--config, --url, --username, --insecure, --timeout).

use std::path::PathBuf;

use fritzgate_config::Config;
use fritzgate_core::GatewayConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// The config file in use: `--config` or the platform default.
pub fn config_file(global: &GlobalOpts) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(fritzgate_config::config_path)
}

/// Load the file config and apply flag overrides.
pub fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    let mut cfg = fritzgate_config::load_config_from(&config_file(global))?;
    apply_overrides(&mut cfg, global);
    Ok(cfg)
}

/// Flags win over file and environment values.
pub fn apply_overrides(cfg: &mut Config, global: &GlobalOpts) {
    if let Some(ref url) = global.url {
        cfg.url.clone_from(url);
    }
    if let Some(ref username) = global.username {
        cfg.username.clone_from(username);
    }
    if global.insecure {
        cfg.insecure = true;
    }
    if let Some(timeout) = global.timeout {
        cfg.timeout = timeout;
    }
}

/// Everything a command needs to talk to the box.
pub fn gateway_config(global: &GlobalOpts) -> Result<GatewayConfig, CliError> {
    Ok(load(global)?.to_gateway_config()?)
}

//! Config subcommand handlers.

use fritzgate_config::Config;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts, OutputFormat};
use crate::error::CliError;
use crate::{config, output};

const MASK: &str = "****";

/// Mask secrets before display.
fn redacted(mut cfg: Config) -> Config {
    if cfg.password.is_some() {
        cfg.password = Some(MASK.into());
    }
    cfg
}

fn render(format: OutputFormat, cfg: &Config) -> Result<String, CliError> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(cfg)?),
        OutputFormat::Table | OutputFormat::Plain => {
            toml::to_string_pretty(cfg).map_err(|e| CliError::Config {
                message: e.to_string(),
            })
        }
    }
}

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Path => {
            let path = config::config_file(global);
            output::print_output(&path.display().to_string(), global.quiet);
            Ok(())
        }

        ConfigCommand::Show => {
            let cfg = redacted(config::load(global)?);
            output::print_output(&render(global.output, &cfg)?, global.quiet);
            Ok(())
        }

        ConfigCommand::SetPassword => {
            let cfg = config::load(global)?;
            let password = rpassword::prompt_password("Password: ")?;
            if password.is_empty() {
                return Err(CliError::Validation {
                    field: "password".into(),
                    reason: "value cannot be empty".into(),
                });
            }
            fritzgate_config::store_password(&cfg.username, &password)?;

            let user = if cfg.username.is_empty() {
                "(no user name)"
            } else {
                cfg.username.as_str()
            };
            eprintln!("✓ Password stored in system keyring for {user}");
            Ok(())
        }
    }
}

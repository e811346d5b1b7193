//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use fritzgate_config::ConfigError;
use fritzgate_core::CoreError;

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not reach the box: {message}")]
    #[diagnostic(
        code(fritzgate::connection_failed),
        help(
            "Check that the box is reachable from this machine.\n\
             Try: fritzgate --url http://192.168.178.1 devices"
        )
    )]
    ConnectionFailed { message: String },

    #[error("Device listing failed: {message}")]
    #[diagnostic(
        code(fritzgate::discovery),
        help("The login worked but the box did not answer the device list. Run with -v for details.")
    )]
    Discovery { message: String },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(fritzgate::auth_failed),
        help(
            "Check the user name and password of the box user with smart-home rights.\n\
             Run: fritzgate config set-password"
        )
    )]
    AuthFailed { message: String },

    #[error("No password configured for user '{username}'")]
    #[diagnostic(
        code(fritzgate::no_credentials),
        help(
            "Store one with: fritzgate config set-password\n\
             Or set FRITZGATE_PASSWORD, or `password_env` in the config file."
        )
    )]
    NoCredentials { username: String },

    // ── Resources ────────────────────────────────────────────────────
    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(fritzgate::not_found),
        help("Run: fritzgate {list_command} to see what the box offers")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    #[error("The box rejected the request: {message}")]
    #[diagnostic(code(fritzgate::rejected))]
    Rejected { message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(fritzgate::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Could not load configuration: {message}")]
    #[diagnostic(
        code(fritzgate::config),
        help("Check the file shown by: fritzgate config path")
    )]
    Config { message: String },

    #[error("Keyring error: {message}")]
    #[diagnostic(code(fritzgate::keyring))]
    Keyring { message: String },

    // ── Internal ─────────────────────────────────────────────────────
    #[error("Internal error: {message}")]
    #[diagnostic(code(fritzgate::internal))]
    Internal { message: String },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Could not encode output: {0}")]
    #[diagnostic(code(fritzgate::json))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::Discovery { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Validation { .. } | Self::Config { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::AuthenticationFailed {
                message,
                unreachable: true,
            } => Self::ConnectionFailed { message },
            CoreError::AuthenticationFailed { message, .. } => Self::AuthFailed { message },
            CoreError::BackendUnavailable { message } => Self::ConnectionFailed { message },
            CoreError::DiscoveryDegraded { message } => Self::Discovery { message },
            CoreError::Rejected { message } => Self::Rejected { message },
            CoreError::ReadOnly { characteristic } => Self::Validation {
                field: characteristic,
                reason: "read-only".into(),
            },
            CoreError::UnknownCharacteristic { characteristic } => Self::Validation {
                field: characteristic,
                reason: "not offered by this accessory".into(),
            },
            CoreError::InvalidValue { message } => Self::Validation {
                field: "value".into(),
                reason: message,
            },
            CoreError::Config { message } => Self::Config { message },
            CoreError::QueueClosed => Self::Internal {
                message: "request queue closed".into(),
            },
            CoreError::Internal(message) => Self::Internal { message },
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            ConfigError::NoCredentials { username } => Self::NoCredentials { username },
            ConfigError::Keyring(e) => Self::Keyring {
                message: e.to_string(),
            },
            ConfigError::Io(e) => Self::Io(e),
            other @ (ConfigError::Figment(_) | ConfigError::Serialization(_)) => Self::Config {
                message: other.to_string(),
            },
        }
    }
}

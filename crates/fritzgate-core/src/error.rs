// ── Core error types ──
//
// User-facing errors from fritzgate-core. Consumers never see HTTP status
// codes or XML parse failures directly; the `From<fritzgate_api::Error>`
// impl folds transport-layer errors into this smaller taxonomy.
//
// Reading a cache entry before its first refresh is not an error: the
// caller gets its default back and `CacheEntry::is_stale()` says so.

use thiserror::Error;

/// Unified error type for the core crate.
///
/// `Clone` because one renewal result is shared by every call waiting on it.
#[derive(Debug, Clone, Error)]
pub enum CoreError {
    // ── Session errors ───────────────────────────────────────────────
    /// Login refused, or impossible because the box did not answer.
    /// `unreachable` tells the second case apart.
    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String, unreachable: bool },

    // ── Backend errors ───────────────────────────────────────────────
    #[error("Backend unavailable: {message}")]
    BackendUnavailable { message: String },

    #[error("Device discovery failed: {message}")]
    DiscoveryDegraded { message: String },

    #[error("Operation rejected by the box: {message}")]
    Rejected { message: String },

    // ── Accessory errors ─────────────────────────────────────────────
    #[error("Characteristic {characteristic} is read-only")]
    ReadOnly { characteristic: String },

    #[error("Accessory has no characteristic {characteristic}")]
    UnknownCharacteristic { characteristic: String },

    #[error("Invalid value: {message}")]
    InvalidValue { message: String },

    // ── Runtime errors ───────────────────────────────────────────────
    #[error("Request queue is shut down")]
    QueueClosed,

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub fn is_authentication_failed(&self) -> bool {
        matches!(self, Self::AuthenticationFailed { .. })
    }

    /// A login that failed because the box could not be reached.
    pub fn is_backend_unreachable(&self) -> bool {
        matches!(
            self,
            Self::AuthenticationFailed {
                unreachable: true,
                ..
            }
        )
    }

    pub(crate) fn refused(message: impl Into<String>) -> Self {
        Self::AuthenticationFailed {
            message: message.into(),
            unreachable: false,
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<fritzgate_api::Error> for CoreError {
    fn from(err: fritzgate_api::Error) -> Self {
        use fritzgate_api::Error as Api;

        match err {
            Api::Authentication { message } => Self::refused(message),
            Api::InvalidSession => Self::refused("box returned the invalid session id"),
            Api::LoginBlocked { block_secs } => {
                Self::refused(format!("login blocked for {block_secs}s"))
            }
            Api::SessionExpired => Self::refused("session expired after renewal"),
            Api::Transport(ref e) => Self::BackendUnavailable {
                message: e.to_string(),
            },
            Api::Timeout { timeout_secs } => Self::BackendUnavailable {
                message: format!("timed out after {timeout_secs}s"),
            },
            Api::Tls(message) => Self::BackendUnavailable { message },
            Api::Api { status, message } if status >= 500 => Self::BackendUnavailable {
                message: format!("HTTP {status}: {message}"),
            },
            Api::Api { status, message } => Self::Rejected {
                message: format!("HTTP {status}: {message}"),
            },
            Api::InvalidResponse { procedure, body } => Self::Rejected {
                message: format!("{procedure} answered {body:?}"),
            },
            Api::InvalidArgument(message) => Self::Rejected { message },
            Api::UnsupportedOperation(op) => Self::Rejected {
                message: format!("unsupported: {op}"),
            },
            Api::Deserialization { message, .. } => Self::Internal(message),
            Api::InvalidUrl(e) => Self::Config {
                message: format!("invalid URL: {e}"),
            },
        }
    }
}

use thiserror::Error;

/// Top-level error type for the `fritzgate-api` crate.
///
/// Covers every failure mode of the box's HTTP surface: login, session
/// handling, transport, and the AHA smart-home endpoints.
/// `fritzgate-core` folds these into its smaller user-facing taxonomy.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Login failed (wrong credentials, unknown user, etc.)
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// The box handed out the all-zero session id.
    #[error("Invalid session id")]
    InvalidSession,

    /// Too many failed logins; the box refuses further attempts for a while.
    #[error("Login blocked for {block_secs}s after failed attempts")]
    LoginBlocked { block_secs: u64 },

    /// Session is no longer accepted (HTTP 403 from an AHA endpoint).
    #[error("Session expired -- re-authentication required")]
    SessionExpired,

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Request timed out.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// TLS handshake or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── AHA interface ───────────────────────────────────────────────
    /// Non-success HTTP status from the box.
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// The box answered `inval` or something that does not parse.
    #[error("Invalid response to {procedure}: {body:?}")]
    InvalidResponse { procedure: String, body: String },

    /// Caller supplied arguments the procedure cannot take.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // ── Data ────────────────────────────────────────────────────────
    /// XML/JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    // ── Platform ────────────────────────────────────────────────────
    /// Operation not supported by this firmware.
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(&'static str),
}

impl Error {
    /// Returns `true` if the session was rejected and re-authentication
    /// might resolve it.
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, Self::SessionExpired)
    }

    /// Returns `true` if logging in itself failed. Retrying with the same
    /// credentials will not help.
    pub fn is_authentication_failure(&self) -> bool {
        matches!(
            self,
            Self::Authentication { .. } | Self::InvalidSession | Self::LoginBlocked { .. }
        )
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::Timeout { .. } => true,
            Self::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

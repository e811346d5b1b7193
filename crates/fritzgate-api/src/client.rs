// FRITZ!Box HTTP client
//
// Wraps `reqwest::Client` with the box's URL layout and status handling.
// Endpoint groups (login, AHA switch commands, system pages) live in
// separate files as inherent methods; this module only deals with
// transport mechanics.

use tracing::{debug, trace};
use url::Url;

use crate::error::Error;
use crate::session::SessionId;
use crate::transport::TransportConfig;

const AHA_PATH: &str = "webservices/homeautoswitch.lua";

/// Raw HTTP client for one FRITZ!Box.
///
/// Stateless apart from the connection pool: every request carries the
/// session id explicitly, so a single client can be shared by any number
/// of concurrent callers.
#[derive(Debug, Clone)]
pub struct FritzClient {
    http: reqwest::Client,
    base_url: Url,
}

impl FritzClient {
    /// Create a client from a `TransportConfig`.
    ///
    /// `base_url` is the box root, e.g. `http://fritz.box` or
    /// `https://192.168.178.1`.
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        Ok(Self {
            http: transport.build_client()?,
            base_url,
        })
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self { http, base_url }
    }

    /// The underlying HTTP client.
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// The box base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// `{base}/{path}`, tolerating a trailing slash on the base.
    pub(crate) fn url(&self, path: &str) -> Result<Url, Error> {
        let base = self.base_url.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!("{base}/{path}"))?)
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// Issue one `homeautoswitch.lua` command and return the trimmed body.
    ///
    /// The box answers a stale sid with HTTP 403 and an unsupported
    /// command/device combination with the literal body `inval`.
    pub(crate) async fn switchcmd(
        &self,
        sid: &SessionId,
        cmd: &str,
        ain: Option<&str>,
        param: Option<&str>,
    ) -> Result<String, Error> {
        let url = self.url(AHA_PATH)?;
        debug!(cmd, ain, param, "GET {}", url);

        let mut query: Vec<(&str, &str)> = vec![("sid", sid.as_str()), ("switchcmd", cmd)];
        if let Some(ain) = ain {
            query.push(("ain", ain));
        }
        if let Some(param) = param {
            query.push(("param", param));
        }

        let resp = self
            .http
            .get(url)
            .query(&query)
            .send()
            .await
            .map_err(Error::Transport)?;
        let body = Self::text(resp).await?;

        let body = body.trim();
        trace!(cmd, body, "switchcmd response");
        if body == "inval" {
            return Err(Error::InvalidResponse {
                procedure: cmd.to_owned(),
                body: body.to_owned(),
            });
        }
        Ok(body.to_owned())
    }

    /// Check the status and read the body. 403 means the sid is stale.
    pub(crate) async fn text(resp: reqwest::Response) -> Result<String, Error> {
        let status = resp.status();

        if status == reqwest::StatusCode::FORBIDDEN {
            return Err(Error::SessionExpired);
        }

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let preview: String = body.chars().take(200).collect();
            return Err(Error::Api {
                status: status.as_u16(),
                message: preview,
            });
        }

        resp.text().await.map_err(Error::Transport)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn url_joins_without_double_slash() {
        let client = FritzClient::with_client(
            reqwest::Client::new(),
            Url::parse("http://fritz.box/").unwrap(),
        );
        assert_eq!(
            client.url(AHA_PATH).unwrap().as_str(),
            "http://fritz.box/webservices/homeautoswitch.lua"
        );
    }
}

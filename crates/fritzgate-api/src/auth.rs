// Session login/logout
//
// `login_sid.lua?version=2` hands out a challenge, we answer it with the
// PBKDF2 response, and the box replies with a fresh sid (or the all-zero
// sid plus a `BlockTime` when the credentials are wrong).

use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info};

use crate::client::FritzClient;
use crate::error::Error;
use crate::session::{SessionId, SessionInfo, solve_challenge};

const LOGIN_PATH: &str = "login_sid.lua";

impl FritzClient {
    /// Authenticate with username/password and return the new session id.
    pub async fn login(&self, username: &str, password: &SecretString) -> Result<SessionId, Error> {
        let url = self.url(LOGIN_PATH)?;
        debug!("requesting login challenge at {}", url);

        let resp = self
            .http()
            .get(url.clone())
            .query(&[("version", "2")])
            .send()
            .await
            .map_err(Error::Transport)?;
        let info = SessionInfo::parse(&Self::text(resp).await?)?;

        if info.block_time > 0 {
            return Err(Error::LoginBlocked {
                block_secs: info.block_time,
            });
        }

        let response = solve_challenge(&info.challenge, password.expose_secret())?;

        let resp = self
            .http()
            .post(url)
            .query(&[("version", "2")])
            .form(&[("username", username), ("response", response.as_str())])
            .send()
            .await
            .map_err(Error::Transport)?;
        let info = SessionInfo::parse(&Self::text(resp).await?)?;

        let sid = info.session_id();
        if sid.is_invalid() {
            if info.block_time > 0 {
                return Err(Error::LoginBlocked {
                    block_secs: info.block_time,
                });
            }
            return Err(Error::Authentication {
                message: format!("box rejected credentials for user {username:?}"),
            });
        }

        info!("login successful");
        Ok(sid)
    }

    /// End a session. The box answers with the all-zero sid.
    pub async fn logout(&self, sid: &SessionId) -> Result<(), Error> {
        let url = self.url(LOGIN_PATH)?;
        debug!("logging out at {}", url);

        let resp = self
            .http()
            .get(url)
            .query(&[("version", "2"), ("logout", "1"), ("sid", sid.as_str())])
            .send()
            .await
            .map_err(Error::Transport)?;
        let _ = Self::text(resp).await?;

        debug!("logout complete");
        Ok(())
    }
}

// Box-level endpoints outside the AHA interface
//
// Guest WLAN state is only reachable through the web UI page
// `wlan/guest_access.lua`; the firmware version comes from the
// unauthenticated `jason_boxinfo.xml`.

use quick_xml::Reader;
use quick_xml::events::Event;
use tracing::debug;

use crate::client::FritzClient;
use crate::error::Error;
use crate::session::SessionId;

const GUEST_ACCESS_PATH: &str = "wlan/guest_access.lua";
const BOXINFO_PATH: &str = "jason_boxinfo.xml";

/// Guest WLAN state as shown on the settings page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuestWlan {
    pub active: bool,
    pub ssid: Option<String>,
}

impl FritzClient {
    /// Read the guest WLAN settings page.
    pub async fn get_guest_wlan(&self, sid: &SessionId) -> Result<GuestWlan, Error> {
        let url = self.url(GUEST_ACCESS_PATH)?;
        debug!("fetching guest wlan state");

        let resp = self
            .http()
            .get(url)
            .query(&[("sid", sid.as_str())])
            .send()
            .await
            .map_err(Error::Transport)?;
        let page = Self::text(resp).await?;

        parse_guest_wlan(&page).ok_or_else(|| Error::InvalidResponse {
            procedure: "getGuestWlan".into(),
            body: page.chars().take(200).collect(),
        })
    }

    /// Switch the guest WLAN on or off and return the resulting state.
    pub async fn set_guest_wlan(&self, sid: &SessionId, enable: bool) -> Result<GuestWlan, Error> {
        let url = self.url(GUEST_ACCESS_PATH)?;
        debug!(enable, "setting guest wlan");

        let mut form = vec![("sid", sid.as_str()), ("btnSave", "")];
        if enable {
            form.push(("activate_guest_access", "on"));
        }

        let resp = self
            .http()
            .post(url)
            .form(&form)
            .send()
            .await
            .map_err(Error::Transport)?;
        let page = Self::text(resp).await?;

        Ok(parse_guest_wlan(&page).unwrap_or(GuestWlan {
            active: enable,
            ssid: None,
        }))
    }

    /// Firmware version string, e.g. `154.07.29`.
    pub async fn get_os_version(&self) -> Result<String, Error> {
        let url = self.url(BOXINFO_PATH)?;
        debug!("fetching box info");

        let resp = self.http().get(url).send().await.map_err(Error::Transport)?;
        let body = Self::text(resp).await?;

        parse_version(&body).ok_or_else(|| Error::InvalidResponse {
            procedure: "getOSVersion".into(),
            body: body.chars().take(200).collect(),
        })
    }
}

// ── Page scraping ────────────────────────────────────────────────────

/// Find the `<input ...>` tag carrying `name="{name}"`.
fn input_tag<'a>(page: &'a str, name: &str) -> Option<&'a str> {
    let needle = format!("name=\"{name}\"");
    let at = page.find(&needle)?;
    let start = page.get(..at)?.rfind('<')?;
    let end = at + page.get(at..)?.find('>')?;
    page.get(start..=end)
}

fn parse_guest_wlan(page: &str) -> Option<GuestWlan> {
    let toggle = input_tag(page, "activate_guest_access")?;
    let active = toggle.contains(" checked");

    let ssid = input_tag(page, "guest_ssid").and_then(|tag| {
        let at = tag.find("value=\"")? + "value=\"".len();
        let rest = tag.get(at..)?;
        rest.find('"').and_then(|end| rest.get(..end)).map(String::from)
    });

    Some(GuestWlan { active, ssid })
}

fn parse_version(body: &str) -> Option<String> {
    let mut reader = Reader::from_str(body);
    let mut in_version = false;
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => in_version = e.local_name().as_ref() == b"Version",
            Ok(Event::Text(t)) if in_version => {
                return t.unescape().ok().map(|v| v.trim().to_owned());
            }
            Ok(Event::End(_)) => in_version = false,
            Ok(Event::Eof) | Err(_) => return None,
            Ok(_) => {}
        }
    }
}

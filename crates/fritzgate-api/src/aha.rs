// AHA smart-home commands
//
// Typed wrappers over `homeautoswitch.lua?switchcmd=...`. Values are
// converted to plain units here (W, Wh, °C) so nothing above this layer
// has to know about milliwatts or half-degree steps.

use tracing::debug;

use crate::client::FritzClient;
use crate::devicelist::{DeviceInfo, TempSetting, parse_device_list};
use crate::error::Error;
use crate::session::SessionId;

impl FritzClient {
    /// All devices and groups known to the box.
    pub async fn get_device_list(&self, sid: &SessionId) -> Result<Vec<DeviceInfo>, Error> {
        let body = self
            .switchcmd(sid, "getdevicelistinfos", None, None)
            .await?;
        let devices = parse_device_list(&body)?;
        debug!(count = devices.len(), "fetched device list");
        Ok(devices)
    }

    /// Whether the outlet relay is closed.
    pub async fn get_switch_state(&self, sid: &SessionId, ain: &str) -> Result<bool, Error> {
        let body = self.switchcmd(sid, "getswitchstate", Some(ain), None).await?;
        parse_flag("getswitchstate", &body)
    }

    /// Switch an outlet and return the state the box reports afterwards.
    pub async fn set_switch(&self, sid: &SessionId, ain: &str, on: bool) -> Result<bool, Error> {
        let cmd = if on { "setswitchon" } else { "setswitchoff" };
        let body = self.switchcmd(sid, cmd, Some(ain), None).await?;
        parse_flag(cmd, &body)
    }

    /// Current power draw in W.
    pub async fn get_switch_power(&self, sid: &SessionId, ain: &str) -> Result<f64, Error> {
        let body = self.switchcmd(sid, "getswitchpower", Some(ain), None).await?;
        Ok(parse_number("getswitchpower", &body)? / 1000.0)
    }

    /// Energy used since first use, in Wh.
    pub async fn get_switch_energy(&self, sid: &SessionId, ain: &str) -> Result<f64, Error> {
        let body = self.switchcmd(sid, "getswitchenergy", Some(ain), None).await?;
        parse_number("getswitchenergy", &body)
    }

    /// Temperature in °C.
    pub async fn get_temperature(&self, sid: &SessionId, ain: &str) -> Result<f64, Error> {
        let body = self.switchcmd(sid, "gettemperature", Some(ain), None).await?;
        Ok(parse_number("gettemperature", &body)? / 10.0)
    }

    /// Current thermostat setpoint.
    pub async fn get_temp_target(&self, sid: &SessionId, ain: &str) -> Result<TempSetting, Error> {
        self.get_setting(sid, "gethkrtsoll", ain).await
    }

    /// Configured comfort ("heat") temperature.
    pub async fn get_temp_comfort(&self, sid: &SessionId, ain: &str) -> Result<TempSetting, Error> {
        self.get_setting(sid, "gethkrkomfort", ain).await
    }

    /// Configured economy ("night") temperature.
    pub async fn get_temp_night(&self, sid: &SessionId, ain: &str) -> Result<TempSetting, Error> {
        self.get_setting(sid, "gethkrabsenk", ain).await
    }

    /// Set the thermostat setpoint. Returns the setting that was sent.
    pub async fn set_temp_target(
        &self,
        sid: &SessionId,
        ain: &str,
        target: TempSetting,
    ) -> Result<TempSetting, Error> {
        let raw = target.to_raw().to_string();
        self.switchcmd(sid, "sethkrtsoll", Some(ain), Some(&raw))
            .await?;
        Ok(TempSetting::from_raw(target.to_raw()))
    }

    async fn get_setting(
        &self,
        sid: &SessionId,
        cmd: &'static str,
        ain: &str,
    ) -> Result<TempSetting, Error> {
        let body = self.switchcmd(sid, cmd, Some(ain), None).await?;
        body.parse::<u16>()
            .map(TempSetting::from_raw)
            .map_err(|_| Error::InvalidResponse {
                procedure: cmd.into(),
                body,
            })
    }
}

fn parse_flag(cmd: &str, body: &str) -> Result<bool, Error> {
    match body {
        "1" => Ok(true),
        "0" => Ok(false),
        _ => Err(Error::InvalidResponse {
            procedure: cmd.into(),
            body: body.into(),
        }),
    }
}

fn parse_number(cmd: &str, body: &str) -> Result<f64, Error> {
    body.parse().map_err(|_| Error::InvalidResponse {
        procedure: cmd.into(),
        body: body.into(),
    })
}

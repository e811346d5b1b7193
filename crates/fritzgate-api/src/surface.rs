// Remote procedure surface
//
// The seam between the gateway core and the box: procedures are invoked
// by name with positional JSON arguments plus a session id, and answer
// with a JSON value. `FritzClient` is the production implementation;
// tests substitute scripted backends.

use async_trait::async_trait;
use secrecy::SecretString;
use serde_json::{Value, json};

use crate::client::FritzClient;
use crate::devicelist::{DeviceInfo, TempSetting};
use crate::error::Error;
use crate::procedure::Procedure;
use crate::session::SessionId;

/// A backend that can authenticate and run named procedures.
///
/// Implementations must report a rejected session as
/// [`Error::SessionExpired`] so callers can renew and retry.
#[async_trait]
pub trait RemoteProcedure: Send + Sync {
    /// Log in and return a fresh session id.
    async fn authenticate(&self, username: &str, password: &SecretString)
    -> Result<SessionId, Error>;

    /// Run one procedure.
    async fn call(
        &self,
        procedure: Procedure,
        sid: &SessionId,
        args: &[Value],
    ) -> Result<Value, Error>;

    /// End a session. Best effort; the default does nothing.
    async fn logout(&self, _sid: &SessionId) -> Result<(), Error> {
        Ok(())
    }
}

#[async_trait]
impl RemoteProcedure for FritzClient {
    async fn authenticate(
        &self,
        username: &str,
        password: &SecretString,
    ) -> Result<SessionId, Error> {
        let sid = self.login(username, password).await?;
        if sid.is_invalid() {
            return Err(Error::InvalidSession);
        }
        Ok(sid)
    }

    async fn call(
        &self,
        procedure: Procedure,
        sid: &SessionId,
        args: &[Value],
    ) -> Result<Value, Error> {
        match procedure {
            Procedure::GetDeviceList => to_json(&self.get_device_list(sid).await?),
            Procedure::GetDeviceListFiltered => {
                let wanted = filter_identifier(args)?;
                let devices: Vec<DeviceInfo> = self
                    .get_device_list(sid)
                    .await?
                    .into_iter()
                    .filter(|d| same_ain(&d.identifier, &wanted))
                    .collect();
                to_json(&devices)
            }
            Procedure::GetSwitchState => {
                Ok(json!(self.get_switch_state(sid, ain(procedure, args)?).await?))
            }
            Procedure::SetSwitchOn => Ok(json!(self.set_switch(sid, ain(procedure, args)?, true).await?)),
            Procedure::SetSwitchOff => {
                Ok(json!(self.set_switch(sid, ain(procedure, args)?, false).await?))
            }
            Procedure::GetSwitchPower => {
                Ok(json!(self.get_switch_power(sid, ain(procedure, args)?).await?))
            }
            Procedure::GetSwitchEnergy => {
                Ok(json!(self.get_switch_energy(sid, ain(procedure, args)?).await?))
            }
            Procedure::GetTemperature => {
                Ok(json!(self.get_temperature(sid, ain(procedure, args)?).await?))
            }
            Procedure::GetTempTarget => {
                Ok(self.get_temp_target(sid, ain(procedure, args)?).await?.into())
            }
            Procedure::GetTempComfort => {
                Ok(self.get_temp_comfort(sid, ain(procedure, args)?).await?.into())
            }
            Procedure::GetTempNight => {
                Ok(self.get_temp_night(sid, ain(procedure, args)?).await?.into())
            }
            Procedure::SetTempTarget => {
                let ain = ain(procedure, args)?;
                let target = args
                    .get(1)
                    .cloned()
                    .ok_or_else(|| Error::InvalidArgument("setTempTarget needs a target".into()))
                    .and_then(TempSetting::try_from)?;
                Ok(self.set_temp_target(sid, ain, target).await?.into())
            }
            Procedure::GetBatteryCharge => {
                let wanted = ain(procedure, args)?;
                let battery = self
                    .get_device_list(sid)
                    .await?
                    .into_iter()
                    .find(|d| same_ain(&d.identifier, wanted))
                    .and_then(|d| d.battery);
                Ok(battery.map_or(Value::Null, |b| json!(b)))
            }
            Procedure::GetGuestWlan => Ok(json!(self.get_guest_wlan(sid).await?.active)),
            Procedure::SetGuestWlan => {
                let enable = args.first().and_then(Value::as_bool).ok_or_else(|| {
                    Error::InvalidArgument("setGuestWlan needs a boolean".into())
                })?;
                Ok(json!(self.set_guest_wlan(sid, enable).await?.active))
            }
            Procedure::GetOsVersion => Ok(json!(self.get_os_version().await?)),
        }
    }

    async fn logout(&self, sid: &SessionId) -> Result<(), Error> {
        FritzClient::logout(self, sid).await
    }
}

// ── Argument helpers ─────────────────────────────────────────────────

fn ain(procedure: Procedure, args: &[Value]) -> Result<&str, Error> {
    args.first()
        .and_then(Value::as_str)
        .ok_or_else(|| Error::InvalidArgument(format!("{procedure} needs an AIN argument")))
}

/// `getDeviceListFiltered` accepts either `"<ain>"` or `{"identifier": "<ain>"}`.
fn filter_identifier(args: &[Value]) -> Result<String, Error> {
    let first = args.first();
    first
        .and_then(Value::as_str)
        .or_else(|| first.and_then(|v| v.get("identifier")).and_then(Value::as_str))
        .map(String::from)
        .ok_or_else(|| Error::InvalidArgument("getDeviceListFiltered needs an identifier".into()))
}

fn same_ain(reported: &str, wanted: &str) -> bool {
    reported
        .chars()
        .filter(|c| !c.is_whitespace())
        .eq(wanted.chars().filter(|c| !c.is_whitespace()))
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<Value, Error> {
    serde_json::to_value(value).map_err(|e| Error::Deserialization {
        message: e.to_string(),
        body: String::new(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn ain_comparison_ignores_spaces() {
        assert!(same_ain("08761 0000434", "087610000434"));
        assert!(!same_ain("08761 0000434", "087610000435"));
    }

    #[test]
    fn filter_accepts_both_shapes() {
        assert_eq!(filter_identifier(&[json!("123")]).unwrap(), "123");
        assert_eq!(
            filter_identifier(&[json!({"identifier": "456"})]).unwrap(),
            "456"
        );
        assert!(filter_identifier(&[]).is_err());
    }
}

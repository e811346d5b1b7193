// Named remote procedures
//
// The string form of each variant is the function name callers and logs
// use (`getSwitchState`, `setTempTarget`, ...). Most map 1:1 onto an AHA
// `switchcmd`; the rest are served from the device list or the web UI.

use strum::{Display, EnumString, IntoStaticStr};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr,
)]
#[strum(serialize_all = "camelCase")]
pub enum Procedure {
    GetDeviceList,
    GetDeviceListFiltered,
    GetSwitchState,
    SetSwitchOn,
    SetSwitchOff,
    GetSwitchPower,
    GetSwitchEnergy,
    GetTemperature,
    GetTempTarget,
    SetTempTarget,
    GetTempComfort,
    GetTempNight,
    GetBatteryCharge,
    GetGuestWlan,
    SetGuestWlan,
    #[strum(serialize = "getOSVersion")]
    GetOsVersion,
}

impl Procedure {
    pub fn name(self) -> &'static str {
        self.into()
    }

    /// The `switchcmd` this procedure issues, for the ones that are plain
    /// `homeautoswitch.lua` commands.
    pub fn switchcmd(self) -> Option<&'static str> {
        match self {
            Self::GetDeviceList | Self::GetDeviceListFiltered | Self::GetBatteryCharge => {
                Some("getdevicelistinfos")
            }
            Self::GetSwitchState => Some("getswitchstate"),
            Self::SetSwitchOn => Some("setswitchon"),
            Self::SetSwitchOff => Some("setswitchoff"),
            Self::GetSwitchPower => Some("getswitchpower"),
            Self::GetSwitchEnergy => Some("getswitchenergy"),
            Self::GetTemperature => Some("gettemperature"),
            Self::GetTempTarget => Some("gethkrtsoll"),
            Self::SetTempTarget => Some("sethkrtsoll"),
            Self::GetTempComfort => Some("gethkrkomfort"),
            Self::GetTempNight => Some("gethkrabsenk"),
            Self::GetGuestWlan | Self::SetGuestWlan | Self::GetOsVersion => None,
        }
    }

    /// Whether the procedure changes state on the box.
    pub fn is_mutation(self) -> bool {
        matches!(
            self,
            Self::SetSwitchOn | Self::SetSwitchOff | Self::SetTempTarget | Self::SetGuestWlan
        )
    }
}

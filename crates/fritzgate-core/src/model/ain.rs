// ── Core identity type ──
//
// The AIN ("Aktor Identifikationsnummer") is the box-assigned identifier
// every smart-home device carries. The box prints it with a space
// (`08761 0000434`) but accepts it without; we always store it bare.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Device id of the box itself (guest WLAN, firmware version).
pub const BOX_DEVICE: &str = "fritzbox";

// ── Ain ─────────────────────────────────────────────────────────────

/// Device identifier, normalized by stripping all whitespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ain(String);

impl Ain {
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().chars().filter(|c| !c.is_whitespace()).collect())
    }

    /// The pseudo-device standing for the box itself.
    pub fn fritzbox() -> Self {
        Self(BOX_DEVICE.to_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Ain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Ain {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

impl From<&str> for Ain {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Ain {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

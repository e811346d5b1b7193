// Session ids and the login_sid.lua challenge-response
//
// FRITZ!OS 7.24+ answers `login_sid.lua?version=2` with a PBKDF2 challenge
// of the form `2$<iter1>$<salt1>$<iter2>$<salt2>`. The response is
// `<salt2>$<hex(pbkdf2(pbkdf2(password, salt1, iter1), salt2, iter2))>`.

use std::fmt;
use std::fmt::Write as _;

use serde::Deserialize;

use crate::error::Error;

/// The box's "no session" marker.
const INVALID_SID: &str = "0000000000000000";

// ── SessionId ────────────────────────────────────────────────────────

/// Opaque session token issued by `login_sid.lua`.
///
/// `Debug` only shows a prefix so tokens don't end up in logs verbatim.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(sid: impl Into<String>) -> Self {
        Self(sid.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `true` for the all-zero sid the box returns when login fails.
    pub fn is_invalid(&self) -> bool {
        self.0.is_empty() || self.0 == INVALID_SID
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix: String = self.0.chars().take(4).collect();
        write!(f, "SessionId({prefix}…)")
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ── SessionInfo ──────────────────────────────────────────────────────

/// `<SessionInfo>` document returned by every `login_sid.lua` request.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionInfo {
    #[serde(rename = "SID")]
    pub sid: String,
    #[serde(rename = "Challenge", default)]
    pub challenge: String,
    #[serde(rename = "BlockTime", default)]
    pub block_time: u64,
}

impl SessionInfo {
    pub fn parse(body: &str) -> Result<Self, Error> {
        quick_xml::de::from_str(body).map_err(|e| Error::Deserialization {
            message: format!("invalid SessionInfo: {e}"),
            body: body.to_owned(),
        })
    }

    pub fn session_id(&self) -> SessionId {
        SessionId::new(self.sid.clone())
    }
}

// ── Challenge response ───────────────────────────────────────────────

/// Compute the login response for a version-2 (PBKDF2) challenge.
pub fn solve_challenge(challenge: &str, password: &str) -> Result<String, Error> {
    let mut parts = challenge.split('$');
    if parts.next() != Some("2") {
        return Err(Error::UnsupportedOperation(
            "MD5 login challenge (FRITZ!OS < 7.24)",
        ));
    }

    let malformed = || Error::InvalidResponse {
        procedure: "login".into(),
        body: challenge.to_owned(),
    };

    let iter1: u32 = parts.next().and_then(|s| s.parse().ok()).ok_or_else(malformed)?;
    let salt1 = parts.next().and_then(decode_hex).ok_or_else(malformed)?;
    let iter2: u32 = parts.next().and_then(|s| s.parse().ok()).ok_or_else(malformed)?;
    let salt2_hex = parts.next().ok_or_else(malformed)?;
    let salt2 = decode_hex(salt2_hex).ok_or_else(malformed)?;

    let hash1 = pbkdf2_sha256(password.as_bytes(), &salt1, iter1);
    let hash2 = pbkdf2_sha256(&hash1, &salt2, iter2);

    Ok(format!("{salt2_hex}${}", encode_hex(&hash2)))
}

/// Single-block PBKDF2-HMAC-SHA256; the box only ever asks for 32 bytes.
fn pbkdf2_sha256(password: &[u8], salt: &[u8], iterations: u32) -> [u8; 32] {
    let mut first = Vec::with_capacity(salt.len() + 4);
    first.extend_from_slice(salt);
    first.extend_from_slice(&1u32.to_be_bytes());

    let mut u = hmac_sha256::HMAC::mac(&first, password);
    let mut out = u;
    for _ in 1..iterations {
        u = hmac_sha256::HMAC::mac(u, password);
        for (o, b) in out.iter_mut().zip(u) {
            *o ^= b;
        }
    }
    out
}

fn decode_hex(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| s.get(i..i + 2).and_then(|b| u8::from_str_radix(b, 16).ok()))
        .collect()
}

fn encode_hex(bytes: &[u8]) -> String {
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut s, b| {
        let _ = write!(s, "{b:02x}");
        s
    })
}

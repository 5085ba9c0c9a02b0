//! Pairing credential

use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// 64-bit token a server hands out trust for
///
/// Established once by the pairing handshake and then presented on every
/// `/login` as `pairing-guid=0x<16 hex digits>`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct PairingCredential(u64);

impl PairingCredential {
    /// Fresh random credential
    #[must_use]
    pub fn generate() -> Self {
        Self(rand::thread_rng().r#gen::<u64>())
    }

    /// Credential with a known value
    #[must_use]
    pub const fn from_u64(value: u64) -> Self {
        Self(value)
    }

    /// Raw value
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Big-endian bytes, as embedded in the pairing answer
    #[must_use]
    pub const fn to_be_bytes(self) -> [u8; 8] {
        self.0.to_be_bytes()
    }

    /// `0x`-prefixed, zero-padded uppercase hex used by `/login`
    #[must_use]
    pub fn to_guid(self) -> String {
        format!("0x{:016X}", self.0)
    }
}

impl fmt::Debug for PairingCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PairingCredential")
            .field(&format_args!("{:016X}", self.0))
            .finish()
    }
}

impl fmt::Display for PairingCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_guid())
    }
}

/// Rejected credential text
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid pairing credential {0:?}")]
pub struct ParseCredentialError(String);

impl FromStr for PairingCredential {
    type Err = ParseCredentialError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);
        if digits.is_empty() || digits.len() > 16 {
            return Err(ParseCredentialError(s.to_string()));
        }
        u64::from_str_radix(digits, 16)
            .map(Self)
            .map_err(|_| ParseCredentialError(s.to_string()))
    }
}

impl From<PairingCredential> for String {
    fn from(credential: PairingCredential) -> Self {
        credential.to_guid()
    }
}

impl TryFrom<String> for PairingCredential {
    type Error = ParseCredentialError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

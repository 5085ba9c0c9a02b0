//! Decoded DMAP leaf values

use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Scalar value held by a tree leaf
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DmapValue {
    /// UTF-8 text
    String(String),
    /// Signed integer with its wire width in bytes
    Signed {
        /// Decoded value
        value: i64,
        /// Wire width (1, 2, 4 or 8)
        width: u8,
    },
    /// Unsigned integer with its wire width in bytes
    Unsigned {
        /// Decoded value
        value: u64,
        /// Wire width (1, 2, 4 or 8)
        width: u8,
    },
    /// Single byte flag
    Boolean(bool),
    /// Seconds since the Unix epoch
    Date(u32),
    /// Protocol version
    Version {
        /// Major half
        major: u16,
        /// Minor half
        minor: u16,
    },
    /// Opaque bytes (packed fields)
    Raw(Vec<u8>),
}

impl DmapValue {
    /// Unsigned value of the given wire width
    #[must_use]
    pub fn unsigned(value: u64, width: u8) -> Self {
        Self::Unsigned { value, width }
    }

    /// Signed value of the given wire width
    #[must_use]
    pub fn signed(value: i64, width: u8) -> Self {
        Self::Signed { value, width }
    }

    /// Best-effort conversion to `i64`
    ///
    /// Unsigned values above `i64::MAX` wrap; text is parsed as decimal.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Signed { value, .. } => Some(*value),
            Self::Unsigned { value, .. } => Some(*value as i64),
            Self::Boolean(b) => Some(i64::from(*b)),
            Self::Date(secs) => Some(i64::from(*secs)),
            Self::String(s) => s.trim().parse().ok(),
            Self::Version { .. } | Self::Raw(_) => None,
        }
    }

    /// Best-effort conversion to `u64`
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::Unsigned { value, .. } => Some(*value),
            Self::Signed { value, .. } => Some(*value as u64),
            Self::Raw(bytes) if bytes.len() <= 8 && !bytes.is_empty() => {
                Some(bytes.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b)))
            }
            other => other.as_i64().map(|v| v as u64),
        }
    }

    /// Borrow text, if this is a string value
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Borrow raw bytes, if this is an opaque value
    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Raw(b) => Some(b),
            _ => None,
        }
    }

    /// Date value as a `SystemTime`
    #[must_use]
    pub fn as_system_time(&self) -> Option<SystemTime> {
        match self {
            Self::Date(secs) => UNIX_EPOCH.checked_add(Duration::from_secs(u64::from(*secs))),
            _ => None,
        }
    }

    /// Uppercase hexadecimal form, zero-padded to the wire width
    ///
    /// Identifiers are opaque tokens, so they are shown in hex rather than
    /// decimal.
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub fn to_hex(&self) -> Option<String> {
        match self {
            Self::Unsigned { value, width } => Some(format!(
                "{value:0digits$X}",
                digits = usize::from(*width) * 2
            )),
            Self::Signed { value, width } => {
                let bits = u32::from(*width) * 8;
                let mask = if bits >= 64 { u64::MAX } else { (1u64 << bits) - 1 };
                Some(format!(
                    "{:0digits$X}",
                    (*value as u64) & mask,
                    digits = usize::from(*width) * 2
                ))
            }
            Self::Raw(bytes) => Some(bytes.iter().map(|b| format!("{b:02X}")).collect()),
            _ => None,
        }
    }
}

impl fmt::Display for DmapValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => write!(f, "{s}"),
            Self::Signed { value, .. } => write!(f, "{value}"),
            Self::Unsigned { value, .. } => write!(f, "{value}"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Date(secs) => write!(f, "@{secs}"),
            Self::Version { major, minor } => write!(f, "{major}.{minor}"),
            Self::Raw(bytes) => write!(f, "<{} bytes>", bytes.len()),
        }
    }
}

//! Session state

use std::fmt;

/// Lifecycle of a remote session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// No credential for this server, or the server refused it
    Unpaired,
    /// Logging in with a credential
    PairedConnecting,
    /// Logged in; commands and status polling are available
    Active,
    /// Status polling failed, retrying login
    Reconnecting,
    /// Gave up after a failure; a new `connect` is needed
    Disconnected,
    /// Stopped on request
    Stopped,
}

impl SessionState {
    /// Check if logged in
    #[must_use]
    pub fn is_active(self) -> bool {
        matches!(self, SessionState::Active)
    }

    /// Check if a login is in progress
    #[must_use]
    pub fn is_connecting(self) -> bool {
        matches!(
            self,
            SessionState::PairedConnecting | SessionState::Reconnecting
        )
    }

    /// Check if the user has to pair before connecting can succeed
    #[must_use]
    pub fn needs_pairing(self) -> bool {
        matches!(self, SessionState::Unpaired)
    }

    /// Check if no further transitions happen without a new `connect`
    #[must_use]
    pub fn is_idle(self) -> bool {
        matches!(
            self,
            SessionState::Unpaired | SessionState::Disconnected | SessionState::Stopped
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Unpaired => "unpaired",
            SessionState::PairedConnecting => "connecting",
            SessionState::Active => "active",
            SessionState::Reconnecting => "reconnecting",
            SessionState::Disconnected => "disconnected",
            SessionState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

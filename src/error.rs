use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::discovery::AdvertiserError;
use crate::protocol::daap::{CatalogError, DecodeError};
use crate::protocol::pairing::StorageError;

/// Errors that can occur while talking to a DACP server
#[derive(Debug, Error)]
pub enum RemoteError {
    // ===== Configuration Errors =====
    /// Field catalog is inconsistent
    #[error("field catalog error: {0}")]
    Catalog(#[from] CatalogError),

    // ===== Decode Errors =====
    /// Server sent a malformed or truncated body
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    // ===== Transport Errors =====
    /// Server answered with a status of 400 or above
    #[error("HTTP {status} from {target}: {message}")]
    HttpStatus {
        /// Request target that failed
        target: String,
        /// HTTP status code
        status: u16,
        /// Reason phrase or body text
        message: String,
    },

    /// Could not reach the server
    #[error("connection failed to {target}: {message}")]
    ConnectionFailed {
        /// Request target that failed
        target: String,
        /// Description of the failure
        message: String,
        /// The underlying source of the error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Request timed out
    #[error("request to {target} timed out after {duration:?}")]
    Timeout {
        /// Request target that timed out
        target: String,
        /// Configured timeout
        duration: Duration,
    },

    /// Transport was shut down before or during the request
    #[error("transport shut down")]
    ShutDown,

    /// Request builder rejected its parameters
    #[error("invalid request: {name} - {message}")]
    InvalidRequest {
        /// The name of the parameter
        name: String,
        /// Description of the error
        message: String,
    },

    // ===== Protocol State Errors =====
    /// Response lacked a field the protocol requires
    #[error("protocol error: {message}")]
    ProtocolState {
        /// Description of what was missing or unexpected
        message: String,
    },

    /// Operation not valid in current session state
    #[error("invalid state: {message} (current state: {current_state})")]
    InvalidState {
        /// Description of why the state is invalid
        message: String,
        /// The current state
        current_state: String,
    },

    // ===== Pairing Errors =====
    /// No credential is stored for this server
    #[error("pairing required with {server}")]
    PairingRequired {
        /// Server identifier
        server: String,
    },

    /// Server refused the stored credential
    #[error("pairing credential rejected by {server} (HTTP {status})")]
    PairingRejected {
        /// Server identifier
        server: String,
        /// Status returned by `/login`
        status: u16,
    },

    /// No server connected to the pairing listener in time
    #[error("pairing timed out after {duration:?}")]
    PairingTimeout {
        /// How long the listener waited
        duration: Duration,
    },

    /// Pairing record advertisement failed
    #[error("advertisement error: {0}")]
    Advertise(#[from] AdvertiserError),

    /// Credential storage failed
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    // ===== I/O Errors =====
    /// Network I/O error
    #[error("network error: {0}")]
    NetworkError(#[from] io::Error),
}

impl RemoteError {
    /// Check if this is a request timeout
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Check if this error is recoverable by retrying
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::ConnectionFailed { .. } | Self::NetworkError(_) => true,
            Self::HttpStatus { status, .. } => *status >= 500 && *status != 503,
            _ => false,
        }
    }

    /// Check if the user has to pair again before reconnecting helps
    #[must_use]
    pub fn needs_pairing(&self) -> bool {
        matches!(
            self,
            Self::PairingRequired { .. } | Self::PairingRejected { .. }
        )
    }

    /// Check if the server sent a body that could not be decoded
    #[must_use]
    pub fn is_decode(&self) -> bool {
        matches!(self, Self::Decode(_))
    }

    /// Check if this error indicates connection loss
    #[must_use]
    pub fn is_connection_lost(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailed { .. } | Self::NetworkError(_) | Self::ShutDown
        )
    }
}

/// Result type alias for remote operations
pub type Result<T> = std::result::Result<T, RemoteError>;

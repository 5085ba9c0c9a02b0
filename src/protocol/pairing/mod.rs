//! Pairing a remote with a media server
//!
//! Pairing is a one-time bootstrap. The remote advertises itself, the
//! server connects to the remote's listener with `/pair`, and the answer
//! carries a credential that every later `/login` presents.

mod ack;
mod credential;
mod listener;
pub mod storage;

#[cfg(test)]
mod tests;

pub use ack::{CREDENTIAL_OFFSET, PAIRING_ACK_TEMPLATE, pairing_ack};
pub use credential::{PairingCredential, ParseCredentialError};
pub use listener::{PairingListener, PairingRequest};
pub use storage::{
    CredentialStore, FileCredentialStore, MemoryCredentialStore, StorageError, StoredPairing,
};

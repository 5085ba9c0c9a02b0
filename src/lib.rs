//! # dacp-remote
//!
//! A Rust library for remote-controlling DACP media servers such as
//! iTunes-style music libraries.
//!
//! ## Features
//!
//! - DMAP response decoding with a data-driven field catalog
//! - Structural diffs between status snapshots
//! - Pairing via a `_touch-remote._tcp` advertisement
//! - Long-poll play-status updates with automatic reconnection
//! - Transport commands, ratings, volume, item lookups and searches
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use dacp_remote::prelude::*;
//! use tokio::sync::mpsc;
//!
//! # async fn example() -> Result<(), dacp_remote::RemoteError> {
//! let config = RemoteConfig::builder().host("192.168.1.20").build();
//! let store = FileCredentialStore::new("pairings.json").await?;
//! let session = RemoteSession::with_http(config, Box::new(store))?;
//!
//! match session.connect().await {
//!     Err(e) if e.needs_pairing() => {
//!         session.pair().await?;
//!     }
//!     other => other?,
//! }
//!
//! let (tx, mut rx) = mpsc::unbounded_channel();
//! session.start_polling(Arc::new(tx)).await?;
//! while let Some(SessionEvent::Status(update)) = rx.recv().await {
//!     if !update.classification.is_ignorable_tick() {
//!         println!("{:?}", NowPlaying::from_status(&update.current));
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! The library is organized into layers:
//!
//! - **Session**: [`RemoteSession`] - pairing, login, polling and commands
//! - **Network**: [`net::TransportClient`] behind the [`net::RemoteTransport`] trait
//! - **Protocol**: DMAP decoding and DACP request building

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Public modules
/// Error types
pub mod error;
/// Core types
pub mod types;

/// Testing utilities
pub mod testing;

pub mod connection;
pub mod discovery;
pub mod net;
pub mod protocol;

// Re-exports
pub use connection::{
    RemoteSession, SessionEvent, SessionState, StatusClassification, StatusListener,
    StatusUpdate, classify,
};
pub use error::{RemoteError, Result};
pub use protocol::daap::{DmapDecoder, FieldCatalog, ResponseTree, diff};
pub use protocol::dacp::{DacpCommand, RequestEncoder, SearchField, SearchPredicate};
pub use protocol::pairing::{FileCredentialStore, MemoryCredentialStore, PairingCredential};
pub use types::{LibraryDatabase, NowPlaying, PlayState, RemoteConfig, RepeatMode};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude for common imports
///
/// Convenient re-exports
pub mod prelude {
    pub use crate::{
        DacpCommand, FileCredentialStore, MemoryCredentialStore, NowPlaying, PairingCredential,
        PlayState, RemoteConfig, RemoteError, RemoteSession, SearchField, SearchPredicate,
        SessionEvent, SessionState, StatusListener, StatusUpdate,
    };
}

//! Session management

mod manager;
mod poll;
mod state;
mod status;

pub use manager::RemoteSession;
pub use state::SessionState;
pub use status::{SessionEvent, StatusClassification, StatusListener, StatusUpdate, classify};

#[cfg(test)]
mod tests;

//! Status updates handed to the caller

use std::sync::Arc;

use tokio::sync::mpsc;

use super::state::SessionState;
use crate::protocol::daap::{ContentCode, ResponseTree, codes};

/// Fields whose change counts as a metadata change
const METADATA_FIELDS: [ContentCode; 7] = [
    codes::CANN,
    codes::CANA,
    codes::CANL,
    codes::CANG,
    codes::CASH,
    codes::CARP,
    codes::CMVO,
];

/// What a status diff means for the caller
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusClassification {
    /// The current item id changed
    pub track_changed: bool,
    /// Play, pause or stop state changed
    pub play_state_changed: bool,
    /// Title, artist, album, genre, shuffle, repeat or volume changed
    pub metadata_changed: bool,
    /// Remaining time changed and nothing else of interest did
    pub progress_only: bool,
}

impl StatusClassification {
    /// A countdown update the caller can skip redrawing for
    #[must_use]
    pub fn is_ignorable_tick(&self) -> bool {
        self.progress_only
    }

    /// Nothing recognized changed
    #[must_use]
    pub fn is_noop(&self) -> bool {
        !self.track_changed
            && !self.play_state_changed
            && !self.metadata_changed
            && !self.progress_only
    }
}

/// Classify a status diff
///
/// Fields are looked up inside `cmst` when the diff has one, otherwise at
/// the root.
#[must_use]
pub fn classify(diff: &ResponseTree) -> StatusClassification {
    let status = diff.get_branch(&[codes::CMST]);
    let scope = if status.is_empty() { diff } else { status };

    let track_changed = scope.contains_leaf(codes::MIID) || scope.contains_leaf(codes::CANP);
    let play_state_changed = scope.contains_leaf(codes::CAPS);
    let metadata_changed = METADATA_FIELDS.iter().any(|c| scope.contains_leaf(*c));
    let progress_only = scope.contains_leaf(codes::CANT)
        && !track_changed
        && !play_state_changed
        && !metadata_changed;

    StatusClassification {
        track_changed,
        play_state_changed,
        metadata_changed,
        progress_only,
    }
}

/// One decoded play-status response
#[derive(Debug, Clone)]
pub struct StatusUpdate {
    /// Snapshot before this update; empty for the first one
    pub previous: Arc<ResponseTree>,
    /// Snapshot from this update
    pub current: Arc<ResponseTree>,
    /// Parts of `current` that differ from `previous`
    pub diff: ResponseTree,
    /// Classification of `diff`
    pub classification: StatusClassification,
    /// Server revision after this update
    pub revision: u32,
}

/// Receives status updates from the poll worker
///
/// Called on the worker task; implementations should hand the update off
/// rather than block.
pub trait StatusListener: Send + Sync {
    /// A status response was decoded
    fn on_status(&self, update: StatusUpdate);

    /// The session moved between states
    fn on_state_changed(&self, old: SessionState, new: SessionState) {
        let _ = (old, new);
    }
}

/// Updates and state changes forwarded over a channel
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// A status response was decoded
    Status(StatusUpdate),
    /// The session moved between states
    StateChanged {
        /// The previous state
        old: SessionState,
        /// The new state
        new: SessionState,
    },
}

impl StatusListener for mpsc::UnboundedSender<SessionEvent> {
    fn on_status(&self, update: StatusUpdate) {
        if self.send(SessionEvent::Status(update)).is_err() {
            tracing::trace!("status receiver dropped");
        }
    }

    fn on_state_changed(&self, old: SessionState, new: SessionState) {
        let _ = self.send(SessionEvent::StateChanged { old, new });
    }
}

//! Test support: a mock DACP server, a scripted transport and canned
//! DMAP bodies.

pub mod bodies;
pub mod mock_server;
pub mod scripted;


pub use mock_server::{MOCK_ARTWORK, MockDmapConfig, MockDmapServer, MockPlayer};
pub use scripted::{RecordedRequest, ScriptedReply, ScriptedTransport};

use crate::protocol::daap::{PlayStatusFields, encode_play_status};

/// Play-status body with a track, for scripted transports
#[must_use]
pub fn status_body(revision: u32, player_state: u8, item_id: u32, title: &str) -> Vec<u8> {
    status_body_with_remaining(revision, player_state, item_id, title, 60_000)
}

/// Like [`status_body`] with an explicit remaining time
#[must_use]
pub fn status_body_with_remaining(
    revision: u32,
    player_state: u8,
    item_id: u32,
    title: &str,
    remaining_ms: u32,
) -> Vec<u8> {
    encode_play_status(&PlayStatusFields {
        revision,
        player_state: Some(player_state),
        now_playing: Some([1, 1, 1, item_id]),
        title: Some(title),
        artist: Some("Artist"),
        album: Some("Album"),
        remaining_ms: Some(remaining_ms),
        total_ms: Some(180_000),
    })
}

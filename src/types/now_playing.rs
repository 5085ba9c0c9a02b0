//! Typed view of a play-status response

use byteorder::{BigEndian, ByteOrder};

use crate::protocol::daap::{ContentCode, NOW_PLAYING_LEN, ResponseTree, codes};

/// Player state reported in `caps`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayState {
    /// Nothing playing
    Stopped,
    /// Paused mid-track
    Paused,
    /// Playing
    Playing,
}

impl PlayState {
    /// Decode the wire value (2, 3 or 4)
    #[must_use]
    pub fn from_code(code: u64) -> Option<Self> {
        match code {
            2 => Some(Self::Stopped),
            3 => Some(Self::Paused),
            4 => Some(Self::Playing),
            _ => None,
        }
    }
}

/// Repeat mode reported in `carp`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RepeatMode {
    /// No repeat
    #[default]
    Off,
    /// Repeat current track
    One,
    /// Repeat entire playlist
    All,
}

impl RepeatMode {
    /// Decode the wire value (0, 1 or 2)
    #[must_use]
    pub fn from_code(code: u64) -> Option<Self> {
        match code {
            0 => Some(Self::Off),
            1 => Some(Self::One),
            2 => Some(Self::All),
            _ => None,
        }
    }
}

/// Ids packed into `canp`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NowPlayingIds {
    /// Database id
    pub database_id: u32,
    /// Playlist id
    pub playlist_id: u32,
    /// Playlist item id
    pub playlist_item_id: u32,
    /// Item id
    pub item_id: u32,
}

/// Snapshot of what the server is playing
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NowPlaying {
    /// Status revision (`cmsr`)
    pub revision: Option<u32>,
    /// Player state
    pub play_state: Option<PlayState>,
    /// Shuffle enabled
    pub shuffle: Option<bool>,
    /// Repeat mode
    pub repeat: Option<RepeatMode>,
    /// Volume 0..=100, when the server includes it
    pub volume: Option<u32>,
    /// Track title
    pub title: Option<String>,
    /// Artist
    pub artist: Option<String>,
    /// Album
    pub album: Option<String>,
    /// Genre
    pub genre: Option<String>,
    /// Ids of the playing item
    pub ids: Option<NowPlayingIds>,
    /// Item id derived from `canp`
    pub item_id: Option<u32>,
    /// Album persistent id as hex
    pub album_id: Option<String>,
    /// Time left in the track
    pub remaining_ms: Option<u32>,
    /// Track length
    pub total_ms: Option<u32>,
}

impl NowPlaying {
    /// Extract from a decoded status response
    ///
    /// Accepts the message root or the `cmst` scope itself. Missing fields
    /// stay `None`.
    #[must_use]
    pub fn from_status(tree: &ResponseTree) -> Self {
        let inner = tree.get_branch(&[codes::CMST]);
        let status = if inner.is_empty() { tree } else { inner };

        let u32_at = |code: ContentCode| {
            status
                .get_unsigned(&[code])
                .and_then(|v| u32::try_from(v).ok())
        };

        Self {
            revision: u32_at(codes::CMSR),
            play_state: status.get_unsigned(&[codes::CAPS]).and_then(PlayState::from_code),
            shuffle: status.get_unsigned(&[codes::CASH]).map(|v| v != 0),
            repeat: status.get_unsigned(&[codes::CARP]).and_then(RepeatMode::from_code),
            volume: u32_at(codes::CMVO),
            title: status.get_string(&[codes::CANN]),
            artist: status.get_string(&[codes::CANA]),
            album: status.get_string(&[codes::CANL]),
            genre: status.get_string(&[codes::CANG]),
            ids: status
                .get_leaf(&[codes::CANP])
                .and_then(|v| v.as_bytes())
                .and_then(unpack_ids),
            item_id: u32_at(codes::MIID),
            album_id: status.get_hex_identifier(&[codes::ASAI]),
            remaining_ms: u32_at(codes::CANT),
            total_ms: u32_at(codes::CAST),
        }
    }

    /// Whether the server reports playback in progress
    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.play_state == Some(PlayState::Playing)
    }

    /// Time played so far
    #[must_use]
    pub fn elapsed_ms(&self) -> Option<u32> {
        Some(self.total_ms?.saturating_sub(self.remaining_ms?))
    }

    /// Fraction played, 0.0..=1.0
    #[must_use]
    pub fn progress(&self) -> Option<f64> {
        let total = self.total_ms.filter(|t| *t > 0)?;
        Some(f64::from(self.elapsed_ms()?) / f64::from(total))
    }
}

fn unpack_ids(bytes: &[u8]) -> Option<NowPlayingIds> {
    if bytes.len() != NOW_PLAYING_LEN {
        return None;
    }
    Some(NowPlayingIds {
        database_id: BigEndian::read_u32(&bytes[0..4]),
        playlist_id: BigEndian::read_u32(&bytes[4..8]),
        playlist_item_id: BigEndian::read_u32(&bytes[8..12]),
        item_id: BigEndian::read_u32(&bytes[12..16]),
    })
}

//! DMAP encoding
//!
//! The client only ever sends one DMAP body itself (the pairing answer), but
//! mock servers and tests build full responses with this encoder.

use super::catalog::{ContentCode, codes};
use super::tree::ResponseTree;
use super::value::DmapValue;

/// DMAP encoder
#[derive(Debug, Default)]
pub struct DmapEncoder {
    buffer: Vec<u8>,
}

impl DmapEncoder {
    /// Create new encoder
    #[must_use]
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Encode a tag-value pair
    pub fn encode_value(&mut self, code: ContentCode, value: &DmapValue) {
        match value {
            DmapValue::String(s) => self.raw(code, s.as_bytes()),
            DmapValue::Signed { value, width } => {
                let bytes = value.to_be_bytes();
                self.raw(code, &bytes[8 - usize::from(*width).min(8)..]);
            }
            DmapValue::Unsigned { value, width } => {
                let bytes = value.to_be_bytes();
                self.raw(code, &bytes[8 - usize::from(*width).min(8)..]);
            }
            DmapValue::Boolean(b) => self.raw(code, &[u8::from(*b)]),
            DmapValue::Date(secs) => self.raw(code, &secs.to_be_bytes()),
            DmapValue::Version { major, minor } => {
                let mut bytes = [0u8; 4];
                bytes[..2].copy_from_slice(&major.to_be_bytes());
                bytes[2..].copy_from_slice(&minor.to_be_bytes());
                self.raw(code, &bytes);
            }
            DmapValue::Raw(data) => self.raw(code, data),
        }
    }

    /// Write a record with an arbitrary payload
    pub fn raw(&mut self, code: ContentCode, payload: &[u8]) {
        self.buffer.extend_from_slice(code.as_bytes());
        #[allow(clippy::cast_possible_truncation)]
        let len = payload.len() as u32;
        self.buffer.extend_from_slice(&len.to_be_bytes());
        self.buffer.extend_from_slice(payload);
    }

    /// Add string tag
    pub fn string(&mut self, code: ContentCode, value: &str) {
        self.raw(code, value.as_bytes());
    }

    /// Add 1-byte unsigned tag
    pub fn u8(&mut self, code: ContentCode, value: u8) {
        self.raw(code, &[value]);
    }

    /// Add 2-byte unsigned tag
    pub fn u16(&mut self, code: ContentCode, value: u16) {
        self.raw(code, &value.to_be_bytes());
    }

    /// Add 4-byte unsigned tag
    pub fn u32(&mut self, code: ContentCode, value: u32) {
        self.raw(code, &value.to_be_bytes());
    }

    /// Add 8-byte unsigned tag
    pub fn u64(&mut self, code: ContentCode, value: u64) {
        self.raw(code, &value.to_be_bytes());
    }

    /// Add a container whose body is written by `build`
    pub fn container(&mut self, code: ContentCode, build: impl FnOnce(&mut DmapEncoder)) {
        let mut inner = DmapEncoder::new();
        build(&mut inner);
        let inner_data = inner.finish();
        self.raw(code, &inner_data);
    }

    /// Encode every field of a tree into the current scope
    ///
    /// Leaves synthesized by the decoder (the item id derived from `canp`)
    /// are written like any other leaf.
    pub fn tree(&mut self, tree: &ResponseTree) {
        for (descriptor, value) in tree.leaves() {
            self.encode_value(descriptor.code(), value);
        }
        for (descriptor, child) in tree.branches() {
            self.container(descriptor.code(), |enc| enc.tree(child));
        }
        for (descriptor, children) in tree.multi_branches() {
            for child in children {
                self.container(descriptor.code(), |enc| enc.tree(child));
            }
        }
    }

    /// Bytes written so far
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Whether nothing has been written
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Finish encoding and return bytes
    #[must_use]
    pub fn finish(self) -> Vec<u8> {
        self.buffer
    }
}

/// Encode a tree as a standalone message
#[must_use]
pub fn encode_tree(tree: &ResponseTree) -> Vec<u8> {
    let mut encoder = DmapEncoder::new();
    encoder.tree(tree);
    encoder.finish()
}

/// Encode a `cmst` play-status body
///
/// Convenience for mock servers; only the fields given are written.
#[must_use]
pub fn encode_play_status(status: &PlayStatusFields<'_>) -> Vec<u8> {
    let mut encoder = DmapEncoder::new();
    encoder.container(codes::CMST, |enc| {
        enc.u32(codes::MSTT, 200);
        enc.u32(codes::CMSR, status.revision);
        if let Some(state) = status.player_state {
            enc.u8(codes::CAPS, state);
        }
        if let Some([db, playlist, playlist_item, item]) = status.now_playing {
            let mut packed = Vec::with_capacity(16);
            for id in [db, playlist, playlist_item, item] {
                packed.extend_from_slice(&id.to_be_bytes());
            }
            enc.raw(codes::CANP, &packed);
        }
        if let Some(title) = status.title {
            enc.string(codes::CANN, title);
        }
        if let Some(artist) = status.artist {
            enc.string(codes::CANA, artist);
        }
        if let Some(album) = status.album {
            enc.string(codes::CANL, album);
        }
        if let Some(remaining) = status.remaining_ms {
            enc.u32(codes::CANT, remaining);
        }
        if let Some(total) = status.total_ms {
            enc.u32(codes::CAST, total);
        }
    });
    encoder.finish()
}

/// Fields written by [`encode_play_status`]
#[derive(Debug, Clone, Copy, Default)]
pub struct PlayStatusFields<'a> {
    /// `cmsr`
    pub revision: u32,
    /// `caps` (2 stopped, 3 paused, 4 playing)
    pub player_state: Option<u8>,
    /// `canp` as database, playlist, playlist item and item ids
    pub now_playing: Option<[u32; 4]>,
    /// `cann`
    pub title: Option<&'a str>,
    /// `cana`
    pub artist: Option<&'a str>,
    /// `canl`
    pub album: Option<&'a str>,
    /// `cant`
    pub remaining_ms: Option<u32>,
    /// `cast`
    pub total_ms: Option<u32>,
}

//! Canned DMAP response bodies
//!
//! Shared by the mock server and by tests that script a transport.

use crate::protocol::daap::{DmapEncoder, codes};

/// `msrv` body answering `/server-info`
#[must_use]
pub fn server_info(name: &str) -> Vec<u8> {
    let mut enc = DmapEncoder::new();
    enc.container(codes::MSRV, |e| {
        e.u32(codes::MSTT, 200);
        e.string(codes::MINM, name);
    });
    enc.finish()
}

/// `mlog` body answering `/login`
#[must_use]
pub fn login(session_id: u32) -> Vec<u8> {
    let mut enc = DmapEncoder::new();
    enc.container(codes::MLOG, |e| {
        e.u32(codes::MSTT, 200);
        e.u32(codes::MLID, session_id);
    });
    enc.finish()
}

/// `avdb` body listing one library database
#[must_use]
pub fn databases(database_id: u32, persistent_id: u64, name: &str) -> Vec<u8> {
    let mut enc = DmapEncoder::new();
    enc.container(codes::AVDB, |e| {
        e.u32(codes::MSTT, 200);
        e.u32(codes::MRCO, 1);
        e.container(codes::MLCL, |list| {
            list.container(codes::MLIT, |item| {
                item.u32(codes::MIID, database_id);
                item.u64(codes::MPER, persistent_id);
                item.string(codes::MINM, name);
            });
        });
    });
    enc.finish()
}

/// One song in an [`items`] listing
#[derive(Debug, Clone, Default)]
pub struct SongRow {
    /// `miid`
    pub item_id: u32,
    /// `minm`
    pub name: String,
    /// `asar`
    pub artist: String,
    /// `asal`
    pub album: String,
    /// `astm` in milliseconds
    pub duration_ms: u32,
    /// `asur`
    pub rating: u8,
}

/// `adbs` body answering an item lookup or search
#[must_use]
pub fn items(rows: &[SongRow]) -> Vec<u8> {
    let mut enc = DmapEncoder::new();
    enc.container(codes::ADBS, |e| {
        e.u32(codes::MSTT, 200);
        e.u32(codes::MRCO, u32::try_from(rows.len()).unwrap_or(u32::MAX));
        e.container(codes::MLCL, |list| {
            for row in rows {
                list.container(codes::MLIT, |item| {
                    item.u32(codes::MIID, row.item_id);
                    item.string(codes::MINM, &row.name);
                    item.string(codes::ASAR, &row.artist);
                    item.string(codes::ASAL, &row.album);
                    item.u32(codes::ASTM, row.duration_ms);
                    item.u8(codes::ASUR, row.rating);
                });
            }
        });
    });
    enc.finish()
}

/// `cmgt` body answering a volume query
#[must_use]
pub fn volume(level: u8) -> Vec<u8> {
    let mut enc = DmapEncoder::new();
    enc.container(codes::CMGT, |e| {
        e.u32(codes::MSTT, 200);
        e.u32(codes::CMVO, u32::from(level));
    });
    enc.finish()
}

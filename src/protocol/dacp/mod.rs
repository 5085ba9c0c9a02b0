//! DACP (Digital Audio Control Protocol) requests sent by a remote

mod commands;
mod request;

pub use commands::{CTRL_INT_PREFIX, DacpCommand};
pub use request::{
    MAX_PERCENT, REFRESH_REVISION, RequestEncoder, RequestTarget, SearchField, SearchPredicate,
    escape_query_value, render_query,
};

/// Default DACP port
pub const DACP_DEFAULT_PORT: u16 = 3689;

/// Metadata fields requested for item lookups unless configured otherwise
pub const DEFAULT_ITEM_META: &[&str] = &[
    "dmap.itemname",
    "dmap.itemid",
    "daap.songartist",
    "daap.songalbum",
    "daap.songgenre",
    "daap.songtime",
    "daap.songuserrating",
    "dmap.persistentid",
];

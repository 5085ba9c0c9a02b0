//! DAAP/DMAP response decoding
//!
//! DMAP bodies are trees of tag-length-value records. The [`FieldCatalog`]
//! says how each four-byte code is laid out, the [`DmapDecoder`] turns bytes
//! into a [`ResponseTree`], and [`diff`] reports what changed between two
//! snapshots.

mod catalog;
mod decoder;
mod diff;
mod encoder;
mod tree;
mod value;

#[cfg(test)]
mod tests;

pub use catalog::{
    BUILTIN_FIELDS, CatalogError, ContentCode, FieldCatalog, FieldDescriptor, ValueKind, codes,
};
pub use decoder::{
    DecodeError, Decoded, DmapDecoder, FieldAnomaly, HEADER_LEN, MAX_DEPTH, NOW_PLAYING_LEN,
    decode_integer, guess_payload,
};
pub use diff::diff;
pub use encoder::{DmapEncoder, PlayStatusFields, encode_play_status, encode_tree};
pub use tree::{ResponseTree, TreeError};
pub use value::DmapValue;

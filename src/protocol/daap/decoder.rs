//! DMAP binary decoder
//!
//! A message is a sequence of `code(4) | length(4, big-endian) | payload`
//! records. Container payloads are themselves record sequences. Truncation
//! anywhere aborts the whole message; anomalies confined to one field are
//! recorded and decoding carries on with its siblings.

use std::io::Read;

use byteorder::{BigEndian, ByteOrder};

use super::catalog::{ContentCode, FieldCatalog, FieldDescriptor, ValueKind, codes};
use super::tree::{ResponseTree, TreeError};
use super::value::DmapValue;

/// Record header size: code + length
pub const HEADER_LEN: usize = 8;

/// Payload size of the packed `canp` now-playing field
pub const NOW_PLAYING_LEN: usize = 16;

/// Nesting limit for container recursion
pub const MAX_DEPTH: usize = 64;

/// Fatal decode failures
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// Fewer bytes than a header or length prefix promises
    #[error("truncated message{}: needed {needed} bytes, {available} available", code_suffix(.code))]
    Truncated {
        /// Field being read, if its header was complete
        code: Option<ContentCode>,
        /// Bytes required
        needed: usize,
        /// Bytes left in the enclosing scope
        available: usize,
    },

    /// Containers nested deeper than [`MAX_DEPTH`]
    #[error("containers nested deeper than {0}")]
    TooDeep(usize),

    /// Catalog routed a field into the wrong slot
    #[error(transparent)]
    Tree(#[from] TreeError),

    /// Reading the body failed
    #[error("I/O error while reading message: {0}")]
    Io(#[from] std::io::Error),
}

fn code_suffix(code: &Option<ContentCode>) -> String {
    code.map(|c| format!(" in {c}")).unwrap_or_default()
}

/// Non-fatal, per-field decode anomaly
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldAnomaly {
    /// Code not in the catalog; `guess` is a diagnostic rendering only
    UnknownField {
        /// The unknown code
        code: ContentCode,
        /// Payload length
        length: usize,
        /// Heuristic rendering of the payload
        guess: String,
    },
    /// Integer field whose length is not 1, 2, 4 or 8
    BadIntegerLength {
        /// The field
        code: ContentCode,
        /// Payload length
        length: usize,
    },
    /// Fixed-size field (boolean, date, version) with the wrong length
    BadFixedLength {
        /// The field
        code: ContentCode,
        /// Required length
        expected: usize,
        /// Payload length
        actual: usize,
    },
    /// Packed field with the wrong length; derived leaves were skipped
    BadSpecialLength {
        /// The field
        code: ContentCode,
        /// Required length
        expected: usize,
        /// Payload length
        actual: usize,
    },
}

/// Decoded tree plus the anomalies met on the way
#[derive(Debug, Clone, Default)]
pub struct Decoded {
    /// Root scope
    pub tree: ResponseTree,
    /// Per-field anomalies, in wire order
    pub anomalies: Vec<FieldAnomaly>,
}

/// Recursive-descent DMAP decoder
#[derive(Debug, Clone, Copy)]
pub struct DmapDecoder<'a> {
    catalog: &'a FieldCatalog,
}

impl Default for DmapDecoder<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl DmapDecoder<'static> {
    /// Decoder over the built-in catalog
    #[must_use]
    pub fn new() -> Self {
        Self {
            catalog: FieldCatalog::builtin(),
        }
    }
}

impl<'a> DmapDecoder<'a> {
    /// Decoder over a custom catalog
    #[must_use]
    pub fn with_catalog(catalog: &'a FieldCatalog) -> Self {
        Self { catalog }
    }

    /// Decode a complete message
    ///
    /// # Errors
    ///
    /// Returns `DecodeError` if the message is truncated or nested too deeply.
    pub fn decode(&self, data: &[u8]) -> Result<ResponseTree, DecodeError> {
        self.decode_with_diagnostics(data).map(|d| d.tree)
    }

    /// Decode a complete message, keeping per-field anomalies
    ///
    /// # Errors
    ///
    /// Returns `DecodeError` if the message is truncated or nested too deeply.
    pub fn decode_with_diagnostics(&self, data: &[u8]) -> Result<Decoded, DecodeError> {
        let mut anomalies = Vec::new();
        let tree = self.decode_scope(data, 0, &mut anomalies)?;
        Ok(Decoded { tree, anomalies })
    }

    /// Read exactly `total_len` bytes from `reader` and decode them
    ///
    /// # Errors
    ///
    /// Returns `DecodeError::Truncated` if the reader ends early, or any
    /// error from [`decode`](Self::decode).
    pub fn decode_reader<R: Read>(
        &self,
        reader: R,
        total_len: usize,
    ) -> Result<ResponseTree, DecodeError> {
        let mut buf = Vec::with_capacity(total_len);
        reader.take(total_len as u64).read_to_end(&mut buf)?;
        if buf.len() < total_len {
            return Err(DecodeError::Truncated {
                code: None,
                needed: total_len,
                available: buf.len(),
            });
        }
        self.decode(&buf)
    }

    fn decode_scope(
        &self,
        mut data: &[u8],
        depth: usize,
        anomalies: &mut Vec<FieldAnomaly>,
    ) -> Result<ResponseTree, DecodeError> {
        if depth > MAX_DEPTH {
            return Err(DecodeError::TooDeep(MAX_DEPTH));
        }

        let mut tree = ResponseTree::new();

        while !data.is_empty() {
            if data.len() < HEADER_LEN {
                return Err(DecodeError::Truncated {
                    code: None,
                    needed: HEADER_LEN,
                    available: data.len(),
                });
            }

            let code = ContentCode([data[0], data[1], data[2], data[3]]);
            let len = BigEndian::read_u32(&data[4..8]) as usize;
            data = &data[HEADER_LEN..];

            if len > data.len() {
                return Err(DecodeError::Truncated {
                    code: Some(code),
                    needed: len,
                    available: data.len(),
                });
            }

            let (payload, rest) = data.split_at(len);
            data = rest;

            match self.catalog.lookup(code) {
                Some(descriptor) => {
                    self.decode_field(*descriptor, payload, depth, &mut tree, anomalies)?;
                }
                None => {
                    let guess = guess_payload(payload);
                    tracing::debug!(%code, length = len, %guess, "skipping unknown DMAP field");
                    anomalies.push(FieldAnomaly::UnknownField {
                        code,
                        length: len,
                        guess,
                    });
                }
            }
        }

        Ok(tree)
    }

    fn decode_field(
        &self,
        descriptor: FieldDescriptor,
        payload: &[u8],
        depth: usize,
        tree: &mut ResponseTree,
        anomalies: &mut Vec<FieldAnomaly>,
    ) -> Result<(), DecodeError> {
        let code = descriptor.code();
        match descriptor.kind() {
            ValueKind::List | ValueKind::MultiList => {
                let child = self.decode_scope(payload, depth + 1, anomalies)?;
                tree.add_child(descriptor, child)?;
            }
            ValueKind::String => {
                let text = String::from_utf8_lossy(payload).into_owned();
                tree.add_value(descriptor, DmapValue::String(text))?;
            }
            kind @ (ValueKind::U8
            | ValueKind::I8
            | ValueKind::U16
            | ValueKind::I16
            | ValueKind::U32
            | ValueKind::I32
            | ValueKind::U64
            | ValueKind::I64) => match decode_integer(payload, kind.is_signed()) {
                Some(value) => tree.add_value(descriptor, value)?,
                None => {
                    tracing::warn!(%code, length = payload.len(), "invalid integer length");
                    anomalies.push(FieldAnomaly::BadIntegerLength {
                        code,
                        length: payload.len(),
                    });
                }
            },
            ValueKind::Boolean => {
                if let [b] = payload {
                    tree.add_value(descriptor, DmapValue::Boolean(*b != 0))?;
                } else {
                    record_fixed_length(code, 1, payload.len(), anomalies);
                }
            }
            ValueKind::Date => {
                if payload.len() == 4 {
                    tree.add_value(descriptor, DmapValue::Date(BigEndian::read_u32(payload)))?;
                } else {
                    record_fixed_length(code, 4, payload.len(), anomalies);
                }
            }
            ValueKind::Version => {
                if payload.len() == 4 {
                    let value = DmapValue::Version {
                        major: BigEndian::read_u16(&payload[0..2]),
                        minor: BigEndian::read_u16(&payload[2..4]),
                    };
                    tree.add_value(descriptor, value)?;
                } else {
                    record_fixed_length(code, 4, payload.len(), anomalies);
                }
            }
            ValueKind::Special => self.decode_special(descriptor, payload, tree, anomalies)?,
        }
        Ok(())
    }

    fn decode_special(
        &self,
        descriptor: FieldDescriptor,
        payload: &[u8],
        tree: &mut ResponseTree,
        anomalies: &mut Vec<FieldAnomaly>,
    ) -> Result<(), DecodeError> {
        let code = descriptor.code();
        tree.add_value(descriptor, DmapValue::Raw(payload.to_vec()))?;

        if code != codes::CANP {
            return Ok(());
        }

        // database id, playlist id, playlist item id, item id
        if payload.len() != NOW_PLAYING_LEN {
            tracing::warn!(
                %code,
                expected = NOW_PLAYING_LEN,
                actual = payload.len(),
                "now-playing field has unexpected length"
            );
            anomalies.push(FieldAnomaly::BadSpecialLength {
                code,
                expected: NOW_PLAYING_LEN,
                actual: payload.len(),
            });
            return Ok(());
        }

        if let Some(item_id) = self.catalog.lookup(codes::MIID) {
            let id = BigEndian::read_u32(&payload[12..16]);
            tree.add_value(*item_id, DmapValue::unsigned(u64::from(id), 4))?;
        }
        Ok(())
    }
}

fn record_fixed_length(
    code: ContentCode,
    expected: usize,
    actual: usize,
    anomalies: &mut Vec<FieldAnomaly>,
) {
    tracing::warn!(%code, expected, actual, "fixed-size field has unexpected length");
    anomalies.push(FieldAnomaly::BadFixedLength {
        code,
        expected,
        actual,
    });
}

/// Big-endian integer sized by the payload length
#[must_use]
#[allow(clippy::cast_possible_wrap)]
pub fn decode_integer(payload: &[u8], signed: bool) -> Option<DmapValue> {
    #[allow(clippy::cast_possible_truncation)]
    let width = payload.len() as u8;
    let value = match (payload.len(), signed) {
        (1, false) => DmapValue::unsigned(u64::from(payload[0]), width),
        (1, true) => DmapValue::signed(i64::from(payload[0] as i8), width),
        (2, false) => DmapValue::unsigned(u64::from(BigEndian::read_u16(payload)), width),
        (2, true) => DmapValue::signed(i64::from(BigEndian::read_i16(payload)), width),
        (4, false) => DmapValue::unsigned(u64::from(BigEndian::read_u32(payload)), width),
        (4, true) => DmapValue::signed(i64::from(BigEndian::read_i32(payload)), width),
        (8, false) => DmapValue::unsigned(BigEndian::read_u64(payload), width),
        (8, true) => DmapValue::signed(BigEndian::read_i64(payload), width),
        _ => return None,
    };
    Some(value)
}

/// Diagnostic rendering of a payload whose type is unknown
///
/// Tries an integer reading for 1/2/4/8-byte payloads, then UTF-8 text.
/// The result is for logs only.
#[must_use]
pub fn guess_payload(payload: &[u8]) -> String {
    if let Some(value) = decode_integer(payload, false) {
        return format!("int {value}");
    }
    match std::str::from_utf8(payload) {
        Ok(text) => format!("text {text:?}"),
        Err(_) => format!("{} opaque bytes", payload.len()),
    }
}

mod catalog;
mod decoder;

use super::{ContentCode, DmapValue, FieldCatalog, FieldDescriptor, ResponseTree};

/// Built-in descriptor for a code known to be in the table
fn descriptor(code: ContentCode) -> FieldDescriptor {
    *FieldCatalog::builtin()
        .lookup(code)
        .unwrap_or_else(|| panic!("{code} missing from built-in catalog"))
}

/// Raw TLV record
fn record(code: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(8 + payload.len());
    out.extend_from_slice(code);
    out.extend_from_slice(&u32::try_from(payload.len()).unwrap().to_be_bytes());
    out.extend_from_slice(payload);
    out
}

/// Tree with the given leaves in its root scope
fn leaves(values: &[(ContentCode, DmapValue)]) -> ResponseTree {
    let mut tree = ResponseTree::new();
    for (code, value) in values {
        tree.add_value(descriptor(*code), value.clone()).unwrap();
    }
    tree
}

//! Decoded DMAP response tree

use std::collections::HashMap;
use std::fmt::{self, Write};
use std::sync::LazyLock;

use super::catalog::{ContentCode, FieldDescriptor, ValueKind};
use super::value::DmapValue;

static EMPTY_TREE: LazyLock<ResponseTree> = LazyLock::new(ResponseTree::default);

/// Rejected write into a tree
#[derive(Debug, Clone, thiserror::Error)]
pub enum TreeError {
    /// A container field was given a scalar or a scalar field a container
    #[error("field {code} of kind {kind:?} cannot hold a {slot}")]
    MisplacedField {
        /// The offending code
        code: ContentCode,
        /// Its declared kind
        kind: ValueKind,
        /// What the caller tried to store
        slot: &'static str,
    },
}

/// One nested scope of a decoded message
///
/// Scalars, single nested containers and repeated containers live in three
/// separate maps keyed by descriptor. Which map a field lands in is decided
/// by its declared kind, never by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseTree {
    leaves: HashMap<FieldDescriptor, DmapValue>,
    branches: HashMap<FieldDescriptor, ResponseTree>,
    multi_branches: HashMap<FieldDescriptor, Vec<ResponseTree>>,
}

impl ResponseTree {
    /// Create an empty tree
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared empty tree returned for missing branches
    #[must_use]
    pub fn empty() -> &'static ResponseTree {
        &EMPTY_TREE
    }

    // ===== Write side =====

    /// Store a scalar under a leaf-kind descriptor
    ///
    /// # Errors
    ///
    /// Returns `TreeError::MisplacedField` if the descriptor is a container.
    pub fn add_value(
        &mut self,
        descriptor: FieldDescriptor,
        value: DmapValue,
    ) -> Result<(), TreeError> {
        if !descriptor.is_leaf() {
            return Err(TreeError::MisplacedField {
                code: descriptor.code(),
                kind: descriptor.kind(),
                slot: "scalar value",
            });
        }
        self.leaves.insert(descriptor, value);
        Ok(())
    }

    /// Attach a nested tree under a container descriptor
    ///
    /// Single containers replace any earlier child; repeated containers
    /// append, keeping wire order.
    ///
    /// # Errors
    ///
    /// Returns `TreeError::MisplacedField` if the descriptor is a scalar kind.
    pub fn add_child(
        &mut self,
        descriptor: FieldDescriptor,
        child: ResponseTree,
    ) -> Result<(), TreeError> {
        match descriptor.kind() {
            ValueKind::List => {
                self.branches.insert(descriptor, child);
                Ok(())
            }
            ValueKind::MultiList => {
                self.multi_branches.entry(descriptor).or_default().push(child);
                Ok(())
            }
            kind => Err(TreeError::MisplacedField {
                code: descriptor.code(),
                kind,
                slot: "nested tree",
            }),
        }
    }

    /// Store a whole repeated-children sequence, replacing any existing one
    ///
    /// # Errors
    ///
    /// Returns `TreeError::MisplacedField` unless the descriptor is a repeated container.
    pub fn set_children(
        &mut self,
        descriptor: FieldDescriptor,
        children: Vec<ResponseTree>,
    ) -> Result<(), TreeError> {
        if !descriptor.is_nested_multi() {
            return Err(TreeError::MisplacedField {
                code: descriptor.code(),
                kind: descriptor.kind(),
                slot: "repeated tree sequence",
            });
        }
        self.multi_branches.insert(descriptor, children);
        Ok(())
    }

    // ===== Read side =====

    /// True if the tree holds nothing at all
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty() && self.branches.is_empty() && self.multi_branches.is_empty()
    }

    /// True if this scope has a scalar under `code`
    #[must_use]
    pub fn contains_leaf(&self, code: ContentCode) -> bool {
        self.leaves.contains_key(&code)
    }

    /// Scalar in this scope
    #[must_use]
    pub fn leaf(&self, code: ContentCode) -> Option<&DmapValue> {
        self.leaves.get(&code)
    }

    /// Follow `path` through single containers; the last segment names a leaf
    #[must_use]
    pub fn get_leaf(&self, path: &[ContentCode]) -> Option<&DmapValue> {
        self.get_leaf_entry(path).map(|(_, v)| v)
    }

    fn get_leaf_entry(&self, path: &[ContentCode]) -> Option<(&FieldDescriptor, &DmapValue)> {
        let (last, parents) = path.split_last()?;
        self.get_branch(parents).leaves.get_key_value(last)
    }

    /// Follow `path` through single containers
    ///
    /// A missing segment yields the shared empty tree, so chained lookups
    /// never need to check each hop.
    #[must_use]
    pub fn get_branch(&self, path: &[ContentCode]) -> &ResponseTree {
        let mut node = self;
        for code in path {
            match node.branches.get(code) {
                Some(child) => node = child,
                None => return ResponseTree::empty(),
            }
        }
        node
    }

    /// Repeated containers at the end of `path`, or an empty slice
    #[must_use]
    pub fn get_multi_branch(&self, path: &[ContentCode]) -> &[ResponseTree] {
        let Some((last, parents)) = path.split_last() else {
            return &[];
        };
        self.get_branch(parents)
            .multi_branches
            .get(last)
            .map_or(&[], Vec::as_slice)
    }

    /// Text at `path`, converting other scalars to their display form
    #[must_use]
    pub fn get_string(&self, path: &[ContentCode]) -> Option<String> {
        let (descriptor, value) = self.get_leaf_entry(path)?;
        if !descriptor.is_string() {
            warn_kind_mismatch(descriptor, "string");
        }
        Some(match value {
            DmapValue::String(s) => s.clone(),
            other => other.to_string(),
        })
    }

    /// 32-bit integer at `path`
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn get_int(&self, path: &[ContentCode]) -> Option<i32> {
        self.get_integer(path, "int").map(|v| v as i32)
    }

    /// 64-bit integer at `path`
    #[must_use]
    pub fn get_long(&self, path: &[ContentCode]) -> Option<i64> {
        self.get_integer(path, "long")
    }

    /// 16-bit integer at `path`
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn get_short(&self, path: &[ContentCode]) -> Option<i16> {
        self.get_integer(path, "short").map(|v| v as i16)
    }

    /// Unsigned integer at `path`, without sign reinterpretation
    #[must_use]
    pub fn get_unsigned(&self, path: &[ContentCode]) -> Option<u64> {
        let (descriptor, value) = self.get_leaf_entry(path)?;
        if !descriptor.is_integer_family() {
            warn_kind_mismatch(descriptor, "unsigned");
        }
        value.as_u64()
    }

    /// Identifier at `path` as zero-padded uppercase hex
    #[must_use]
    pub fn get_hex_identifier(&self, path: &[ContentCode]) -> Option<String> {
        let (descriptor, value) = self.get_leaf_entry(path)?;
        if !descriptor.is_integer_family() && !descriptor.is_special() {
            warn_kind_mismatch(descriptor, "hex identifier");
        }
        value
            .to_hex()
            .or_else(|| value.as_u64().map(|v| format!("{v:016X}")))
    }

    fn get_integer(&self, path: &[ContentCode], accessor: &'static str) -> Option<i64> {
        let (descriptor, value) = self.get_leaf_entry(path)?;
        if !descriptor.is_integer_family() {
            warn_kind_mismatch(descriptor, accessor);
        }
        value.as_i64()
    }

    /// Scalars in this scope
    pub fn leaves(&self) -> impl Iterator<Item = (&FieldDescriptor, &DmapValue)> {
        self.leaves.iter()
    }

    /// Single nested containers in this scope
    pub fn branches(&self) -> impl Iterator<Item = (&FieldDescriptor, &ResponseTree)> {
        self.branches.iter()
    }

    /// Repeated containers in this scope
    pub fn multi_branches(&self) -> impl Iterator<Item = (&FieldDescriptor, &[ResponseTree])> {
        self.multi_branches.iter().map(|(d, v)| (d, v.as_slice()))
    }

    /// Indented multi-line rendering, sorted by code, for logs
    #[must_use]
    pub fn dump(&self) -> String {
        let mut out = String::new();
        self.dump_into(&mut out, 0);
        out
    }

    fn dump_into(&self, out: &mut String, depth: usize) {
        let pad = "  ".repeat(depth);
        let mut leaves: Vec<_> = self.leaves.iter().collect();
        leaves.sort_by_key(|(d, _)| d.code());
        for (d, v) in leaves {
            let _ = writeln!(out, "{pad}{} = {v}", d.code());
        }
        let mut branches: Vec<_> = self.branches.iter().collect();
        branches.sort_by_key(|(d, _)| d.code());
        for (d, child) in branches {
            let _ = writeln!(out, "{pad}{}:", d.code());
            child.dump_into(out, depth + 1);
        }
        let mut multi: Vec<_> = self.multi_branches.iter().collect();
        multi.sort_by_key(|(d, _)| d.code());
        for (d, children) in multi {
            for (i, child) in children.iter().enumerate() {
                let _ = writeln!(out, "{pad}{}[{i}]:", d.code());
                child.dump_into(out, depth + 1);
            }
        }
    }
}

impl fmt::Display for ResponseTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.dump())
    }
}

fn warn_kind_mismatch(descriptor: &FieldDescriptor, accessor: &str) {
    tracing::warn!(
        field = %descriptor,
        kind = ?descriptor.kind(),
        accessor,
        "accessor does not match declared field kind"
    );
}

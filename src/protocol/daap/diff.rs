//! Structural diff between two decoded responses

use super::tree::ResponseTree;

/// Parts of `current` that are new or different from `previous`
///
/// Leaves are compared by value. Single containers are diffed recursively
/// and kept only when something inside changed. Repeated containers carry no
/// stable key to match elements by, so a sequence that differs in any way
/// is copied whole. Fields that disappeared are not reported.
#[must_use]
pub fn diff(previous: &ResponseTree, current: &ResponseTree) -> ResponseTree {
    let mut out = ResponseTree::new();

    for (descriptor, value) in current.leaves() {
        if previous.leaf(descriptor.code()) != Some(value) {
            // Descriptor came out of a tree, so it is a leaf kind.
            let _ = out.add_value(*descriptor, value.clone());
        }
    }

    for (descriptor, child) in current.branches() {
        let before = previous.get_branch(&[descriptor.code()]);
        let changed = diff(before, child);
        if !changed.is_empty() {
            let _ = out.add_child(*descriptor, changed);
        }
    }

    for (descriptor, children) in current.multi_branches() {
        if previous.get_multi_branch(&[descriptor.code()]) != children {
            let _ = out.set_children(*descriptor, children.to_vec());
        }
    }

    out
}

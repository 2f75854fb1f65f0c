//! Mutation records.

use crate::graph::UnitId;
use crate::tree::{AttrMap, AttrPatch};

/// What an `Update` record changes on its host node.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdatePayload {
    /// Changed attributes; removed keys map to `None`.
    Attributes(AttrPatch),
    /// New text content.
    Text(String),
}

/// One host mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum MutationOp {
    /// Create the host node for `target` and attach it. `anchor` is the
    /// unit whose host node the new one is inserted before, when the
    /// target's nearest host ancestor already exists; nested creations
    /// are attached by their creating ancestor instead.
    Create { anchor: Option<UnitId> },

    /// Change attributes or text of an existing host node.
    Update(UpdatePayload),

    /// Reposition an existing host node among its siblings.
    Move { index: usize },

    /// Remove the target's whole subtree from the host. The target is a
    /// unit of the previous generation.
    Delete,
}

/// An instruction describing one change to apply to the host structure.
///
/// Produced by the differ, applied exactly once by the commit executor in
/// the order produced (depth first, children before a parent's own
/// record), then discarded.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationRecord {
    pub target: UnitId,
    pub op: MutationOp,
}

impl MutationRecord {
    pub fn is_create(&self) -> bool {
        matches!(self.op, MutationOp::Create { .. })
    }

    pub fn is_update(&self) -> bool {
        matches!(self.op, MutationOp::Update(_))
    }

    pub fn is_move(&self) -> bool {
        matches!(self.op, MutationOp::Move { .. })
    }

    pub fn is_delete(&self) -> bool {
        matches!(self.op, MutationOp::Delete)
    }
}

/// Shallow key-by-key attribute comparison. Keys present in `old` but
/// absent from `new` are recorded as removals; an unchanged map yields an
/// empty patch, which callers elide.
pub fn diff_attributes(old: &AttrMap, new: &AttrMap) -> AttrPatch {
    let mut patch = AttrPatch::new();
    for (name, value) in new {
        if old.get(name) != Some(value) {
            patch.insert(name.clone(), Some(value.clone()));
        }
    }
    for name in old.keys() {
        if !new.contains_key(name) {
            patch.insert(name.clone(), None);
        }
    }
    patch
}

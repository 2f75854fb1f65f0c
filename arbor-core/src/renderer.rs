//! Renderer Interface
//!
//! The reconciler never touches the host structure directly. The commit
//! executor drives a host-implemented [`Renderer`], one call per mutation
//! record, so the engine stays independent of what a "node" actually is
//! (a DOM element, a terminal cell region, a retained scene-graph entry).
//!
//! # Contract
//!
//! - `Handle` is a cheap, cloneable identifier for one host node. The
//!   engine stores handles in its work units and hands them back for
//!   updates, moves and removals; it never inspects them.
//! - Child indices refer to the parent's child list at the time of the
//!   call. Records are applied in the order produced, so an index is
//!   always consistent with the mutations applied before it.
//! - Every operation is fallible. The first failure stops the commit at
//!   that record; the engine does not retry.

use crate::error::HostError;
use crate::tree::{AttrMap, AttrPatch};

/// Host backend consumed by the commit executor.
pub trait Renderer {
    /// Backend-specific node handle. Handles end up in node refs that
    /// host event threads may read, hence `Send`.
    type Handle: Clone + Send + std::fmt::Debug + 'static;

    /// Create a host node for an element description.
    fn create_element(&mut self, tag: &str, attrs: &AttrMap) -> Result<Self::Handle, HostError>;

    /// Create a host text node.
    fn create_text(&mut self, content: &str) -> Result<Self::Handle, HostError>;

    /// Apply an attribute patch. Entries with a `None` value are removals.
    fn update_attributes(
        &mut self,
        handle: &Self::Handle,
        patch: &AttrPatch,
    ) -> Result<(), HostError>;

    /// Replace a text node's content.
    fn set_text(&mut self, handle: &Self::Handle, content: &str) -> Result<(), HostError>;

    /// Append `child` at the end of `parent`'s child list.
    fn append_child(&mut self, parent: &Self::Handle, child: &Self::Handle)
        -> Result<(), HostError>;

    /// Insert `child` into `parent` directly before `anchor`, or append
    /// when no anchor is given.
    fn insert_before(
        &mut self,
        parent: &Self::Handle,
        child: &Self::Handle,
        anchor: Option<&Self::Handle>,
    ) -> Result<(), HostError>;

    /// Move an existing child of `parent` to `index`.
    fn move_child(
        &mut self,
        parent: &Self::Handle,
        child: &Self::Handle,
        index: usize,
    ) -> Result<(), HostError>;

    /// Detach `child` (and its whole host subtree) from `parent`.
    fn remove_child(&mut self, parent: &Self::Handle, child: &Self::Handle)
        -> Result<(), HostError>;
}

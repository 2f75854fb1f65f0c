//! Tree Description Model
//!
//! A description is an immutable value tree stating what the UI should
//! look like after the next commit. Components produce a fresh
//! description on every render; the differ compares it against the
//! previously committed one and derives mutations, so descriptions are
//! never patched in place.
//!
//! # Node kinds
//!
//! [`TreeNode`] is a closed tagged variant:
//!
//! - `Element`: a host node with a string tag (`"div"`, `"row"`, ...).
//! - `Text`: a host text node.
//! - `Component`: a function from its own description to a child
//!   description. Two component nodes are the same kind only when they
//!   wrap the same function (pointer identity), never by name.
//! - `Fragment`: groups children without producing a host node.
//!
//! # Identity
//!
//! `key` is an optional identity hint, unique among siblings and stable
//! across renders. Keyed children are matched by key during child
//! reconciliation; everything else matches positionally.

mod node;

pub use node::{
    AttrMap, AttrPatch, AttrValue, ComponentFn, ErrorBoundary, NodeKind, NodeRef, TreeNode,
};

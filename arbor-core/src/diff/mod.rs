//! Differ
//!
//! The differ walks the previously committed work-unit tree and a fresh
//! description pairwise and produces tagged mutation records. The
//! heuristic is linear, not globally minimal:
//!
//! 1. Different kinds at the same position are assumed to produce
//!    unrelated subtrees: delete the old one, mount the new one, never
//!    diff their children against each other.
//! 2. Same kinds update in place: a shallow attribute (or text) compare,
//!    then child reconciliation.
//! 3. Children match by key first; a key match always wins over a
//!    positional one, which is what preserves per-child state across
//!    reorders. Keyless children match only the keyless old child at the
//!    same index. Old children left unmatched are deleted.
//!
//! Duplicate keys among siblings are a caller error: the engine logs a
//! warning and treats the later occurrence as keyless. Keyless children
//! in a fully reordering list are not guaranteed to keep their state;
//! positional matching may legitimately misattribute it. Use keys.
//!
//! Records come out depth first, children before a parent's own record,
//! so the commit executor never references a host node that does not
//! exist yet.

mod differ;
mod record;

pub use differ::{diff_root, DiffPass};
pub use record::{diff_attributes, MutationOp, MutationRecord, UpdatePayload};

//! Commit Executor
//!
//! Commit applies one pass's mutation records to the host in a single
//! uninterrupted sweep. Diffing may be sliced and abandoned; commit never
//! is, which is what keeps intermediate states invisible: the host
//! observes either the previous tree or the new one.
//!
//! # Sequence
//!
//! 1. Apply every structural record in the order produced. The first
//!    host failure stops the commit at that record; nothing after it is
//!    applied and no callbacks run.
//! 2. Publish node refs for mounted host nodes.
//! 3. Run queued effect callbacks in the order their owning units appear
//!    in the new tree, each preceded by its own previous cleanup.
//! 4. Run the remaining cleanups of destroyed units, clear their refs,
//!    and free them.

mod executor;

pub use executor::apply;

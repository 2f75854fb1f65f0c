//! Scheduler
//!
//! The scheduler turns the differ's recursive walk into cooperative,
//! per-root work: a pass is a queue of per-unit diff tasks that can pause
//! between any two tasks (never inside one), resume on the host's next
//! slice, or be discarded when something more urgent arrives.
//!
//! # State machine
//!
//! Per root: `Idle → Diffing → CommitPending → Committed`. Diffing is the
//! only interruptible stage; commit always runs in one uninterrupted
//! sweep.
//!
//! # Priority lanes
//!
//! `Immediate` requests run synchronously and never yield. `Normal` and
//! `Deferred` passes check the host [`Deadline`] between units and give
//! control back when the slice is spent. A request at the same or higher
//! priority for the same root discards the in-flight pass outright; the
//! partial work is rolled back, never merged. Discarding is normal
//! control flow, not an error.
//!
//! # One context per root
//!
//! There is no global scheduler state. Every root owns a
//! [`SchedulerContext`] with its own arena, renderer, queues and error
//! sink, so independent roots cannot interfere and a context is testable
//! with a mock host.

mod context;
mod host;
mod lane;

pub use context::{PassHandle, PassStatus, SchedulerContext};
pub use host::{Deadline, NeverYield, SliceHost};
pub use lane::Priority;

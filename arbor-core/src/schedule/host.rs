//! Host cooperation traits.
//!
//! The scheduler never owns a thread or a timer. When work is pending it
//! asks the host for an execution opportunity through [`SliceHost`]; the
//! host answers by calling
//! [`SchedulerContext::drive`](super::SchedulerContext::drive) whenever
//! it has spare time, synchronously or from a later tick. While driving,
//! the [`Deadline`] is consulted between units to decide when to give
//! control back.

use super::lane::Priority;

/// Implemented by the host to receive "work is pending" signals.
///
/// The host may call back synchronously (blocking) or later
/// (cooperative); the engine assumes neither.
pub trait SliceHost: Send + Sync {
    fn request_slice(&self, hint: Priority);
}

/// Time budget of one execution slice.
pub trait Deadline {
    /// Consulted between diff units; `true` pauses the pass.
    fn should_yield(&self) -> bool;
}

/// A deadline that never expires. Immediate work and tests use it to
/// drain a pass in one call.
pub struct NeverYield;

impl Deadline for NeverYield {
    fn should_yield(&self) -> bool {
        false
    }
}

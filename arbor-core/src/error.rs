//! Error Taxonomy
//!
//! Errors are split along the two phases of a render pass:
//!
//! - [`RenderError`]: produced while diffing, i.e. while a component
//!   function runs or its hook slots are read back. Recoverable by the
//!   nearest error boundary; otherwise the pass is abandoned and the root
//!   keeps its last committed tree.
//! - [`CommitError`]: produced while applying mutation records to the
//!   host. Commit stops at the failing record and no effect callbacks run.
//!
//! [`ReconcileError`] is the union delivered to a root's error sink.
//!
//! Two conditions are deliberately *not* errors: duplicate sibling keys
//! (logged, second occurrence treated as keyless) and a pass discarded by
//! a higher-priority request (normal control flow).

use thiserror::Error;

/// Detail attached to a hook order violation.
///
/// Slot identity is purely positional, so a component must perform the
/// same hook calls, in the same order, on every render of a unit.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HookOrderViolation {
    /// The slot at this position was created by a different hook kind.
    #[error("slot {slot} holds a {stored} hook but {requested} was called")]
    KindMismatch {
        slot: usize,
        stored: &'static str,
        requested: &'static str,
    },

    /// The slot kind matched but its stored value or dependency type did not.
    #[error("slot {slot} holds a value of a different type than requested")]
    TypeMismatch { slot: usize },

    /// The render returned after consuming fewer slots than it appended
    /// on a previous render.
    #[error("render consumed {used} of {stored} hook slots")]
    TooFewCalls { used: usize, stored: usize },

    /// The render called more hooks than any previous render stored.
    #[error("render called more hooks than the {stored} previously stored")]
    TooManyCalls { stored: usize },
}

/// An error raised while rendering one unit of the tree.
#[derive(Debug, Clone, Error)]
pub enum RenderError {
    /// A component function reported a failure.
    #[error("component `{component}` failed: {message}")]
    Component { component: String, message: String },

    /// A component broke the positional hook protocol. Fatal for that
    /// unit's render; surfaced like any render failure so boundaries
    /// still catch it.
    #[error("hook order violation in `{component}`: {violation}")]
    HookOrder {
        component: String,
        violation: HookOrderViolation,
    },

    /// A hook operation ran while no unit was rendering.
    #[error("hook called outside of a render pass")]
    OutsideRender,
}

impl RenderError {
    /// Convenience constructor for component failures.
    pub fn component(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Component {
            component: name.into(),
            message: message.into(),
        }
    }
}

/// A failure reported by a [`Renderer`](crate::renderer::Renderer)
/// operation.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct HostError {
    message: String,
}

impl HostError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// An error raised while applying mutation records to the host.
#[derive(Debug, Error)]
pub enum CommitError {
    /// The host rejected a mutation. `index` is the position of the
    /// failing record in the batch; records after it were not applied.
    #[error("host rejected mutation {index}: {source}")]
    Host {
        index: usize,
        #[source]
        source: HostError,
    },

    /// A record referenced a work unit that is no longer in the arena.
    #[error("mutation {index} targets a missing work unit")]
    MissingUnit { index: usize },

    /// A structural operation needed a host handle that was never
    /// assigned.
    #[error("mutation {index} needs a host handle that was never created")]
    MissingHandle { index: usize },

    /// The host rejected detaching a root's tree during unmount.
    #[error("host rejected teardown: {source}")]
    Teardown {
        #[source]
        source: HostError,
    },
}

/// Union of everything a root can report to its error sink.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Commit(#[from] CommitError),
}

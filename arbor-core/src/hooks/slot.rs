//! Slot storage types.
//!
//! A slot is one persistent cell owned by a work unit. Values are
//! type-erased behind `Any`; the hook functions downcast on read and
//! report a violation instead of panicking when the type moved.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

/// Cleanup callback returned by an effect run.
pub type Cleanup = Box<dyn FnOnce() + Send>;

/// One queued effect invocation, consumed post-commit.
pub(crate) type EffectRun = Box<dyn FnOnce() -> Option<Cleanup> + Send>;

/// Backing cell of a `use_state` slot.
///
/// The cell is shared between the slot and every [`StateSetter`] clone,
/// and survives the double-buffer swap because the slot array moves from
/// the old unit to its new incarnation. Setter writes land in `pending`
/// and are promoted into `value` when the owning unit next renders, so a
/// discarded pass never leaves a half-applied value behind.
///
/// [`StateSetter`]: super::state::StateSetter
pub struct StateCell {
    value: Mutex<Box<dyn Any + Send>>,
    pending: Mutex<Option<Box<dyn Any + Send>>>,
}

impl StateCell {
    pub(crate) fn new(value: Box<dyn Any + Send>) -> Self {
        Self {
            value: Mutex::new(value),
            pending: Mutex::new(None),
        }
    }

    /// Apply the pending value, if any.
    pub(crate) fn promote(&self) {
        if let Some(next) = self.pending.lock().take() {
            *self.value.lock() = next;
        }
    }

    pub(crate) fn store_pending(&self, value: Box<dyn Any + Send>) {
        *self.pending.lock() = Some(value);
    }

    /// Read the promoted value.
    pub(crate) fn read<T: Clone + 'static>(&self) -> Option<T> {
        self.value.lock().downcast_ref::<T>().cloned()
    }

    /// Read the pending value if one is queued, otherwise the promoted
    /// one. Setter `update` closures see their own not-yet-rendered
    /// writes this way.
    pub(crate) fn read_latest<T: Clone + 'static>(&self) -> Option<T> {
        if let Some(pending) = self.pending.lock().as_ref() {
            return pending.downcast_ref::<T>().cloned();
        }
        self.read::<T>()
    }
}

/// Payload of a `use_effect` slot.
pub struct EffectSlot {
    /// Dependency value of the last queued run.
    pub(crate) deps: Box<dyn Any + Send>,
    /// Cleanup returned by the previous run, if any.
    pub(crate) cleanup: Option<Cleanup>,
    /// Run queued by the current render; taken by the commit executor.
    pub(crate) pending: Option<EffectRun>,
}

/// Payload of a `use_memo` slot.
pub struct MemoSlot {
    pub(crate) deps: Box<dyn Any + Send>,
    pub(crate) value: Box<dyn Any + Send>,
}

/// One persistent state cell of a work unit, identified by call order.
pub enum HookSlot {
    State(Arc<StateCell>),
    Effect(EffectSlot),
    Memo(MemoSlot),
    Ref(Arc<Mutex<Box<dyn Any + Send>>>),
}

impl HookSlot {
    /// Kind label used in order-violation reports.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::State(_) => "state",
            Self::Effect(_) => "effect",
            Self::Memo(_) => "memo",
            Self::Ref(_) => "ref",
        }
    }

    /// Whether this slot has an effect run queued for the next commit.
    pub fn has_pending_effect(&self) -> bool {
        matches!(self, Self::Effect(slot) if slot.pending.is_some())
    }
}

impl fmt::Debug for HookSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("HookSlot").field(&self.kind_name()).finish()
    }
}

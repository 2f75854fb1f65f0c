//! `use_state` and `use_ref`.

use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{HookOrderViolation, RenderError};

use super::context::{with_frame, UpdateSink};
use super::slot::{HookSlot, StateCell};

/// Allocate or re-read a state slot for the currently rendering unit.
///
/// Returns the current value together with a [`StateSetter`]. `init` runs
/// only on the unit's first render; later renders return the stored value
/// (with any pending setter write promoted first).
///
/// # Example
///
/// ```rust,ignore
/// let (count, set_count) = use_state(|| 0)?;
/// // From an event handler, later:
/// set_count.set(count + 1);
/// ```
pub fn use_state<T>(init: impl FnOnce() -> T) -> Result<(T, StateSetter<T>), RenderError>
where
    T: Clone + Send + 'static,
{
    with_frame(|frame| {
        let index = frame.cursor();
        if index == frame.slot_count() {
            if !frame.first_render() {
                return Err(frame.fail(HookOrderViolation::TooManyCalls {
                    stored: frame.slot_count(),
                }));
            }
            frame.push_slot(HookSlot::State(Arc::new(StateCell::new(Box::new(init())))));
        }

        let stored = frame.slot_kind(index);
        let cell = match frame.slot_mut(index) {
            HookSlot::State(cell) => Arc::clone(cell),
            _ => {
                return Err(frame.fail(HookOrderViolation::KindMismatch {
                    slot: index,
                    stored,
                    requested: "state",
                }))
            }
        };

        cell.promote();
        let value = match cell.read::<T>() {
            Some(value) => value,
            None => return Err(frame.fail(HookOrderViolation::TypeMismatch { slot: index })),
        };

        let setter = StateSetter {
            cell,
            sink: frame.sink().clone(),
            _marker: PhantomData,
        };
        frame.advance();
        Ok((value, setter))
    })
}

/// Handle for writing a state slot from outside the render.
///
/// Setters are clonable and `Send`; host event handlers typically own
/// one. A write stores the value as pending and asks the owning root for
/// a re-render; the value becomes visible the next time the unit renders.
pub struct StateSetter<T> {
    cell: Arc<StateCell>,
    sink: UpdateSink,
    _marker: PhantomData<fn(T) -> T>,
}

impl<T: Send + 'static> StateSetter<T> {
    /// Store `value` and request a re-render of the owning root.
    pub fn set(&self, value: T) {
        self.cell.store_pending(Box::new(value));
        (self.sink)();
    }

    /// Compute the next value from the latest one (pending write
    /// included, so consecutive updates compose).
    pub fn update(&self, f: impl FnOnce(&T) -> T)
    where
        T: Clone,
    {
        if let Some(current) = self.cell.read_latest::<T>() {
            self.set(f(&current));
        }
    }
}

impl<T> Clone for StateSetter<T> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
            sink: Arc::clone(&self.sink),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for StateSetter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StateSetter")
    }
}

/// Allocate or re-read a ref slot: a mutable cell that survives renders
/// without scheduling any.
pub fn use_ref<T>(init: impl FnOnce() -> T) -> Result<SlotRef<T>, RenderError>
where
    T: Send + 'static,
{
    with_frame(|frame| {
        let index = frame.cursor();
        if index == frame.slot_count() {
            if !frame.first_render() {
                return Err(frame.fail(HookOrderViolation::TooManyCalls {
                    stored: frame.slot_count(),
                }));
            }
            frame.push_slot(HookSlot::Ref(Arc::new(Mutex::new(Box::new(init())))));
        }

        let stored = frame.slot_kind(index);
        let cell = match frame.slot_mut(index) {
            HookSlot::Ref(cell) => Arc::clone(cell),
            _ => {
                return Err(frame.fail(HookOrderViolation::KindMismatch {
                    slot: index,
                    stored,
                    requested: "ref",
                }))
            }
        };

        // The stored type must still match.
        if !cell.lock().is::<T>() {
            return Err(frame.fail(HookOrderViolation::TypeMismatch { slot: index }));
        }

        frame.advance();
        Ok(SlotRef {
            cell,
            _marker: PhantomData,
        })
    })
}

/// Typed view over a ref slot.
pub struct SlotRef<T> {
    cell: Arc<Mutex<Box<dyn Any + Send>>>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Send + 'static> SlotRef<T> {
    /// Read a copy of the stored value.
    pub fn get(&self) -> Option<T>
    where
        T: Clone,
    {
        self.cell.lock().downcast_ref::<T>().cloned()
    }

    /// Replace the stored value.
    pub fn set(&self, value: T) {
        *self.cell.lock() = Box::new(value);
    }

    /// Run `f` with mutable access to the stored value.
    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        self.cell.lock().downcast_mut::<T>().map(f)
    }
}

impl<T> Clone for SlotRef<T> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for SlotRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SlotRef")
    }
}

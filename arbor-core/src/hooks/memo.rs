//! `use_memo`.

use crate::error::{HookOrderViolation, RenderError};

use super::context::with_frame;
use super::slot::{HookSlot, MemoSlot};

/// Allocate or re-read a memo slot: a cached value recomputed only when
/// `deps` differs from the previous render.
///
/// `compute` must be pure with respect to anything other than `deps`;
/// the engine is free to run it again on a restarted pass.
pub fn use_memo<D, T, F>(deps: D, compute: F) -> Result<T, RenderError>
where
    D: PartialEq + Send + 'static,
    T: Clone + Send + 'static,
    F: FnOnce() -> T,
{
    with_frame(|frame| {
        let index = frame.cursor();
        if index == frame.slot_count() {
            if !frame.first_render() {
                return Err(frame.fail(HookOrderViolation::TooManyCalls {
                    stored: frame.slot_count(),
                }));
            }
            let value = compute();
            frame.push_slot(HookSlot::Memo(MemoSlot {
                deps: Box::new(deps),
                value: Box::new(value.clone()),
            }));
            frame.advance();
            return Ok(value);
        }

        let stored = frame.slot_kind(index);
        let outcome = match frame.slot_mut(index) {
            HookSlot::Memo(slot) => match slot.deps.downcast_ref::<D>() {
                None => Err(HookOrderViolation::TypeMismatch { slot: index }),
                Some(previous) => {
                    if *previous != deps {
                        let value = compute();
                        slot.deps = Box::new(deps);
                        slot.value = Box::new(value.clone());
                        Ok(value)
                    } else {
                        match slot.value.downcast_ref::<T>() {
                            Some(value) => Ok(value.clone()),
                            None => Err(HookOrderViolation::TypeMismatch { slot: index }),
                        }
                    }
                }
            },
            _ => Err(HookOrderViolation::KindMismatch {
                slot: index,
                stored,
                requested: "memo",
            }),
        };

        match outcome {
            Ok(value) => {
                frame.advance();
                Ok(value)
            }
            Err(violation) => Err(frame.fail(violation)),
        }
    })
}

//! `use_effect`.

use crate::error::{HookOrderViolation, RenderError};

use super::context::with_frame;
use super::slot::{Cleanup, EffectSlot, HookSlot};

/// Convenience for effects that return a cleanup.
///
/// ```rust,ignore
/// use_effect(id, move || {
///     subscribe(id);
///     cleanup(move || unsubscribe(id))
/// })?;
/// ```
pub fn cleanup(f: impl FnOnce() + Send + 'static) -> Option<Cleanup> {
    Some(Box::new(f))
}

/// Queue a side effect to run after the next commit, whenever `deps`
/// differs from the previous render (always on the first render).
///
/// The effect may return a cleanup via [`cleanup`]; it runs before the
/// effect's next invocation and when the owning unit is destroyed.
/// Effects never run during diffing, so an abandoned pass queues nothing.
pub fn use_effect<D, F>(deps: D, effect: F) -> Result<(), RenderError>
where
    D: PartialEq + Send + 'static,
    F: FnOnce() -> Option<Cleanup> + Send + 'static,
{
    with_frame(|frame| {
        let index = frame.cursor();
        if index == frame.slot_count() {
            if !frame.first_render() {
                return Err(frame.fail(HookOrderViolation::TooManyCalls {
                    stored: frame.slot_count(),
                }));
            }
            frame.push_slot(HookSlot::Effect(EffectSlot {
                deps: Box::new(deps),
                cleanup: None,
                pending: Some(Box::new(effect)),
            }));
            frame.advance();
            return Ok(());
        }

        let stored = frame.slot_kind(index);
        let outcome = match frame.slot_mut(index) {
            HookSlot::Effect(slot) => match slot.deps.downcast_ref::<D>() {
                None => Err(HookOrderViolation::TypeMismatch { slot: index }),
                Some(previous) => {
                    if *previous != deps {
                        slot.deps = Box::new(deps);
                        slot.pending = Some(Box::new(effect));
                    } else {
                        // Unchanged deps: clear anything a discarded pass
                        // may have queued.
                        slot.pending = None;
                    }
                    Ok(())
                }
            },
            _ => Err(HookOrderViolation::KindMismatch {
                slot: index,
                stored,
                requested: "effect",
            }),
        };

        match outcome {
            Ok(()) => {
                frame.advance();
                Ok(())
            }
            Err(violation) => Err(frame.fail(violation)),
        }
    })
}

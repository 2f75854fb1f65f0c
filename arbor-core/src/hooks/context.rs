//! Render frame tracking.
//!
//! The hook functions need to know which unit is currently rendering.
//! A thread-local stack of frames tracks that: the differ pushes a frame
//! before calling a component function and pops it afterwards, taking the
//! (possibly grown) slot array back. Nesting happens when a component
//! renders another root synchronously; each frame keeps its own cursor.
//!
//! The guard returned by [`enter_frame`] pops on drop as well, so an
//! unwinding component cannot leave a stale frame behind.

use std::cell::RefCell;
use std::sync::Arc;

use crate::error::{HookOrderViolation, RenderError};

use super::slot::HookSlot;

/// Callback a state setter uses to request a re-render of its root.
///
/// The scheduler installs one per root; it decides the priority of the
/// request (normal, or immediate inside an immediate event window).
pub type UpdateSink = Arc<dyn Fn() + Send + Sync>;

/// A sink that drops re-render requests. For driving
/// [`diff_root`](crate::diff::diff_root) directly, without a scheduler.
pub fn noop_sink() -> UpdateSink {
    Arc::new(|| {})
}

/// The state of one in-progress component render.
pub(crate) struct HookFrame {
    component: String,
    slots: Vec<HookSlot>,
    cursor: usize,
    first_render: bool,
    sink: UpdateSink,
    violation: Option<HookOrderViolation>,
}

impl HookFrame {
    pub(crate) fn new(component: &str, slots: Vec<HookSlot>, sink: UpdateSink) -> Self {
        let first_render = slots.is_empty();
        Self {
            component: component.to_owned(),
            slots,
            cursor: 0,
            first_render,
            sink,
            violation: None,
        }
    }

    pub(crate) fn component(&self) -> &str {
        &self.component
    }

    pub(crate) fn sink(&self) -> &UpdateSink {
        &self.sink
    }

    pub(crate) fn first_render(&self) -> bool {
        self.first_render
    }

    pub(crate) fn cursor(&self) -> usize {
        self.cursor
    }

    pub(crate) fn advance(&mut self) {
        self.cursor += 1;
    }

    pub(crate) fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn slot_mut(&mut self, index: usize) -> &mut HookSlot {
        &mut self.slots[index]
    }

    pub(crate) fn slot_kind(&self, index: usize) -> &'static str {
        self.slots[index].kind_name()
    }

    pub(crate) fn push_slot(&mut self, slot: HookSlot) {
        self.slots.push(slot);
    }

    /// Record a violation and build the error returned from the hook.
    pub(crate) fn fail(&mut self, violation: HookOrderViolation) -> RenderError {
        self.violation = Some(violation.clone());
        RenderError::HookOrder {
            component: self.component.clone(),
            violation,
        }
    }

    /// Close out the frame after the component returned.
    ///
    /// When the render itself succeeded, a cursor short of the stored
    /// slot count means hooks were skipped this render; that is reported
    /// like any other order violation. A failed render legitimately
    /// stops mid-way, so the check is suppressed.
    pub(crate) fn conclude(mut self, render_failed: bool) -> (Vec<HookSlot>, Option<RenderError>) {
        if self.violation.is_none()
            && !render_failed
            && !self.first_render
            && self.cursor < self.slots.len()
        {
            self.violation = Some(HookOrderViolation::TooFewCalls {
                used: self.cursor,
                stored: self.slots.len(),
            });
        }
        let error = self.violation.take().map(|violation| RenderError::HookOrder {
            component: self.component.clone(),
            violation,
        });
        (self.slots, error)
    }
}

thread_local! {
    static FRAME_STACK: RefCell<Vec<HookFrame>> = RefCell::new(Vec::new());
}

/// Guard over one pushed frame. `finish` pops and returns the frame;
/// dropping without finishing pops and discards it.
pub(crate) struct FrameGuard {
    finished: bool,
}

impl FrameGuard {
    pub(crate) fn finish(mut self) -> HookFrame {
        self.finished = true;
        FRAME_STACK.with(|stack| {
            stack
                .borrow_mut()
                .pop()
                .expect("frame stack empty on finish")
        })
    }
}

impl Drop for FrameGuard {
    fn drop(&mut self) {
        if !self.finished {
            FRAME_STACK.with(|stack| {
                stack.borrow_mut().pop();
            });
        }
    }
}

/// Push a frame for the unit about to render.
pub(crate) fn enter_frame(frame: HookFrame) -> FrameGuard {
    FRAME_STACK.with(|stack| stack.borrow_mut().push(frame));
    FrameGuard { finished: false }
}

/// Run `f` against the innermost frame, or report that no unit is
/// rendering.
pub(crate) fn with_frame<R>(
    f: impl FnOnce(&mut HookFrame) -> Result<R, RenderError>,
) -> Result<R, RenderError> {
    FRAME_STACK.with(|stack| {
        let mut stack = stack.borrow_mut();
        match stack.last_mut() {
            Some(frame) => f(frame),
            None => Err(RenderError::OutsideRender),
        }
    })
}

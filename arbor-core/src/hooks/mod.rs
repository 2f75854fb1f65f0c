//! Hook Store
//!
//! Hooks give component functions persistent state across re-renders
//! without the component owning any struct. Each work unit carries an
//! ordered slot array; a call counter starts at zero when the unit begins
//! rendering and every hook call reads or appends the slot at the current
//! position, then advances the counter.
//!
//! # The positional contract
//!
//! Because slot identity is purely positional, a component must call the
//! same hooks, in the same order, on every render of a given unit. On the
//! first render slots are appended; on every later render they are read
//! back and must match in kind and value type. Any mismatch, or a render
//! that consumes fewer or more slots than before, is a
//! [`HookOrderViolation`](crate::error::HookOrderViolation) and fails
//! that unit's render.
//!
//! # Concepts
//!
//! ## State
//!
//! [`use_state`] stores a value and hands out a [`StateSetter`]. Setters
//! are cheap clones, callable from outside the render (event handlers);
//! a set stores the value as pending and asks the owning root for a
//! re-render. The pending value is promoted the next time the unit
//! renders.
//!
//! ## Effects
//!
//! [`use_effect`] queues a callback that runs after the commit in which
//! its unit took part, whenever its dependencies change. The callback may
//! return a cleanup, run before the next invocation and when the unit is
//! destroyed.
//!
//! ## Memos
//!
//! [`use_memo`] caches a computed value in the slot and recomputes it
//! only when its dependencies change.
//!
//! ## Refs
//!
//! [`use_ref`] stores a mutable cell that survives renders without
//! triggering any.
//!
//! Hook operations may only run while a unit is rendering; elsewhere they
//! return [`RenderError::OutsideRender`](crate::error::RenderError).

mod context;
mod effect;
mod memo;
mod slot;
mod state;

pub use context::{noop_sink, UpdateSink};
pub use effect::{cleanup, use_effect};
pub use memo::use_memo;
pub use slot::{Cleanup, HookSlot};
pub use state::{use_ref, use_state, SlotRef, StateSetter};

pub(crate) use context::{enter_frame, HookFrame};
pub(crate) use slot::EffectRun;

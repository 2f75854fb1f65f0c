//! Work Unit Graph
//!
//! The graph is a mutable, arena-allocated mirror of the rendered tree:
//! one [`WorkUnit`] per logical tree position, linked by integer indices
//! ([`UnitId`]) rather than references. Index links keep the cyclic
//! parent/child/sibling structure out of the ownership system and make
//! bulk subtree teardown a plain index sweep.
//!
//! # Double buffering
//!
//! Every render pass builds a fresh set of units; each new unit points at
//! the unit that held the same logical position in the previously
//! committed tree through `previous_version`. Hook slot arrays move from
//! the old unit to the new one when a position is reused, so state
//! survives the swap. At commit the root pointer flips to the new set and
//! the old one is freed; an abandoned pass instead moves the slots back
//! and frees the new set.
//!
//! Only the differ writes the graph. The commit executor and the hook
//! store read it.

mod arena;
mod unit;

pub use arena::UnitArena;
pub use unit::{MutationTag, UnitId, WorkUnit};

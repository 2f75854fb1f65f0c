//! Arbor Core
//!
//! This crate provides the reconciliation runtime for the Arbor
//! declarative UI framework. It implements:
//!
//! - An immutable tree description model (elements, text, components,
//!   fragments)
//! - An arena-backed work unit graph with double-buffered generations
//! - A linear-time keyed tree differ producing mutation records
//! - A cooperative, priority-laned scheduler driven by the host
//! - An atomic commit executor applying records through a renderer trait
//! - Positional hooks giving component functions persistent state
//!
//! The engine owns no rendering backend. A host implements
//! [`renderer::Renderer`] over its node type, hands the scheduler a
//! container handle, and drives it with execution slices; everything the
//! host sees arrives as an ordered batch of mutations.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `tree`: description values produced by every render
//! - `graph`: the work unit arena mirroring the rendered tree
//! - `diff`: the pairwise walk deriving mutation records
//! - `schedule`: per-root pass scheduling, pausing and preemption
//! - `commit`: record application and post-commit callbacks
//! - `hooks`: per-unit positional state for component functions
//!
//! Data flows one way: descriptions enter the differ, the differ updates
//! the graph and queues records, the scheduler decides when that work
//! runs, and the commit executor applies the records atomically before
//! effects fire.
//!
//! # Example
//!
//! ```rust,ignore
//! use arbor_core::schedule::{Priority, SchedulerContext};
//! use arbor_core::tree::{ComponentFn, TreeNode};
//! use arbor_core::hooks::use_state;
//!
//! let counter = ComponentFn::fallible("Counter", |_| {
//!     let (count, set_count) = use_state(|| 0)?;
//!     Ok(TreeNode::element("button")
//!         .with_attr("count", count)
//!         .with_child(TreeNode::text(count.to_string())))
//! });
//!
//! let mut root = SchedulerContext::new(renderer, container, host);
//! root.schedule_root(TreeNode::component(counter), Priority::Normal);
//! // Later, from the host's idle callback:
//! root.drive(&deadline);
//! ```

pub mod commit;
pub mod diff;
pub mod error;
pub mod graph;
pub mod hooks;
pub mod renderer;
pub mod schedule;
pub mod tree;

//! Record application.

use tracing::trace;

use crate::diff::{MutationOp, MutationRecord, UpdatePayload};
use crate::error::CommitError;
use crate::graph::{MutationTag, UnitArena, UnitId};
use crate::hooks::{Cleanup, EffectRun, HookSlot};
use crate::renderer::Renderer;
use crate::tree::NodeKind;

/// Apply a pass's mutation records against the host, then run the
/// post-commit callbacks.
///
/// `new_root` is the root produced by
/// [`DiffPass::finalize`](crate::diff::DiffPass::finalize); `container`
/// is the host node adopting the root's host children. Records are
/// consumed exactly once. On a host failure the commit stops at the
/// failing record: later records, refs, effects and destroyed-unit
/// cleanups are all skipped.
pub fn apply<R: Renderer>(
    renderer: &mut R,
    arena: &mut UnitArena<R::Handle>,
    container: &R::Handle,
    new_root: UnitId,
    records: Vec<MutationRecord>,
) -> Result<(), CommitError> {
    let mut deleted_roots: Vec<UnitId> = Vec::new();
    for (index, record) in records.into_iter().enumerate() {
        trace!(unit = record.target.index(), op = ?record.op, "apply");
        apply_record(renderer, arena, container, index, &record)?;
        if record.is_delete() {
            deleted_roots.push(record.target);
        }
    }

    publish_refs(arena, new_root);
    run_effects(arena, new_root);

    // Destroyed units: refs cleared, cleanups run, storage freed. The
    // host nodes are already detached.
    for root in deleted_roots {
        for mut unit in arena.take_subtree(root) {
            if let Some(node_ref) = unit.description().node_ref() {
                node_ref.clear();
            }
            for slot in unit.slots.drain(..) {
                if let HookSlot::Effect(mut effect) = slot {
                    if let Some(cleanup) = effect.cleanup.take() {
                        cleanup();
                    }
                }
            }
        }
    }
    Ok(())
}

fn apply_record<R: Renderer>(
    renderer: &mut R,
    arena: &mut UnitArena<R::Handle>,
    container: &R::Handle,
    index: usize,
    record: &MutationRecord,
) -> Result<(), CommitError> {
    let target = record.target;
    let host_err = |source| CommitError::Host { index, source };

    match &record.op {
        MutationOp::Create { anchor } => {
            let unit = arena.get(target).ok_or(CommitError::MissingUnit { index })?;
            let handle = match unit.description().kind() {
                NodeKind::Element { tag } => renderer
                    .create_element(tag, unit.description().attributes())
                    .map_err(host_err)?,
                NodeKind::Text { content } => renderer.create_text(content).map_err(host_err)?,
                // Fragments and components own no host node.
                _ => return Ok(()),
            };

            // Children committed before their parent: adopt them now.
            for child in arena.host_children(target) {
                let child_handle = arena
                    .get(child)
                    .and_then(|unit| unit.host().cloned())
                    .ok_or(CommitError::MissingHandle { index })?;
                renderer
                    .append_child(&handle, &child_handle)
                    .map_err(host_err)?;
            }

            if let Some(unit) = arena.get_mut(target) {
                unit.host = Some(handle.clone());
            }

            // A created unit under a created host ancestor is adopted by
            // that ancestor's own record; otherwise it is inserted into
            // the existing host tree here.
            let host_parent = arena.nearest_host_ancestor(target);
            let parent_is_new = host_parent
                .and_then(|parent| arena.get(parent))
                .is_some_and(|unit| unit.tag() == MutationTag::Create);
            if parent_is_new {
                return Ok(());
            }
            let parent_handle = match host_parent {
                Some(parent) => arena
                    .get(parent)
                    .and_then(|unit| unit.host().cloned())
                    .ok_or(CommitError::MissingHandle { index })?,
                None => container.clone(),
            };
            let anchor_handle = match anchor {
                Some(anchor) => Some(
                    arena
                        .get(*anchor)
                        .and_then(|unit| unit.host().cloned())
                        .ok_or(CommitError::MissingHandle { index })?,
                ),
                None => None,
            };
            renderer
                .insert_before(&parent_handle, &handle, anchor_handle.as_ref())
                .map_err(host_err)
        }

        MutationOp::Update(payload) => {
            let handle = arena
                .get(target)
                .and_then(|unit| unit.host().cloned())
                .ok_or(CommitError::MissingHandle { index })?;
            match payload {
                UpdatePayload::Attributes(patch) => {
                    renderer.update_attributes(&handle, patch).map_err(host_err)
                }
                UpdatePayload::Text(text) => renderer.set_text(&handle, text).map_err(host_err),
            }
        }

        MutationOp::Move { index: to } => {
            let handle = arena
                .get(target)
                .and_then(|unit| unit.host().cloned())
                .ok_or(CommitError::MissingHandle { index })?;
            let parent_handle = match arena.nearest_host_ancestor(target) {
                Some(parent) => arena
                    .get(parent)
                    .and_then(|unit| unit.host().cloned())
                    .ok_or(CommitError::MissingHandle { index })?,
                None => container.clone(),
            };
            renderer
                .move_child(&parent_handle, &handle, *to)
                .map_err(host_err)
        }

        MutationOp::Delete => {
            // The target is an old-generation unit; its links are intact
            // until the generation is freed after commit.
            let parent_handle = match arena.nearest_host_ancestor(target) {
                Some(parent) => arena
                    .get(parent)
                    .and_then(|unit| unit.host().cloned())
                    .ok_or(CommitError::MissingHandle { index })?,
                None => container.clone(),
            };
            for root in arena.host_roots(target) {
                let handle = arena
                    .get(root)
                    .and_then(|unit| unit.host().cloned())
                    .ok_or(CommitError::MissingHandle { index })?;
                renderer
                    .remove_child(&parent_handle, &handle)
                    .map_err(host_err)?;
            }
            Ok(())
        }
    }
}

/// Fill node refs on mounted host units, in tree order.
fn publish_refs<H: Clone + Send + 'static>(arena: &UnitArena<H>, root: UnitId) {
    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
        if let Some(unit) = arena.get(id) {
            if let (Some(node_ref), Some(handle)) = (unit.description().node_ref(), unit.host()) {
                node_ref.publish(handle.clone());
            }
        }
        let children = arena.child_ids(id);
        for &child in children.iter().rev() {
            stack.push(child);
        }
    }
}

/// Run queued effect callbacks in the order their owning units appear in
/// the new tree, each preceded by the cleanup of its previous run.
fn run_effects<H>(arena: &mut UnitArena<H>, root: UnitId) {
    // Collect first: the callbacks must not observe a borrowed arena.
    let mut pending: Vec<(UnitId, usize, Option<Cleanup>, EffectRun)> = Vec::new();
    let mut stack = vec![root];
    let mut order: Vec<UnitId> = Vec::new();
    while let Some(id) = stack.pop() {
        order.push(id);
        let children = arena.child_ids(id);
        for &child in children.iter().rev() {
            stack.push(child);
        }
    }
    for id in order {
        let Some(unit) = arena.get_mut(id) else { continue };
        for (slot_index, slot) in unit.slots.iter_mut().enumerate() {
            if let HookSlot::Effect(effect) = slot {
                if let Some(run) = effect.pending.take() {
                    pending.push((id, slot_index, effect.cleanup.take(), run));
                }
            }
        }
    }

    for (id, slot_index, cleanup, run) in pending {
        if let Some(cleanup) = cleanup {
            cleanup();
        }
        let next_cleanup = run();
        if let Some(unit) = arena.get_mut(id) {
            if let Some(HookSlot::Effect(effect)) = unit.slots.get_mut(slot_index) {
                effect.cleanup = next_cleanup;
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

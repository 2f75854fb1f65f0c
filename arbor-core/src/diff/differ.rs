//! The diff pass.

use std::collections::{HashMap, HashSet, VecDeque};

use smallvec::SmallVec;
use tracing::{debug, warn};

use crate::error::RenderError;
use crate::graph::{MutationTag, UnitArena, UnitId};
use crate::hooks::{enter_frame, HookFrame, UpdateSink};
use crate::tree::{NodeKind, TreeNode};

use super::record::{diff_attributes, MutationOp, MutationRecord, UpdatePayload};

/// One pending unit comparison.
struct DiffTask {
    old: Option<UnitId>,
    parent: Option<UnitId>,
    description: TreeNode,
}

/// A resumable diff of one root.
///
/// The recursive walk is flattened into a queue of per-unit tasks so the
/// scheduler can pause between any two units, abandon the pass, or run it
/// to completion in one go. A pass builds a fresh generation of work
/// units; nothing in the old generation changes except hook slot arrays
/// moving to their new incarnations (and moving back on rollback).
pub struct DiffPass {
    queue: VecDeque<DiffTask>,
    old_root: Option<UnitId>,
    new_root: Option<UnitId>,
    allocations: Vec<UnitId>,
    root_deleted: SmallVec<[UnitId; 1]>,
}

impl DiffPass {
    /// Start a pass diffing `description` against the committed
    /// `old_root`.
    pub fn begin(old_root: Option<UnitId>, description: TreeNode) -> Self {
        debug!(root = description.kind().label(), "diff pass started");
        let mut queue = VecDeque::new();
        queue.push_back(DiffTask {
            old: old_root,
            parent: None,
            description,
        });
        Self {
            queue,
            old_root,
            new_root: None,
            allocations: Vec::new(),
            root_deleted: SmallVec::new(),
        }
    }

    /// Whether diff tasks remain.
    pub fn has_work(&self) -> bool {
        !self.queue.is_empty()
    }

    /// Process exactly one unit. Returns whether work remains.
    ///
    /// A render failure inside the unit is routed to the nearest
    /// ancestor-or-self error boundary; only an uncaught failure is
    /// returned, at which point the caller must [`rollback`](Self::rollback)
    /// the pass.
    pub fn step<H: Clone>(
        &mut self,
        arena: &mut UnitArena<H>,
        sink: &UpdateSink,
    ) -> Result<bool, RenderError> {
        let Some(task) = self.queue.pop_front() else {
            return Ok(false);
        };
        if let Err((error, failed)) = self.process_task(arena, sink, task) {
            if !self.try_boundary(arena, failed, &error) {
                return Err(error);
            }
        }
        Ok(self.has_work())
    }

    /// Produce the new root and the ordered mutation records.
    ///
    /// Records come out depth first, children before a parent's own
    /// record; a unit's subtree removals are emitted before its
    /// children's records so positional operations see a purged child
    /// list.
    pub fn finalize<H: Clone>(self, arena: &mut UnitArena<H>) -> (UnitId, Vec<MutationRecord>) {
        debug_assert!(self.queue.is_empty(), "finalize with tasks remaining");
        let root = self
            .new_root
            .expect("finalize before the root task ran");

        // Old ids seen through the container scope map to their new
        // incarnations; everything else keeps its id.
        let mut incarnation: HashMap<UnitId, UnitId> = HashMap::new();
        for &id in &self.allocations {
            if let Some(prev) = arena.get(id).and_then(|unit| unit.previous_version()) {
                incarnation.insert(prev, id);
            }
        }

        let mut records = Vec::new();
        let mut sim: Vec<UnitId> = match self.old_root {
            Some(old) => arena
                .host_roots(old)
                .into_iter()
                .map(|id| incarnation.get(&id).copied().unwrap_or(id))
                .collect(),
            None => Vec::new(),
        };
        for &old in &self.root_deleted {
            remove_from_sim(arena, &mut sim, old);
            records.push(MutationRecord {
                target: old,
                op: MutationOp::Delete,
            });
        }

        let mut pos = 0usize;
        visit(arena, root, &mut sim, &mut pos, &mut records, &incarnation);
        debug!(records = records.len(), "diff pass finalized");
        (root, records)
    }

    /// Discard the pass: hook slots return to their old units and every
    /// unit allocated this pass is freed. The committed tree is left
    /// exactly as it was.
    pub fn rollback<H>(self, arena: &mut UnitArena<H>) {
        debug!(allocated = self.allocations.len(), "diff pass discarded");
        for &id in &self.allocations {
            if let Some(prev) = arena.get(id).and_then(|unit| unit.previous_version()) {
                let slots = arena.take_slots(id);
                if !slots.is_empty() {
                    arena.restore_slots(prev, slots);
                }
            }
        }
        for &id in &self.allocations {
            arena.free(id);
        }
    }

    fn attach<H>(&mut self, arena: &mut UnitArena<H>, parent: Option<UnitId>, id: UnitId) {
        match parent {
            Some(parent) => arena.push_child(parent, id),
            None => self.new_root = Some(id),
        }
    }

    fn record_removal<H>(
        &mut self,
        arena: &mut UnitArena<H>,
        parent: Option<UnitId>,
        old_id: UnitId,
    ) {
        match parent {
            Some(parent) => {
                if let Some(unit) = arena.get_mut(parent) {
                    unit.deleted.push(old_id);
                }
            }
            None => self.root_deleted.push(old_id),
        }
    }

    fn process_task<H: Clone>(
        &mut self,
        arena: &mut UnitArena<H>,
        sink: &UpdateSink,
        task: DiffTask,
    ) -> Result<(), (RenderError, Option<UnitId>)> {
        let DiffTask {
            old,
            parent,
            description,
        } = task;

        if let Some(old_id) = old {
            if let Some(old_unit) = arena.get(old_id) {
                if old_unit.description().kind().same_kind(description.kind()) {
                    let host = old_unit.host().cloned();
                    let old_description = old_unit.description().clone();
                    let old_children = arena.child_ids(old_id);
                    return self.reuse_unit(
                        arena,
                        sink,
                        old_id,
                        host,
                        old_description,
                        old_children,
                        parent,
                        description,
                    );
                }
            }
            // Different kinds produce unrelated subtrees: replace, do not
            // recurse.
            self.record_removal(arena, parent, old_id);
        }
        self.mount_unit(arena, sink, parent, description)
    }

    /// Mount a fresh subtree position.
    fn mount_unit<H: Clone>(
        &mut self,
        arena: &mut UnitArena<H>,
        sink: &UpdateSink,
        parent: Option<UnitId>,
        mut description: TreeNode,
    ) -> Result<(), (RenderError, Option<UnitId>)> {
        let is_component = matches!(description.kind(), NodeKind::Component { .. });
        let children = if is_component {
            Vec::new()
        } else {
            description.take_children()
        };

        let id = arena.alloc(description);
        self.allocations.push(id);
        self.attach(arena, parent, id);
        if let Some(unit) = arena.get_mut(id) {
            unit.tag = MutationTag::Create;
        }

        if is_component {
            let rendered = self.render_component(arena, sink, id)?;
            self.queue.push_back(DiffTask {
                old: None,
                parent: Some(id),
                description: rendered,
            });
        } else {
            for child in children {
                self.queue.push_back(DiffTask {
                    old: None,
                    parent: Some(id),
                    description: child,
                });
            }
        }
        Ok(())
    }

    /// Re-render an existing position with a same-kind description.
    #[allow(clippy::too_many_arguments)]
    fn reuse_unit<H: Clone>(
        &mut self,
        arena: &mut UnitArena<H>,
        sink: &UpdateSink,
        old_id: UnitId,
        host: Option<H>,
        old_description: TreeNode,
        old_children: SmallVec<[UnitId; 8]>,
        parent: Option<UnitId>,
        mut description: TreeNode,
    ) -> Result<(), (RenderError, Option<UnitId>)> {
        let is_component = matches!(description.kind(), NodeKind::Component { .. });
        let is_text = matches!(description.kind(), NodeKind::Text { .. });
        let is_element = matches!(description.kind(), NodeKind::Element { .. });

        let children = if is_component {
            Vec::new()
        } else {
            description.take_children()
        };
        let attr_patch = is_element
            .then(|| diff_attributes(old_description.attributes(), description.attributes()))
            .filter(|patch| !patch.is_empty());
        let text_patch = match (is_text, description.text_content()) {
            (true, Some(content)) if old_description.text_content() != Some(content) => {
                Some(content.to_owned())
            }
            _ => None,
        };

        let id = arena.alloc(description);
        self.allocations.push(id);
        self.attach(arena, parent, id);
        let slots = arena.take_slots(old_id);
        if let Some(unit) = arena.get_mut(id) {
            unit.previous_version = Some(old_id);
            unit.host = host;
            unit.slots = slots;
            if let Some(patch) = attr_patch {
                unit.patch = Some(UpdatePayload::Attributes(patch));
                unit.tag = MutationTag::Update;
            }
            if let Some(text) = text_patch {
                unit.patch = Some(UpdatePayload::Text(text));
                unit.tag = MutationTag::Update;
            }
        }

        if is_component {
            let rendered = self.render_component(arena, sink, id)?;
            self.queue.push_back(DiffTask {
                old: old_children.first().copied(),
                parent: Some(id),
                description: rendered,
            });
        } else {
            self.reconcile_children(arena, id, &old_children, children);
        }
        Ok(())
    }

    /// Match new children against old ones: keys first, position as the
    /// fallback, leftovers removed.
    fn reconcile_children<H>(
        &mut self,
        arena: &mut UnitArena<H>,
        parent: UnitId,
        old_children: &SmallVec<[UnitId; 8]>,
        new_children: Vec<TreeNode>,
    ) {
        // key -> (old index, id); later duplicates are demoted to keyless.
        let mut keyed: HashMap<String, (usize, UnitId)> = HashMap::new();
        let mut demoted = vec![false; old_children.len()];
        for (index, &child) in old_children.iter().enumerate() {
            let Some(key) = arena.get(child).and_then(|unit| unit.description().key()) else {
                continue;
            };
            if keyed.contains_key(key) {
                warn!(key, "duplicate sibling key; treating the later child as keyless");
                demoted[index] = true;
            } else {
                keyed.insert(key.to_owned(), (index, child));
            }
        }

        let mut claimed = vec![false; old_children.len()];
        let mut seen_new_keys: HashSet<String> = HashSet::new();
        for (index, child) in new_children.into_iter().enumerate() {
            let mut origin = None;
            if let Some(key) = child.key() {
                if !seen_new_keys.insert(key.to_owned()) {
                    warn!(key, "duplicate sibling key; treating the later child as keyless");
                } else if let Some((old_index, old_id)) = keyed.remove(key) {
                    claimed[old_index] = true;
                    origin = Some(old_id);
                }
            }
            if origin.is_none() {
                // Positional fallback: only the keyless old child at the
                // same index qualifies, and a key match always wins over
                // it. No look-ahead to neighbouring indices.
                if let Some(&candidate) = old_children.get(index) {
                    let effectively_keyless = demoted[index]
                        || arena
                            .get(candidate)
                            .is_some_and(|unit| unit.description().key().is_none());
                    if effectively_keyless && !claimed[index] {
                        claimed[index] = true;
                        origin = Some(candidate);
                    }
                }
            }
            self.queue.push_back(DiffTask {
                old: origin,
                parent: Some(parent),
                description: child,
            });
        }

        for (index, &child) in old_children.iter().enumerate() {
            if !claimed[index] {
                if let Some(unit) = arena.get_mut(parent) {
                    unit.deleted.push(child);
                }
            }
        }
    }

    /// Run a component function inside a hook frame, keeping its slot
    /// array on the unit afterwards.
    fn render_component<H>(
        &mut self,
        arena: &mut UnitArena<H>,
        sink: &UpdateSink,
        id: UnitId,
    ) -> Result<TreeNode, (RenderError, Option<UnitId>)> {
        let (component, props) = match arena.get(id).map(|unit| unit.description()) {
            Some(description) => match description.kind() {
                NodeKind::Component { component } => (component.clone(), description.clone()),
                _ => {
                    return Err((
                        RenderError::component(description.kind().label(), "not a component"),
                        Some(id),
                    ))
                }
            },
            None => {
                return Err((
                    RenderError::component("<missing>", "unit vanished during diff"),
                    Some(id),
                ))
            }
        };

        let slots = arena.take_slots(id);
        let guard = enter_frame(HookFrame::new(component.name(), slots, sink.clone()));
        let rendered = component.render(&props);
        let frame = guard.finish();
        let (slots, hook_error) = frame.conclude(rendered.is_err());
        arena.restore_slots(id, slots);

        match (rendered, hook_error) {
            (Err(error), _) => Err((error, Some(id))),
            (Ok(_), Some(error)) => Err((error, Some(id))),
            (Ok(rendered), None) => Ok(rendered),
        }
    }

    /// Route a render failure to the nearest ancestor-or-self boundary.
    /// Returns whether the pass can continue.
    fn try_boundary<H>(
        &mut self,
        arena: &mut UnitArena<H>,
        failed: Option<UnitId>,
        error: &RenderError,
    ) -> bool {
        let mut cursor = failed;
        while let Some(id) = cursor {
            let Some(unit) = arena.get(id) else { break };
            let handler = (!unit.boundary_used)
                .then(|| unit.description().boundary().cloned())
                .flatten();
            if let Some(handler) = handler {
                let fallback = handler.fallback(error, failed.unwrap_or(id));
                self.substitute_fallback(arena, id, fallback);
                return true;
            }
            cursor = unit.parent();
        }
        false
    }

    /// Replace the boundary unit's children with the fallback subtree:
    /// partial work under it is rolled back, its previous children are
    /// scheduled for removal, and the fallback mounts fresh.
    fn substitute_fallback<H>(
        &mut self,
        arena: &mut UnitArena<H>,
        boundary: UnitId,
        fallback: TreeNode,
    ) {
        debug!(unit = boundary.index(), "error boundary substituted a fallback");

        self.queue
            .retain(|task| !is_self_or_descendant(arena, task.parent, boundary));

        let doomed: Vec<UnitId> = self
            .allocations
            .iter()
            .copied()
            .filter(|&id| id != boundary && is_self_or_descendant(arena, Some(id), boundary))
            .collect();
        for &id in &doomed {
            if let Some(prev) = arena.get(id).and_then(|unit| unit.previous_version()) {
                let slots = arena.take_slots(id);
                if !slots.is_empty() {
                    arena.restore_slots(prev, slots);
                }
            }
        }
        for &id in &doomed {
            arena.free(id);
        }
        self.allocations.retain(|id| !doomed.contains(id));

        let previous = arena.get(boundary).and_then(|unit| unit.previous_version());
        let old_children = previous
            .map(|prev| arena.child_ids(prev))
            .unwrap_or_default();
        if let Some(unit) = arena.get_mut(boundary) {
            unit.first_child = None;
            unit.last_child = None;
            unit.boundary_used = true;
            unit.deleted.clear();
            unit.deleted.extend(old_children);
        }

        self.queue.push_back(DiffTask {
            old: None,
            parent: Some(boundary),
            description: fallback,
        });
    }
}

/// Whether `start` (walking parents) reaches `ancestor`.
fn is_self_or_descendant<H>(
    arena: &UnitArena<H>,
    start: Option<UnitId>,
    ancestor: UnitId,
) -> bool {
    let mut cursor = start;
    while let Some(id) = cursor {
        if id == ancestor {
            return true;
        }
        cursor = arena.get(id).and_then(|unit| unit.parent());
    }
    false
}

fn remove_from_sim<H>(arena: &UnitArena<H>, sim: &mut Vec<UnitId>, old_subtree: UnitId) {
    for host in arena.host_roots(old_subtree) {
        sim.retain(|&entry| entry != host);
    }
}

/// Post-order record emission over the new generation.
///
/// `sim` mirrors the host child list of the nearest host ancestor as it
/// will look at each point of the commit, so a move is emitted only when
/// a child's position still differs when it is visited; siblings shifted
/// by earlier moves come out clean.
fn visit<H: Clone>(
    arena: &mut UnitArena<H>,
    id: UnitId,
    sim: &mut Vec<UnitId>,
    pos: &mut usize,
    records: &mut Vec<MutationRecord>,
    incarnation: &HashMap<UnitId, UnitId>,
) {
    let Some(unit) = arena.get(id) else { return };
    let is_host = unit.is_host();
    let is_create = unit.tag() == MutationTag::Create;
    let previous = unit.previous_version();
    let deleted: SmallVec<[UnitId; 2]> = unit.deleted.clone();
    let children = arena.child_ids(id);

    if !is_host {
        // A fragment or component contributes its children, removals
        // included, to the nearest host ancestor's scope.
        for old in deleted {
            remove_from_sim(arena, sim, old);
            records.push(MutationRecord {
                target: old,
                op: MutationOp::Delete,
            });
        }
        for child in children {
            visit(arena, child, sim, pos, records, incarnation);
        }
        return;
    }

    if is_create {
        // A fresh host node opens an empty scope; everything below it is
        // fresh too.
        let mut inner_sim = Vec::new();
        let mut inner_pos = 0usize;
        for child in children {
            visit(arena, child, &mut inner_sim, &mut inner_pos, records, incarnation);
        }
        let anchor = sim.get(*pos).copied();
        records.push(MutationRecord {
            target: id,
            op: MutationOp::Create { anchor },
        });
        sim.insert(*pos, id);
    } else {
        let mut inner_sim: Vec<UnitId> = previous
            .map(|prev| {
                arena
                    .host_children(prev)
                    .into_iter()
                    .map(|old| incarnation.get(&old).copied().unwrap_or(old))
                    .collect()
            })
            .unwrap_or_default();
        // Removed children leave this unit's own child list.
        for old in deleted {
            remove_from_sim(arena, &mut inner_sim, old);
            records.push(MutationRecord {
                target: old,
                op: MutationOp::Delete,
            });
        }
        let mut inner_pos = 0usize;
        for child in children {
            visit(arena, child, &mut inner_sim, &mut inner_pos, records, incarnation);
        }

        if let Some(payload) = arena.get_mut(id).and_then(|unit| unit.patch.take()) {
            records.push(MutationRecord {
                target: id,
                op: MutationOp::Update(payload),
            });
        }
        if let Some(current) = sim.iter().position(|&entry| entry == id) {
            if current != *pos {
                records.push(MutationRecord {
                    target: id,
                    op: MutationOp::Move { index: *pos },
                });
                sim.remove(current);
                sim.insert(*pos, id);
                if let Some(unit) = arena.get_mut(id) {
                    unit.tag = MutationTag::Move;
                }
            }
        }
    }
    *pos += 1;
}

/// Drain a whole pass in one call. Used for immediate-priority renders
/// and anywhere incremental slicing is not needed.
pub fn diff_root<H: Clone>(
    arena: &mut UnitArena<H>,
    old_root: Option<UnitId>,
    description: TreeNode,
    sink: &UpdateSink,
) -> Result<(UnitId, Vec<MutationRecord>), RenderError> {
    let mut pass = DiffPass::begin(old_root, description);
    loop {
        match pass.step(arena, sink) {
            Ok(true) => {}
            Ok(false) => break,
            Err(error) => {
                pass.rollback(arena);
                return Err(error);
            }
        }
    }
    Ok(pass.finalize(arena))
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

//! Flat unit storage.

use smallvec::SmallVec;

use crate::hooks::HookSlot;
use crate::tree::TreeNode;

use super::unit::{UnitId, WorkUnit};

/// Arena owning every work unit of one root, old and new generation
/// alike. Slots of freed units go on a free list and are reused by later
/// passes.
pub struct UnitArena<H> {
    entries: Vec<Option<WorkUnit<H>>>,
    free: Vec<u32>,
}

impl<H> UnitArena<H> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            free: Vec::new(),
        }
    }

    /// Allocate a fresh unit for `description` and return its id.
    pub fn alloc(&mut self, description: TreeNode) -> UnitId {
        let unit = WorkUnit::new(description);
        match self.free.pop() {
            Some(index) => {
                self.entries[index as usize] = Some(unit);
                UnitId::new(index as usize)
            }
            None => {
                self.entries.push(Some(unit));
                UnitId::new(self.entries.len() - 1)
            }
        }
    }

    pub fn get(&self, id: UnitId) -> Option<&WorkUnit<H>> {
        self.entries.get(id.index()).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, id: UnitId) -> Option<&mut WorkUnit<H>> {
        self.entries.get_mut(id.index()).and_then(Option::as_mut)
    }

    /// Number of live units.
    pub fn len(&self) -> usize {
        self.entries.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append `child` at the end of `parent`'s child chain.
    pub(crate) fn push_child(&mut self, parent: UnitId, child: UnitId) {
        if let Some(unit) = self.get_mut(child) {
            unit.parent = Some(parent);
            unit.next_sibling = None;
        }
        let previous_last = match self.get_mut(parent) {
            Some(unit) => {
                let previous = unit.last_child;
                unit.last_child = Some(child);
                if unit.first_child.is_none() {
                    unit.first_child = Some(child);
                }
                previous
            }
            None => None,
        };
        if let Some(last) = previous_last {
            if let Some(unit) = self.get_mut(last) {
                unit.next_sibling = Some(child);
            }
        }
    }

    /// Direct children of `id`, in order.
    pub fn child_ids(&self, id: UnitId) -> SmallVec<[UnitId; 8]> {
        let mut out = SmallVec::new();
        let mut next = self.get(id).and_then(|unit| unit.first_child);
        while let Some(child) = next {
            out.push(child);
            next = self.get(child).and_then(|unit| unit.next_sibling);
        }
        out
    }

    /// Host-owning descendants of `id` reachable without crossing another
    /// host unit, in tree order. These are the host children that `id`
    /// contributes to its nearest host ancestor's child list.
    pub fn host_children(&self, id: UnitId) -> SmallVec<[UnitId; 8]> {
        let mut out = SmallVec::new();
        self.collect_host_children(id, &mut out);
        out
    }

    fn collect_host_children(&self, id: UnitId, out: &mut SmallVec<[UnitId; 8]>) {
        for child in self.child_ids(id) {
            match self.get(child) {
                Some(unit) if unit.is_host() => out.push(child),
                Some(_) => self.collect_host_children(child, out),
                None => {}
            }
        }
    }

    /// The host nodes a subtree rooted at `id` contributes: the unit
    /// itself when it owns a host node, otherwise its flattened host
    /// children.
    pub fn host_roots(&self, id: UnitId) -> SmallVec<[UnitId; 8]> {
        match self.get(id) {
            Some(unit) if unit.is_host() => {
                let mut out = SmallVec::new();
                out.push(id);
                out
            }
            Some(_) => self.host_children(id),
            None => SmallVec::new(),
        }
    }

    /// Nearest ancestor of `id` that owns a host node.
    pub fn nearest_host_ancestor(&self, id: UnitId) -> Option<UnitId> {
        let mut current = self.get(id).and_then(|unit| unit.parent);
        while let Some(ancestor) = current {
            match self.get(ancestor) {
                Some(unit) if unit.is_host() => return Some(ancestor),
                Some(unit) => current = unit.parent,
                None => return None,
            }
        }
        None
    }

    /// Move the hook slots out of a unit (for the render of its new
    /// incarnation).
    pub(crate) fn take_slots(&mut self, id: UnitId) -> Vec<HookSlot> {
        self.get_mut(id)
            .map(|unit| std::mem::take(&mut unit.slots))
            .unwrap_or_default()
    }

    pub(crate) fn restore_slots(&mut self, id: UnitId, slots: Vec<HookSlot>) {
        if let Some(unit) = self.get_mut(id) {
            unit.slots = slots;
        }
    }

    /// Remove one unit, returning it.
    pub(crate) fn free(&mut self, id: UnitId) -> Option<WorkUnit<H>> {
        let entry = self.entries.get_mut(id.index())?.take();
        if entry.is_some() {
            self.free.push(id.index() as u32);
        }
        entry
    }

    /// Remove a whole subtree, returning its units in tree order.
    /// Already-freed ids inside the subtree are skipped.
    pub(crate) fn take_subtree(&mut self, root: UnitId) -> Vec<WorkUnit<H>> {
        let mut out = Vec::new();
        let mut stack: Vec<UnitId> = vec![root];
        while let Some(id) = stack.pop() {
            let children = self.child_ids(id);
            if let Some(unit) = self.free(id) {
                out.push(unit);
            }
            // Reverse keeps tree order in the output.
            for &child in children.iter().rev() {
                stack.push(child);
            }
        }
        out
    }

    /// Drop a whole subtree.
    pub(crate) fn free_subtree(&mut self, root: UnitId) {
        drop(self.take_subtree(root));
    }
}

impl<H> Default for UnitArena<H> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arena_with_list() -> (UnitArena<u32>, UnitId, Vec<UnitId>) {
        let mut arena: UnitArena<u32> = UnitArena::new();
        let parent = arena.alloc(TreeNode::element("ul"));
        let children: Vec<UnitId> = (0..3)
            .map(|i| {
                let child = arena.alloc(TreeNode::element("li").with_key(i.to_string()));
                arena.push_child(parent, child);
                child
            })
            .collect();
        (arena, parent, children)
    }

    #[test]
    fn alloc_and_get() {
        let mut arena: UnitArena<u32> = UnitArena::new();
        let id = arena.alloc(TreeNode::text("hi"));
        assert_eq!(arena.len(), 1);
        assert_eq!(arena.get(id).unwrap().label(), "#text");
        assert!(arena.get_mut(id).is_some());
    }

    #[test]
    fn child_chain_preserves_order() {
        let (arena, parent, children) = arena_with_list();
        assert_eq!(arena.child_ids(parent).to_vec(), children);
        for &child in &children {
            assert_eq!(arena.get(child).unwrap().parent(), Some(parent));
        }
    }

    #[test]
    fn freed_slots_are_reused() {
        let mut arena: UnitArena<u32> = UnitArena::new();
        let a = arena.alloc(TreeNode::text("a"));
        let _b = arena.alloc(TreeNode::text("b"));
        arena.free(a);
        assert_eq!(arena.len(), 1);

        let c = arena.alloc(TreeNode::text("c"));
        assert_eq!(c.index(), a.index());
        assert_eq!(arena.len(), 2);
    }

    #[test]
    fn take_subtree_sweeps_all_descendants() {
        let (mut arena, parent, children) = arena_with_list();
        let grandchild = arena.alloc(TreeNode::text("x"));
        arena.push_child(children[0], grandchild);

        let taken = arena.take_subtree(parent);
        assert_eq!(taken.len(), 5);
        assert!(arena.is_empty());
        // Tree order: parent first, then first child and its subtree.
        assert_eq!(taken[0].label(), "ul");
        assert_eq!(taken[1].label(), "li");
        assert_eq!(taken[2].label(), "#text");
    }

    #[test]
    fn host_children_flatten_fragments() {
        let mut arena: UnitArena<u32> = UnitArena::new();
        let root = arena.alloc(TreeNode::element("div"));
        let fragment = arena.alloc(TreeNode::fragment());
        let inner = arena.alloc(TreeNode::element("span"));
        let text = arena.alloc(TreeNode::text("t"));
        arena.push_child(root, fragment);
        arena.push_child(fragment, inner);
        arena.push_child(root, text);

        assert_eq!(arena.host_children(root).to_vec(), vec![inner, text]);
        assert_eq!(arena.host_roots(fragment).to_vec(), vec![inner]);
        assert_eq!(arena.nearest_host_ancestor(inner), Some(root));
        assert_eq!(arena.nearest_host_ancestor(fragment), Some(root));
    }
}

//! Work units.

use smallvec::SmallVec;

use crate::diff::UpdatePayload;
use crate::hooks::HookSlot;
use crate::tree::TreeNode;

/// Index of a work unit in its arena.
///
/// Ids are plain slot indices; a freed slot may be reused by a later
/// pass, so ids must not be held across commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UnitId(u32);

impl UnitId {
    pub(crate) fn new(index: usize) -> Self {
        Self(index as u32)
    }

    /// The raw arena index.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// How a unit will change the host structure at the next commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MutationTag {
    /// No host mutation.
    #[default]
    None,
    /// The unit is new this pass; its host node must be created.
    Create,
    /// The unit's host node changes attributes or text.
    Update,
    /// The unit's host node changes position among its siblings.
    Move,
    /// The unit's subtree leaves the tree.
    Delete,
}

/// One position in the rendered tree, persisted across renders via
/// double-buffered versions.
pub struct WorkUnit<H> {
    pub(crate) description: TreeNode,
    /// Host handle, present on element and text units once created.
    pub(crate) host: Option<H>,

    pub(crate) parent: Option<UnitId>,
    pub(crate) first_child: Option<UnitId>,
    pub(crate) last_child: Option<UnitId>,
    pub(crate) next_sibling: Option<UnitId>,

    /// The unit at the same logical position in the prior committed tree.
    pub(crate) previous_version: Option<UnitId>,

    pub(crate) tag: MutationTag,
    pub(crate) slots: Vec<HookSlot>,

    // Transient per-pass diff results, cleared at commit.
    pub(crate) patch: Option<UpdatePayload>,
    pub(crate) deleted: SmallVec<[UnitId; 2]>,
    pub(crate) boundary_used: bool,
}

impl<H> WorkUnit<H> {
    pub(crate) fn new(description: TreeNode) -> Self {
        Self {
            description,
            host: None,
            parent: None,
            first_child: None,
            last_child: None,
            next_sibling: None,
            previous_version: None,
            tag: MutationTag::None,
            slots: Vec::new(),
            patch: None,
            deleted: SmallVec::new(),
            boundary_used: false,
        }
    }

    pub fn description(&self) -> &TreeNode {
        &self.description
    }

    pub fn host(&self) -> Option<&H> {
        self.host.as_ref()
    }

    pub fn parent(&self) -> Option<UnitId> {
        self.parent
    }

    pub fn first_child(&self) -> Option<UnitId> {
        self.first_child
    }

    pub fn next_sibling(&self) -> Option<UnitId> {
        self.next_sibling
    }

    pub fn previous_version(&self) -> Option<UnitId> {
        self.previous_version
    }

    pub fn tag(&self) -> MutationTag {
        self.tag
    }

    /// Whether this unit owns a host node.
    pub fn is_host(&self) -> bool {
        self.description.kind().is_host()
    }

    /// Short label for traces.
    pub fn label(&self) -> &str {
        self.description.kind().label()
    }

    /// Reset the transient diff fields after a commit consumed them.
    pub(crate) fn clear_pass_state(&mut self) {
        self.tag = MutationTag::None;
        self.patch = None;
        self.deleted.clear();
        self.boundary_used = false;
        self.previous_version = None;
    }
}

//! Per-root scheduling.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error};

use crate::commit;
use crate::diff::DiffPass;
use crate::error::{CommitError, ReconcileError};
use crate::graph::{UnitArena, UnitId};
use crate::hooks::{HookSlot, UpdateSink};
use crate::renderer::Renderer;
use crate::tree::TreeNode;

use super::host::{Deadline, NeverYield, SliceHost};
use super::lane::Priority;

/// Identifies one scheduled render request, for cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PassHandle(u64);

/// Pass state machine of a root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassStatus {
    /// Nothing scheduled, nothing in flight.
    Idle,
    /// A pass is diffing; it may be paused between units.
    Diffing,
    /// Diffing finished; mutation records are about to apply.
    CommitPending,
    /// The most recent pass committed.
    Committed,
}

/// State shared with setter handles, written from host event threads.
#[derive(Default)]
pub(crate) struct RootShared {
    requested: Mutex<Option<Priority>>,
    immediate_events: AtomicBool,
}

impl RootShared {
    /// Record a state update. Inside an immediate event window the
    /// request escalates to `Immediate`.
    fn note_update(&self) -> Priority {
        let priority = if self.immediate_events.load(Ordering::SeqCst) {
            Priority::Immediate
        } else {
            Priority::Normal
        };
        let mut slot = self.requested.lock();
        *slot = Some(slot.map_or(priority, |existing| existing.max(priority)));
        priority
    }

    fn take(&self) -> Option<Priority> {
        self.requested.lock().take()
    }
}

struct PendingRequest {
    handle: PassHandle,
    priority: Priority,
    description: TreeNode,
}

struct InFlight {
    handle: PassHandle,
    priority: Priority,
    pass: DiffPass,
}

/// Scheduler state for one root: the work unit arena, the renderer, the
/// committed tree and at most one in-flight diff pass.
///
/// Each root owns its own context; independent roots never share
/// scheduler state, so they are driven, preempted and torn down in
/// isolation.
pub struct SchedulerContext<R: Renderer> {
    renderer: R,
    container: R::Handle,
    arena: UnitArena<R::Handle>,
    host: Arc<dyn SliceHost>,
    shared: Arc<RootShared>,
    sink: UpdateSink,
    committed_root: Option<UnitId>,
    last_description: Option<TreeNode>,
    request: Option<PendingRequest>,
    in_flight: Option<InFlight>,
    status: PassStatus,
    next_handle: u64,
    error_sink: Option<Box<dyn Fn(&ReconcileError) + Send>>,
}

impl<R: Renderer> SchedulerContext<R> {
    /// A context rendering into `container`. `host` receives
    /// work-pending signals and is expected to call [`drive`](Self::drive)
    /// back.
    pub fn new(renderer: R, container: R::Handle, host: Arc<dyn SliceHost>) -> Self {
        let shared = Arc::new(RootShared::default());
        let sink: UpdateSink = {
            let shared = Arc::clone(&shared);
            let host = Arc::clone(&host);
            Arc::new(move || {
                let priority = shared.note_update();
                host.request_slice(priority);
            })
        };
        Self {
            renderer,
            container,
            arena: UnitArena::new(),
            host,
            shared,
            sink,
            committed_root: None,
            last_description: None,
            request: None,
            in_flight: None,
            status: PassStatus::Idle,
            next_handle: 0,
            error_sink: None,
        }
    }

    /// Where otherwise-unhandled pass errors are delivered. Without a
    /// sink they are logged.
    pub fn set_error_sink(&mut self, sink: impl Fn(&ReconcileError) + Send + 'static) {
        self.error_sink = Some(Box::new(sink));
    }

    pub fn status(&self) -> PassStatus {
        self.status
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    /// Read access to the work unit graph.
    pub fn arena(&self) -> &UnitArena<R::Handle> {
        &self.arena
    }

    /// Root of the committed tree, if one has been committed.
    pub fn committed_root(&self) -> Option<UnitId> {
        self.committed_root
    }

    fn next_pass_handle(&mut self) -> PassHandle {
        self.next_handle += 1;
        PassHandle(self.next_handle)
    }

    /// Request a render of `description`.
    ///
    /// `Immediate` requests run synchronously, discarding any in-flight
    /// lower-priority pass for this root. Other lanes are queued; the
    /// latest request wins and keeps the higher of the two priorities.
    pub fn schedule_root(&mut self, description: TreeNode, priority: Priority) -> PassHandle {
        let handle = self.next_pass_handle();
        let merged = match self.request.take() {
            Some(previous) => priority.max(previous.priority),
            None => priority,
        };
        debug!(priority = merged.label(), "root scheduled");
        self.request = Some(PendingRequest {
            handle,
            priority: merged,
            description,
        });
        if merged == Priority::Immediate {
            self.drive(&NeverYield);
        } else {
            self.host.request_slice(merged);
        }
        handle
    }

    /// Withdraw a request. A pending request is dropped; an in-flight
    /// pass is discarded with its partial work rolled back. Unknown or
    /// already-committed handles do nothing.
    pub fn cancel(&mut self, handle: PassHandle) {
        if self
            .request
            .as_ref()
            .is_some_and(|request| request.handle == handle)
        {
            self.request = None;
        }
        if self
            .in_flight
            .as_ref()
            .is_some_and(|flight| flight.handle == handle)
        {
            if let Some(flight) = self.in_flight.take() {
                flight.pass.rollback(&mut self.arena);
            }
            self.status = PassStatus::Idle;
            debug!("in-flight pass cancelled");
        }
    }

    /// Fold setter-side update requests into the pending request.
    fn absorb_updates(&mut self) {
        let Some(priority) = self.shared.take() else {
            return;
        };
        // Updates re-render the latest description. Before the first
        // schedule_root there is nothing to re-render.
        let Some(description) = self.last_description.clone() else {
            return;
        };
        match &mut self.request {
            Some(request) => request.priority = request.priority.max(priority),
            None => {
                let handle = self.next_pass_handle();
                self.request = Some(PendingRequest {
                    handle,
                    priority,
                    description,
                });
            }
        }
    }

    /// Run pending work until the deadline says stop, the pass commits,
    /// or there is nothing to do. Called by the host in response to
    /// [`SliceHost::request_slice`].
    pub fn drive(&mut self, deadline: &dyn Deadline) -> PassStatus {
        self.absorb_updates();
        loop {
            let start = match (&self.request, &self.in_flight) {
                (Some(_), None) => true,
                // A request at the same or higher priority supersedes the
                // pass in flight; its partial work is discarded, not
                // merged.
                (Some(request), Some(flight)) => request.priority >= flight.priority,
                (None, _) => false,
            };
            if start {
                if let Some(flight) = self.in_flight.take() {
                    debug!("in-flight pass superseded");
                    flight.pass.rollback(&mut self.arena);
                }
                if let Some(request) = self.request.take() {
                    debug!(priority = request.priority.label(), "pass started");
                    self.last_description = Some(request.description.clone());
                    self.in_flight = Some(InFlight {
                        handle: request.handle,
                        priority: request.priority,
                        pass: DiffPass::begin(self.committed_root, request.description),
                    });
                    self.status = PassStatus::Diffing;
                }
            }

            let Some(mut flight) = self.in_flight.take() else {
                return self.status;
            };

            loop {
                match flight.pass.step(&mut self.arena, &self.sink) {
                    Err(render_error) => {
                        // No boundary caught it: the root keeps its last
                        // committed tree.
                        flight.pass.rollback(&mut self.arena);
                        self.status = PassStatus::Idle;
                        self.report(ReconcileError::Render(render_error));
                        break;
                    }
                    Ok(true) => {
                        self.absorb_updates();
                        if self
                            .request
                            .as_ref()
                            .is_some_and(|request| request.priority > flight.priority)
                        {
                            debug!("pass preempted by a higher-priority request");
                            flight.pass.rollback(&mut self.arena);
                            self.status = PassStatus::Idle;
                            break;
                        }
                        if flight.priority.yields() && deadline.should_yield() {
                            self.host.request_slice(flight.priority);
                            self.in_flight = Some(flight);
                            self.status = PassStatus::Diffing;
                            return PassStatus::Diffing;
                        }
                    }
                    Ok(false) => {
                        self.status = PassStatus::CommitPending;
                        let (new_root, records) = flight.pass.finalize(&mut self.arena);
                        if let Err(commit_error) = self.commit_pass(new_root, records) {
                            self.report(ReconcileError::Commit(commit_error));
                        }
                        self.status = PassStatus::Committed;
                        self.absorb_updates();
                        if let Some(request) = &self.request {
                            self.host.request_slice(request.priority);
                        }
                        return PassStatus::Committed;
                    }
                }
            }
        }
    }

    /// Run `f` inside an immediate event window: state updates made
    /// during it escalate to `Immediate` and are flushed synchronously
    /// before this returns.
    pub fn run_immediate<T>(&mut self, f: impl FnOnce() -> T) -> T {
        self.shared.immediate_events.store(true, Ordering::SeqCst);
        let output = f();
        self.shared.immediate_events.store(false, Ordering::SeqCst);

        self.absorb_updates();
        while self
            .request
            .as_ref()
            .is_some_and(|request| request.priority == Priority::Immediate)
        {
            self.drive(&NeverYield);
        }
        output
    }

    /// Apply a finished pass and swap the double buffer: the new
    /// generation becomes the committed tree and the old one is freed.
    fn commit_pass(
        &mut self,
        new_root: UnitId,
        records: Vec<crate::diff::MutationRecord>,
    ) -> Result<(), CommitError> {
        let result = commit::apply(
            &mut self.renderer,
            &mut self.arena,
            &self.container,
            new_root,
            records,
        );

        // Even a faulted commit leaves the host closest to the new tree:
        // applied records already reference the new generation, so the
        // swap happens either way and the error is reported.
        let old_root = self.committed_root.replace(new_root);
        if let Some(old) = old_root {
            self.arena.free_subtree(old);
        }

        let mut stack = vec![new_root];
        while let Some(id) = stack.pop() {
            let children = self.arena.child_ids(id);
            for &child in children.iter().rev() {
                stack.push(child);
            }
            if let Some(unit) = self.arena.get_mut(id) {
                unit.clear_pass_state();
            }
        }

        debug!(root = new_root.index(), "commit finished");
        result
    }

    /// Tear the root down: discard in-flight work, detach the committed
    /// host tree, run remaining cleanups and clear refs.
    pub fn unmount(&mut self) {
        if let Some(flight) = self.in_flight.take() {
            flight.pass.rollback(&mut self.arena);
        }
        self.request = None;
        self.shared.take();

        if let Some(root) = self.committed_root.take() {
            let mut failure: Option<crate::error::HostError> = None;
            for host_id in self.arena.host_roots(root) {
                if let Some(handle) = self
                    .arena
                    .get(host_id)
                    .and_then(|unit| unit.host().cloned())
                {
                    if let Err(host_error) = self.renderer.remove_child(&self.container, &handle) {
                        failure.get_or_insert(host_error);
                    }
                }
            }
            for mut unit in self.arena.take_subtree(root) {
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
            if let Some(source) = failure {
                self.report(ReconcileError::Commit(CommitError::Teardown { source }));
            }
        }

        self.last_description = None;
        self.status = PassStatus::Idle;
        debug!("root unmounted");
    }

    fn report(&self, reconcile_error: ReconcileError) {
        match &self.error_sink {
            Some(sink) => sink(&reconcile_error),
            None => error!(error = %reconcile_error, "unhandled reconcile error"),
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

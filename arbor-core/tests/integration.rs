//! Integration Tests for the Reconciliation Engine
//!
//! These tests drive the whole pipeline end to end: descriptions through
//! the differ and scheduler into a mock host tree, with hooks, effects,
//! error boundaries and fault injection along the way.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use arbor_core::error::HostError;
use arbor_core::hooks::{cleanup, use_effect, use_state, StateSetter};
use arbor_core::renderer::Renderer;
use arbor_core::schedule::{Deadline, NeverYield, PassStatus, Priority, SchedulerContext, SliceHost};
use arbor_core::tree::{AttrMap, AttrPatch, AttrValue, ComponentFn, ErrorBoundary, NodeRef, TreeNode};

// ----------------------------------------------------------------------------
// Mock host
// ----------------------------------------------------------------------------

/// An in-memory host tree. Handles are indices into `nodes`; index 0 is
/// the container.
#[derive(Default)]
struct HostTree {
    nodes: Vec<HostNode>,
    ops: Vec<String>,
    fail_after: Option<usize>,
}

#[derive(Default, Clone)]
struct HostNode {
    label: String,
    attrs: Vec<(String, String)>,
    children: Vec<usize>,
}

impl HostTree {
    fn new() -> Self {
        let mut host = Self::default();
        host.nodes.push(HostNode {
            label: "#root".into(),
            ..Default::default()
        });
        host
    }

    fn fault(&mut self) -> Result<(), HostError> {
        if let Some(budget) = self.fail_after.as_mut() {
            if *budget == 0 {
                return Err(HostError::new("injected host fault"));
            }
            *budget -= 1;
        }
        Ok(())
    }

    /// Render a subtree as `tag[child child ...]`, text as `"content"`.
    fn snapshot(&self, handle: usize) -> String {
        let node = &self.nodes[handle];
        if node.label.starts_with('"') {
            return node.label.clone();
        }
        if node.children.is_empty() {
            return node.label.clone();
        }
        let children: Vec<String> = node
            .children
            .iter()
            .map(|&child| self.snapshot(child))
            .collect();
        format!("{}[{}]", node.label, children.join(" "))
    }

    fn created_count(&self) -> usize {
        self.ops.iter().filter(|op| op.starts_with("create")).count()
    }
}

impl Renderer for HostTree {
    type Handle = usize;

    fn create_element(&mut self, tag: &str, attrs: &AttrMap) -> Result<usize, HostError> {
        self.fault()?;
        self.ops.push(format!("create {tag}"));
        self.nodes.push(HostNode {
            label: tag.to_owned(),
            attrs: attrs
                .iter()
                .map(|(name, value)| (name.clone(), value.to_string()))
                .collect(),
            children: Vec::new(),
        });
        Ok(self.nodes.len() - 1)
    }

    fn create_text(&mut self, content: &str) -> Result<usize, HostError> {
        self.fault()?;
        self.ops.push(format!("create text {content:?}"));
        self.nodes.push(HostNode {
            label: format!("\"{content}\""),
            ..Default::default()
        });
        Ok(self.nodes.len() - 1)
    }

    fn update_attributes(&mut self, handle: &usize, patch: &AttrPatch) -> Result<(), HostError> {
        self.fault()?;
        self.ops.push(format!("update {handle}"));
        for (name, value) in patch {
            let attrs = &mut self.nodes[*handle].attrs;
            attrs.retain(|(existing, _)| existing != name);
            if let Some(value) = value {
                attrs.push((name.clone(), value.to_string()));
            }
        }
        Ok(())
    }

    fn set_text(&mut self, handle: &usize, content: &str) -> Result<(), HostError> {
        self.fault()?;
        self.ops.push(format!("set_text {handle} {content:?}"));
        self.nodes[*handle].label = format!("\"{content}\"");
        Ok(())
    }

    fn append_child(&mut self, parent: &usize, child: &usize) -> Result<(), HostError> {
        self.fault()?;
        self.ops.push(format!("append {child} -> {parent}"));
        self.nodes[*parent].children.push(*child);
        Ok(())
    }

    fn insert_before(
        &mut self,
        parent: &usize,
        child: &usize,
        anchor: Option<&usize>,
    ) -> Result<(), HostError> {
        self.fault()?;
        self.ops.push(format!("insert {child} -> {parent}"));
        let children = &mut self.nodes[*parent].children;
        match anchor.and_then(|a| children.iter().position(|c| c == a)) {
            Some(index) => children.insert(index, *child),
            None => children.push(*child),
        }
        Ok(())
    }

    fn move_child(&mut self, parent: &usize, child: &usize, index: usize) -> Result<(), HostError> {
        self.fault()?;
        self.ops.push(format!("move {child} -> {index}"));
        let children = &mut self.nodes[*parent].children;
        if let Some(position) = children.iter().position(|c| c == child) {
            children.remove(position);
            children.insert(index.min(children.len()), *child);
        }
        Ok(())
    }

    fn remove_child(&mut self, parent: &usize, child: &usize) -> Result<(), HostError> {
        self.fault()?;
        self.ops.push(format!("remove {child}"));
        self.nodes[*parent].children.retain(|c| c != child);
        Ok(())
    }
}

#[derive(Default)]
struct IdleHost {
    slices: Mutex<Vec<Priority>>,
}

impl SliceHost for IdleHost {
    fn request_slice(&self, hint: Priority) {
        self.slices.lock().push(hint);
    }
}

struct YieldEvery;

impl Deadline for YieldEvery {
    fn should_yield(&self) -> bool {
        true
    }
}

fn new_root() -> (SchedulerContext<HostTree>, Arc<IdleHost>) {
    let host = Arc::new(IdleHost::default());
    let context = SchedulerContext::new(HostTree::new(), 0, host.clone());
    (context, host)
}

fn host_snapshot(context: &SchedulerContext<HostTree>) -> String {
    context.renderer().snapshot(0)
}

// ----------------------------------------------------------------------------
// Mount, update, teardown
// ----------------------------------------------------------------------------

#[test]
fn mount_renders_the_whole_description() {
    let (mut root, _) = new_root();
    root.schedule_root(
        TreeNode::element("div")
            .with_attr("id", "app")
            .with_child(TreeNode::element("span").with_child(TreeNode::text("hello")))
            .with_child(TreeNode::text("tail")),
        Priority::Immediate,
    );

    assert_eq!(root.status(), PassStatus::Committed);
    assert_eq!(host_snapshot(&root), r#"#root[div[span["hello"] "tail"]]"#);
}

#[test]
fn rerender_with_identical_description_touches_nothing() {
    let tree = TreeNode::element("div").with_child(TreeNode::text("x"));
    let (mut root, _) = new_root();
    root.schedule_root(tree.clone(), Priority::Immediate);
    let ops_after_mount = root.renderer().ops.len();

    root.schedule_root(tree, Priority::Immediate);
    assert_eq!(root.status(), PassStatus::Committed);
    assert_eq!(root.renderer().ops.len(), ops_after_mount);
}

#[test]
fn attribute_and_text_updates_reach_the_host() {
    let (mut root, _) = new_root();
    root.schedule_root(
        TreeNode::element("div")
            .with_attr("mode", "a")
            .with_child(TreeNode::text("before")),
        Priority::Immediate,
    );

    root.schedule_root(
        TreeNode::element("div")
            .with_attr("mode", "b")
            .with_child(TreeNode::text("after")),
        Priority::Immediate,
    );

    assert_eq!(host_snapshot(&root), r#"#root[div["after"]]"#);
    let div = root
        .renderer()
        .nodes
        .iter()
        .position(|node| node.label == "div")
        .expect("div exists");
    assert_eq!(
        root.renderer().nodes[div].attrs,
        vec![("mode".to_owned(), "b".to_owned())]
    );
    // Same identity: nothing was recreated.
    assert_eq!(root.renderer().created_count(), 2);
}

#[test]
fn unmount_detaches_the_host_tree() {
    let (mut root, _) = new_root();
    root.schedule_root(
        TreeNode::element("div").with_child(TreeNode::text("x")),
        Priority::Immediate,
    );
    assert_ne!(host_snapshot(&root), "#root");

    root.unmount();
    assert_eq!(host_snapshot(&root), "#root");
    assert_eq!(root.status(), PassStatus::Idle);
}

#[test]
fn large_pass_paused_by_the_deadline_still_converges() {
    let (mut root, _) = new_root();
    let list = TreeNode::element("ul").with_children(
        (0..20).map(|i| {
            TreeNode::element("li")
                .with_key(i.to_string())
                .with_child(TreeNode::text(i.to_string()))
        }),
    );
    root.schedule_root(list, Priority::Normal);

    let mut drives = 0;
    while root.drive(&YieldEvery) != PassStatus::Committed {
        drives += 1;
        assert!(drives < 200, "pass did not converge");
    }
    assert!(drives > 1, "deadline never paused the pass");
    let snapshot = host_snapshot(&root);
    assert!(snapshot.starts_with("#root[ul["));
    assert!(snapshot.contains("\"19\""));
}

// ----------------------------------------------------------------------------
// Keyed identity
// ----------------------------------------------------------------------------

/// A keyed stateful list item: renders `li[key:value]` and exposes its
/// setter keyed by the `label` attribute.
fn item_component(
    setters: Arc<Mutex<HashMap<String, StateSetter<i32>>>>,
) -> ComponentFn {
    ComponentFn::fallible("Item", move |props| {
        let label = match props.attributes().get("label") {
            Some(AttrValue::Text(label)) => label.clone(),
            _ => String::new(),
        };
        let (value, setter) = use_state(|| 0)?;
        setters.lock().insert(label.clone(), setter);
        Ok(TreeNode::element("li").with_child(TreeNode::text(format!("{label}:{value}"))))
    })
}

fn keyed_items(component: &ComponentFn, labels: &[&str]) -> TreeNode {
    TreeNode::element("ul").with_children(labels.iter().map(|label| {
        TreeNode::component(component.clone())
            .with_key(*label)
            .with_attr("label", *label)
    }))
}

#[test]
fn keyed_reorder_preserves_component_state() {
    let setters = Arc::new(Mutex::new(HashMap::new()));
    let item = item_component(setters.clone());

    let (mut root, _) = new_root();
    root.schedule_root(keyed_items(&item, &["a", "b", "c"]), Priority::Immediate);
    assert_eq!(
        host_snapshot(&root),
        r#"#root[ul[li["a:0"] li["b:0"] li["c:0"]]]"#
    );

    // Give b a distinct state, then reorder.
    setters.lock().get("b").expect("setter for b").set(9);
    root.drive(&NeverYield);
    assert_eq!(
        host_snapshot(&root),
        r#"#root[ul[li["a:0"] li["b:9"] li["c:0"]]]"#
    );

    let created_before = root.renderer().created_count();
    root.schedule_root(keyed_items(&item, &["c", "a", "b"]), Priority::Immediate);

    // State travelled with the key, and nothing was recreated.
    assert_eq!(
        host_snapshot(&root),
        r#"#root[ul[li["c:0"] li["a:0"] li["b:9"]]]"#
    );
    assert_eq!(root.renderer().created_count(), created_before);
}

#[test]
fn type_mismatch_discards_component_state() {
    let setters = Arc::new(Mutex::new(HashMap::new()));
    let item = item_component(setters.clone());

    let (mut root, _) = new_root();
    root.schedule_root(keyed_items(&item, &["a"]), Priority::Immediate);
    setters.lock().get("a").expect("setter").set(5);
    root.drive(&NeverYield);
    assert_eq!(host_snapshot(&root), r#"#root[ul[li["a:5"]]]"#);

    // Same position, different component identity: fresh state.
    let other = item_component(setters.clone());
    root.schedule_root(keyed_items(&other, &["a"]), Priority::Immediate);
    assert_eq!(host_snapshot(&root), r#"#root[ul[li["a:0"]]]"#);
}

// ----------------------------------------------------------------------------
// Hooks
// ----------------------------------------------------------------------------

#[test]
fn conditional_hook_is_rejected_on_the_render_where_the_count_changes() {
    let errors: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));

    let component = ComponentFn::fallible("Sometimes", |props| {
        let (first, _) = use_state(|| 1)?;
        if props.attributes().get("extra").is_some() {
            let (_, _) = use_state(|| 2)?;
        }
        Ok(TreeNode::text(first.to_string()))
    });

    let (mut root, _) = new_root();
    {
        let errors = errors.clone();
        root.set_error_sink(move |error| errors.lock().push(error.to_string()));
    }

    root.schedule_root(TreeNode::component(component.clone()), Priority::Immediate);
    assert!(errors.lock().is_empty());
    let snapshot = host_snapshot(&root);

    // The second render calls one more hook: fatal for that render, the
    // committed tree stays.
    root.schedule_root(
        TreeNode::component(component).with_attr("extra", true),
        Priority::Immediate,
    );
    assert_eq!(errors.lock().len(), 1);
    assert!(errors.lock()[0].contains("hook order violation"));
    assert_eq!(host_snapshot(&root), snapshot);
}

#[test]
fn effects_run_after_commit_with_cleanup_between_runs() {
    let log: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));

    let component = {
        let log = log.clone();
        ComponentFn::fallible("Effectful", move |props| {
            let generation = match props.attributes().get("generation") {
                Some(AttrValue::Int(generation)) => *generation,
                _ => 0,
            };
            let log = log.clone();
            use_effect(generation, move || {
                log.lock().push(format!("effect {generation}"));
                let log = log.clone();
                cleanup(move || log.lock().push(format!("cleanup {generation}")))
            })?;
            Ok(TreeNode::element("div").with_attr("generation", generation))
        })
    };

    let (mut root, _) = new_root();
    let tree = |generation: i64| {
        TreeNode::component(component.clone()).with_attr("generation", generation)
    };

    root.schedule_root(tree(1), Priority::Immediate);
    assert_eq!(log.lock().as_slice(), &["effect 1".to_owned()]);

    // Unchanged deps: no re-run.
    root.schedule_root(tree(1), Priority::Immediate);
    assert_eq!(log.lock().len(), 1);

    // Changed deps: cleanup, then the new run.
    root.schedule_root(tree(2), Priority::Immediate);
    assert_eq!(
        log.lock().as_slice(),
        &[
            "effect 1".to_owned(),
            "cleanup 1".to_owned(),
            "effect 2".to_owned()
        ]
    );

    // Teardown runs the final cleanup.
    root.unmount();
    assert_eq!(log.lock().last().map(String::as_str), Some("cleanup 2"));
}

#[test]
fn effects_of_deleted_units_clean_up_after_the_commit() {
    let log: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let child = {
        let log = log.clone();
        ComponentFn::fallible("Child", move |_| {
            let log = log.clone();
            use_effect((), move || {
                log.lock().push("mounted".to_owned());
                let log = log.clone();
                cleanup(move || log.lock().push("unmounted".to_owned()))
            })?;
            Ok(TreeNode::text("child"))
        })
    };

    let (mut root, _) = new_root();
    root.schedule_root(
        TreeNode::element("div").with_child(TreeNode::component(child.clone())),
        Priority::Immediate,
    );
    assert_eq!(log.lock().as_slice(), &["mounted".to_owned()]);

    root.schedule_root(TreeNode::element("div"), Priority::Immediate);
    assert_eq!(
        log.lock().as_slice(),
        &["mounted".to_owned(), "unmounted".to_owned()]
    );
}

#[test]
fn node_refs_publish_on_mount_and_clear_on_delete() {
    let node_ref = NodeRef::new();
    let (mut root, _) = new_root();

    root.schedule_root(
        TreeNode::element("div")
            .with_child(TreeNode::element("span").with_ref(node_ref.clone())),
        Priority::Immediate,
    );
    let handle = node_ref.get::<usize>().expect("ref published");
    assert_eq!(root.renderer().nodes[handle].label, "span");

    root.schedule_root(TreeNode::element("div"), Priority::Immediate);
    assert!(!node_ref.is_set());
}

// ----------------------------------------------------------------------------
// Failure paths
// ----------------------------------------------------------------------------

#[test]
fn boundary_replaces_only_the_failing_subtree() {
    let broken = ComponentFn::fallible("Broken", |_| {
        Err(arbor_core::error::RenderError::component("Broken", "boom"))
    });

    let (mut root, _) = new_root();
    root.schedule_root(
        TreeNode::element("div")
            .with_child(
                TreeNode::element("section")
                    .with_boundary(ErrorBoundary::new(|error, _| {
                        TreeNode::text(format!("failed: {error}"))
                    }))
                    .with_child(TreeNode::component(broken)),
            )
            .with_child(TreeNode::text("sibling")),
        Priority::Immediate,
    );

    assert_eq!(root.status(), PassStatus::Committed);
    let snapshot = host_snapshot(&root);
    assert!(snapshot.contains("failed: component `Broken` failed: boom"));
    assert!(snapshot.contains("\"sibling\""));
}

#[test]
fn injected_host_fault_stops_commit_and_skips_effects() {
    let effect_runs = Arc::new(AtomicUsize::new(0));
    let component = {
        let effect_runs = effect_runs.clone();
        ComponentFn::fallible("WithEffect", move |props| {
            let generation = match props.attributes().get("generation") {
                Some(AttrValue::Int(generation)) => *generation,
                _ => 0,
            };
            let effect_runs = effect_runs.clone();
            use_effect(generation, move || {
                effect_runs.fetch_add(1, Ordering::SeqCst);
                None
            })?;
            // Three host nodes change per generation bump, so a faulted
            // commit stops partway through its records.
            Ok(TreeNode::element("div")
                .with_attr("generation", generation)
                .with_child(TreeNode::element("span").with_attr("generation", generation))
                .with_child(TreeNode::element("b").with_attr("generation", generation)))
        })
    };

    let errors: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let (mut root, _) = new_root();
    {
        let errors = errors.clone();
        root.set_error_sink(move |error| errors.lock().push(error.to_string()));
    }

    root.schedule_root(
        TreeNode::component(component.clone()).with_attr("generation", 1),
        Priority::Immediate,
    );
    assert_eq!(effect_runs.load(Ordering::SeqCst), 1);

    // Allow exactly two host operations of the next commit, then fault.
    root.renderer_mut().fail_after = Some(2);
    let ops_before = root.renderer().ops.len();
    root.schedule_root(
        TreeNode::component(component).with_attr("generation", 2),
        Priority::Immediate,
    );

    assert_eq!(errors.lock().len(), 1);
    assert!(errors.lock()[0].contains("host rejected mutation"));
    // The host saw exactly the operations before the fault point.
    assert_eq!(root.renderer().ops.len(), ops_before + 2);
    // No effect callback ran after the fault.
    assert_eq!(effect_runs.load(Ordering::SeqCst), 1);
}

#[test]
fn two_roots_schedule_independently() {
    let (mut first, _) = new_root();
    let (mut second, _) = new_root();

    first.schedule_root(
        TreeNode::element("div").with_child(TreeNode::text("one")),
        Priority::Immediate,
    );
    second.schedule_root(
        TreeNode::element("div").with_child(TreeNode::text("two")),
        Priority::Normal,
    );

    // The first root committed; the second has not been driven yet.
    assert_eq!(host_snapshot(&first), r#"#root[div["one"]]"#);
    assert_eq!(host_snapshot(&second), "#root");

    second.drive(&NeverYield);
    assert_eq!(host_snapshot(&second), r#"#root[div["two"]]"#);
}

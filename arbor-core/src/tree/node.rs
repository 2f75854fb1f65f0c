//! Description node types.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::RenderError;
use crate::graph::UnitId;

/// Attribute map of a description node. Insertion order is preserved so
/// diffing and host application stay deterministic.
pub type AttrMap = IndexMap<String, AttrValue>;

/// Shallow attribute diff: changed keys map to their new value, removed
/// keys map to `None`.
pub type AttrPatch = IndexMap<String, Option<AttrValue>>;

/// A plain-data attribute payload.
///
/// Attributes are deliberately restricted to data a host can interpret
/// without calling back into the engine; event handlers and similar live
/// on the host side of the [`Renderer`](crate::renderer::Renderer) seam.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for AttrValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for AttrValue {
    fn from(value: i32) -> Self {
        Self::Int(value.into())
    }
}

impl From<f64> for AttrValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
        }
    }
}

/// A component: a pure function from its own description node (carrying
/// props as attributes and children) to a rendered child description.
///
/// Identity is the function pointer, shared through `Arc`. Cloning a
/// `ComponentFn` and using it in many places keeps those nodes the same
/// kind; constructing a second `ComponentFn` from an identical closure
/// does not.
#[derive(Clone)]
pub struct ComponentFn {
    name: Arc<str>,
    render: Arc<dyn Fn(&TreeNode) -> Result<TreeNode, RenderError> + Send + Sync>,
}

impl ComponentFn {
    /// Wrap an infallible component function.
    pub fn new<F>(name: impl Into<Arc<str>>, render: F) -> Self
    where
        F: Fn(&TreeNode) -> TreeNode + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            render: Arc::new(move |props| Ok(render(props))),
        }
    }

    /// Wrap a component function that can fail.
    ///
    /// Hook operations return `Result`, so components using hooks are
    /// usually built with this constructor and `?`.
    pub fn fallible<F>(name: impl Into<Arc<str>>, render: F) -> Self
    where
        F: Fn(&TreeNode) -> Result<TreeNode, RenderError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            render: Arc::new(render),
        }
    }

    /// Display name used in errors and traces.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the component for the given description node.
    pub fn render(&self, props: &TreeNode) -> Result<TreeNode, RenderError> {
        (self.render)(props)
    }

    /// Whether two component nodes wrap the same function.
    pub fn same_function(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.render, &other.render)
    }
}

impl fmt::Debug for ComponentFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentFn")
            .field("name", &self.name)
            .finish()
    }
}

/// The kind of a description node.
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// A host node identified by a string tag.
    Element { tag: String },

    /// A host text node.
    Text { content: String },

    /// A component invocation; children and attributes act as props.
    Component { component: ComponentFn },

    /// A grouping node with no host counterpart.
    Fragment,
}

impl NodeKind {
    /// The type-mismatch check: same variant, and for elements the same
    /// tag, for components the same function. Text and fragment nodes
    /// always match their own variant; text content is diffed later.
    pub fn same_kind(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Element { tag: a }, Self::Element { tag: b }) => a == b,
            (Self::Text { .. }, Self::Text { .. }) => true,
            (Self::Component { component: a }, Self::Component { component: b }) => {
                a.same_function(b)
            }
            (Self::Fragment, Self::Fragment) => true,
            _ => false,
        }
    }

    /// Short label for traces and error messages.
    pub fn label(&self) -> &str {
        match self {
            Self::Element { tag } => tag,
            Self::Text { .. } => "#text",
            Self::Component { component } => component.name(),
            Self::Fragment => "#fragment",
        }
    }

    /// Whether nodes of this kind own a host node.
    pub fn is_host(&self) -> bool {
        matches!(self, Self::Element { .. } | Self::Text { .. })
    }
}

/// A writable cell the commit executor fills with the host handle of the
/// node, once it exists. Cleared again when the node is deleted.
///
/// The stored handle is type-erased; `get` downcasts to the renderer's
/// handle type. Refs on component or fragment nodes are never populated
/// since those nodes own no host handle.
#[derive(Clone, Default)]
pub struct NodeRef {
    cell: Arc<Mutex<Option<Box<dyn Any + Send>>>>,
}

impl NodeRef {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the handle, if the node is mounted and `H` is the renderer's
    /// handle type.
    pub fn get<H: Clone + 'static>(&self) -> Option<H> {
        self.cell
            .lock()
            .as_ref()
            .and_then(|boxed| boxed.downcast_ref::<H>())
            .cloned()
    }

    /// Whether a handle is currently published.
    pub fn is_set(&self) -> bool {
        self.cell.lock().is_some()
    }

    pub(crate) fn publish<H: Send + 'static>(&self, handle: H) {
        *self.cell.lock() = Some(Box::new(handle));
    }

    pub(crate) fn clear(&self) {
        *self.cell.lock() = None;
    }
}

impl fmt::Debug for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRef").field("set", &self.is_set()).finish()
    }
}

/// An error handler attached to a description node.
///
/// When a render inside the node's subtree fails, the nearest
/// ancestor-or-self boundary is asked for a fallback description that
/// replaces the subtree's children for the rest of the pass.
#[derive(Clone)]
pub struct ErrorBoundary {
    handler: Arc<dyn Fn(&RenderError, UnitId) -> TreeNode + Send + Sync>,
}

impl ErrorBoundary {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&RenderError, UnitId) -> TreeNode + Send + Sync + 'static,
    {
        Self {
            handler: Arc::new(handler),
        }
    }

    /// Produce the fallback description for a failed unit.
    pub fn fallback(&self, error: &RenderError, failed: UnitId) -> TreeNode {
        (self.handler)(error, failed)
    }
}

impl fmt::Debug for ErrorBoundary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ErrorBoundary")
    }
}

/// One node of a description tree. Built once per render, read-only
/// afterwards.
#[derive(Debug, Clone)]
pub struct TreeNode {
    kind: NodeKind,
    attributes: AttrMap,
    children: Vec<TreeNode>,
    key: Option<String>,
    node_ref: Option<NodeRef>,
    boundary: Option<ErrorBoundary>,
}

impl TreeNode {
    fn from_kind(kind: NodeKind) -> Self {
        Self {
            kind,
            attributes: AttrMap::new(),
            children: Vec::new(),
            key: None,
            node_ref: None,
            boundary: None,
        }
    }

    /// An element node with the given tag.
    pub fn element(tag: impl Into<String>) -> Self {
        Self::from_kind(NodeKind::Element { tag: tag.into() })
    }

    /// A text node.
    pub fn text(content: impl Into<String>) -> Self {
        Self::from_kind(NodeKind::Text {
            content: content.into(),
        })
    }

    /// A component invocation node.
    pub fn component(component: ComponentFn) -> Self {
        Self::from_kind(NodeKind::Component { component })
    }

    /// A fragment node.
    pub fn fragment() -> Self {
        Self::from_kind(NodeKind::Fragment)
    }

    /// Add or replace an attribute.
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Set the sibling identity key.
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Append one child.
    pub fn with_child(mut self, child: TreeNode) -> Self {
        self.children.push(child);
        self
    }

    /// Append several children.
    pub fn with_children(mut self, children: impl IntoIterator<Item = TreeNode>) -> Self {
        self.children.extend(children);
        self
    }

    /// Attach a node ref to be filled at commit.
    pub fn with_ref(mut self, node_ref: NodeRef) -> Self {
        self.node_ref = Some(node_ref);
        self
    }

    /// Attach an error boundary covering this node's subtree.
    pub fn with_boundary(mut self, boundary: ErrorBoundary) -> Self {
        self.boundary = Some(boundary);
        self
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn attributes(&self) -> &AttrMap {
        &self.attributes
    }

    pub fn children(&self) -> &[TreeNode] {
        &self.children
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn node_ref(&self) -> Option<&NodeRef> {
        self.node_ref.as_ref()
    }

    pub fn boundary(&self) -> Option<&ErrorBoundary> {
        self.boundary.as_ref()
    }

    /// Move the children out. The differ hands each child to its own
    /// diff task; the child units carry the structure from then on, so
    /// the stored description keeps only the node's own data.
    pub(crate) fn take_children(&mut self) -> Vec<TreeNode> {
        std::mem::take(&mut self.children)
    }

    /// Text content, for text nodes.
    pub fn text_content(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Text { content } => Some(content),
            _ => None,
        }
    }
}

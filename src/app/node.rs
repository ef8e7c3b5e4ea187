use crate::app::hooks::HookRegistry;
use derivative::*;
use futures::future::LocalBoxFuture;
use std::fmt;
use std::ops::Index;
use std::rc::Rc;
use std::str::FromStr;

pub type TaskError = Box<dyn std::error::Error + 'static>;
pub type TaskResult = Result<(), TaskError>;

/// Body of a test or a lifetime hook. Invoked once per run for tests, once per
/// applicable test for `beforeEach`/`afterEach` hooks.
pub type TestCallback = Rc<dyn Fn() -> LocalBoxFuture<'static, TaskResult>>;

/// Mode a node was declared with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CollectorMode {
    Run,
    Skip,
    Only,
    Todo,
}

impl Default for CollectorMode {
    fn default() -> Self {
        CollectorMode::Run
    }
}

impl FromStr for CollectorMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "run" => Ok(CollectorMode::Run),
            "skip" => Ok(CollectorMode::Skip),
            "only" => Ok(CollectorMode::Only),
            "todo" => Ok(CollectorMode::Todo),
            _ => Err(format!("Invalid run mode '{}'", s)),
        }
    }
}

/// Mode a node ends up with once the whole tree is known.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RunMode {
    Run,
    Skip,
    Todo,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeKind {
    Suite,
    Test,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Identifier {
    Root,
    Named(String),
}

impl Identifier {
    pub fn as_str(&self) -> &str {
        match self {
            Identifier::Root => "<root>",
            Identifier::Named(name) => name,
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Derivative)]
#[derivative(Debug)]
pub struct Node {
    identifier: Identifier,
    kind: NodeKind,
    declared_mode: CollectorMode,
    resolved_mode: Option<RunMode>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    #[derivative(Debug = "ignore")]
    body: Option<TestCallback>,
    hooks: HookRegistry,
}

impl Node {
    pub fn identifier(&self) -> &Identifier {
        &self.identifier
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn is_suite(&self) -> bool {
        self.kind == NodeKind::Suite
    }

    pub fn declared_mode(&self) -> CollectorMode {
        self.declared_mode
    }

    pub fn resolved_mode(&self) -> Option<RunMode> {
        self.resolved_mode
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn body(&self) -> Option<&TestCallback> {
        self.body.as_ref()
    }

    pub fn hooks(&self) -> &HookRegistry {
        &self.hooks
    }
}

/// Arena of collected nodes.
///
/// Nodes are stored in registration (pre-order) order, so a parent always has
/// a smaller index than any of its descendants. The root suite is index 0.
#[derive(Debug)]
pub struct NodeTree {
    nodes: Vec<Node>,
}

impl NodeTree {
    pub(crate) fn new() -> Self {
        Self {
            nodes: vec![Node {
                identifier: Identifier::Root,
                kind: NodeKind::Suite,
                declared_mode: CollectorMode::Run,
                resolved_mode: None,
                parent: None,
                children: Vec::new(),
                body: None,
                hooks: HookRegistry::default(),
            }],
        }
    }

    #[inline]
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Number of nodes, the root suite included.
    #[inline]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Whether nothing was registered below the root suite.
    pub fn is_blank(&self) -> bool {
        self.nodes[0].children.is_empty()
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn ids(&self) -> impl DoubleEndedIterator<Item = NodeId> {
        (0..self.nodes.len()).map(NodeId)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    /// Enclosing suites of `id`, innermost first. Does not include `id`.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.nodes[id.0].parent, move |current| {
            self.nodes[current.0].parent
        })
    }

    /// Identifiers from the outermost user suite down to `id`; the root is left out.
    pub fn path(&self, id: NodeId) -> Vec<&str> {
        let mut path: Vec<&str> = self
            .ancestors(id)
            .filter(|ancestor| *ancestor != self.root())
            .map(|ancestor| self.nodes[ancestor.0].identifier.as_str())
            .collect();
        path.reverse();
        if id != self.root() {
            path.push(self.nodes[id.0].identifier.as_str());
        }
        path
    }

    pub fn full_name(&self, id: NodeId) -> String {
        self.path(id).join(" > ")
    }

    pub fn find(&self, path: &[&str]) -> Option<NodeId> {
        path.iter().try_fold(self.root(), |current, name| {
            self.child_named(current, name)
        })
    }

    pub fn child_named(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        self.nodes[parent.0]
            .children
            .iter()
            .copied()
            .find(|child| self.nodes[child.0].identifier.as_str() == name)
    }

    pub fn is_resolved(&self) -> bool {
        self.nodes.iter().all(|node| node.resolved_mode.is_some())
    }

    pub(crate) fn push_suite(
        &mut self,
        parent: NodeId,
        identifier: String,
        mode: CollectorMode,
    ) -> NodeId {
        self.push(parent, identifier, NodeKind::Suite, mode, None)
    }

    pub(crate) fn push_test(
        &mut self,
        parent: NodeId,
        identifier: String,
        mode: CollectorMode,
        body: Option<TestCallback>,
    ) -> NodeId {
        self.push(parent, identifier, NodeKind::Test, mode, body)
    }

    fn push(
        &mut self,
        parent: NodeId,
        identifier: String,
        kind: NodeKind,
        declared_mode: CollectorMode,
        body: Option<TestCallback>,
    ) -> NodeId {
        debug_assert!(self.nodes[parent.0].is_suite(), "tests cannot own children");
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            identifier: Identifier::Named(identifier),
            kind,
            declared_mode,
            resolved_mode: None,
            parent: Some(parent),
            children: Vec::new(),
            body,
            hooks: HookRegistry::default(),
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    pub(crate) fn hooks_mut(&mut self, suite: NodeId) -> &mut HookRegistry {
        &mut self.nodes[suite.0].hooks
    }

    pub(crate) fn set_resolved(&mut self, id: NodeId, mode: RunMode) {
        self.nodes[id.0].resolved_mode = Some(mode);
    }
}

impl Index<NodeId> for NodeTree {
    type Output = Node;

    fn index(&self, id: NodeId) -> &Node {
        self.node(id)
    }
}

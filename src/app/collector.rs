use crate::app::error::StructuralError;
use crate::app::executor::panic_message;
use crate::app::hooks::LifetimeHook;
use crate::app::node::{CollectorMode, NodeId, NodeTree, TaskResult, TestCallback};
use futures::FutureExt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

/// Expands a suite: receives the bridge while the suite is the open one.
pub type NodeFactory<'f> =
    Box<dyn FnOnce(&mut dyn HostBridge) -> Result<(), StructuralError> + 'f>;

/// The three registration operations a host calls while a test module is
/// being collected. Every operation targets the currently open suite.
pub trait HostBridge {
    fn register_collector_task(
        &mut self,
        identifier: String,
        callback: Option<TestCallback>,
        mode: CollectorMode,
    ) -> Result<(), StructuralError>;

    fn register_collector_node(
        &mut self,
        identifier: String,
        factory: NodeFactory<'_>,
        mode: CollectorMode,
    ) -> Result<(), StructuralError>;

    fn register_lifetime_hook(
        &mut self,
        hook: LifetimeHook,
        callback: TestCallback,
    ) -> Result<(), StructuralError>;
}

/// Builds a [`NodeTree`] out of bridge calls.
///
/// The open suite is tracked on an explicit stack: a node registration pushes
/// the new suite, runs its factory to completion and pops it again.
#[derive(Debug)]
pub struct Collector {
    tree: Option<NodeTree>,
    open: Vec<NodeId>,
    failure: Option<StructuralError>,
}

impl Collector {
    pub fn new() -> Self {
        let tree = NodeTree::new();
        let open = vec![tree.root()];
        Self {
            tree: Some(tree),
            open,
            failure: None,
        }
    }

    /// Closes the root suite and hands out the collected tree.
    ///
    /// Once any registration failed, the tree is discarded and the first
    /// failure is returned instead.
    pub fn finish(&mut self) -> Result<NodeTree, StructuralError> {
        let tree = self.tree.take().ok_or(StructuralError::AlreadyCollected)?;
        self.open.clear();
        if let Some(failure) = self.failure.take() {
            debug!("Discarding collected tree: {}", failure);
            return Err(failure);
        }
        debug!("Collected {} nodes", tree.node_count() - 1);
        Ok(tree)
    }

    /// Remembers the first failed registration; every later one repeats it.
    fn latch<R>(&mut self, register: R) -> Result<(), StructuralError>
    where
        R: FnOnce(&mut Self) -> Result<(), StructuralError>,
    {
        if let Some(failure) = &self.failure {
            return Err(failure.clone());
        }
        let result = register(self);
        if let Err(err) = &result {
            if self.failure.is_none() {
                self.failure = Some(err.clone());
            }
        }
        result
    }

    fn add_task(
        &mut self,
        identifier: String,
        callback: Option<TestCallback>,
        mode: CollectorMode,
    ) -> Result<(), StructuralError> {
        let (tree, suite) = self.open_suite(format!("test '{}'", identifier))?;
        Self::ensure_unique(tree, suite, &identifier)?;
        // A test without a body can only be reported as todo.
        let mode = if callback.is_some() { mode } else { CollectorMode::Todo };
        trace!("Registering test '{}' ({:?})", identifier, mode);
        tree.push_test(suite, identifier, mode, callback);
        Ok(())
    }

    fn add_suite(
        &mut self,
        identifier: String,
        factory: NodeFactory<'_>,
        mode: CollectorMode,
    ) -> Result<(), StructuralError> {
        let (tree, parent) = self.open_suite(format!("suite '{}'", identifier))?;
        Self::ensure_unique(tree, parent, &identifier)?;
        trace!("Registering suite '{}' ({:?})", identifier, mode);
        let suite = tree.push_suite(parent, identifier, mode);

        self.open.push(suite);
        let expanded = panic::catch_unwind(AssertUnwindSafe(|| factory(&mut *self)));
        self.open.pop();

        match expanded {
            Ok(result) => result,
            Err(payload) => {
                let suite = match self.tree.as_ref() {
                    Some(tree) => tree.full_name(suite),
                    None => String::new(),
                };
                Err(StructuralError::FactoryPanicked {
                    suite,
                    message: panic_message(&*payload),
                })
            }
        }
    }

    fn add_hook(&mut self, hook: LifetimeHook, callback: TestCallback) -> Result<(), StructuralError> {
        let (tree, suite) = self.open_suite(format!("{} hook", hook))?;
        trace!("Registering {} hook on '{}'", hook, tree[suite].identifier());
        tree.hooks_mut(suite).add(hook, callback);
        Ok(())
    }

    fn open_suite(&mut self, what: String) -> Result<(&mut NodeTree, NodeId), StructuralError> {
        match (self.tree.as_mut(), self.open.last()) {
            (Some(tree), Some(suite)) => Ok((tree, *suite)),
            _ => Err(StructuralError::NoOpenSuite { what }),
        }
    }

    fn ensure_unique(
        tree: &NodeTree,
        parent: NodeId,
        identifier: &str,
    ) -> Result<(), StructuralError> {
        match tree.child_named(parent, identifier) {
            Some(_) => Err(StructuralError::DuplicateIdentifier {
                parent: tree[parent].identifier().to_string(),
                identifier: identifier.to_owned(),
            }),
            None => Ok(()),
        }
    }
}

impl Default for Collector {
    fn default() -> Self {
        Collector::new()
    }
}

impl HostBridge for Collector {
    fn register_collector_task(
        &mut self,
        identifier: String,
        callback: Option<TestCallback>,
        mode: CollectorMode,
    ) -> Result<(), StructuralError> {
        self.latch(|collector| collector.add_task(identifier, callback, mode))
    }

    fn register_collector_node(
        &mut self,
        identifier: String,
        factory: NodeFactory<'_>,
        mode: CollectorMode,
    ) -> Result<(), StructuralError> {
        self.latch(|collector| collector.add_suite(identifier, factory, mode))
    }

    fn register_lifetime_hook(
        &mut self,
        hook: LifetimeHook,
        callback: TestCallback,
    ) -> Result<(), StructuralError> {
        self.latch(|collector| collector.add_hook(hook, callback))
    }
}

/// Collects a test module whose top level is `factory`.
pub fn collect<F>(factory: F) -> Result<NodeTree, StructuralError>
where
    F: FnOnce(&mut Scope<'_>),
{
    let mut collector = Collector::new();
    {
        let mut scope = Scope::new(&mut collector);
        factory(&mut scope);
        scope.finish()?;
    }
    collector.finish()
}

/// Public registration API handed to suite factories.
///
/// Registration calls do not return errors themselves: the first structural
/// error is kept, later calls are ignored and the error surfaces once the
/// factory returns.
pub struct Scope<'b> {
    bridge: &'b mut dyn HostBridge,
    failure: Option<StructuralError>,
}

impl<'b> Scope<'b> {
    pub fn new(bridge: &'b mut dyn HostBridge) -> Self {
        Self {
            bridge,
            failure: None,
        }
    }

    pub fn finish(self) -> Result<(), StructuralError> {
        match self.failure {
            Some(failure) => Err(failure),
            None => Ok(()),
        }
    }

    pub fn skip(&mut self) -> Modifier<'_, 'b> {
        self.with_mode(CollectorMode::Skip)
    }

    pub fn only(&mut self) -> Modifier<'_, 'b> {
        self.with_mode(CollectorMode::Only)
    }

    pub fn todo(&mut self) -> Modifier<'_, 'b> {
        self.with_mode(CollectorMode::Todo)
    }

    pub fn with_mode(&mut self, mode: CollectorMode) -> Modifier<'_, 'b> {
        Modifier { scope: self, mode }
    }

    pub fn test<F, Fut>(&mut self, identifier: impl Into<String>, body: F)
    where
        F: Fn() -> Fut + 'static,
        Fut: Future<Output = TaskResult> + 'static,
    {
        self.with_mode(CollectorMode::Run).test(identifier, body)
    }

    pub fn it<F, Fut>(&mut self, identifier: impl Into<String>, body: F)
    where
        F: Fn() -> Fut + 'static,
        Fut: Future<Output = TaskResult> + 'static,
    {
        self.with_mode(CollectorMode::Run).it(identifier, body)
    }

    pub fn describe<F>(&mut self, identifier: impl Into<String>, factory: F)
    where
        F: FnOnce(&mut Scope<'_>),
    {
        self.with_mode(CollectorMode::Run).describe(identifier, factory)
    }

    pub fn suite<F>(&mut self, identifier: impl Into<String>, factory: F)
    where
        F: FnOnce(&mut Scope<'_>),
    {
        self.with_mode(CollectorMode::Run).suite(identifier, factory)
    }

    pub fn create_node<F>(&mut self, identifier: impl Into<String>, factory: F)
    where
        F: FnOnce(&mut Scope<'_>),
    {
        self.with_mode(CollectorMode::Run).create_node(identifier, factory)
    }

    pub fn before_all<F, Fut>(&mut self, callback: F)
    where
        F: Fn() -> Fut + 'static,
        Fut: Future<Output = TaskResult> + 'static,
    {
        self.hook(LifetimeHook::BeforeAll, callback)
    }

    pub fn after_all<F, Fut>(&mut self, callback: F)
    where
        F: Fn() -> Fut + 'static,
        Fut: Future<Output = TaskResult> + 'static,
    {
        self.hook(LifetimeHook::AfterAll, callback)
    }

    pub fn before_each<F, Fut>(&mut self, callback: F)
    where
        F: Fn() -> Fut + 'static,
        Fut: Future<Output = TaskResult> + 'static,
    {
        self.hook(LifetimeHook::BeforeEach, callback)
    }

    pub fn after_each<F, Fut>(&mut self, callback: F)
    where
        F: Fn() -> Fut + 'static,
        Fut: Future<Output = TaskResult> + 'static,
    {
        self.hook(LifetimeHook::AfterEach, callback)
    }

    fn hook<F, Fut>(&mut self, hook: LifetimeHook, callback: F)
    where
        F: Fn() -> Fut + 'static,
        Fut: Future<Output = TaskResult> + 'static,
    {
        let callback = into_callback(callback);
        self.forward(|bridge| bridge.register_lifetime_hook(hook, callback));
    }

    fn forward<R>(&mut self, register: R)
    where
        R: FnOnce(&mut dyn HostBridge) -> Result<(), StructuralError>,
    {
        if self.failure.is_some() {
            return;
        }
        if let Err(err) = register(&mut *self.bridge) {
            self.failure = Some(err);
        }
    }
}

/// A registration call carrying a declared mode, as produced by
/// `skip()`, `only()` and `todo()`.
pub struct Modifier<'s, 'b> {
    scope: &'s mut Scope<'b>,
    mode: CollectorMode,
}

impl<'s, 'b> Modifier<'s, 'b> {
    pub fn test<F, Fut>(self, identifier: impl Into<String>, body: F)
    where
        F: Fn() -> Fut + 'static,
        Fut: Future<Output = TaskResult> + 'static,
    {
        let identifier = identifier.into();
        let callback = into_callback(body);
        let mode = self.mode;
        self.scope
            .forward(|bridge| bridge.register_collector_task(identifier, Some(callback), mode));
    }

    pub fn it<F, Fut>(self, identifier: impl Into<String>, body: F)
    where
        F: Fn() -> Fut + 'static,
        Fut: Future<Output = TaskResult> + 'static,
    {
        self.test(identifier, body)
    }

    pub fn describe<F>(self, identifier: impl Into<String>, factory: F)
    where
        F: FnOnce(&mut Scope<'_>),
    {
        let identifier = identifier.into();
        let mode = self.mode;
        let factory: NodeFactory<'_> = Box::new(move |bridge: &mut dyn HostBridge| {
            let mut scope = Scope::new(bridge);
            factory(&mut scope);
            scope.finish()
        });
        self.scope
            .forward(|bridge| bridge.register_collector_node(identifier, factory, mode));
    }

    pub fn suite<F>(self, identifier: impl Into<String>, factory: F)
    where
        F: FnOnce(&mut Scope<'_>),
    {
        self.describe(identifier, factory)
    }

    pub fn create_node<F>(self, identifier: impl Into<String>, factory: F)
    where
        F: FnOnce(&mut Scope<'_>),
    {
        self.describe(identifier, factory)
    }
}

pub fn into_callback<F, Fut>(body: F) -> TestCallback
where
    F: Fn() -> Fut + 'static,
    Fut: Future<Output = TaskResult> + 'static,
{
    Rc::new(move || body().boxed_local())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::node::NodeKind;
    use futures::future::ready;

    fn pass() -> futures::future::Ready<TaskResult> {
        ready(Ok(()))
    }

    #[test]
    fn test_collects_in_registration_order() {
        let tree = collect(|s| {
            s.test("first", pass);
            s.describe("group", |s| {
                s.it("inner", pass);
                s.skip().it("skipped", pass);
            });
            s.only().test("focused", pass);
            s.todo().suite("later", |_| {});
        })
        .unwrap();

        let names: Vec<String> = tree
            .ids()
            .skip(1)
            .map(|id| tree.full_name(id))
            .collect();
        assert_eq!(
            names,
            vec!["first", "group", "group > inner", "group > skipped", "focused", "later"]
        );

        let group = tree.find(&["group"]).unwrap();
        assert_eq!(tree[group].kind(), NodeKind::Suite);
        let skipped = tree.find(&["group", "skipped"]).unwrap();
        assert_eq!(tree[skipped].declared_mode(), CollectorMode::Skip);
        let focused = tree.find(&["focused"]).unwrap();
        assert_eq!(tree[focused].declared_mode(), CollectorMode::Only);
        let later = tree.find(&["later"]).unwrap();
        assert_eq!(tree[later].declared_mode(), CollectorMode::Todo);
    }

    #[test]
    fn test_hooks_attach_to_open_suite() {
        let tree = collect(|s| {
            s.before_all(pass);
            s.describe("inner", |s| {
                s.before_each(pass);
                s.after_each(pass);
                s.test("t", pass);
            });
            s.after_all(pass);
        })
        .unwrap();

        let root = tree.root();
        let inner = tree.find(&["inner"]).unwrap();
        assert_eq!(tree.lifetime_hooks(root, LifetimeHook::BeforeAll).len(), 1);
        assert_eq!(tree.lifetime_hooks(root, LifetimeHook::AfterAll).len(), 1);
        assert!(tree.lifetime_hooks(inner, LifetimeHook::BeforeAll).is_empty());
        assert_eq!(tree[inner].hooks().get(LifetimeHook::BeforeEach).len(), 1);
        assert_eq!(tree[inner].hooks().get(LifetimeHook::AfterEach).len(), 1);
    }

    #[test]
    fn test_duplicate_sibling_is_structural_error() {
        let result = collect(|s| {
            s.describe("group", |s| {
                s.test("same", pass);
                s.test("same", pass);
            });
        });

        assert_eq!(
            result.unwrap_err(),
            StructuralError::DuplicateIdentifier {
                parent: "group".to_owned(),
                identifier: "same".to_owned(),
            }
        );
    }

    #[test]
    fn test_same_name_in_different_suites_is_fine() {
        let tree = collect(|s| {
            s.describe("a", |s| s.test("same", pass));
            s.describe("b", |s| s.test("same", pass));
        })
        .unwrap();

        assert!(tree.find(&["a", "same"]).is_some());
        assert!(tree.find(&["b", "same"]).is_some());
    }

    #[test]
    fn test_panicking_factory_aborts_collection() {
        let result = collect(|s| {
            s.describe("outer", |s| {
                s.describe("broken", |_| panic!("no luck"));
            });
        });

        assert_eq!(
            result.unwrap_err(),
            StructuralError::FactoryPanicked {
                suite: "outer > broken".to_owned(),
                message: "no luck".to_owned(),
            }
        );
    }

    #[test]
    fn test_failed_bridge_call_discards_tree() {
        let mut collector = Collector::new();
        let result = collector.register_collector_node(
            "broken".to_owned(),
            Box::new(|bridge: &mut dyn HostBridge| -> Result<(), StructuralError> {
                bridge.register_collector_task(
                    "half".to_owned(),
                    Some(into_callback(pass)),
                    CollectorMode::Run,
                )?;
                panic!("gave up")
            }),
            CollectorMode::Run,
        );
        let failure = StructuralError::FactoryPanicked {
            suite: "broken".to_owned(),
            message: "gave up".to_owned(),
        };
        assert_eq!(result, Err(failure.clone()));

        // Later registrations keep reporting the first failure.
        let later = collector.register_collector_task(
            "later".to_owned(),
            Some(into_callback(pass)),
            CollectorMode::Run,
        );
        assert_eq!(later, Err(failure.clone()));
        assert_eq!(collector.finish().unwrap_err(), failure);
        assert_eq!(collector.finish().unwrap_err(), StructuralError::AlreadyCollected);
    }

    #[test]
    fn test_bodyless_task_is_todo() {
        let mut collector = Collector::new();
        collector
            .register_collector_task("pending".to_owned(), None, CollectorMode::Only)
            .unwrap();
        let tree = collector.finish().unwrap();

        let pending = tree.find(&["pending"]).unwrap();
        assert_eq!(tree[pending].declared_mode(), CollectorMode::Todo);
        assert!(tree[pending].body().is_none());
    }

    #[test]
    fn test_registration_after_finish_has_no_open_suite() {
        let mut collector = Collector::new();
        collector.finish().unwrap();

        let result = collector.register_lifetime_hook(
            LifetimeHook::BeforeEach,
            into_callback(pass),
        );
        assert_eq!(
            result,
            Err(StructuralError::NoOpenSuite {
                what: "beforeEach hook".to_owned()
            })
        );
        assert_eq!(collector.finish().unwrap_err(), StructuralError::AlreadyCollected);
    }

    #[test]
    fn test_bridge_factory_nests_suites() {
        let mut collector = Collector::new();
        collector
            .register_collector_node(
                "outer".to_owned(),
                Box::new(|bridge: &mut dyn HostBridge| {
                    bridge.register_collector_node(
                        "inner".to_owned(),
                        Box::new(|bridge: &mut dyn HostBridge| {
                            bridge.register_collector_task(
                                "leaf".to_owned(),
                                Some(into_callback(pass)),
                                CollectorMode::Run,
                            )
                        }),
                        CollectorMode::Skip,
                    )
                }),
                CollectorMode::Run,
            )
            .unwrap();
        collector
            .register_collector_task("after".to_owned(), Some(into_callback(pass)), CollectorMode::Run)
            .unwrap();
        let tree = collector.finish().unwrap();

        let leaf = tree.find(&["outer", "inner", "leaf"]).unwrap();
        let after = tree.find(&["after"]).unwrap();
        assert_eq!(tree[after].parent(), Some(tree.root()));
        assert_eq!(tree.path(leaf), vec!["outer", "inner", "leaf"]);
    }
}

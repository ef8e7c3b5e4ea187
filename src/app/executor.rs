use crate::app::error::{Failure, StructuralError};
use crate::app::hooks::LifetimeHook;
use crate::app::node::{NodeId, NodeKind, NodeTree, RunMode, TestCallback};
use crate::app::result::{ExecutionResult, NodeResult, Status};
use crate::reporter::{Reporter, SilentReporter};
use futures::future::LocalBoxFuture;
use futures::FutureExt;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq)]
pub struct RunnerOptions {
    /// Upper bound for a single test body. `None` waits forever.
    pub test_timeout: Option<Duration>,
    /// Upper bound for a single hook invocation.
    pub hook_timeout: Option<Duration>,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            test_timeout: Some(Duration::from_secs(5)),
            hook_timeout: Some(Duration::from_secs(10)),
        }
    }
}

/// How a subtree is entered.
#[derive(Debug, Clone)]
enum Gate {
    /// Nodes run according to their resolved mode.
    Open,
    /// An enclosing suite was skipped or marked todo; nothing below runs.
    Bypass(Status),
    /// An enclosing `beforeAll` hook failed; tests that would have run fail with it.
    Blocked(Failure),
}

/// Executes a resolved [`NodeTree`] depth-first, one node at a time.
pub struct Runner {
    options: RunnerOptions,
    reporter: Rc<dyn Reporter>,
}

impl Runner {
    pub fn new(options: RunnerOptions) -> Self {
        Self {
            options,
            reporter: Rc::new(SilentReporter),
        }
    }

    pub fn with_reporter(options: RunnerOptions, reporter: Rc<dyn Reporter>) -> Self {
        Self { options, reporter }
    }

    pub fn options(&self) -> &RunnerOptions {
        &self.options
    }

    /// Runs a resolved tree. Timeouts only apply when driven by a tokio runtime.
    pub async fn run(&self, tree: &NodeTree) -> Result<NodeResult, StructuralError> {
        if !tree.is_resolved() {
            return Err(StructuralError::Unresolved);
        }
        let result = self.visit(tree, tree.root(), Gate::Open).await;
        self.reporter.on_finished(&result);
        Ok(result)
    }

    fn visit<'a>(
        &'a self,
        tree: &'a NodeTree,
        id: NodeId,
        gate: Gate,
    ) -> LocalBoxFuture<'a, NodeResult> {
        async move {
            match tree[id].kind() {
                NodeKind::Suite => self.visit_suite(tree, id, gate).await,
                NodeKind::Test => self.visit_test(tree, id, gate).await,
            }
        }
        .boxed_local()
    }

    async fn visit_suite(&self, tree: &NodeTree, id: NodeId, gate: Gate) -> NodeResult {
        let gate = match (gate, mode(tree, id)) {
            (Gate::Open, RunMode::Skip) => Gate::Bypass(Status::Skipped),
            (Gate::Open, RunMode::Todo) => Gate::Bypass(Status::Todo),
            (Gate::Blocked(_), RunMode::Skip) => Gate::Bypass(Status::Skipped),
            (Gate::Blocked(_), RunMode::Todo) => Gate::Bypass(Status::Todo),
            (gate, _) => gate,
        };
        let enters = matches!(gate, Gate::Open) && has_runnable_descendant(tree, id);
        if enters {
            self.reporter.on_suite_start(tree, id);
        }
        let started = Instant::now();

        let mut hook_failures = Vec::new();
        let child_gate = if enters {
            match self.run_hooks(tree.lifetime_hooks(id, LifetimeHook::BeforeAll)).await {
                Ok(()) => Gate::Open,
                Err(failure) => {
                    let failure = failure.in_hook(LifetimeHook::BeforeAll);
                    warn!("beforeAll of '{}' failed: {}", tree.full_name(id), failure);
                    hook_failures.push(failure.clone());
                    Gate::Blocked(failure)
                }
            }
        } else {
            gate
        };

        let mut children = Vec::with_capacity(tree.children(id).len());
        for child in tree.children(id) {
            children.push(self.visit(tree, *child, child_gate.clone()).await);
        }

        if enters {
            for failure in self.collect_hooks(tree.lifetime_hooks(id, LifetimeHook::AfterAll)).await {
                let failure = failure.in_hook(LifetimeHook::AfterAll);
                warn!("afterAll of '{}' failed: {}", tree.full_name(id), failure);
                hook_failures.push(failure);
            }
        }

        let mut result = aggregate(&children, started.elapsed());
        if !hook_failures.is_empty() {
            // Hook failures take precedence over failing children.
            let nested = result.error.take();
            let mut failures = hook_failures.into_iter().chain(nested);
            result = ExecutionResult {
                status: Status::Failed,
                error: failures.next(),
                attached: failures.collect(),
                duration: result.duration,
            };
        }
        let result = NodeResult {
            id,
            identifier: tree[id].identifier().to_string(),
            kind: NodeKind::Suite,
            result,
            children,
        };
        if enters {
            self.reporter.on_suite_end(tree, &result);
        }
        result
    }

    async fn visit_test(&self, tree: &NodeTree, id: NodeId, gate: Gate) -> NodeResult {
        let result = match (gate, mode(tree, id), tree[id].body()) {
            (_, RunMode::Todo, _) | (_, RunMode::Run, None) => ExecutionResult::todo(),
            (Gate::Bypass(status), _, _) => bypassed(status),
            (_, RunMode::Skip, _) => ExecutionResult::skipped(),
            (Gate::Blocked(failure), RunMode::Run, Some(_)) => {
                ExecutionResult::failed(failure, Duration::default())
            }
            (Gate::Open, RunMode::Run, Some(body)) => {
                self.reporter.on_test_start(tree, id);
                let result = self.run_test(tree, id, body).await;
                let result = NodeResult {
                    id,
                    identifier: tree[id].identifier().to_string(),
                    kind: NodeKind::Test,
                    result,
                    children: Vec::new(),
                };
                self.reporter.on_test_end(tree, &result);
                return result;
            }
        };
        NodeResult {
            id,
            identifier: tree[id].identifier().to_string(),
            kind: NodeKind::Test,
            result,
            children: Vec::new(),
        }
    }

    async fn run_test(&self, tree: &NodeTree, id: NodeId, body: &TestCallback) -> ExecutionResult {
        let started = Instant::now();
        let before = self.run_hooks(tree.before_each_chain(id)).await;
        let outcome = match before {
            Ok(()) => invoke(body, self.options.test_timeout).await,
            Err(failure) => Err(failure.in_hook(LifetimeHook::BeforeEach)),
        };
        let cleanup = self.collect_hooks(tree.after_each_chain(id)).await;

        let mut result = match outcome {
            Ok(()) => ExecutionResult::passed(Duration::default()),
            Err(failure) => ExecutionResult::failed(failure, Duration::default()),
        };
        for failure in cleanup {
            result.record(failure.in_hook(LifetimeHook::AfterEach));
        }
        result.duration = started.elapsed();
        debug!(
            "Test '{}' {:?} in {} ms",
            tree.full_name(id),
            result.status,
            result.duration_ms()
        );
        result
    }

    /// Runs hooks in order, stopping at the first failure.
    async fn run_hooks<'h, I>(&self, hooks: I) -> Result<(), Failure>
    where
        I: IntoIterator<Item = &'h TestCallback>,
    {
        for hook in hooks {
            invoke(hook, self.options.hook_timeout).await?;
        }
        Ok(())
    }

    /// Runs every hook in order, collecting all failures.
    async fn collect_hooks<'h, I>(&self, hooks: I) -> Vec<Failure>
    where
        I: IntoIterator<Item = &'h TestCallback>,
    {
        let mut failures = Vec::new();
        for hook in hooks {
            if let Err(failure) = invoke(hook, self.options.hook_timeout).await {
                failures.push(failure);
            }
        }
        failures
    }
}

/// Calls a test or hook callback, turning returned errors, panics and
/// timeouts into a [`Failure`]. A timed out operation is dropped.
///
/// Timeouts need a tokio runtime with the time driver; on any other executor
/// `limit` is ignored.
pub async fn invoke(callback: &TestCallback, limit: Option<Duration>) -> Result<(), Failure> {
    let limit = limit.filter(|_| tokio::runtime::Handle::try_current().is_ok());
    let pending = match panic::catch_unwind(AssertUnwindSafe(|| callback())) {
        Ok(pending) => AssertUnwindSafe(pending).catch_unwind(),
        Err(payload) => return Err(Failure::Panic(panic_message(&*payload))),
    };
    let outcome = match limit {
        Some(limit) => match tokio::time::timeout(limit, pending).await {
            Ok(outcome) => outcome,
            Err(_) => return Err(Failure::Timeout(limit)),
        },
        None => pending.await,
    };
    match outcome {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(Failure::Error(err.to_string())),
        Err(payload) => Err(Failure::Panic(panic_message(&*payload))),
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_owned()
    }
}

fn mode(tree: &NodeTree, id: NodeId) -> RunMode {
    tree[id].resolved_mode().unwrap_or(RunMode::Skip)
}

fn bypassed(status: Status) -> ExecutionResult {
    match status {
        Status::Todo => ExecutionResult::todo(),
        _ => ExecutionResult::skipped(),
    }
}

/// Whether entering `suite` would execute at least one test body.
fn has_runnable_descendant(tree: &NodeTree, suite: NodeId) -> bool {
    tree.children(suite).iter().any(|child| {
        let node = &tree[*child];
        mode(tree, *child) == RunMode::Run
            && match node.kind() {
                NodeKind::Test => node.body().is_some(),
                NodeKind::Suite => has_runnable_descendant(tree, *child),
            }
    })
}

/// Suite status derived from its children.
fn aggregate(children: &[NodeResult], duration: Duration) -> ExecutionResult {
    let failed = children.iter().filter(|child| child.status() == Status::Failed).count();
    let mut result = if failed > 0 {
        ExecutionResult::failed(Failure::Nested(count_failed_tests(children)), duration)
    } else if children.iter().any(|child| child.status() == Status::Passed) {
        ExecutionResult::passed(duration)
    } else if !children.is_empty() && children.iter().all(|child| child.status() == Status::Todo) {
        ExecutionResult::todo()
    } else {
        ExecutionResult::skipped()
    };
    result.duration = duration;
    result
}

/// Failed tests below `children`, plus suites that failed through their own hooks.
fn count_failed_tests(children: &[NodeResult]) -> usize {
    children
        .iter()
        .map(|child| match child.kind {
            NodeKind::Test if child.status() == Status::Failed => 1,
            NodeKind::Test => 0,
            NodeKind::Suite => {
                let own = matches!(child.error(), Some(Failure::Hook { .. })) as usize;
                own + count_failed_tests(&child.children)
            }
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::collector::into_callback;
    use crate::app::node::TaskError;
    use crate::app::node::TaskResult;
    use futures::future::{ready, Ready};

    async fn explode() -> TaskResult {
        panic!("kaboom")
    }

    async fn stall() -> TaskResult {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(())
    }

    #[tokio::test]
    async fn test_invoke_maps_outcomes() {
        let ok = into_callback(|| ready(Ok(())));
        let err = into_callback(|| ready(Err(TaskError::from("nope"))));
        let panicking = into_callback(explode);
        let panicking_early = into_callback(|| -> Ready<TaskResult> { panic!("early") });

        assert_eq!(invoke(&ok, None).await, Ok(()));
        assert_eq!(invoke(&err, None).await, Err(Failure::Error("nope".to_owned())));
        assert_eq!(
            invoke(&panicking, None).await,
            Err(Failure::Panic("kaboom".to_owned()))
        );
        assert_eq!(
            invoke(&panicking_early, None).await,
            Err(Failure::Panic("early".to_owned()))
        );
    }

    #[tokio::test]
    async fn test_invoke_abandons_slow_callback() {
        let slow = into_callback(stall);
        let limit = Duration::from_millis(20);

        assert_eq!(invoke(&slow, Some(limit)).await, Err(Failure::Timeout(limit)));
    }

    #[test]
    fn test_runs_without_tokio_runtime() {
        let mut tree = crate::app::collector::collect(|s| {
            s.it("plain", || ready(Ok(())));
            s.it("failing", || ready(Err(TaskError::from("nope"))));
        })
        .unwrap();
        crate::app::resolver::resolve(&mut tree);

        let result = futures::executor::block_on(Runner::new(RunnerOptions::default()).run(&tree)).unwrap();

        assert_eq!(result.find(&["plain"]).unwrap().status(), Status::Passed);
        assert_eq!(
            result.find(&["failing"]).unwrap().error(),
            Some(&Failure::Error("nope".to_owned()))
        );
    }

    #[test]
    fn test_aggregate_statuses() {
        let leaf = |status: Status| NodeResult {
            id: NodeId::default(),
            identifier: "leaf".to_owned(),
            kind: NodeKind::Test,
            result: ExecutionResult {
                status,
                error: None,
                attached: Vec::new(),
                duration: Duration::default(),
            },
            children: Vec::new(),
        };
        let of = |statuses: &[Status]| {
            let children: Vec<NodeResult> = statuses.iter().copied().map(leaf).collect();
            aggregate(&children, Duration::default()).status
        };

        assert_eq!(of(&[Status::Passed, Status::Skipped]), Status::Passed);
        assert_eq!(of(&[Status::Passed, Status::Failed]), Status::Failed);
        assert_eq!(of(&[Status::Todo, Status::Todo]), Status::Todo);
        assert_eq!(of(&[Status::Todo, Status::Skipped]), Status::Skipped);
        assert_eq!(of(&[]), Status::Skipped);
    }

    #[test]
    fn test_nested_failures_count_suite_hook_failures() {
        let failed_test = NodeResult {
            id: NodeId::default(),
            identifier: "t".to_owned(),
            kind: NodeKind::Test,
            result: ExecutionResult::failed(Failure::Error("no".to_owned()), Duration::default()),
            children: Vec::new(),
        };
        let suite = NodeResult {
            id: NodeId::default(),
            identifier: "s".to_owned(),
            kind: NodeKind::Suite,
            result: ExecutionResult::failed(
                Failure::Error("port busy".to_owned()).in_hook(LifetimeHook::AfterAll),
                Duration::default(),
            ),
            children: vec![failed_test.clone()],
        };

        let result = aggregate(&[suite, failed_test], Duration::default());

        assert_eq!(result.error, Some(Failure::Nested(3)));
    }
}

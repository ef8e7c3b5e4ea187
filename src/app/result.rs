use crate::app::error::Failure;
use crate::app::node::{NodeId, NodeKind};
use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Status {
    Passed,
    Failed,
    Skipped,
    Todo,
}

/// Outcome of one node. `error` is set exactly when `status` is `Failed`;
/// `attached` keeps further failures (e.g. of cleanup hooks) for diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionResult {
    pub status: Status,
    pub error: Option<Failure>,
    pub attached: Vec<Failure>,
    pub duration: Duration,
}

impl ExecutionResult {
    pub fn passed(duration: Duration) -> Self {
        Self::with_status(Status::Passed, duration)
    }

    pub fn skipped() -> Self {
        Self::with_status(Status::Skipped, Duration::default())
    }

    pub fn todo() -> Self {
        Self::with_status(Status::Todo, Duration::default())
    }

    pub fn failed(error: Failure, duration: Duration) -> Self {
        Self {
            status: Status::Failed,
            error: Some(error),
            attached: Vec::new(),
            duration,
        }
    }

    fn with_status(status: Status, duration: Duration) -> Self {
        Self {
            status,
            error: None,
            attached: Vec::new(),
            duration,
        }
    }

    /// Records a failure that happened after the outcome was known. The first
    /// failure turns a non-failed result into `Failed`; anything later is
    /// attached.
    pub fn record(&mut self, failure: Failure) {
        if self.status == Status::Failed {
            self.attached.push(failure);
        } else {
            self.status = Status::Failed;
            self.error = Some(failure);
        }
    }

    pub fn is_failed(&self) -> bool {
        self.status == Status::Failed
    }

    pub fn duration_ms(&self) -> u128 {
        self.duration.as_millis()
    }
}

/// Result tree mirroring the collected node tree.
#[derive(Debug, Clone)]
pub struct NodeResult {
    pub id: NodeId,
    pub identifier: String,
    pub kind: NodeKind,
    pub result: ExecutionResult,
    pub children: Vec<NodeResult>,
}

impl NodeResult {
    pub fn status(&self) -> Status {
        self.result.status
    }

    pub fn error(&self) -> Option<&Failure> {
        self.result.error.as_ref()
    }

    pub fn find(&self, path: &[&str]) -> Option<&NodeResult> {
        path.iter().try_fold(self, |current, name| {
            current.children.iter().find(|child| child.identifier == *name)
        })
    }

    /// All test results below (and including) this node, in pre-order.
    pub fn tests(&self) -> Vec<&NodeResult> {
        let mut tests = Vec::new();
        self.collect_tests(&mut tests);
        tests
    }

    fn collect_tests<'a>(&'a self, into: &mut Vec<&'a NodeResult>) {
        match self.kind {
            NodeKind::Test => into.push(self),
            NodeKind::Suite => self
                .children
                .iter()
                .for_each(|child| child.collect_tests(into)),
        }
    }

    pub fn summary(&self) -> RunSummary {
        let mut summary = RunSummary {
            duration: self.result.duration,
            ..RunSummary::default()
        };
        for test in self.tests() {
            match test.status() {
                Status::Passed => summary.passed += 1,
                Status::Failed => summary.failed += 1,
                Status::Skipped => summary.skipped += 1,
                Status::Todo => summary.todo += 1,
            }
        }
        summary
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub todo: usize,
    pub duration: Duration,
}

impl RunSummary {
    /// Tests that actually ran, successfully or not.
    pub fn runnable(&self) -> usize {
        self.passed + self.failed
    }

    pub fn total(&self) -> usize {
        self.runnable() + self.skipped + self.todo
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

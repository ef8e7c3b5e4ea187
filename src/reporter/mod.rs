pub mod model;
pub mod serialize;

use crate::app::node::{NodeId, NodeTree};
use crate::app::result::{NodeResult, Status};
use std::cell::Cell;
use std::time::Instant;

/// Progress callbacks fired by the runner in traversal order.
///
/// Suite callbacks only fire for suites that are actually entered; test
/// callbacks only for tests whose body runs.
pub trait Reporter {
    fn on_collected(&self, _tree: &NodeTree) {}
    fn on_suite_start(&self, _tree: &NodeTree, _suite: NodeId) {}
    fn on_suite_end(&self, _tree: &NodeTree, _result: &NodeResult) {}
    fn on_test_start(&self, _tree: &NodeTree, _test: NodeId) {}
    fn on_test_end(&self, _tree: &NodeTree, _result: &NodeResult) {}
    fn on_finished(&self, _result: &NodeResult) {}
}

pub struct SilentReporter;

impl Reporter for SilentReporter {}

/// Writes progress and the final summary through the `log` facade.
pub struct LogReporter {
    start_time: Cell<Instant>,
}

impl LogReporter {
    pub fn new() -> Self {
        Self {
            start_time: Cell::new(Instant::now()),
        }
    }
}

impl Default for LogReporter {
    fn default() -> Self {
        LogReporter::new()
    }
}

impl Reporter for LogReporter {
    fn on_collected(&self, tree: &NodeTree) {
        self.start_time.set(Instant::now());
        debug!("Reporter: collected {} nodes", tree.node_count() - 1);
    }

    fn on_suite_start(&self, tree: &NodeTree, suite: NodeId) {
        if suite != tree.root() {
            info!("Suite {}", tree.full_name(suite));
        }
    }

    fn on_suite_end(&self, tree: &NodeTree, result: &NodeResult) {
        if let Some(error) = result.error().filter(|_| result.id != tree.root()) {
            warn!("Suite {} failed: {}", tree.full_name(result.id), error);
        }
    }

    fn on_test_start(&self, tree: &NodeTree, test: NodeId) {
        trace!("Test {} started", tree.full_name(test));
    }

    fn on_test_end(&self, tree: &NodeTree, result: &NodeResult) {
        let name = tree.full_name(result.id);
        match result.error() {
            Some(error) => error!("FAIL {} ({} ms): {}", name, result.result.duration_ms(), error),
            None => info!("PASS {} ({} ms)", name, result.result.duration_ms()),
        }
        for attached in &result.result.attached {
            warn!("     {} also failed: {}", name, attached);
        }
    }

    fn on_finished(&self, result: &NodeResult) {
        let elapsed = self.start_time.get().elapsed();
        let summary = result.summary();

        let failed: Vec<&NodeResult> = result
            .tests()
            .into_iter()
            .filter(|test| test.status() == Status::Failed)
            .collect();
        if !failed.is_empty() {
            error!("Failed tests ({})", failed.len());
            for test in failed {
                if let Some(error) = test.error() {
                    error!(" FAIL {}: {}", test.identifier, error);
                }
            }
        }
        if summary.failed > 0 {
            error!("Failed {} / {}", summary.failed, summary.runnable());
        }
        info!("Passed {} / {}", summary.passed, summary.runnable());
        if summary.skipped > 0 {
            info!("Skipped {}", summary.skipped);
        }
        if summary.todo > 0 {
            info!("Todo {}", summary.todo);
        }
        info!("Time {} ms", elapsed.as_millis());
    }
}

//! Collection and execution core of a test runner.
//!
//! Test modules register suites, tests and lifetime hooks through a
//! [`HostBridge`](app::collector::HostBridge); the resulting [`NodeTree`] has its
//! run modes resolved and is then executed depth-first by a [`Runner`].

#[macro_use]
extern crate log;

pub mod app;
pub mod configuration;
pub mod reporter;
pub mod time;

pub use app::collector::{collect, into_callback, Collector, HostBridge, Modifier, Scope};
pub use app::error::{Error, Failure, StructuralError};
pub use app::executor::{Runner, RunnerOptions};
pub use app::hooks::LifetimeHook;
pub use app::node::{CollectorMode, NodeId, NodeTree, RunMode, TaskError, TaskResult, TestCallback};
pub use app::resolver::resolve;
pub use app::result::{ExecutionResult, NodeResult, RunSummary, Status};

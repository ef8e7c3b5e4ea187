use crate::app::error::Failure;
use crate::app::node::NodeKind;
use crate::app::result::{NodeResult, RunSummary, Status as ResultStatus};
use serde_derive::Serialize;
use serde_json::Error;
use std::fs::File;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Serialize, Clone, Copy, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum Status {
    Passed,
    Failed,
    Skipped,
    Todo,
}

impl From<ResultStatus> for Status {
    fn from(status: ResultStatus) -> Self {
        match status {
            ResultStatus::Passed => Status::Passed,
            ResultStatus::Failed => Status::Failed,
            ResultStatus::Skipped => Status::Skipped,
            ResultStatus::Todo => Status::Todo,
        }
    }
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum Kind {
    Suite,
    Test,
}

#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct NodeReport {
    name: String,
    kind: Kind,
    status: Status,
    #[serde(with = "crate::reporter::serialize::duration_ms")]
    duration_ms: Duration,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "crate::reporter::serialize::failure::serialize"
    )]
    error: Option<Failure>,
    #[serde(
        skip_serializing_if = "Vec::is_empty",
        serialize_with = "crate::reporter::serialize::failures::serialize"
    )]
    attached: Vec<Failure>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    children: Vec<NodeReport>,
}

impl From<&NodeResult> for NodeReport {
    fn from(result: &NodeResult) -> Self {
        Self {
            name: result.identifier.clone(),
            kind: match result.kind {
                NodeKind::Suite => Kind::Suite,
                NodeKind::Test => Kind::Test,
            },
            status: result.status().into(),
            duration_ms: result.result.duration,
            error: result.result.error.clone(),
            attached: result.result.attached.clone(),
            children: result.children.iter().map(NodeReport::from).collect(),
        }
    }
}

#[derive(Debug, Serialize, Clone, Copy)]
#[serde(rename_all = "camelCase")]
pub struct SummaryReport {
    passed: usize,
    failed: usize,
    skipped: usize,
    todo: usize,
    #[serde(with = "crate::reporter::serialize::duration_ms")]
    duration_ms: Duration,
}

impl From<RunSummary> for SummaryReport {
    fn from(summary: RunSummary) -> Self {
        Self {
            passed: summary.passed,
            failed: summary.failed,
            skipped: summary.skipped,
            todo: summary.todo,
            duration_ms: summary.duration,
        }
    }
}

/// Serializable form of a finished run.
#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    name: String,
    started_at: String,
    summary: SummaryReport,
    root: NodeReport,
}

impl RunReport {
    pub fn new(name: impl Into<String>, started_at: chrono::DateTime<chrono::Local>, result: &NodeResult) -> Self {
        Self {
            name: name.into(),
            started_at: started_at.to_rfc3339(),
            summary: result.summary().into(),
            root: NodeReport::from(result),
        }
    }

    pub fn save_into_file(&self, path: &Path) -> Result<(), Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(Error::io)?;
        }
        let file = File::create(path).map_err(Error::io)?;
        serde_json::to_writer_pretty(file, self)
    }
}

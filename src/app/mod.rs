pub mod collector;
pub mod error;
pub mod executor;
pub mod hooks;
pub mod node;
pub mod resolver;
pub mod result;
pub mod shell;

use crate::app::collector::Collector;
use crate::app::error::Error;
use crate::app::executor::{Runner, RunnerOptions};
use crate::app::resolver::resolve;
use crate::app::result::RunSummary;
use crate::configuration::manifest::Manifest;
use crate::reporter::model::RunReport;
use crate::reporter::{LogReporter, Reporter};
use std::path::PathBuf;
use std::rc::Rc;

/// Collects, resolves and runs the tests declared by a manifest.
pub struct App {
    manifest: Manifest,
    options: RunnerOptions,
    report: Option<PathBuf>,
}

impl App {
    pub fn new(manifest: Manifest) -> Self {
        let options = RunnerOptions {
            test_timeout: Some(manifest.timeout),
            hook_timeout: Some(manifest.hook_timeout),
        };
        App {
            manifest,
            options,
            report: None,
        }
    }

    pub fn with_options(mut self, options: RunnerOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_report(mut self, report: Option<PathBuf>) -> Self {
        self.report = report;
        self
    }

    pub async fn run(&self) -> Result<RunSummary, Error> {
        info!("Starting '{}'", self.manifest.name);
        let mut collector = Collector::new();
        shell::declare(&self.manifest, &mut collector)?;
        let mut tree = collector.finish()?;

        let resolution = resolve(&mut tree);
        if resolution.only_exists {
            info!("Running focused tests only");
        }

        let reporter = Rc::new(LogReporter::new());
        reporter.on_collected(&tree);
        let started_at = chrono::Local::now();
        let runner = Runner::with_reporter(self.options.clone(), reporter);
        let result = runner.run(&tree).await?;

        if let Some(path) = &self.report {
            RunReport::new(self.manifest.name.as_str(), started_at, &result).save_into_file(path)?;
            info!("Report written to {}", path.display());
        }
        Ok(result.summary())
    }
}

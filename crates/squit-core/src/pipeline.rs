//! The Squit pipeline: index, process, request, diff and report.
//!
//! Every stage reads the artifacts of the previous one from the build
//! directory, so stages can be re-run on their own.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::info;

use crate::compare::DiffStage;
use crate::config::{ConfigError, ConfigWalker, SquitConfig};
use crate::db::ConnectionPool;
use crate::index::{IndexError, SquitTest, TagFilter, TestIndexer};
use crate::layout::BuildLayout;
use crate::media::{MediaType, MediaTypeRegistry};
use crate::process::{ProcessingStage, Processor, ProcessorRegistry, StageReport};
use crate::report::{write_reports, ReportError, ReportPaths};
use crate::result::{RunSummary, SquitResult};
use crate::runner::{ExecutionError, Orchestrator, Runner, RunnerRegistry};
use crate::script::resolve_script;

/// Errors that abort a pipeline stage.
#[derive(Debug, Error)]
pub enum SquitError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error(transparent)]
    Report(#[from] ReportError),
}

/// Outcome of a complete run.
#[derive(Debug)]
pub struct RunOutcome {
    pub results: Vec<SquitResult>,
    pub summary: RunSummary,
    pub reports: ReportPaths,
}

/// Entry point tying the stages together.
pub struct Squit {
    config: SquitConfig,
    walker: ConfigWalker,
    layout: BuildLayout,
    media_types: MediaTypeRegistry,
    processors: ProcessorRegistry,
    runners: RunnerRegistry,
    pool: Arc<ConnectionPool>,
}

impl Squit {
    /// Create a pipeline with the built-in media types and processors.
    pub fn new(config: SquitConfig) -> Self {
        Self {
            walker: config.walker(),
            layout: BuildLayout::new(&config.paths.build_dir),
            media_types: MediaTypeRegistry::new(),
            processors: ProcessorRegistry::new(),
            runners: RunnerRegistry::new(),
            pool: Arc::new(ConnectionPool::new()),
            config,
        }
    }

    pub fn with_media_type(mut self, handler: Arc<dyn MediaType>) -> Self {
        self.media_types.register(handler);
        self
    }

    pub fn with_processor(mut self, processor: Arc<dyn Processor>) -> Self {
        self.processors.register(processor);
        self
    }

    pub fn with_runner(mut self, runner: Arc<dyn Runner>) -> Self {
        self.runners.register(runner);
        self
    }

    pub fn config(&self) -> &SquitConfig {
        &self.config
    }

    pub fn layout(&self) -> &BuildLayout {
        &self.layout
    }

    /// Index the source tree and check that every referenced processor,
    /// runner and script exists.
    pub fn index(&self) -> Result<Vec<SquitTest>, SquitError> {
        let filter = TagFilter::from_run_config(&self.config.run);
        let tests = TestIndexer::new(&self.walker, &self.media_types).index(&filter)?;
        for test in &tests {
            self.validate(test)?;
        }
        Ok(tests)
    }

    /// Write processed sources.
    pub async fn process(&self, tests: &[SquitTest]) -> StageReport {
        self.processing_stage().pre_process(tests).await
    }

    /// Run fixtures and requests, then post-process the responses.
    pub async fn request(&self, tests: &[SquitTest]) -> Result<StageReport, SquitError> {
        let orchestrator = Orchestrator::new(
            &self.layout,
            self.walker.root(),
            &self.media_types,
            &self.runners,
            Arc::clone(&self.pool),
            Duration::from_secs(self.config.run.timeout_secs),
        )?
        .with_concurrency(self.config.run.concurrency);

        let report = orchestrator.run(tests).await;
        self.processing_stage().post_process(tests).await;
        Ok(report)
    }

    /// Compare processed responses.
    pub fn diff(&self, tests: &[SquitTest]) -> Vec<SquitResult> {
        DiffStage::new(&self.layout, &self.media_types).compare(tests)
    }

    /// Write the reports for a result list.
    pub fn report(&self, results: &[SquitResult]) -> Result<ReportPaths, SquitError> {
        let title = self
            .walker
            .root()
            .file_name()
            .map(|name| format!("Squit report: {}", name.to_string_lossy()))
            .unwrap_or_else(|| "Squit report".to_string());
        Ok(write_reports(&self.layout, &self.media_types, results, &title)?)
    }

    /// Run every stage.
    pub async fn run(&self) -> Result<RunOutcome, SquitError> {
        let tests = self.index()?;
        info!(tests = tests.len(), "indexed tests");

        self.process(&tests).await;
        self.request(&tests).await?;
        let results = self.diff(&tests);
        let reports = self.report(&results)?;
        let summary = RunSummary::from_results(&results);

        info!(
            total = summary.total,
            passed = summary.passed,
            failed = summary.failed,
            errors = summary.errors,
            ignored = summary.ignored,
            "run finished"
        );

        Ok(RunOutcome {
            results,
            summary,
            reports,
        })
    }

    fn processing_stage(&self) -> ProcessingStage<'_> {
        ProcessingStage::new(
            &self.layout,
            self.walker.root(),
            &self.media_types,
            &self.processors,
        )
        .with_concurrency(self.config.run.concurrency)
    }

    fn validate(&self, test: &SquitTest) -> Result<(), ConfigError> {
        let config = test.config.as_ref();
        let unknown = |kind: &'static str, name: &str| ConfigError::UnknownPlugin {
            path: test.path.clone(),
            kind,
            name: name.to_string(),
        };

        for name in config.pre_processors.iter().chain(&config.post_processors) {
            if !self.processors.contains(name) {
                return Err(unknown("processor", name));
            }
        }
        for name in config.pre_runners.iter().chain(&config.post_runners) {
            if !self.runners.contains(name) {
                return Err(unknown("runner", name));
            }
        }

        let scripts = config
            .pre_processor_scripts
            .iter()
            .chain(&config.post_processor_scripts)
            .chain(&config.pre_runner_scripts)
            .chain(&config.post_runner_scripts);
        for script in scripts {
            if !resolve_script(self.walker.root(), script).is_file() {
                return Err(unknown("script", &script.to_string_lossy()));
            }
        }

        Ok(())
    }
}

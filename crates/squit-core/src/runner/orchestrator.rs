use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::stream::{self, StreamExt};
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use tracing::{debug, info, warn};

use super::{ExecutionError, ResponseMeta, RunnerRegistry};
use crate::config::{MergedConfig, TaskKind, ERROR_FILE, POST_SCRIPT_SUFFIX, PRE_SCRIPT_SUFFIX};
use crate::db::ConnectionPool;
use crate::index::SquitTest;
use crate::layout::{reset_dir, write_error, BuildLayout};
use crate::media::{self, MediaType, MediaTypeRegistry};
use crate::process::StageReport;
use crate::script::{resolve_script, run_script, ScriptEnv};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Pre,
    Post,
}

impl Phase {
    fn tasks(self, config: &MergedConfig) -> &[TaskKind] {
        match self {
            Phase::Pre => &config.pre_test_tasks,
            Phase::Post => &config.post_test_tasks,
        }
    }

    fn runners(self, config: &MergedConfig) -> &[String] {
        match self {
            Phase::Pre => &config.pre_runners,
            Phase::Post => &config.post_runners,
        }
    }

    fn runner_scripts(self, config: &MergedConfig) -> &[PathBuf] {
        match self {
            Phase::Pre => &config.pre_runner_scripts,
            Phase::Post => &config.post_runner_scripts,
        }
    }

    fn scripts(self, test: &SquitTest) -> &BTreeMap<String, Vec<PathBuf>> {
        match self {
            Phase::Pre => &test.pre_scripts,
            Phase::Post => &test.post_scripts,
        }
    }

    fn script_suffix(self) -> &'static str {
        match self {
            Phase::Pre => PRE_SCRIPT_SUFFIX,
            Phase::Post => POST_SCRIPT_SUFFIX,
        }
    }
}

/// Runs fixtures and issues the request of every test.
///
/// Every test records `meta.json` in its raw response directory whether it
/// succeeds or not. Failures become an `error.txt` artifact and never stop
/// the other tests.
///
/// Tests carrying a once script run alone: everything indexed before them
/// has finished when they start, and nothing indexed after them starts
/// until they finish.
pub struct Orchestrator<'a> {
    layout: &'a BuildLayout,
    source_root: &'a Path,
    media_types: &'a MediaTypeRegistry,
    runners: &'a RunnerRegistry,
    pool: Arc<ConnectionPool>,
    client: Client,
    concurrency: usize,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        layout: &'a BuildLayout,
        source_root: &'a Path,
        media_types: &'a MediaTypeRegistry,
        runners: &'a RunnerRegistry,
        pool: Arc<ConnectionPool>,
        timeout: Duration,
    ) -> Result<Self, ExecutionError> {
        let client = Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()
            .map_err(ExecutionError::Client)?;

        Ok(Self {
            layout,
            source_root,
            media_types,
            runners,
            pool,
            client,
            concurrency: 1,
        })
    }

    /// Sets the number of tests executed at the same time.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Execute every test that is not ignored and was processed without
    /// error.
    pub async fn run(&self, tests: &[SquitTest]) -> StageReport {
        let mut report = StageReport::default();
        let mut outcomes: Vec<Option<bool>> = Vec::with_capacity(tests.len());
        for batch in execution_batches(tests) {
            let batch_outcomes: Vec<Option<bool>> = stream::iter(batch)
                .map(|test| self.run_one(test))
                .buffer_unordered(self.concurrency)
                .collect()
                .await;
            outcomes.extend(batch_outcomes);
        }

        for outcome in outcomes {
            match outcome {
                Some(true) => report.processed += 1,
                Some(false) => report.errors += 1,
                None => report.skipped += 1,
            }
        }

        info!(
            executed = report.processed,
            skipped = report.skipped,
            errors = report.errors,
            "requests finished"
        );
        report
    }

    /// Returns `None` for skipped tests, otherwise whether the test ran
    /// without error.
    async fn run_one(&self, test: &SquitTest) -> Option<bool> {
        let dir = self.layout.raw_responses(&test.path);
        if let Err(e) = reset_dir(&dir) {
            warn!(test = %test.path.display(), error = %e, "failed to prepare response directory");
            return Some(false);
        }

        if test.config.ignore {
            debug!(test = %test.path.display(), "skipping ignored test");
            return None;
        }
        if self.layout.sources(&test.path).join(ERROR_FILE).is_file() {
            debug!(test = %test.path.display(), "skipping test with processing error");
            return None;
        }

        let date = Utc::now();
        let started = Instant::now();
        let mut status = None;
        let outcome = self.execute(test, &dir, &mut status).await;

        let meta = ResponseMeta {
            date,
            duration: started.elapsed().as_millis() as u64,
            status,
        };
        if let Err(e) = meta.write(&dir) {
            warn!(test = %test.path.display(), error = %e, "failed to write metadata");
        }

        match outcome {
            Ok(()) => Some(true),
            Err(e) => {
                warn!(test = %test.path.display(), error = %e, "test execution failed");
                if let Err(e) = write_error(&dir, &e) {
                    warn!(dir = %dir.display(), error = %e, "failed to write error artifact");
                }
                Some(false)
            }
        }
    }

    /// Post tasks always run so scope teardown is not lost. The request is
    /// skipped when a pre task failed. The first error wins.
    async fn execute(
        &self,
        test: &SquitTest,
        dir: &Path,
        status: &mut Option<u16>,
    ) -> Result<(), ExecutionError> {
        let handler = self.media_types.for_media_type(&test.config.media_type);

        let mut outcome = self.run_tasks(test, handler.as_ref(), Phase::Pre).await;
        if outcome.is_ok() {
            outcome = self.send(test, handler.as_ref(), dir, status).await;
        }
        let post = self.run_tasks(test, handler.as_ref(), Phase::Post).await;
        outcome.and(post)
    }

    async fn send(
        &self,
        test: &SquitTest,
        handler: &dyn MediaType,
        dir: &Path,
        status: &mut Option<u16>,
    ) -> Result<(), ExecutionError> {
        let config = test.config.as_ref();

        let mut request = self
            .client
            .request(config.method.into(), &config.endpoint);
        for (name, value) in &config.headers {
            request = request.header(name, value);
        }
        if config.method.requires_body() {
            let path = self.layout.sources(&test.path).join(handler.request_name());
            let body = fs::read(&path).map_err(|e| ExecutionError::io(&path, e))?;
            if !config
                .headers
                .keys()
                .any(|name| name.eq_ignore_ascii_case(CONTENT_TYPE.as_str()))
            {
                request = request.header(CONTENT_TYPE, &config.media_type);
            }
            request = request.body(body);
        }

        let http_error = |source| ExecutionError::Http {
            endpoint: config.endpoint.clone(),
            source,
        };
        let response = request.send().await.map_err(http_error)?;
        let code = response.status();
        *status = Some(code.as_u16());

        if !code.is_success() {
            warn!(test = %test.path.display(), status = code.as_u16(), "non-success response status");
        }
        if let Some(content_type) = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
        {
            if media::normalize(content_type) != media::normalize(&config.media_type) {
                warn!(
                    test = %test.path.display(),
                    expected = %config.media_type,
                    actual = %content_type,
                    "response media type differs from configuration"
                );
            }
        }

        let body = response.bytes().await.map_err(http_error)?;
        let actual = dir.join(handler.actual_response_name());
        fs::write(&actual, &body).map_err(|e| ExecutionError::io(&actual, e))
    }

    async fn run_tasks(
        &self,
        test: &SquitTest,
        handler: &dyn MediaType,
        phase: Phase,
    ) -> Result<(), ExecutionError> {
        let config = test.config.as_ref();
        for task in phase.tasks(config) {
            match task {
                TaskKind::DatabaseScripts => self.run_database_scripts(test, phase).await,
                TaskKind::Runners => {
                    for name in phase.runners(config) {
                        let runner = self
                            .runners
                            .get(name)
                            .ok_or_else(|| ExecutionError::UnknownRunner(name.clone()))?;
                        runner.run(config).await?;
                    }
                }
                TaskKind::RunnerScripts => {
                    let env = self.script_env(test, handler, phase);
                    for script in phase.runner_scripts(config) {
                        run_script(&resolve_script(self.source_root, script), &env).await?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Database script failures are logged and do not fail the test.
    async fn run_database_scripts(&self, test: &SquitTest, phase: Phase) {
        let sources = self.layout.sources(&test.path);
        for name in phase.scripts(test).keys() {
            let Some(db) = test.config.databases.get(name) else {
                warn!(test = %test.path.display(), database = %name, "no connection configured");
                continue;
            };
            let script = sources.join(format!("{name}{}", phase.script_suffix()));
            if !script.is_file() {
                continue;
            }

            let pool = Arc::clone(&self.pool);
            let db = db.clone();
            let path = script.clone();
            let result = tokio::task::spawn_blocking(move || pool.execute_script(&db, &path)).await;
            match result {
                Ok(Ok(())) => {
                    debug!(test = %test.path.display(), script = %script.display(), "database script executed")
                }
                Ok(Err(e)) => {
                    warn!(test = %test.path.display(), database = %name, error = %e, "database script failed")
                }
                Err(e) => {
                    warn!(test = %test.path.display(), database = %name, error = %e, "database script panicked")
                }
            }
        }
    }

    fn script_env(&self, test: &SquitTest, handler: &dyn MediaType, phase: Phase) -> ScriptEnv {
        let sources = self.layout.sources(&test.path);
        let mut env = ScriptEnv::for_test(&test.path, &test.config)
            .file("SQUIT_EXPECTED_RESPONSE", &sources.join(handler.expected_response_name()));

        let request = sources.join(handler.request_name());
        if request.is_file() {
            env = env.file("SQUIT_REQUEST", &request);
        }
        if phase == Phase::Post {
            let actual = self
                .layout
                .raw_responses(&test.path)
                .join(handler.actual_response_name());
            env = env.file("SQUIT_ACTUAL_RESPONSE", &actual);
        }
        env
    }
}

/// Split tests into consecutive batches; a test with once scripts forms a
/// batch of its own.
fn execution_batches(tests: &[SquitTest]) -> Vec<&[SquitTest]> {
    let mut batches = Vec::new();
    let mut start = 0;
    for (position, test) in tests.iter().enumerate() {
        if test.once_scripts && !test.config.ignore {
            if start < position {
                batches.push(&tests[start..position]);
            }
            batches.push(&tests[position..=position]);
            start = position + 1;
        }
    }
    if start < tests.len() {
        batches.push(&tests[start..]);
    }
    batches
}

//! The processing stage: materializes processed sources before the
//! requests are made and processed responses afterwards.

use std::fs;
use std::path::{Path, PathBuf};

use futures::stream::{self, StreamExt};
use tracing::{info, warn};

use super::{Documents, ProcessError, ProcessorRegistry};
use crate::config::{MERGED_CONFIG_FILE, DESCRIPTION_FILE, POST_SCRIPT_SUFFIX, PRE_SCRIPT_SUFFIX};
use crate::index::SquitTest;
use crate::layout::{reset_dir, write_error, BuildLayout};
use crate::media::MediaTypeRegistry;
use crate::script::{resolve_script, run_script, ScriptEnv};

/// Outcome counts of a stage pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageReport {
    pub processed: usize,
    pub skipped: usize,
    pub errors: usize,
}

enum Outcome {
    Processed,
    Skipped,
    Failed,
}

impl StageReport {
    fn from_outcomes(outcomes: &[Outcome]) -> Self {
        outcomes.iter().fold(Self::default(), |mut report, outcome| {
            match outcome {
                Outcome::Processed => report.processed += 1,
                Outcome::Skipped => report.skipped += 1,
                Outcome::Failed => report.errors += 1,
            }
            report
        })
    }
}

/// Applies media type hooks, registered processors and processor scripts.
///
/// A failing test gets an `error.txt` artifact; the other tests are not
/// affected.
pub struct ProcessingStage<'a> {
    layout: &'a BuildLayout,
    source_root: &'a Path,
    media_types: &'a MediaTypeRegistry,
    processors: &'a ProcessorRegistry,
    concurrency: usize,
}

impl<'a> ProcessingStage<'a> {
    pub fn new(
        layout: &'a BuildLayout,
        source_root: &'a Path,
        media_types: &'a MediaTypeRegistry,
        processors: &'a ProcessorRegistry,
    ) -> Self {
        Self {
            layout,
            source_root,
            media_types,
            processors,
            concurrency: 1,
        }
    }

    /// Sets the number of tests processed at the same time.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Write processed sources for every test.
    pub async fn pre_process(&self, tests: &[SquitTest]) -> StageReport {
        let outcomes: Vec<Outcome> = stream::iter(tests)
            .map(|test| async move {
                let dir = self.layout.sources(&test.path);
                match self.pre_process_one(test, &dir).await {
                    Ok(()) => Outcome::Processed,
                    Err(e) => {
                        warn!(test = %test.path.display(), error = %e, "pre-processing failed");
                        record_error(&dir, &e);
                        Outcome::Failed
                    }
                }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let report = StageReport::from_outcomes(&outcomes);
        info!(processed = report.processed, errors = report.errors, "pre-processing finished");
        report
    }

    /// Write processed responses for every test that has an actual response.
    pub async fn post_process(&self, tests: &[SquitTest]) -> StageReport {
        let outcomes: Vec<Outcome> = stream::iter(tests)
            .map(|test| async move {
                let dir = self.layout.processed_responses(&test.path);
                match self.post_process_one(test, &dir).await {
                    Ok(true) => Outcome::Processed,
                    Ok(false) => Outcome::Skipped,
                    Err(e) => {
                        warn!(test = %test.path.display(), error = %e, "post-processing failed");
                        record_error(&dir, &e);
                        Outcome::Failed
                    }
                }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let report = StageReport::from_outcomes(&outcomes);
        info!(
            processed = report.processed,
            skipped = report.skipped,
            errors = report.errors,
            "post-processing finished"
        );
        report
    }

    async fn pre_process_one(&self, test: &SquitTest, dir: &Path) -> Result<(), ProcessError> {
        prepare_dir(dir)?;

        let config = test.config.as_ref();
        let handler = self.media_types.for_media_type(&config.media_type);

        let request = test.request.as_deref().map(read).transpose()?;
        let expected = read(&test.response)?;

        let (request, expected) = handler.pre_process(request, expected, config)?;
        let documents = self.processors.apply(
            &config.pre_processors,
            Documents {
                request,
                response: expected,
            },
            config,
        )?;

        let request_path = dir.join(handler.request_name());
        if let Some(request) = &documents.request {
            write(&request_path, request)?;
        }
        let expected_path = dir.join(handler.expected_response_name());
        write(&expected_path, &documents.response)?;

        for (db, scripts) in &test.pre_scripts {
            write(&dir.join(format!("{db}{PRE_SCRIPT_SUFFIX}")), &concat_scripts(scripts)?)?;
        }
        for (db, scripts) in &test.post_scripts {
            write(&dir.join(format!("{db}{POST_SCRIPT_SUFFIX}")), &concat_scripts(scripts)?)?;
        }
        if !test.descriptions.is_empty() {
            write(&dir.join(DESCRIPTION_FILE), test.description().as_bytes())?;
        }
        write(
            &dir.join(MERGED_CONFIG_FILE),
            serde_json::to_string_pretty(config)?.as_bytes(),
        )?;

        let mut env = ScriptEnv::for_test(&test.path, config).file("SQUIT_EXPECTED_RESPONSE", &expected_path);
        if documents.request.is_some() {
            env = env.file("SQUIT_REQUEST", &request_path);
        }
        for script in &config.pre_processor_scripts {
            run_script(&resolve_script(self.source_root, script), &env).await?;
        }

        Ok(())
    }

    /// Returns `false` when there is no actual response to process.
    async fn post_process_one(&self, test: &SquitTest, dir: &Path) -> Result<bool, ProcessError> {
        let config = test.config.as_ref();
        let handler = self.media_types.for_media_type(&config.media_type);

        let raw = self
            .layout
            .raw_responses(&test.path)
            .join(handler.actual_response_name());
        prepare_dir(dir)?;
        if !raw.is_file() {
            return Ok(false);
        }

        let actual = handler.post_process(read(&raw)?, config)?;
        let documents = self.processors.apply(
            &config.post_processors,
            Documents {
                request: None,
                response: actual,
            },
            config,
        )?;

        let actual_path = dir.join(handler.actual_response_name());
        write(&actual_path, &documents.response)?;

        let env = ScriptEnv::for_test(&test.path, config).file("SQUIT_ACTUAL_RESPONSE", &actual_path);
        for script in &config.post_processor_scripts {
            run_script(&resolve_script(self.source_root, script), &env).await?;
        }

        Ok(true)
    }
}

/// Artifacts of a previous run never survive into the current one.
fn prepare_dir(dir: &Path) -> Result<(), ProcessError> {
    reset_dir(dir).map_err(|e| ProcessError::io(dir, e))
}

fn record_error(dir: &Path, error: &ProcessError) {
    if let Err(e) = write_error(dir, error) {
        warn!(dir = %dir.display(), error = %e, "failed to write error artifact");
    }
}

fn read(path: &Path) -> Result<Vec<u8>, ProcessError> {
    fs::read(path).map_err(|e| ProcessError::io(path, e))
}

fn write(path: &Path, content: &[u8]) -> Result<(), ProcessError> {
    fs::write(path, content).map_err(|e| ProcessError::io(path, e))
}

fn concat_scripts(scripts: &[PathBuf]) -> Result<Vec<u8>, ProcessError> {
    let mut sql = Vec::new();
    for script in scripts {
        sql.extend(read(script)?);
        if !sql.ends_with(b"\n") {
            sql.push(b'\n');
        }
    }
    Ok(sql)
}

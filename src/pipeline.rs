//! The load orchestrator: Reader → Parse → Writer.
//!
//! A [`LoadPipeline`] pulls raw lines from a [`LineSource`], parses them in
//! batches with a [`Runner`] and hands every batch of typed records to a
//! [`RecordSink`]. A run moves through `Idle → Running → {Succeeded, Failed}`
//! exactly once; the pipeline is consumed by [`LoadPipeline::run`].
//!
//! Failure handling is fail-fast by default: the first malformed or
//! unparsable line, or any collaborator failure, ends the run as `Failed`.
//! Batches written before the failure stay written.
//!
//! ```
//! use taxibeam::pipeline::{LoadPipeline, PipelineOptions, RunState};
//! use taxibeam::testing::{RecordingSink, VecSource, sample_lines};
//!
//! let source = VecSource::new(sample_lines(3));
//! let mut sink = RecordingSink::new();
//!
//! let outcome = LoadPipeline::new(PipelineOptions::default())?.run(&source, &mut sink);
//! assert_eq!(outcome.report.state, RunState::Succeeded);
//! assert_eq!(sink.records().len(), 3);
//! # Ok::<(), anyhow::Error>(())
//! ```

use crate::io::cloud::CloudIOError;
use crate::io::sink::RecordSink;
use crate::io::text::LineSource;
use crate::parser::ParseError;
use crate::runner::{ExecMode, Runner};
use crate::schema::TripRecord;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Lifecycle of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    #[default]
    Idle,
    Running,
    Succeeded,
    Failed,
}

impl RunState {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// What a run does with a line that cannot be parsed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Abort the run on the first bad line.
    #[default]
    FailFast,
    /// Log, count and drop bad lines. Collaborator failures still abort.
    SkipMalformed,
}

/// Cooperative stop signal shared between a run and its host.
///
/// Checked before every pull from the source.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Why a run failed.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("reader failed: {0:#}")]
    Source(anyhow::Error),

    #[error("writer failed: {0}")]
    Writer(#[from] CloudIOError),

    #[error("run cancelled")]
    Cancelled,
}

/// Orchestrator settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOptions {
    /// Lines per parse batch and per `write_batch` call.
    pub batch_size: usize,
    pub exec_mode: ExecMode,
    pub failure_policy: FailurePolicy,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            batch_size: 500,
            exec_mode: ExecMode::default(),
            failure_policy: FailurePolicy::default(),
        }
    }
}

/// Summary of a finished run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub state: RunState,
    pub lines_read: u64,
    pub records_written: u64,
    pub records_skipped: u64,
    pub null_fields: u64,
    pub batches: u64,
    pub elapsed_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunReport {
    /// Write the report as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or written.
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut file =
            File::create(path).with_context(|| format!("create report {}", path.display()))?;
        let formatted = serde_json::to_string_pretty(self)?;
        file.write_all(formatted.as_bytes())
            .with_context(|| format!("write report {}", path.display()))?;
        Ok(())
    }
}

/// Terminal result of [`LoadPipeline::run`].
#[derive(Debug)]
pub struct RunOutcome {
    pub report: RunReport,
    pub error: Option<PipelineError>,
}

impl RunOutcome {
    #[must_use]
    pub const fn succeeded(&self) -> bool {
        matches!(self.report.state, RunState::Succeeded)
    }

    /// # Errors
    ///
    /// Returns the error that failed the run.
    pub fn into_result(self) -> Result<RunReport, PipelineError> {
        match self.error {
            None => Ok(self.report),
            Some(e) => Err(e),
        }
    }
}

/// Drives one load from a line source into a record sink.
pub struct LoadPipeline {
    options: PipelineOptions,
    runner: Runner,
    cancel: CancelToken,
    state: RunState,
}

impl LoadPipeline {
    /// # Errors
    ///
    /// Returns an error if `batch_size` is zero or the parse pool cannot be
    /// built.
    pub fn new(options: PipelineOptions) -> Result<Self> {
        anyhow::ensure!(options.batch_size > 0, "batch_size must be at least 1");
        Ok(Self {
            runner: Runner::new(options.exec_mode)?,
            options,
            cancel: CancelToken::new(),
            state: RunState::Idle,
        })
    }

    #[must_use]
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// Handle that stops this run when cancelled.
    #[must_use]
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    #[must_use]
    pub const fn state(&self) -> RunState {
        self.state
    }

    #[must_use]
    pub const fn options(&self) -> &PipelineOptions {
        &self.options
    }

    fn transition(&mut self, next: RunState) {
        debug!(from = %self.state, to = %next, "run state");
        self.state = next;
    }

    /// Execute the run to a terminal state.
    pub fn run<S, K>(mut self, source: &S, sink: &mut K) -> RunOutcome
    where
        S: LineSource + ?Sized,
        K: RecordSink + ?Sized,
    {
        let started = Instant::now();
        let mut report = RunReport::default();
        self.transition(RunState::Running);
        info!(
            batch_size = self.options.batch_size,
            mode = ?self.options.exec_mode,
            policy = ?self.options.failure_policy,
            "load started"
        );

        let result = self.drive(source, sink, &mut report);

        let next = if result.is_ok() {
            RunState::Succeeded
        } else {
            RunState::Failed
        };
        self.transition(next);
        report.state = self.state;
        report.elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        match &result {
            Ok(()) => info!(
                lines = report.lines_read,
                written = report.records_written,
                skipped = report.records_skipped,
                nulls = report.null_fields,
                elapsed_ms = report.elapsed_ms,
                "load succeeded"
            ),
            Err(e) => {
                report.error = Some(e.to_string());
                error!(
                    error = %e,
                    lines = report.lines_read,
                    written = report.records_written,
                    "load failed"
                );
            }
        }

        RunOutcome {
            report,
            error: result.err(),
        }
    }

    fn drive<S, K>(
        &self,
        source: &S,
        sink: &mut K,
        report: &mut RunReport,
    ) -> Result<(), PipelineError>
    where
        S: LineSource + ?Sized,
        K: RecordSink + ?Sized,
    {
        self.check_cancelled()?;
        let mut lines = source.lines().map_err(PipelineError::Source)?;
        sink.open()?;

        let mut batch = Vec::with_capacity(self.options.batch_size);
        loop {
            self.check_cancelled()?;
            match lines.next() {
                Some(Ok(line)) => {
                    report.lines_read += 1;
                    batch.push(line);
                    if batch.len() == self.options.batch_size {
                        self.flush(&mut batch, sink, report)?;
                    }
                }
                Some(Err(e)) => return Err(PipelineError::Source(e)),
                None => break,
            }
        }

        if !batch.is_empty() {
            self.flush(&mut batch, sink, report)?;
        }
        Ok(())
    }

    fn check_cancelled(&self) -> Result<(), PipelineError> {
        if self.cancel.is_cancelled() {
            warn!("cancellation requested, no further lines will be read");
            return Err(PipelineError::Cancelled);
        }
        Ok(())
    }

    /// Parse the pending lines and write what survives as one batch.
    fn flush<K>(
        &self,
        batch: &mut Vec<String>,
        sink: &mut K,
        report: &mut RunReport,
    ) -> Result<(), PipelineError>
    where
        K: RecordSink + ?Sized,
    {
        let results = self.runner.parse_batch(batch);
        batch.clear();

        let mut records: Vec<TripRecord> = Vec::with_capacity(results.len());
        for result in results {
            match result {
                Ok(record) => records.push(record),
                Err(e) => match self.options.failure_policy {
                    // Reported once, by `run`, as the cause of the failed load.
                    FailurePolicy::FailFast => return Err(e.into()),
                    FailurePolicy::SkipMalformed => {
                        warn!(line = e.line(), error = %e, "skipping line");
                        report.records_skipped += 1;
                    }
                },
            }
        }
        if records.is_empty() {
            return Ok(());
        }

        let nulls: usize = records.iter().map(TripRecord::null_count).sum();
        let count = records.len();
        let written = sink.write_batch(records)?;

        report.null_fields += nulls as u64;
        report.records_written += written as u64;
        report.batches += 1;
        debug!(records = count, written, batch = report.batches, "batch written");
        Ok(())
    }
}

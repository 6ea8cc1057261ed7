//! Run configuration.
//!
//! Settings are layered: built-in defaults, then an optional JSON file, then
//! `TAXIBEAM_*` environment variables, then command-line flags (applied by the
//! binary). Every layer only overrides what it names.
//!
//! ```
//! use taxibeam::config::PipelineConfig;
//! use std::collections::HashMap;
//!
//! let mut config = PipelineConfig::default();
//! config.apply_overrides(&HashMap::from([("batch_size".to_string(), "250".to_string())]))?;
//! config.validate()?;
//! assert_eq!(config.batch_size, 250);
//! # Ok::<(), anyhow::Error>(())
//! ```

use crate::io::cloud::helpers::{RetryConfig, config_from_env};
use crate::io::sink::{CreateDisposition, WriteDisposition, WriteOptions};
use crate::pipeline::{FailurePolicy, PipelineOptions};
use crate::runner::ExecMode;
use anyhow::{Context, Result, ensure};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Prefix of environment overrides, e.g. `TAXIBEAM_BATCH_SIZE=1000`.
pub const ENV_PREFIX: &str = "TAXIBEAM_";

/// Where batches are parsed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecKind {
    Sequential,
    #[default]
    Parallel,
}

/// Every tunable of a load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub batch_size: usize,
    pub exec_mode: ExecKind,
    /// Parse workers; `None` uses one per core.
    pub threads: Option<usize>,
    pub failure_policy: FailurePolicy,
    pub skip_header_lines: usize,
    pub create_disposition: CreateDisposition,
    pub write_disposition: WriteDisposition,
    pub max_rows_per_request: usize,
    pub retry: RetryConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: 500,
            exec_mode: ExecKind::default(),
            threads: None,
            failure_policy: FailurePolicy::default(),
            skip_header_lines: 1,
            create_disposition: CreateDisposition::default(),
            write_disposition: WriteDisposition::default(),
            max_rows_per_request: 500,
            retry: RetryConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Read a JSON config file. Missing keys keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid config JSON.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text =
            fs::read_to_string(path).with_context(|| format!("read config {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parse config {}", path.display()))
    }

    /// Defaults, then `path` if given, then the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the file or an environment override is invalid.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        config.apply_env()?;
        Ok(config)
    }

    /// Apply `TAXIBEAM_*` variables from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a recognized variable has an invalid value.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(&config_from_env(ENV_PREFIX))
    }

    /// Apply overrides keyed by lower-case field name (without the prefix).
    /// Retry settings use a `retry_` prefix, e.g. `retry_max_attempts`.
    ///
    /// # Errors
    ///
    /// Returns an error if a recognized key has an invalid value.
    pub fn apply_overrides(&mut self, vars: &HashMap<String, String>) -> Result<()> {
        for (key, raw) in vars {
            match key.as_str() {
                "batch_size" => self.batch_size = parse_value(key, raw)?,
                "exec_mode" => self.exec_mode = parse_value(key, raw)?,
                "threads" => self.threads = parse_value(key, raw)?,
                "failure_policy" => self.failure_policy = parse_value(key, raw)?,
                "skip_header_lines" => self.skip_header_lines = parse_value(key, raw)?,
                "create_disposition" => self.create_disposition = parse_value(key, raw)?,
                "write_disposition" => self.write_disposition = parse_value(key, raw)?,
                "max_rows_per_request" => self.max_rows_per_request = parse_value(key, raw)?,
                "retry_max_attempts" => self.retry.max_attempts = parse_value(key, raw)?,
                "retry_initial_delay_ms" => self.retry.initial_delay_ms = parse_value(key, raw)?,
                "retry_max_delay_ms" => self.retry.max_delay_ms = parse_value(key, raw)?,
                "retry_backoff_multiplier" => {
                    self.retry.backoff_multiplier = parse_value(key, raw)?;
                }
                // CLI-only variables share the prefix
                _ => {
                    debug!(key = %key, "not a configuration key, ignored");
                    continue;
                }
            }
            debug!(key = %key, value = %raw, "configuration override");
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Returns an error naming the first setting that cannot work.
    pub fn validate(&self) -> Result<()> {
        ensure!(self.batch_size > 0, "batch_size must be at least 1");
        ensure!(
            self.max_rows_per_request > 0,
            "max_rows_per_request must be at least 1"
        );
        ensure!(self.threads != Some(0), "threads must be at least 1");
        ensure!(self.retry.max_attempts > 0, "retry.max_attempts must be at least 1");
        Ok(())
    }

    #[must_use]
    pub const fn exec_mode(&self) -> ExecMode {
        match self.exec_mode {
            ExecKind::Sequential => ExecMode::Sequential,
            ExecKind::Parallel => ExecMode::Parallel {
                threads: self.threads,
            },
        }
    }

    #[must_use]
    pub const fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            batch_size: self.batch_size,
            exec_mode: self.exec_mode(),
            failure_policy: self.failure_policy,
        }
    }

    #[must_use]
    pub const fn write_options(&self) -> WriteOptions {
        WriteOptions {
            create_disposition: self.create_disposition,
            write_disposition: self.write_disposition,
            max_rows_per_request: self.max_rows_per_request,
            retry: self.retry,
        }
    }
}

/// Enum names are taken as bare strings, everything else as JSON.
fn parse_value<T: DeserializeOwned>(key: &str, raw: &str) -> Result<T> {
    serde_json::from_value(Value::String(raw.to_string()))
        .or_else(|_| serde_json::from_str(raw))
        .with_context(|| {
            format!(
                "invalid value for {ENV_PREFIX}{}: {raw:?}",
                key.to_uppercase()
            )
        })
}

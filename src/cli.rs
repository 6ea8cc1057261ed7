//! Command-line surface of the `taxibeam` binary.

use crate::config::{ExecKind, PipelineConfig};
use crate::io::cloud::{FsObjectIO, FsWarehouseIO, TableRef};
use crate::io::sink::{CreateDisposition, WarehouseSink, WriteDisposition};
use crate::io::text::TextSource;
use crate::pipeline::{FailurePolicy, LoadPipeline, RunOutcome};
use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Load taxi trip CSV exports into a warehouse table.
#[derive(Parser, Debug)]
#[command(name = "taxibeam")]
#[command(version)]
#[command(
    after_help = "Unrecognized trailing options (e.g. --runner=X --project p) are runner options; \
                  they are logged and otherwise ignored. A `--` separator is also accepted."
)]
pub struct Cli {
    /// Input glob: a local pattern or `scheme://bucket/key-pattern`.
    #[arg(short, long)]
    pub input: String,

    /// Destination table: `project:dataset.table`, `project.dataset.table` or `dataset.table`.
    #[arg(short, long)]
    pub output: String,

    /// Root directory of the warehouse.
    #[arg(long, env = "TAXIBEAM_WAREHOUSE_DIR", default_value = "warehouse")]
    pub warehouse_dir: PathBuf,

    /// Root directory serving `scheme://` inputs; each bucket is a sub-directory.
    #[arg(long, env = "TAXIBEAM_OBJECT_STORE_ROOT")]
    pub object_store_root: Option<PathBuf>,

    /// JSON config file.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Lines per batch.
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Parse worker threads.
    #[arg(long, conflicts_with = "sequential")]
    pub threads: Option<usize>,

    /// Parse on the main thread.
    #[arg(long)]
    pub sequential: bool,

    /// Skip unparsable lines instead of failing the run.
    #[arg(long)]
    pub skip_malformed: bool,

    #[arg(long, value_enum)]
    pub create_disposition: Option<CreateDisposition>,

    #[arg(long, value_enum)]
    pub write_disposition: Option<WriteDisposition>,

    /// Write the run report as JSON to this path.
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(short, long, default_value = "info")]
    pub log_level: String,

    /// Runner options, passed through untouched.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, hide = true)]
    pub pipeline_args: Vec<String>,
}

impl Cli {
    /// Flags override whatever the file and environment set.
    pub fn apply_to(&self, config: &mut PipelineConfig) {
        if let Some(n) = self.batch_size {
            config.batch_size = n;
        }
        if let Some(n) = self.threads {
            config.exec_mode = ExecKind::Parallel;
            config.threads = Some(n);
        }
        if self.sequential {
            config.exec_mode = ExecKind::Sequential;
        }
        if self.skip_malformed {
            config.failure_policy = FailurePolicy::SkipMalformed;
        }
        if let Some(d) = self.create_disposition {
            config.create_disposition = d;
        }
        if let Some(d) = self.write_disposition {
            config.write_disposition = d;
        }
    }
}

#[must_use]
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Resolve configuration, run one load and write the report if asked.
///
/// A failed load is reported through the returned outcome, not as an error.
///
/// # Errors
///
/// Returns an error if configuration is invalid, the table id cannot be
/// parsed, or the report cannot be written.
pub fn run_with_cli(cli: &Cli) -> Result<RunOutcome> {
    let mut config = PipelineConfig::load(cli.config.as_deref())?;
    cli.apply_to(&mut config);
    config.validate().context("invalid configuration")?;

    if !cli.pipeline_args.is_empty() {
        info!(args = ?cli.pipeline_args, "runner options passed through");
    }

    let table = TableRef::parse(&cli.output)
        .with_context(|| format!("invalid output table {}", cli.output))?;

    let mut source = TextSource::new(&cli.input).skip_header_lines(config.skip_header_lines);
    if let Some(root) = &cli.object_store_root {
        source = source.with_object_store(Arc::new(FsObjectIO::new(root)));
    }
    let mut sink = WarehouseSink::new(
        FsWarehouseIO::new(&cli.warehouse_dir),
        table,
        config.write_options(),
    );

    info!(
        input = %cli.input,
        output = %sink.table(),
        warehouse = %cli.warehouse_dir.display(),
        cores = num_cpus::get(),
        "starting load"
    );
    let outcome = LoadPipeline::new(config.pipeline_options())?.run(&source, &mut sink);

    if let Some(path) = &cli.report {
        outcome.report.save_to_file(path)?;
        info!(path = %path.display(), "run report written");
    }
    Ok(outcome)
}

use crate::parser::{ParseError, RecordParser};
use crate::schema::TripRecord;
#[cfg(feature = "parallel-parse")]
use anyhow::Context;
use anyhow::Result;
#[cfg(feature = "parallel-parse")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// How a batch of lines is parsed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecMode {
    Sequential,
    Parallel { threads: Option<usize> },
}

impl Default for ExecMode {
    fn default() -> Self {
        Self::Parallel { threads: None }
    }
}

/// Parses batches of raw lines on the calling thread or a rayon pool.
///
/// Results always come back in input order, so the first failure of a batch
/// is the failure of its lowest-indexed bad line regardless of mode.
pub struct Runner {
    mode: ExecMode,
    parser: RecordParser,
    #[cfg(feature = "parallel-parse")]
    pool: Option<rayon::ThreadPool>,
}

impl Default for Runner {
    fn default() -> Self {
        Self {
            mode: ExecMode::default(),
            parser: RecordParser::new(),
            #[cfg(feature = "parallel-parse")]
            pool: None,
        }
    }
}

impl Runner {
    /// Build a runner. `Parallel { threads: Some(n) }` gets a dedicated pool of
    /// `n` workers; `threads: None` uses rayon's global pool.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker pool cannot be created.
    pub fn new(mode: ExecMode) -> Result<Self> {
        #[cfg(feature = "parallel-parse")]
        let pool = match mode {
            ExecMode::Parallel { threads: Some(n) } => Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(n)
                    .thread_name(|i| format!("taxibeam-parse-{i}"))
                    .build()
                    .with_context(|| format!("build parse pool with {n} threads"))?,
            ),
            _ => None,
        };
        #[cfg(not(feature = "parallel-parse"))]
        if matches!(mode, ExecMode::Parallel { .. }) {
            debug!("parallel-parse feature disabled, parsing sequentially");
        }

        Ok(Self {
            mode,
            parser: RecordParser::new(),
            #[cfg(feature = "parallel-parse")]
            pool,
        })
    }

    #[must_use]
    pub const fn mode(&self) -> ExecMode {
        self.mode
    }

    /// Parse every line of `lines`, one result per line, in order.
    pub fn parse_batch(&self, lines: &[String]) -> Vec<Result<TripRecord, ParseError>> {
        match self.mode {
            ExecMode::Sequential => self.parse_seq(lines),
            ExecMode::Parallel { .. } => self.parse_par(lines),
        }
    }

    fn parse_seq(&self, lines: &[String]) -> Vec<Result<TripRecord, ParseError>> {
        lines.iter().map(|l| self.parser.parse_line(l)).collect()
    }

    #[cfg(feature = "parallel-parse")]
    fn parse_par(&self, lines: &[String]) -> Vec<Result<TripRecord, ParseError>> {
        let parser = self.parser;
        let work = || {
            lines
                .par_iter()
                .map(|l| parser.parse_line(l))
                .collect::<Vec<_>>()
        };
        debug!(lines = lines.len(), dedicated_pool = self.pool.is_some(), "parallel parse");
        match &self.pool {
            Some(pool) => pool.install(work),
            None => work(),
        }
    }

    #[cfg(not(feature = "parallel-parse"))]
    fn parse_par(&self, lines: &[String]) -> Vec<Result<TripRecord, ParseError>> {
        self.parse_seq(lines)
    }
}

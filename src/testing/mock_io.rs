//! In-memory collaborators for exercising a load without files or a
//! warehouse.

use crate::io::cloud::{CloudIOError, CloudResult, ErrorKind};
use crate::io::sink::RecordSink;
use crate::io::text::{LineSource, Lines};
use crate::schema::TripRecord;
use anyhow::{Result, anyhow};

/// Serves a fixed list of lines (no header handling).
#[derive(Debug, Clone, Default)]
pub struct VecSource {
    lines: Vec<String>,
    fail_at: Option<usize>,
}

impl VecSource {
    #[must_use]
    pub fn new<S: Into<String>>(lines: impl IntoIterator<Item = S>) -> Self {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
            fail_at: None,
        }
    }

    /// Yield a read error in place of line `index`; nothing after it.
    #[must_use]
    pub const fn failing_at(mut self, index: usize) -> Self {
        self.fail_at = Some(index);
        self
    }
}

impl LineSource for VecSource {
    fn lines(&self) -> Result<Lines<'_>> {
        let fail_at = self.fail_at;
        Ok(Box::new(
            self.lines
                .iter()
                .enumerate()
                .map(move |(i, line)| {
                    if Some(i) == fail_at {
                        Err(anyhow!("injected read failure at line {i}"))
                    } else {
                        Ok(line.clone())
                    }
                })
                .take(fail_at.map_or(usize::MAX, |i| i + 1)),
        ))
    }
}

/// Keeps every written batch in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    batches: Vec<Vec<TripRecord>>,
    open_calls: usize,
    fail_open: Option<ErrorKind>,
    fail_on_batch: Option<(usize, ErrorKind)>,
    write_calls: usize,
}

impl RecordingSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail `open` with `kind`.
    #[must_use]
    pub const fn fail_open(mut self, kind: ErrorKind) -> Self {
        self.fail_open = Some(kind);
        self
    }

    /// Fail the `n`th `write_batch` call (0-based) with `kind`, storing nothing.
    #[must_use]
    pub const fn fail_on_batch(mut self, n: usize, kind: ErrorKind) -> Self {
        self.fail_on_batch = Some((n, kind));
        self
    }

    #[must_use]
    pub fn batches(&self) -> &[Vec<TripRecord>] {
        &self.batches
    }

    /// All stored records, in write order.
    #[must_use]
    pub fn records(&self) -> Vec<TripRecord> {
        self.batches.iter().flatten().cloned().collect()
    }

    #[must_use]
    pub const fn open_calls(&self) -> usize {
        self.open_calls
    }
}

impl RecordSink for RecordingSink {
    fn open(&mut self) -> CloudResult<()> {
        self.open_calls += 1;
        match self.fail_open {
            Some(kind) => Err(CloudIOError::new(kind, "injected open failure")),
            None => Ok(()),
        }
    }

    fn write_batch(&mut self, records: Vec<TripRecord>) -> CloudResult<usize> {
        let call = self.write_calls;
        self.write_calls += 1;
        if let Some((n, kind)) = self.fail_on_batch.filter(|(n, _)| *n == call) {
            return Err(CloudIOError::new(
                kind,
                format!("injected failure on batch {n}"),
            ));
        }
        let count = records.len();
        self.batches.push(records);
        Ok(count)
    }
}

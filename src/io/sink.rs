//! Record sinks: where parsed trips are delivered.
//!
//! [`RecordSink`] is the writer seam of a load. [`WarehouseSink`] is the
//! production implementation: it applies the caller's create/write
//! dispositions once, then appends rows in provider-sized requests, retrying
//! transient failures. A retried request may already have been applied, so
//! delivery is at-least-once.

use crate::io::cloud::helpers::{RetryConfig, batch_in_chunks, retry_with_backoff};
use crate::io::cloud::{CloudIOError, CloudResult, ErrorKind, Row, TableRef, WarehouseIO};
use crate::schema::{TRIP_SCHEMA, TripRecord, warehouse_schema};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Accepts batches of typed records and persists them.
pub trait RecordSink {
    /// Prepare the destination. Called once before the first batch.
    ///
    /// # Errors
    ///
    /// Returns the collaborator's error unmodified.
    fn open(&mut self) -> CloudResult<()> {
        Ok(())
    }

    /// Persist `records`, returning how many were accepted.
    ///
    /// # Errors
    ///
    /// Returns the collaborator's error unmodified. Records of a failed call
    /// may have been partially applied.
    fn write_batch(&mut self, records: Vec<TripRecord>) -> CloudResult<usize>;
}

impl<S: RecordSink + ?Sized> RecordSink for Box<S> {
    fn open(&mut self) -> CloudResult<()> {
        (**self).open()
    }

    fn write_batch(&mut self, records: Vec<TripRecord>) -> CloudResult<usize> {
        (**self).write_batch(records)
    }
}

/// What to do when the destination table does not exist.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum CreateDisposition {
    /// Fail the load.
    CreateNever,
    /// Create the table from the trip schema.
    #[default]
    CreateIfNeeded,
}

/// What to do with rows already in the destination table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum WriteDisposition {
    /// Keep existing rows.
    #[default]
    Append,
    /// Remove existing rows before the first write.
    Truncate,
    /// Fail the load if the table holds any row.
    WriteEmpty,
}

/// Writer-side settings supplied by the caller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WriteOptions {
    pub create_disposition: CreateDisposition,
    pub write_disposition: WriteDisposition,
    pub max_rows_per_request: usize,
    pub retry: RetryConfig,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            create_disposition: CreateDisposition::default(),
            write_disposition: WriteDisposition::default(),
            max_rows_per_request: 500,
            retry: RetryConfig::default(),
        }
    }
}

/// Appends trip rows to a warehouse table.
pub struct WarehouseSink<W: WarehouseIO> {
    warehouse: W,
    table: TableRef,
    options: WriteOptions,
    opened: bool,
}

impl<W: WarehouseIO> WarehouseSink<W> {
    pub const fn new(warehouse: W, table: TableRef, options: WriteOptions) -> Self {
        Self {
            warehouse,
            table,
            options,
            opened: false,
        }
    }

    #[must_use]
    pub const fn table(&self) -> &TableRef {
        &self.table
    }

    #[must_use]
    pub const fn warehouse(&self) -> &W {
        &self.warehouse
    }

    fn with_retry<T>(&self, op: impl FnMut() -> CloudResult<T>) -> CloudResult<T> {
        retry_with_backoff(&self.options.retry, op)
    }

    fn check_schema(&self) -> CloudResult<()> {
        let existing = self.with_retry(|| self.warehouse.get_schema(&self.table))?;
        let names: Vec<&str> = existing.iter().map(|(name, _)| name.as_str()).collect();
        let expected: Vec<&str> = TRIP_SCHEMA.iter().map(|f| f.name).collect();
        if names == expected {
            Ok(())
        } else {
            Err(CloudIOError::new(
                ErrorKind::InvalidInput,
                format!(
                    "table {} has columns [{}], expected [{}]",
                    self.table,
                    names.join(", "),
                    expected.join(", ")
                ),
            ))
        }
    }
}

impl<W: WarehouseIO> RecordSink for WarehouseSink<W> {
    fn open(&mut self) -> CloudResult<()> {
        if self.opened {
            return Ok(());
        }
        let table = &self.table;
        let exists = self.with_retry(|| self.warehouse.table_exists(table))?;

        if exists {
            self.check_schema()?;
            match self.options.write_disposition {
                WriteDisposition::Append => {}
                WriteDisposition::Truncate => {
                    info!(%table, "truncating destination table");
                    self.with_retry(|| self.warehouse.truncate_table(table))?;
                }
                WriteDisposition::WriteEmpty => {
                    let rows = self.with_retry(|| self.warehouse.row_count(table))?;
                    if rows > 0 {
                        return Err(CloudIOError::new(
                            ErrorKind::AlreadyExists,
                            format!("table {table} already holds {rows} rows"),
                        ));
                    }
                }
            }
        } else {
            match self.options.create_disposition {
                CreateDisposition::CreateNever => {
                    return Err(CloudIOError::new(
                        ErrorKind::NotFound,
                        format!("table {table} does not exist and tables are never created"),
                    ));
                }
                CreateDisposition::CreateIfNeeded => {
                    info!(%table, "creating destination table");
                    let schema = warehouse_schema();
                    // A retried create may find the table its lost attempt made.
                    let mut attempt = 0;
                    self.with_retry(|| {
                        attempt += 1;
                        match self.warehouse.create_table(table, &schema) {
                            Err(e) if attempt > 1 && e.kind == ErrorKind::AlreadyExists => {
                                debug!(%table, "table created by an earlier attempt");
                                Ok(())
                            }
                            other => other,
                        }
                    })?;
                }
            }
        }

        self.opened = true;
        Ok(())
    }

    fn write_batch(&mut self, records: Vec<TripRecord>) -> CloudResult<usize> {
        self.open()?;
        if records.is_empty() {
            return Ok(0);
        }

        let rows: Vec<Row> = records.iter().map(TripRecord::to_row).collect();
        drop(records);

        let accepted = batch_in_chunks(&rows, self.options.max_rows_per_request, |chunk| {
            self.with_retry(|| self.warehouse.append_rows(&self.table, chunk))
        })?
        .into_iter()
        .sum();
        debug!(table = %self.table, rows = accepted, "appended batch");
        Ok(accepted)
    }
}

//! # taxibeam
//!
//! A batch loader for taxi trip CSV exports. Each run reads every source
//! matching a glob, drops one header line per source, turns each line into a
//! typed [`TripRecord`] and writes the records to a warehouse table.
//!
//! ## Key Features
//!
//! - **Best-effort coercion** - a numeric field that does not parse becomes null
//!   instead of failing the line
//! - **Strict shape** - a line without exactly 19 fields fails the run
//! - **At-least-once delivery** - writer retries may duplicate rows, never drop them
//! - **Sequential and parallel parsing** - batches are parsed on a rayon pool by default
//! - **Compressed sources** - gzip, zstd, bzip2 and xz behind feature flags
//!
//! ## Quick Start
//!
//! ```
//! use taxibeam::*;
//! use taxibeam::io::cloud::{FakeWarehouseIO, TableRef};
//! use taxibeam::testing::{VecSource, sample_lines};
//!
//! # fn main() -> anyhow::Result<()> {
//! let warehouse = FakeWarehouseIO::new();
//! let table = TableRef::parse("nyc:taxi.trips")?;
//! let mut sink = WarehouseSink::new(warehouse.clone(), table.clone(), WriteOptions::default());
//!
//! let report = LoadPipeline::new(PipelineOptions::default())?
//!     .run(&VecSource::new(sample_lines(10)), &mut sink)
//!     .into_result()?;
//!
//! assert_eq!(report.state, RunState::Succeeded);
//! assert_eq!(warehouse.rows(&table).len(), 10);
//! # Ok(())
//! # }
//! ```
//!
//! ## Components
//!
//! - [`coerce`] - text to typed scalar, or null
//! - [`parser`] - one CSV line to one [`TripRecord`]
//! - [`pipeline`] - the Reader → Parse → Writer orchestrator
//! - [`io`] - sources, sinks and the warehouse/object-store seams
//! - [`config`] - layered run configuration
//! - [`testing`] - fixtures and in-memory collaborators

pub mod cli;
pub mod coerce;
pub mod config;
pub mod io;
pub mod parser;
pub mod pipeline;
pub mod runner;
pub mod schema;
pub mod testing;

pub use coerce::coerce;
pub use config::PipelineConfig;
pub use io::sink::{CreateDisposition, RecordSink, WarehouseSink, WriteDisposition, WriteOptions};
pub use io::text::{LineSource, TextSource};
pub use parser::{ParseError, RecordParser, parse_line};
pub use pipeline::{
    CancelToken, FailurePolicy, LoadPipeline, PipelineError, PipelineOptions, RunOutcome,
    RunReport, RunState,
};
pub use runner::{ExecMode, Runner};
pub use schema::{FieldKind, FieldValue, TRIP_SCHEMA, TripRecord};

//! Testing utilities for loads.
//!
//! - **Fixtures**: well-formed trip lines, their expected records and source
//!   files on disk
//! - **Mock I/O**: an in-memory [`LineSource`](crate::io::text::LineSource)
//!   and a recording [`RecordSink`](crate::io::sink::RecordSink) with failure
//!   injection
//!
//! The warehouse and object-store fakes live in [`crate::io::cloud::fake`].
//!
//! # Quick Start
//!
//! ```
//! use taxibeam::pipeline::{LoadPipeline, PipelineOptions};
//! use taxibeam::testing::*;
//!
//! # fn main() -> anyhow::Result<()> {
//! let mut lines = sample_lines(4);
//! lines.push("not,a,trip".to_string());
//!
//! let mut sink = RecordingSink::new();
//! let outcome = LoadPipeline::new(PipelineOptions::default())?
//!     .run(&VecSource::new(lines), &mut sink);
//!
//! assert!(!outcome.succeeded());
//! assert!(sink.records().is_empty());
//! # Ok(())
//! # }
//! ```

pub mod fixtures;
pub mod mock_io;

pub use fixtures::*;
pub use mock_io::*;

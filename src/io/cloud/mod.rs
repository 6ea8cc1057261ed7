//! Storage and warehouse abstractions.
//!
//! The loader talks to two collaborators through provider-agnostic traits:
//!
//! - [`ObjectIO`] - object storage holding the CSV exports (GCS, S3, ...)
//! - [`WarehouseIO`] - the analytical warehouse receiving trip rows
//!
//! Both traits are synchronous. An implementation wrapping an async SDK blocks
//! internally, which matches the batch execution model of the loader.
//!
//! ## Implementations
//!
//! - [`fake`] - in-memory fakes with fault injection, for tests
//! - [`fs`] - directory-backed store and warehouse, used by the CLI
//!
//! ## Error Handling
//!
//! All operations return [`CloudResult<T>`] where the error is [`CloudIOError`].
//! Errors are categorized by [`ErrorKind`]:
//! - `Authentication` / `Authorization` - Credential issues
//! - `NotFound` / `AlreadyExists` - Resource state
//! - `Network` / `Timeout` / `ServiceUnavailable` / `RateLimited` - Transient failures
//! - `InvalidInput` - Bad parameters
//! - `InternalError` / `Other` - Catch-all
//!
//! [`helpers::retry_with_backoff`] retries the transient kinds.
//!
//! ```
//! use taxibeam::io::cloud::*;
//!
//! # fn main() -> CloudResult<()> {
//! let storage = FakeObjectIO::new();
//! storage.put_object("bucket", "trips/2015-01.csv", b"header\n")?;
//! assert_eq!(storage.list_objects("bucket", Some("trips/"))?.len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod fake;
pub mod fs;
pub mod helpers;
pub mod traits;

pub use fake::*;
pub use fs::*;
pub use traits::*;

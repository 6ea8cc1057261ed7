//! Core traits for the storage and warehouse collaborators.
//!
//! Both traits are synchronous. Implementations backed by async SDKs are
//! expected to block internally.

use serde_json::{Map, Value};
use std::error::Error;
use std::fmt;

// ============================================================================
// Core Error Type
// ============================================================================

/// Error reported by an object store or warehouse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudIOError {
    pub message: String,
    pub kind: ErrorKind,
    pub source: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Authentication,
    Authorization,
    NotFound,
    AlreadyExists,
    InvalidInput,
    Network,
    Timeout,
    ServiceUnavailable,
    RateLimited,
    InternalError,
    Other,
}

impl ErrorKind {
    /// Whether a request failing with this kind may succeed when repeated.
    #[must_use]
    pub const fn is_transient(self) -> bool {
        matches!(
            self,
            Self::Network | Self::Timeout | Self::ServiceUnavailable | Self::RateLimited
        )
    }
}

impl fmt::Display for CloudIOError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)?;
        if let Some(source) = &self.source {
            write!(f, " ({source})")?;
        }
        Ok(())
    }
}

impl Error for CloudIOError {}

impl CloudIOError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind,
            source: None,
        }
    }

    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

pub type CloudResult<T> = Result<T, CloudIOError>;

// ============================================================================
// Table identifiers
// ============================================================================

/// A destination table: `project:dataset.table`, `project.dataset.table` or
/// `dataset.table`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableRef {
    pub project: Option<String>,
    pub dataset: String,
    pub table: String,
}

impl TableRef {
    /// Parse a table identifier.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::InvalidInput`] when the identifier does not have
    /// one of the accepted shapes or a component is not a valid name.
    pub fn parse(id: &str) -> CloudResult<Self> {
        let invalid = || {
            CloudIOError::new(
                ErrorKind::InvalidInput,
                format!("invalid table identifier '{id}', expected [project:]dataset.table"),
            )
        };

        let (project, rest) = match id.split_once(':') {
            Some((project, rest)) => (Some(project), rest),
            None => (None, id),
        };
        let parts: Vec<&str> = rest.split('.').collect();
        let (project, dataset, table) = match (project, parts.as_slice()) {
            (Some(p), [d, t]) => (Some(p), *d, *t),
            (None, [p, d, t]) => (Some(*p), *d, *t),
            (None, [d, t]) => (None, *d, *t),
            _ => return Err(invalid()),
        };

        for name in project.iter().chain([&dataset, &table]) {
            validate_name(name).map_err(|_| invalid())?;
        }
        Ok(Self {
            project: project.map(str::to_string),
            dataset: dataset.to_string(),
            table: table.to_string(),
        })
    }
}

fn validate_name(name: &str) -> CloudResult<()> {
    let ok = !name.is_empty()
        && name.len() <= 1024
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if ok {
        Ok(())
    } else {
        Err(CloudIOError::new(
            ErrorKind::InvalidInput,
            format!("invalid name '{name}'"),
        ))
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.project {
            Some(project) => write!(f, "{project}:{}.{}", self.dataset, self.table),
            None => write!(f, "{}.{}", self.dataset, self.table),
        }
    }
}

// ============================================================================
// WarehouseIO - Analytical Databases
// ============================================================================

/// A warehouse row: column name → JSON value (`null` for missing).
pub type Row = Map<String, Value>;

/// Trait for analytical data warehouse operations.
pub trait WarehouseIO: Send + Sync {
    /// Check if a table exists.
    ///
    /// # Errors
    ///
    /// Returns an error if there's a connection issue or insufficient permissions
    fn table_exists(&self, table: &TableRef) -> CloudResult<bool>;

    /// Create a table with the given `(column, type)` schema.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::AlreadyExists`] if the table exists, or a transport error
    fn create_table(&self, table: &TableRef, schema: &[(String, String)]) -> CloudResult<()>;

    /// Get table schema.
    ///
    /// # Errors
    ///
    /// Returns an error if the table doesn't exist or there's a connection issue
    fn get_schema(&self, table: &TableRef) -> CloudResult<Vec<(String, String)>>;

    /// Number of rows currently stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the table doesn't exist or there's a connection issue
    fn row_count(&self, table: &TableRef) -> CloudResult<usize>;

    /// Remove every row, keeping the schema.
    ///
    /// # Errors
    ///
    /// Returns an error if the table doesn't exist or there's a connection issue
    fn truncate_table(&self, table: &TableRef) -> CloudResult<()>;

    /// Append rows. A request that fails may still have been applied.
    ///
    /// # Errors
    ///
    /// Returns an error if the table doesn't exist, a row is rejected, or the
    /// request fails in transport
    fn append_rows(&self, table: &TableRef, rows: &[Row]) -> CloudResult<usize>;
}

// ============================================================================
// ObjectIO - Object Storage
// ============================================================================

/// Metadata for an object in storage
#[derive(Debug, Clone)]
pub struct ObjectMetadata {
    pub key: String,
    pub size: u64,
}

/// Trait for object storage operations
pub trait ObjectIO: Send + Sync {
    /// Upload data to object storage
    ///
    /// # Errors
    ///
    /// Returns an error if the bucket doesn't exist, permissions are not enough, or the upload fails
    fn put_object(&self, bucket: &str, key: &str, data: &[u8]) -> CloudResult<()>;

    /// Download data from object storage
    ///
    /// # Errors
    ///
    /// Returns an error if the object doesn't exist, permissions are not enough, or the download fails
    fn get_object(&self, bucket: &str, key: &str) -> CloudResult<Vec<u8>>;

    /// List objects with a prefix
    ///
    /// # Errors
    ///
    /// Returns an error if the bucket doesn't exist, permissions are not enough, or the listing fails
    fn list_objects(&self, bucket: &str, prefix: Option<&str>) -> CloudResult<Vec<ObjectMetadata>>;
}

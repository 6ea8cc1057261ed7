//! Fake implementations for testing.
//!
//! These implementations use in-memory data structures to simulate the object
//! store and the warehouse, making them ideal for unit testing without external
//! dependencies. [`FakeWarehouseIO`] can also inject append and create failures
//! to exercise retry and at-least-once behavior.

use crate::io::cloud::traits::{
    CloudIOError, CloudResult, ErrorKind, ObjectIO, ObjectMetadata, Row, TableRef, WarehouseIO,
};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

// Type aliases for complex nested types
type BucketStorage = Arc<Mutex<HashMap<String, HashMap<String, Vec<u8>>>>>;
type TableStorage = Arc<Mutex<HashMap<TableRef, FakeTable>>>;

// ============================================================================
// FakeWarehouseIO
// ============================================================================

#[derive(Clone, Debug, Default)]
struct FakeTable {
    schema: Vec<(String, String)>,
    rows: Vec<Row>,
}

#[derive(Clone, Copy, Debug)]
struct Fault {
    kind: ErrorKind,
    /// Rows are stored before the error is returned (lost acknowledgement).
    applied: bool,
}

#[derive(Clone, Default)]
pub struct FakeWarehouseIO {
    tables: TableStorage,
    faults: Arc<Mutex<VecDeque<Fault>>>,
    create_fault: Arc<Mutex<Option<ErrorKind>>>,
    append_calls: Arc<Mutex<usize>>,
}

impl FakeWarehouseIO {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a table with schema and rows to the fake warehouse.
    ///
    /// # Panics
    ///
    /// Panics if the mutex protecting the tables is poisoned.
    pub fn add_table(&self, table: &TableRef, schema: Vec<(String, String)>, rows: Vec<Row>) {
        self.tables
            .lock()
            .expect("tables mutex poisoned")
            .insert(table.clone(), FakeTable { schema, rows });
    }

    /// Make the next `n` append requests fail with `kind` without storing rows.
    ///
    /// # Panics
    ///
    /// Panics if the mutex protecting the fault queue is poisoned.
    pub fn fail_next_appends(&self, n: usize, kind: ErrorKind) {
        let mut faults = self.faults.lock().expect("faults mutex poisoned");
        faults.extend(std::iter::repeat_n(
            Fault {
                kind,
                applied: false,
            },
            n,
        ));
    }

    /// Make the next append request store its rows and then fail with `kind`.
    ///
    /// # Panics
    ///
    /// Panics if the mutex protecting the fault queue is poisoned.
    pub fn fail_after_apply(&self, kind: ErrorKind) {
        self.faults
            .lock()
            .expect("faults mutex poisoned")
            .push_back(Fault {
                kind,
                applied: true,
            });
    }

    /// Make the next `create_table` create the table and then fail with `kind`.
    ///
    /// # Panics
    ///
    /// Panics if the mutex protecting the fault is poisoned.
    pub fn fail_create_after_apply(&self, kind: ErrorKind) {
        *self.create_fault.lock().expect("faults mutex poisoned") = Some(kind);
    }

    /// All rows stored in `table` (empty if the table does not exist).
    ///
    /// # Panics
    ///
    /// Panics if the mutex protecting the tables is poisoned.
    #[must_use]
    pub fn rows(&self, table: &TableRef) -> Vec<Row> {
        self.tables
            .lock()
            .expect("tables mutex poisoned")
            .get(table)
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }

    /// Number of `append_rows` requests received, failed ones included.
    ///
    /// # Panics
    ///
    /// Panics if the mutex protecting the counter is poisoned.
    #[must_use]
    pub fn append_calls(&self) -> usize {
        *self.append_calls.lock().expect("counter mutex poisoned")
    }

    fn not_found(table: &TableRef) -> CloudIOError {
        CloudIOError::new(ErrorKind::NotFound, format!("Table {table} not found"))
    }
}

impl WarehouseIO for FakeWarehouseIO {
    fn table_exists(&self, table: &TableRef) -> CloudResult<bool> {
        Ok(self
            .tables
            .lock()
            .expect("tables mutex poisoned")
            .contains_key(table))
    }

    fn create_table(&self, table: &TableRef, schema: &[(String, String)]) -> CloudResult<()> {
        let mut tables = self.tables.lock().expect("tables mutex poisoned");
        if tables.contains_key(table) {
            return Err(CloudIOError::new(
                ErrorKind::AlreadyExists,
                format!("Table {table} already exists"),
            ));
        }
        tables.insert(
            table.clone(),
            FakeTable {
                schema: schema.to_vec(),
                rows: Vec::new(),
            },
        );
        match self.create_fault.lock().expect("faults mutex poisoned").take() {
            Some(kind) => Err(CloudIOError::new(kind, "create applied, response lost")),
            None => Ok(()),
        }
    }

    fn get_schema(&self, table: &TableRef) -> CloudResult<Vec<(String, String)>> {
        self.tables
            .lock()
            .expect("tables mutex poisoned")
            .get(table)
            .map(|t| t.schema.clone())
            .ok_or_else(|| Self::not_found(table))
    }

    fn row_count(&self, table: &TableRef) -> CloudResult<usize> {
        self.tables
            .lock()
            .expect("tables mutex poisoned")
            .get(table)
            .map(|t| t.rows.len())
            .ok_or_else(|| Self::not_found(table))
    }

    fn truncate_table(&self, table: &TableRef) -> CloudResult<()> {
        self.tables
            .lock()
            .expect("tables mutex poisoned")
            .get_mut(table)
            .map(|t| t.rows.clear())
            .ok_or_else(|| Self::not_found(table))
    }

    fn append_rows(&self, table: &TableRef, rows: &[Row]) -> CloudResult<usize> {
        *self.append_calls.lock().expect("counter mutex poisoned") += 1;
        let fault = self.faults.lock().expect("faults mutex poisoned").pop_front();

        if let Some(Fault {
            kind,
            applied: false,
        }) = fault
        {
            return Err(CloudIOError::new(kind, "injected append failure"));
        }

        let mut tables = self.tables.lock().expect("tables mutex poisoned");
        let stored = tables.get_mut(table).ok_or_else(|| Self::not_found(table))?;
        stored.rows.extend_from_slice(rows);
        drop(tables);

        match fault {
            Some(Fault { kind, .. }) => Err(CloudIOError::new(
                kind,
                "injected failure after rows were applied",
            )),
            None => Ok(rows.len()),
        }
    }
}

// ============================================================================
// FakeObjectIO
// ============================================================================

#[derive(Clone, Default)]
pub struct FakeObjectIO {
    storage: BucketStorage,
}

impl FakeObjectIO {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ObjectIO for FakeObjectIO {
    fn put_object(&self, bucket: &str, key: &str, data: &[u8]) -> CloudResult<()> {
        self.storage
            .lock()
            .expect("storage mutex poisoned")
            .entry(bucket.to_string())
            .or_default()
            .insert(key.to_string(), data.to_vec());
        Ok(())
    }

    fn get_object(&self, bucket: &str, key: &str) -> CloudResult<Vec<u8>> {
        self.storage
            .lock()
            .expect("storage mutex poisoned")
            .get(bucket)
            .and_then(|b| b.get(key))
            .cloned()
            .ok_or_else(|| {
                CloudIOError::new(
                    ErrorKind::NotFound,
                    format!("Object {bucket}/{key} not found"),
                )
            })
    }

    fn list_objects(&self, bucket: &str, prefix: Option<&str>) -> CloudResult<Vec<ObjectMetadata>> {
        let storage = self.storage.lock().expect("storage mutex poisoned");
        let Some(objects) = storage.get(bucket) else {
            return Err(CloudIOError::new(
                ErrorKind::NotFound,
                format!("Bucket {bucket} not found"),
            ));
        };
        let mut listed: Vec<ObjectMetadata> = objects
            .iter()
            .filter(|(key, _)| prefix.is_none_or(|p| key.starts_with(p)))
            .map(|(key, data)| ObjectMetadata {
                key: key.clone(),
                size: data.len() as u64,
            })
            .collect();
        listed.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(listed)
    }
}

//! Directory-backed object store and warehouse.
//!
//! These back the command-line tool when no hosted service is configured:
//!
//! - [`FsObjectIO`] maps `bucket/key` to `<root>/<bucket>/<key>`.
//! - [`FsWarehouseIO`] stores each table as newline-delimited JSON at
//!   `<root>/[<project>/]<dataset>/<table>.jsonl`, next to a
//!   `<table>.schema.json` file holding its column list.

use crate::io::cloud::traits::{
    CloudIOError, CloudResult, ErrorKind, ObjectIO, ObjectMetadata, Row, TableRef, WarehouseIO,
};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

fn io_error(context: impl Into<String>, err: &io::Error) -> CloudIOError {
    let kind = match err.kind() {
        io::ErrorKind::NotFound => ErrorKind::NotFound,
        io::ErrorKind::PermissionDenied => ErrorKind::Authorization,
        io::ErrorKind::AlreadyExists => ErrorKind::AlreadyExists,
        io::ErrorKind::TimedOut => ErrorKind::Timeout,
        io::ErrorKind::Interrupted => ErrorKind::ServiceUnavailable,
        _ => ErrorKind::InternalError,
    };
    CloudIOError::new(kind, context).with_source(err.to_string())
}

// ============================================================================
// FsObjectIO
// ============================================================================

#[derive(Debug, Clone)]
pub struct FsObjectIO {
    root: PathBuf,
}

impl FsObjectIO {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn object_path(&self, bucket: &str, key: &str) -> PathBuf {
        self.root.join(bucket).join(key)
    }
}

impl ObjectIO for FsObjectIO {
    fn put_object(&self, bucket: &str, key: &str, data: &[u8]) -> CloudResult<()> {
        let path = self.object_path(bucket, key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| io_error(format!("mkdir -p {}", parent.display()), &e))?;
        }
        fs::write(&path, data).map_err(|e| io_error(format!("write {}", path.display()), &e))
    }

    fn get_object(&self, bucket: &str, key: &str) -> CloudResult<Vec<u8>> {
        let path = self.object_path(bucket, key);
        fs::read(&path).map_err(|e| io_error(format!("Object {bucket}/{key} not readable"), &e))
    }

    fn list_objects(&self, bucket: &str, prefix: Option<&str>) -> CloudResult<Vec<ObjectMetadata>> {
        let bucket_dir = self.root.join(bucket);
        if !bucket_dir.is_dir() {
            return Err(CloudIOError::new(
                ErrorKind::NotFound,
                format!("Bucket {bucket} not found under {}", self.root.display()),
            ));
        }

        let pattern = format!("{}/**/*", glob::Pattern::escape(&bucket_dir.to_string_lossy()));
        let entries = glob::glob(&pattern).map_err(|e| {
            CloudIOError::new(ErrorKind::InvalidInput, format!("list {bucket}: {e}"))
        })?;

        let mut listed = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| io_error(format!("list {bucket}"), e.error()))?;
            if !path.is_file() {
                continue;
            }
            let Some(key) = relative_key(&bucket_dir, &path) else {
                continue;
            };
            if prefix.is_some_and(|p| !key.starts_with(p)) {
                continue;
            }
            let size = path.metadata().map(|m| m.len()).unwrap_or(0);
            listed.push(ObjectMetadata { key, size });
        }
        listed.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(listed)
    }
}

fn relative_key(base: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(base).ok()?;
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Some(parts.join("/"))
}

// ============================================================================
// FsWarehouseIO
// ============================================================================

#[derive(Debug, Clone)]
pub struct FsWarehouseIO {
    root: PathBuf,
}

impl FsWarehouseIO {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn table_dir(&self, table: &TableRef) -> PathBuf {
        match &table.project {
            Some(project) => self.root.join(project).join(&table.dataset),
            None => self.root.join(&table.dataset),
        }
    }

    /// Path of the newline-delimited JSON file holding the table's rows.
    #[must_use]
    pub fn data_path(&self, table: &TableRef) -> PathBuf {
        self.table_dir(table).join(format!("{}.jsonl", table.table))
    }

    fn schema_path(&self, table: &TableRef) -> PathBuf {
        self.table_dir(table)
            .join(format!("{}.schema.json", table.table))
    }

    fn require(&self, table: &TableRef) -> CloudResult<PathBuf> {
        let path = self.data_path(table);
        if path.is_file() {
            Ok(path)
        } else {
            Err(CloudIOError::new(
                ErrorKind::NotFound,
                format!("Table {table} not found"),
            ))
        }
    }

    /// Read every stored row back.
    ///
    /// # Errors
    ///
    /// Returns an error if the table is missing or a stored line is not a JSON object.
    pub fn read_rows(&self, table: &TableRef) -> CloudResult<Vec<Row>> {
        let path = self.require(table)?;
        let f = File::open(&path).map_err(|e| io_error(format!("open {}", path.display()), &e))?;
        let mut rows = Vec::new();
        for (idx, line) in BufReader::new(f).lines().enumerate() {
            let line = line.map_err(|e| io_error(format!("read {}", path.display()), &e))?;
            if line.trim().is_empty() {
                continue;
            }
            let row: Row = serde_json::from_str(&line).map_err(|e| {
                CloudIOError::new(
                    ErrorKind::InternalError,
                    format!("corrupt row {} in {}", idx + 1, path.display()),
                )
                .with_source(e.to_string())
            })?;
            rows.push(row);
        }
        Ok(rows)
    }
}

impl WarehouseIO for FsWarehouseIO {
    fn table_exists(&self, table: &TableRef) -> CloudResult<bool> {
        Ok(self.data_path(table).is_file())
    }

    fn create_table(&self, table: &TableRef, schema: &[(String, String)]) -> CloudResult<()> {
        if self.table_exists(table)? {
            return Err(CloudIOError::new(
                ErrorKind::AlreadyExists,
                format!("Table {table} already exists"),
            ));
        }
        let dir = self.table_dir(table);
        fs::create_dir_all(&dir).map_err(|e| io_error(format!("mkdir -p {}", dir.display()), &e))?;

        let schema_json = serde_json::to_vec_pretty(schema).map_err(|e| {
            CloudIOError::new(ErrorKind::InternalError, "serialize schema")
                .with_source(e.to_string())
        })?;
        let schema_path = self.schema_path(table);
        fs::write(&schema_path, schema_json)
            .map_err(|e| io_error(format!("write {}", schema_path.display()), &e))?;

        let data_path = self.data_path(table);
        File::create(&data_path)
            .map(drop)
            .map_err(|e| io_error(format!("create {}", data_path.display()), &e))
    }

    fn get_schema(&self, table: &TableRef) -> CloudResult<Vec<(String, String)>> {
        self.require(table)?;
        let path = self.schema_path(table);
        let bytes = fs::read(&path).map_err(|e| io_error(format!("read {}", path.display()), &e))?;
        serde_json::from_slice(&bytes).map_err(|e| {
            CloudIOError::new(
                ErrorKind::InternalError,
                format!("corrupt schema {}", path.display()),
            )
            .with_source(e.to_string())
        })
    }

    fn row_count(&self, table: &TableRef) -> CloudResult<usize> {
        let path = self.require(table)?;
        let f = File::open(&path).map_err(|e| io_error(format!("open {}", path.display()), &e))?;
        let mut count = 0;
        for line in BufReader::new(f).lines() {
            let line = line.map_err(|e| io_error(format!("read {}", path.display()), &e))?;
            if !line.trim().is_empty() {
                count += 1;
            }
        }
        Ok(count)
    }

    fn truncate_table(&self, table: &TableRef) -> CloudResult<()> {
        let path = self.require(table)?;
        File::create(&path)
            .map(drop)
            .map_err(|e| io_error(format!("truncate {}", path.display()), &e))
    }

    fn append_rows(&self, table: &TableRef, rows: &[Row]) -> CloudResult<usize> {
        let path = self.require(table)?;
        let f = OpenOptions::new()
            .append(true)
            .open(&path)
            .map_err(|e| io_error(format!("open {}", path.display()), &e))?;
        let mut w = BufWriter::new(f);
        for (i, row) in rows.iter().enumerate() {
            serde_json::to_writer(&mut w, row).map_err(|e| {
                CloudIOError::new(
                    ErrorKind::InvalidInput,
                    format!("serialize row #{i} for {table}"),
                )
                .with_source(e.to_string())
            })?;
            w.write_all(b"\n")
                .map_err(|e| io_error(format!("append {}", path.display()), &e))?;
        }
        w.flush()
            .map_err(|e| io_error(format!("flush {}", path.display()), &e))?;
        Ok(rows.len())
    }
}

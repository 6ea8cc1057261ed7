//! Line-oriented text sources.
//!
//! [`TextSource`] resolves a glob pattern to one or more sources (local files
//! or object-store keys) and yields their lines lazily, one source at a time.
//! The first `skip_header_lines` lines of every source are discarded before any
//! of its data lines are produced.

use crate::io::cloud::ObjectIO;
use crate::io::cloud::helpers::{is_object_uri, parse_object_uri};
use crate::io::compression::auto_detect_reader;
use crate::io::glob::{expand_glob, expand_object_glob};
use anyhow::{Context, Result, anyhow, bail};
use std::collections::VecDeque;
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader, Cursor};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// Boxed, lazily evaluated sequence of raw lines.
pub type Lines<'a> = Box<dyn Iterator<Item = Result<String>> + 'a>;

/// Produces the raw text lines a run consumes.
pub trait LineSource {
    /// Start reading. Each call restarts from the first source.
    ///
    /// # Errors
    ///
    /// Returns an error if the sources cannot be resolved.
    fn lines(&self) -> Result<Lines<'_>>;
}

/// One resolved input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceFile {
    Local(PathBuf),
    Object { bucket: String, key: String },
}

impl fmt::Display for SourceFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local(path) => write!(f, "{}", path.display()),
            Self::Object { bucket, key } => write!(f, "{bucket}/{key}"),
        }
    }
}

/// Text files matching a local glob or a `scheme://bucket/pattern` URI.
///
/// ```no_run
/// use taxibeam::io::text::{LineSource, TextSource};
///
/// let source = TextSource::new("exports/trips-*.csv.gz");
/// for line in source.lines()? {
///     println!("{}", line?);
/// }
/// # Ok::<(), anyhow::Error>(())
/// ```
#[derive(Clone)]
pub struct TextSource {
    pattern: String,
    skip_header_lines: usize,
    store: Option<Arc<dyn ObjectIO>>,
}

impl TextSource {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            skip_header_lines: 1,
            store: None,
        }
    }

    /// Object store used to resolve `scheme://` patterns.
    #[must_use]
    pub fn with_object_store(mut self, store: Arc<dyn ObjectIO>) -> Self {
        self.store = Some(store);
        self
    }

    /// Number of leading lines dropped from every source (default 1).
    #[must_use]
    pub const fn skip_header_lines(mut self, n: usize) -> Self {
        self.skip_header_lines = n;
        self
    }

    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Expand the pattern into the ordered list of sources to read.
    ///
    /// # Errors
    ///
    /// Returns an error if the pattern is invalid, a `scheme://` pattern has no
    /// object store attached, listing fails, or nothing matches.
    pub fn resolve(&self) -> Result<Vec<SourceFile>> {
        let files: Vec<SourceFile> = if is_object_uri(&self.pattern) {
            let uri = parse_object_uri(&self.pattern)?;
            let store = self.store.as_deref().ok_or_else(|| {
                anyhow!(
                    "no object store configured for '{}://' input {}",
                    uri.scheme,
                    self.pattern
                )
            })?;
            expand_object_glob(store, &uri.bucket, &uri.key)
                .with_context(|| format!("list sources for {}", self.pattern))?
                .into_iter()
                .map(|key| SourceFile::Object {
                    bucket: uri.bucket.clone(),
                    key,
                })
                .collect()
        } else {
            expand_glob(&self.pattern)?
                .into_iter()
                .map(SourceFile::Local)
                .collect()
        };

        if files.is_empty() {
            bail!("no sources match {}", self.pattern);
        }
        info!(pattern = %self.pattern, sources = files.len(), "resolved input sources");
        Ok(files)
    }
}

impl LineSource for TextSource {
    fn lines(&self) -> Result<Lines<'_>> {
        let files = self.resolve()?;
        Ok(Box::new(TextLines {
            store: self.store.as_deref(),
            pending: files.into(),
            current: None,
            skip_header_lines: self.skip_header_lines,
            finished: false,
        }))
    }
}

struct OpenSource {
    name: String,
    reader: Box<dyn BufRead>,
    line_no: usize,
}

/// Lazy line iterator over a queue of sources. Fused after the first error.
struct TextLines<'a> {
    store: Option<&'a dyn ObjectIO>,
    pending: VecDeque<SourceFile>,
    current: Option<OpenSource>,
    skip_header_lines: usize,
    finished: bool,
}

impl TextLines<'_> {
    fn open(&self, file: &SourceFile) -> Result<OpenSource> {
        let reader = match file {
            SourceFile::Local(path) => {
                let f = File::open(path).with_context(|| format!("open {}", path.display()))?;
                auto_detect_reader(f, path)
                    .with_context(|| format!("setup decompression for {}", path.display()))?
            }
            SourceFile::Object { bucket, key } => {
                let store = self
                    .store
                    .ok_or_else(|| anyhow!("no object store configured for {file}"))?;
                let bytes = store
                    .get_object(bucket, key)
                    .with_context(|| format!("download {file}"))?;
                auto_detect_reader(Cursor::new(bytes), key)
                    .with_context(|| format!("setup decompression for {file}"))?
            }
        };

        let mut source = OpenSource {
            name: file.to_string(),
            reader: Box::new(BufReader::new(reader)),
            line_no: 0,
        };
        for _ in 0..self.skip_header_lines {
            if read_line(&mut source)?.is_none() {
                break;
            }
        }
        debug!(source = %source.name, skipped = source.line_no, "opened source");
        Ok(source)
    }

    fn advance(&mut self) -> Result<Option<String>> {
        loop {
            if self.current.is_none() {
                let Some(file) = self.pending.pop_front() else {
                    return Ok(None);
                };
                self.current = Some(self.open(&file)?);
            }
            if let Some(source) = self.current.as_mut() {
                if let Some(line) = read_line(source)? {
                    return Ok(Some(line));
                }
                debug!(source = %source.name, lines = source.line_no, "source exhausted");
            }
            self.current = None;
        }
    }
}

impl Iterator for TextLines<'_> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.advance() {
            Ok(Some(line)) => Some(Ok(line)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                self.current = None;
                self.pending.clear();
                Some(Err(e))
            }
        }
    }
}

/// Read one line without its `\n` / `\r\n` terminator.
fn read_line(source: &mut OpenSource) -> Result<Option<String>> {
    let mut buf = String::new();
    let n = source
        .reader
        .read_line(&mut buf)
        .with_context(|| format!("read line {} of {}", source.line_no + 1, source.name))?;
    if n == 0 {
        return Ok(None);
    }
    source.line_no += 1;
    if buf.ends_with('\n') {
        buf.pop();
        if buf.ends_with('\r') {
            buf.pop();
        }
    }
    Ok(Some(buf))
}

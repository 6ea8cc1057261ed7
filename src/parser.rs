//! Line → [`TripRecord`] parsing.
//!
//! A line is tokenized with RFC 4180 quoting rules, checked for exactly
//! [`FIELD_COUNT`] columns, normalized (timestamp `" UTC"` suffix) and coerced
//! column by column. Coercion failures become nulls; only structural problems
//! surface as a [`ParseError`].

use crate::coerce::coerce;
use crate::schema::{FIELD_COUNT, TIMESTAMP_FIELDS, TRIP_SCHEMA, TripRecord};
use csv::{ReaderBuilder, StringRecord};
use thiserror::Error;

/// Record-level parse failure. Always fatal to the record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The line did not split into exactly [`FIELD_COUNT`] columns.
    #[error("malformed record: expected {expected} fields, found {found}: {line}")]
    Malformed {
        expected: usize,
        found: usize,
        line: String,
    },

    /// Tokenizing or assembling the record failed unexpectedly.
    #[error("failed to parse record ({reason}): {line}")]
    Failure { reason: String, line: String },
}

impl ParseError {
    /// The raw line that caused the failure.
    #[must_use]
    pub fn line(&self) -> &str {
        match self {
            Self::Malformed { line, .. } | Self::Failure { line, .. } => line,
        }
    }

    #[must_use]
    pub const fn is_malformed(&self) -> bool {
        matches!(self, Self::Malformed { .. })
    }
}

/// Stateless trip-line parser. Cheap to copy and safe to share across threads.
#[derive(Clone, Copy, Debug, Default)]
pub struct RecordParser;

impl RecordParser {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Parse one raw line into a [`TripRecord`].
    ///
    /// # Errors
    ///
    /// * [`ParseError::Malformed`] when the column count is not [`FIELD_COUNT`].
    /// * [`ParseError::Failure`] when the CSV tokenizer or record assembly fails.
    pub fn parse_line(&self, line: &str) -> Result<TripRecord, ParseError> {
        let fields = split_fields(line)?;
        if fields.len() != FIELD_COUNT {
            return Err(ParseError::Malformed {
                expected: FIELD_COUNT,
                found: fields.len(),
                line: line.to_string(),
            });
        }

        let values = fields
            .iter()
            .zip(TRIP_SCHEMA.iter())
            .enumerate()
            .map(|(idx, (raw, spec))| {
                let raw = if TIMESTAMP_FIELDS.contains(&idx) {
                    strip_utc_suffix(raw)
                } else {
                    raw
                };
                coerce(raw, spec.kind)
            })
            .collect();

        TripRecord::from_values(values).map_err(|e| ParseError::Failure {
            reason: e.to_string(),
            line: line.to_string(),
        })
    }
}

/// Convenience wrapper around [`RecordParser::parse_line`].
///
/// # Errors
///
/// See [`RecordParser::parse_line`].
pub fn parse_line(line: &str) -> Result<TripRecord, ParseError> {
    RecordParser.parse_line(line)
}

/// Split one line into unescaped CSV fields.
///
/// An empty line yields zero fields.
///
/// # Errors
///
/// Returns [`ParseError::Failure`] if the tokenizer rejects the input or the
/// line holds more than one CSV record.
pub fn split_fields(line: &str) -> Result<StringRecord, ParseError> {
    let failure = |reason: String| ParseError::Failure {
        reason,
        line: line.to_string(),
    };

    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(line.as_bytes());
    let mut record = StringRecord::new();
    let found = rdr
        .read_record(&mut record)
        .map_err(|e| failure(e.to_string()))?;
    if !found {
        return Ok(StringRecord::new());
    }

    let mut trailing = StringRecord::new();
    if rdr
        .read_record(&mut trailing)
        .map_err(|e| failure(e.to_string()))?
    {
        return Err(failure("line holds more than one record".to_string()));
    }
    Ok(record)
}

/// Drop a trailing `" UTC"` (and the whitespace before it) from a timestamp.
///
/// Values without the suffix are returned untouched.
///
/// ```
/// use taxibeam::parser::strip_utc_suffix;
///
/// assert_eq!(strip_utc_suffix("2015-01-01 12:00:00 UTC"), "2015-01-01 12:00:00");
/// assert_eq!(strip_utc_suffix("2015-01-01 12:00:00"), "2015-01-01 12:00:00");
/// ```
#[must_use]
pub fn strip_utc_suffix(raw: &str) -> &str {
    match raw.trim_end().strip_suffix(" UTC") {
        Some(head) => head.trim_end(),
        None => raw,
    }
}

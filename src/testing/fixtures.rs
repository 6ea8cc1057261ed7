//! Trip lines, expected records and on-disk sources.

use crate::schema::{TRIP_SCHEMA, TripRecord};
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// The header line every source starts with.
#[must_use]
pub fn sample_header() -> String {
    TRIP_SCHEMA
        .iter()
        .map(|f| f.name)
        .collect::<Vec<_>>()
        .join(",")
}

/// A well-formed trip line with every field populated.
///
/// ```
/// use taxibeam::parser::parse_line;
/// use taxibeam::testing::{sample_line, sample_record};
///
/// assert_eq!(parse_line(&sample_line()).unwrap(), sample_record());
/// ```
#[must_use]
pub fn sample_line() -> String {
    "VTS,2015-01-01 00:00:00 UTC,2015-01-01 00:10:00 UTC,1,2,CRD,0,CSH,\
     10.5,0.5,0.5,1.0,0.0,0.3,12.8,100,200,2015,1"
        .to_string()
}

/// The record [`sample_line`] parses to.
#[must_use]
pub fn sample_record() -> TripRecord {
    TripRecord {
        vendor_id: Some("VTS".to_string()),
        pickup_datetime: Some("2015-01-01 00:00:00".to_string()),
        dropoff_datetime: Some("2015-01-01 00:10:00".to_string()),
        passenger_count: Some(1),
        trip_distance: Some(2),
        rate_code: Some("CRD".to_string()),
        store_and_fwd_flag: Some(0),
        payment_type: Some("CSH".to_string()),
        fare_amount: Some(10.5),
        extra: Some(0.5),
        mta_tax: Some(0.5),
        tip_amount: Some(1.0),
        tolls_amount: Some(0.0),
        imp_surcharge: Some(0.3),
        total_amount: Some(12.8),
        pickup_location_id: Some(100),
        dropoff_location_id: Some(200),
        data_file_year: Some(2015),
        data_file_month: Some(1),
    }
}

/// `n` distinct well-formed lines. Line `i` has `passenger_count = i % 6 + 1`
/// and `pickup_location_id = i`.
#[must_use]
pub fn sample_lines(n: usize) -> Vec<String> {
    (0..n)
        .map(|i| {
            format!(
                "VTS,2015-01-01 00:00:00 UTC,2015-01-01 00:10:00 UTC,{},2,CRD,0,CSH,\
                 10.5,0.5,0.5,1.0,0.0,0.3,12.8,{i},200,2015,1",
                i % 6 + 1
            )
        })
        .collect()
}

/// Header plus `lines`, newline-terminated, as source bytes.
#[must_use]
pub fn source_bytes<S: AsRef<str>>(lines: &[S]) -> Vec<u8> {
    let mut out = sample_header();
    out.push('\n');
    for line in lines {
        out.push_str(line.as_ref());
        out.push('\n');
    }
    out.into_bytes()
}

/// Write a source file (header plus `lines`) to `dir/name`.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn write_source_file<S: AsRef<str>>(dir: &Path, name: &str, lines: &[S]) -> Result<PathBuf> {
    let path = dir.join(name);
    fs::write(&path, source_bytes(lines))
        .with_context(|| format!("write source {}", path.display()))?;
    Ok(path)
}

/// Like [`write_source_file`], gzip-compressed.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
#[cfg(feature = "compression-gzip")]
pub fn write_gzip_source_file<S: AsRef<str>>(
    dir: &Path,
    name: &str,
    lines: &[S],
) -> Result<PathBuf> {
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;

    let path = dir.join(name);
    let file = fs::File::create(&path).with_context(|| format!("create {}", path.display()))?;
    let mut encoder = GzEncoder::new(file, Compression::default());
    encoder.write_all(&source_bytes(lines))?;
    encoder.finish()?;
    Ok(path)
}

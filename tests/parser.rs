//! Line parsing: shape checks, timestamp cleanup and per-field coercion.

use taxibeam::parser::{RecordParser, split_fields, strip_utc_suffix};
use taxibeam::testing::{sample_line, sample_record};
use taxibeam::{ParseError, TripRecord, parse_line};

#[test]
fn test_parse_sample_line() -> anyhow::Result<()> {
    let record = parse_line(&sample_line())?;

    assert_eq!(record.vendor_id.as_deref(), Some("VTS"));
    assert_eq!(record.passenger_count, Some(1));
    assert_eq!(record.trip_distance, Some(2));
    assert_eq!(record.fare_amount, Some(10.5));
    assert_eq!(record.data_file_year, Some(2015));
    assert_eq!(record.data_file_month, Some(1));
    assert_eq!(record.null_count(), 0);
    assert_eq!(record, sample_record());
    Ok(())
}

#[test]
fn test_parse_is_deterministic() -> anyhow::Result<()> {
    let parser = RecordParser::new();
    assert_eq!(parser.parse_line(&sample_line())?, parser.parse_line(&sample_line())?);
    Ok(())
}

#[test]
fn test_timestamps_lose_utc_suffix() -> anyhow::Result<()> {
    let record = parse_line(&sample_line())?;
    assert_eq!(record.pickup_datetime.as_deref(), Some("2015-01-01 00:00:00"));
    assert_eq!(record.dropoff_datetime.as_deref(), Some("2015-01-01 00:10:00"));
    Ok(())
}

#[test]
fn test_strip_utc_suffix() {
    assert_eq!(strip_utc_suffix("2015-01-01 12:00:00 UTC"), "2015-01-01 12:00:00");
    assert_eq!(strip_utc_suffix("2015-01-01 12:00:00"), "2015-01-01 12:00:00");
    assert_eq!(strip_utc_suffix(""), "");
}

#[test]
fn test_empty_numeric_field_is_null() -> anyhow::Result<()> {
    let line = sample_line().replacen(",1,2,CRD,", ",,2,CRD,", 1);
    let record = parse_line(&line)?;

    assert_eq!(record.passenger_count, None);
    assert_eq!(
        record,
        TripRecord {
            passenger_count: None,
            ..sample_record()
        }
    );
    Ok(())
}

#[test]
fn test_non_numeric_field_is_null() -> anyhow::Result<()> {
    let line = sample_line().replace(",10.5,", ",abc,");
    let record = parse_line(&line)?;

    assert_eq!(record.fare_amount, None);
    assert_eq!(record.null_count(), 1);
    assert_eq!(record.total_amount, Some(12.8));
    Ok(())
}

#[test]
fn test_wrong_field_count_is_malformed() {
    let short = "VTS,2015-01-01 00:00:00 UTC,1";
    let err = parse_line(short).unwrap_err();
    assert!(err.is_malformed());
    assert_eq!(err.line(), short);
    assert!(matches!(err, ParseError::Malformed { expected: 19, found: 3, .. }));

    let long = format!("{},extra", sample_line());
    assert!(matches!(
        parse_line(&long),
        Err(ParseError::Malformed { found: 20, .. })
    ));
}

#[test]
fn test_empty_line_is_malformed() {
    assert!(matches!(
        parse_line(""),
        Err(ParseError::Malformed { found: 0, .. })
    ));
}

#[test]
fn test_quoted_fields_are_unescaped() -> anyhow::Result<()> {
    let line = sample_line().replacen("VTS", "\"V,\"\"TS\"\"\"", 1);
    let record = parse_line(&line)?;
    assert_eq!(record.vendor_id.as_deref(), Some("V,\"TS\""));
    Ok(())
}

#[test]
fn test_split_fields_counts_quoted_commas_once() -> anyhow::Result<()> {
    let fields = split_fields("a,\"b,c\",d")?;
    assert_eq!(fields.len(), 3);
    assert_eq!(&fields[1], "b,c");
    Ok(())
}

//! Warehouse sink: dispositions, chunking, retry and at-least-once delivery.

use serde_json::json;
use taxibeam::io::cloud::helpers::RetryConfig;
use taxibeam::io::cloud::{ErrorKind, FakeWarehouseIO, TableRef, WarehouseIO};
use taxibeam::schema::warehouse_schema;
use taxibeam::testing::{sample_lines, sample_record};
use taxibeam::{
    CreateDisposition, RecordSink, TripRecord, WarehouseSink, WriteDisposition, WriteOptions,
    parse_line,
};

fn table() -> TableRef {
    TableRef::parse("nyc:taxi.trips").unwrap()
}

fn options() -> WriteOptions {
    WriteOptions {
        retry: RetryConfig::immediate(3),
        ..WriteOptions::default()
    }
}

fn records(n: usize) -> Vec<TripRecord> {
    sample_lines(n)
        .iter()
        .map(|l| parse_line(l).unwrap())
        .collect()
}

#[test]
fn test_creates_missing_table_and_appends() -> anyhow::Result<()> {
    let warehouse = FakeWarehouseIO::new();
    let mut sink = WarehouseSink::new(warehouse.clone(), table(), options());

    sink.open()?;
    assert!(warehouse.table_exists(&table())?);
    assert_eq!(warehouse.get_schema(&table())?, warehouse_schema());

    assert_eq!(sink.write_batch(records(3))?, 3);
    let rows = warehouse.rows(&table());
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0]["vendor_id"], json!("VTS"));
    assert_eq!(rows[0]["pickup_datetime"], json!("2015-01-01 00:00:00"));
    Ok(())
}

#[test]
fn test_null_fields_are_written_as_null() -> anyhow::Result<()> {
    let warehouse = FakeWarehouseIO::new();
    let mut sink = WarehouseSink::new(warehouse.clone(), table(), options());
    let record = TripRecord {
        passenger_count: None,
        ..sample_record()
    };

    sink.write_batch(vec![record])?;
    assert_eq!(warehouse.rows(&table())[0]["passenger_count"], json!(null));
    Ok(())
}

#[test]
fn test_create_never_requires_existing_table() {
    let warehouse = FakeWarehouseIO::new();
    let mut sink = WarehouseSink::new(
        warehouse.clone(),
        table(),
        WriteOptions {
            create_disposition: CreateDisposition::CreateNever,
            ..options()
        },
    );

    let err = sink.open().unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);
    assert!(!warehouse.table_exists(&table()).unwrap());
}

#[test]
fn test_truncate_clears_existing_rows() -> anyhow::Result<()> {
    let warehouse = FakeWarehouseIO::new();
    let old = records(2).iter().map(TripRecord::to_row).collect();
    warehouse.add_table(&table(), warehouse_schema(), old);

    let mut sink = WarehouseSink::new(
        warehouse.clone(),
        table(),
        WriteOptions {
            write_disposition: WriteDisposition::Truncate,
            ..options()
        },
    );
    sink.write_batch(records(1))?;
    sink.write_batch(records(1))?;

    // Truncation happens once, before the first write.
    assert_eq!(warehouse.rows(&table()).len(), 2);
    Ok(())
}

#[test]
fn test_write_empty_rejects_populated_table() {
    let warehouse = FakeWarehouseIO::new();
    let old = records(1).iter().map(TripRecord::to_row).collect();
    warehouse.add_table(&table(), warehouse_schema(), old);

    let mut sink = WarehouseSink::new(
        warehouse,
        table(),
        WriteOptions {
            write_disposition: WriteDisposition::WriteEmpty,
            ..options()
        },
    );
    assert_eq!(sink.open().unwrap_err().kind, ErrorKind::AlreadyExists);
}

#[test]
fn test_schema_mismatch_is_rejected() {
    let warehouse = FakeWarehouseIO::new();
    warehouse.add_table(
        &table(),
        vec![("id".to_string(), "INTEGER".to_string())],
        Vec::new(),
    );

    let mut sink = WarehouseSink::new(warehouse, table(), options());
    assert_eq!(sink.open().unwrap_err().kind, ErrorKind::InvalidInput);
}

#[test]
fn test_rows_are_sent_in_chunks() -> anyhow::Result<()> {
    let warehouse = FakeWarehouseIO::new();
    let mut sink = WarehouseSink::new(
        warehouse.clone(),
        table(),
        WriteOptions {
            max_rows_per_request: 2,
            ..options()
        },
    );

    assert_eq!(sink.write_batch(records(5))?, 5);
    assert_eq!(warehouse.append_calls(), 3);
    assert_eq!(warehouse.rows(&table()).len(), 5);
    Ok(())
}

#[test]
fn test_transient_failure_is_retried() -> anyhow::Result<()> {
    let warehouse = FakeWarehouseIO::new();
    let mut sink = WarehouseSink::new(warehouse.clone(), table(), options());
    sink.open()?;
    warehouse.fail_next_appends(2, ErrorKind::ServiceUnavailable);

    assert_eq!(sink.write_batch(records(2))?, 2);
    assert_eq!(warehouse.append_calls(), 3);
    assert_eq!(warehouse.rows(&table()).len(), 2);
    Ok(())
}

#[test]
fn test_lost_acknowledgement_duplicates_rows() -> anyhow::Result<()> {
    let warehouse = FakeWarehouseIO::new();
    let mut sink = WarehouseSink::new(warehouse.clone(), table(), options());
    sink.open()?;
    warehouse.fail_after_apply(ErrorKind::Timeout);

    sink.write_batch(records(1))?;
    let rows = warehouse.rows(&table());
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0], rows[1]);
    Ok(())
}

#[test]
fn test_create_retried_after_lost_acknowledgement() -> anyhow::Result<()> {
    let warehouse = FakeWarehouseIO::new();
    warehouse.fail_create_after_apply(ErrorKind::Network);
    let mut sink = WarehouseSink::new(warehouse.clone(), table(), options());

    sink.open()?;
    assert!(warehouse.table_exists(&table())?);
    assert_eq!(sink.write_batch(records(2))?, 2);
    assert_eq!(warehouse.rows(&table()).len(), 2);
    Ok(())
}

#[test]
fn test_create_conflict_on_first_attempt_fails() {
    let warehouse = FakeWarehouseIO::new();
    warehouse.fail_create_after_apply(ErrorKind::AlreadyExists);
    let mut sink = WarehouseSink::new(warehouse, table(), options());

    assert_eq!(sink.open().unwrap_err().kind, ErrorKind::AlreadyExists);
}

#[test]
fn test_permanent_failure_surfaces_unmodified() -> anyhow::Result<()> {
    let warehouse = FakeWarehouseIO::new();
    let mut sink = WarehouseSink::new(warehouse.clone(), table(), options());
    sink.open()?;
    warehouse.fail_next_appends(1, ErrorKind::Authentication);

    let err = sink.write_batch(records(1)).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Authentication);
    assert_eq!(warehouse.append_calls(), 1);
    Ok(())
}

#[test]
fn test_retries_are_bounded() -> anyhow::Result<()> {
    let warehouse = FakeWarehouseIO::new();
    let mut sink = WarehouseSink::new(warehouse.clone(), table(), options());
    sink.open()?;
    warehouse.fail_next_appends(5, ErrorKind::Network);

    assert_eq!(sink.write_batch(records(1)).unwrap_err().kind, ErrorKind::Network);
    assert_eq!(warehouse.append_calls(), 3);
    Ok(())
}

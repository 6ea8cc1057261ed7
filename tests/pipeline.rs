//! End-to-end loads through the orchestrator.

use taxibeam::io::cloud::helpers::RetryConfig;
use taxibeam::io::cloud::{ErrorKind, FakeWarehouseIO, FsWarehouseIO, TableRef};
use taxibeam::testing::{RecordingSink, VecSource, sample_line, sample_lines, write_source_file};
use taxibeam::{
    CancelToken, CreateDisposition, ExecMode, FailurePolicy, LoadPipeline, ParseError,
    PipelineError, PipelineOptions, RunState, TextSource, WarehouseSink, WriteOptions,
};
use tempfile::TempDir;

fn options(batch_size: usize) -> PipelineOptions {
    PipelineOptions {
        batch_size,
        exec_mode: ExecMode::Sequential,
        failure_policy: FailurePolicy::FailFast,
    }
}

#[test]
fn test_well_formed_lines_are_loaded() -> anyhow::Result<()> {
    let mut sink = RecordingSink::new();
    let report = LoadPipeline::new(options(2))?
        .run(&VecSource::new(sample_lines(5)), &mut sink)
        .into_result()?;

    assert_eq!(report.state, RunState::Succeeded);
    assert_eq!(report.lines_read, 5);
    assert_eq!(report.records_written, 5);
    assert_eq!(report.batches, 3);
    assert_eq!(report.null_fields, 0);
    assert_eq!(sink.open_calls(), 1);

    let passengers: Vec<_> = sink.records().iter().map(|r| r.passenger_count).collect();
    assert_eq!(passengers, vec![Some(1), Some(2), Some(3), Some(4), Some(5)]);
    Ok(())
}

#[test]
fn test_null_fields_are_counted() -> anyhow::Result<()> {
    let line = sample_line().replacen(",1,2,CRD,", ",,2,CRD,", 1);
    let mut sink = RecordingSink::new();
    let report = LoadPipeline::new(options(10))?
        .run(&VecSource::new([line, sample_line()]), &mut sink)
        .into_result()?;

    assert_eq!(report.records_written, 2);
    assert_eq!(report.null_fields, 1);
    assert_eq!(sink.records()[0].passenger_count, None);
    Ok(())
}

#[test]
fn test_empty_source_succeeds() -> anyhow::Result<()> {
    let mut sink = RecordingSink::new();
    let outcome =
        LoadPipeline::new(options(10))?.run(&VecSource::new(Vec::<String>::new()), &mut sink);

    assert!(outcome.succeeded());
    assert_eq!(outcome.report.lines_read, 0);
    assert!(sink.batches().is_empty());
    Ok(())
}

#[test]
fn test_header_only_file_succeeds() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    write_source_file::<&str>(dir.path(), "trips.csv", &[])?;
    let source = TextSource::new(format!("{}/*.csv", dir.path().display()));

    let warehouse = FakeWarehouseIO::new();
    let table = TableRef::parse("taxi.trips")?;
    let mut sink = WarehouseSink::new(warehouse.clone(), table.clone(), WriteOptions::default());

    let report = LoadPipeline::new(options(10))?
        .run(&source, &mut sink)
        .into_result()?;
    assert_eq!(report.state, RunState::Succeeded);
    assert_eq!(report.records_written, 0);
    assert!(warehouse.rows(&table).is_empty());
    Ok(())
}

#[test]
fn test_malformed_line_fails_fast() -> anyhow::Result<()> {
    let mut lines = sample_lines(5);
    lines[3] = "VTS,only,three".to_string();
    let mut sink = RecordingSink::new();

    let outcome = LoadPipeline::new(options(2))?.run(&VecSource::new(lines), &mut sink);

    assert_eq!(outcome.report.state, RunState::Failed);
    // First batch was written; the failing batch and everything after were not.
    assert_eq!(sink.batches().len(), 1);
    assert_eq!(outcome.report.records_written, 2);
    assert_eq!(outcome.report.lines_read, 4);
    match outcome.error {
        Some(PipelineError::Parse(ParseError::Malformed { line, found, .. })) => {
            assert_eq!(line, "VTS,only,three");
            assert_eq!(found, 3);
        }
        other => panic!("expected malformed error, got {other:?}"),
    }
    Ok(())
}

#[test]
fn test_first_bad_line_of_batch_is_reported() -> anyhow::Result<()> {
    let mut lines = sample_lines(6);
    lines[2] = "first,bad".to_string();
    lines[4] = "second,bad".to_string();

    for mode in [ExecMode::Sequential, ExecMode::Parallel { threads: Some(3) }] {
        let mut sink = RecordingSink::new();
        let opts = PipelineOptions {
            exec_mode: mode,
            ..options(6)
        };
        let err = LoadPipeline::new(opts)?
            .run(&VecSource::new(lines.clone()), &mut sink)
            .into_result()
            .unwrap_err();

        match err {
            PipelineError::Parse(e) => assert_eq!(e.line(), "first,bad"),
            other => panic!("expected parse error, got {other:?}"),
        }
        assert!(sink.records().is_empty());
    }
    Ok(())
}

#[test]
fn test_skip_policy_drops_bad_lines() -> anyhow::Result<()> {
    let mut lines = sample_lines(4);
    lines.insert(1, "garbage".to_string());
    lines.push(String::new());
    let opts = PipelineOptions {
        failure_policy: FailurePolicy::SkipMalformed,
        ..options(3)
    };
    let mut sink = RecordingSink::new();

    let report = LoadPipeline::new(opts)?
        .run(&VecSource::new(lines), &mut sink)
        .into_result()?;

    assert_eq!(report.state, RunState::Succeeded);
    assert_eq!(report.lines_read, 6);
    assert_eq!(report.records_skipped, 2);
    assert_eq!(report.records_written, 4);
    Ok(())
}

#[test]
fn test_parallel_mode_matches_sequential() -> anyhow::Result<()> {
    let lines = sample_lines(50);

    let mut seq = RecordingSink::new();
    LoadPipeline::new(options(7))?
        .run(&VecSource::new(lines.clone()), &mut seq)
        .into_result()?;

    let mut par = RecordingSink::new();
    let opts = PipelineOptions {
        exec_mode: ExecMode::Parallel { threads: Some(4) },
        ..options(7)
    };
    LoadPipeline::new(opts)?
        .run(&VecSource::new(lines), &mut par)
        .into_result()?;

    assert_eq!(seq.records(), par.records());
    Ok(())
}

#[test]
fn test_writer_failure_propagates_unmodified() -> anyhow::Result<()> {
    let mut sink = RecordingSink::new().fail_on_batch(1, ErrorKind::Authentication);

    let outcome = LoadPipeline::new(options(2))?.run(&VecSource::new(sample_lines(6)), &mut sink);

    assert_eq!(outcome.report.state, RunState::Failed);
    assert_eq!(outcome.report.records_written, 2);
    assert!(outcome.report.error.is_some());
    match outcome.error {
        Some(PipelineError::Writer(e)) => assert_eq!(e.kind, ErrorKind::Authentication),
        other => panic!("expected writer error, got {other:?}"),
    }
    Ok(())
}

#[test]
fn test_open_failure_stops_before_reading() -> anyhow::Result<()> {
    let mut sink = RecordingSink::new().fail_open(ErrorKind::NotFound);
    let outcome = LoadPipeline::new(options(2))?.run(&VecSource::new(sample_lines(3)), &mut sink);

    assert!(matches!(outcome.error, Some(PipelineError::Writer(_))));
    assert_eq!(outcome.report.lines_read, 0);
    Ok(())
}

#[test]
fn test_create_never_fails_the_run() -> anyhow::Result<()> {
    let warehouse = FakeWarehouseIO::new();
    let table = TableRef::parse("taxi.trips")?;
    let mut sink = WarehouseSink::new(
        warehouse,
        table,
        WriteOptions {
            create_disposition: CreateDisposition::CreateNever,
            ..WriteOptions::default()
        },
    );

    let err = LoadPipeline::new(options(2))?
        .run(&VecSource::new(sample_lines(2)), &mut sink)
        .into_result()
        .unwrap_err();
    match err {
        PipelineError::Writer(e) => assert_eq!(e.kind, ErrorKind::NotFound),
        other => panic!("expected writer error, got {other:?}"),
    }
    Ok(())
}

#[test]
fn test_reader_failure_fails_the_run() -> anyhow::Result<()> {
    let mut sink = RecordingSink::new();
    let source = VecSource::new(sample_lines(5)).failing_at(3);

    let outcome = LoadPipeline::new(options(2))?.run(&source, &mut sink);

    assert!(matches!(outcome.error, Some(PipelineError::Source(_))));
    assert_eq!(outcome.report.lines_read, 3);
    assert_eq!(sink.records().len(), 2);
    Ok(())
}

#[test]
fn test_cancel_before_start() -> anyhow::Result<()> {
    let token = CancelToken::new();
    token.cancel();
    let mut sink = RecordingSink::new();

    let outcome = LoadPipeline::new(options(2))?
        .with_cancel_token(token)
        .run(&VecSource::new(sample_lines(4)), &mut sink);

    assert_eq!(outcome.report.state, RunState::Failed);
    assert!(matches!(outcome.error, Some(PipelineError::Cancelled)));
    assert_eq!(outcome.report.lines_read, 0);
    assert_eq!(sink.open_calls(), 0);
    Ok(())
}

#[test]
fn test_load_into_directory_warehouse() -> anyhow::Result<()> {
    let input = TempDir::new()?;
    let lines = sample_lines(7);
    write_source_file(input.path(), "a.csv", &lines[..4])?;
    write_source_file(input.path(), "b.csv", &lines[4..])?;

    let root = TempDir::new()?;
    let table = TableRef::parse("nyc:taxi.trips")?;
    let mut sink = WarehouseSink::new(
        FsWarehouseIO::new(root.path()),
        table.clone(),
        WriteOptions {
            max_rows_per_request: 3,
            retry: RetryConfig::immediate(1),
            ..WriteOptions::default()
        },
    );
    let source = TextSource::new(format!("{}/*.csv", input.path().display()));

    let report = LoadPipeline::new(PipelineOptions::default())?
        .run(&source, &mut sink)
        .into_result()?;

    assert_eq!(report.records_written, 7);
    let stored = std::fs::read_to_string(root.path().join("nyc/taxi/trips.jsonl"))?;
    assert_eq!(stored.lines().count(), 7);
    Ok(())
}

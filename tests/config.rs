//! Layered configuration: file, environment-style overrides and validation.

use std::collections::HashMap;
use std::fs;
use taxibeam::config::{ExecKind, PipelineConfig};
use taxibeam::{CreateDisposition, ExecMode, FailurePolicy, WriteDisposition};
use tempfile::TempDir;

#[test]
fn test_defaults() {
    let config = PipelineConfig::default();
    assert_eq!(config.batch_size, 500);
    assert_eq!(config.skip_header_lines, 1);
    assert_eq!(config.failure_policy, FailurePolicy::FailFast);
    assert_eq!(config.create_disposition, CreateDisposition::CreateIfNeeded);
    assert_eq!(config.write_disposition, WriteDisposition::Append);
    assert_eq!(config.exec_mode(), ExecMode::Parallel { threads: None });
    assert!(config.validate().is_ok());
}

#[test]
fn test_partial_file_keeps_defaults() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("load.json");
    fs::write(
        &path,
        r#"{
            "batch_size": 1000,
            "exec_mode": "sequential",
            "write_disposition": "truncate",
            "retry": { "max_attempts": 5 }
        }"#,
    )?;

    let config = PipelineConfig::from_file(&path)?;
    assert_eq!(config.batch_size, 1000);
    assert_eq!(config.exec_mode, ExecKind::Sequential);
    assert_eq!(config.write_disposition, WriteDisposition::Truncate);
    assert_eq!(config.retry.max_attempts, 5);
    assert_eq!(config.retry.initial_delay_ms, 100);
    assert_eq!(config.max_rows_per_request, 500);
    Ok(())
}

#[test]
fn test_unknown_file_key_is_rejected() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("load.json");
    fs::write(&path, r#"{ "batchsize": 10 }"#)?;

    assert!(PipelineConfig::from_file(&path).is_err());
    Ok(())
}

#[test]
fn test_missing_file_is_an_error() {
    let err = PipelineConfig::from_file("/nonexistent/taxibeam.json").unwrap_err();
    assert!(err.to_string().contains("read config"));
}

#[test]
fn test_overrides_win_over_file() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("load.json");
    fs::write(&path, r#"{ "batch_size": 1000, "threads": 2 }"#)?;

    let mut config = PipelineConfig::from_file(&path)?;
    config.apply_overrides(&HashMap::from([
        ("batch_size".to_string(), "50".to_string()),
        ("create_disposition".to_string(), "create-never".to_string()),
        ("retry_max_attempts".to_string(), "1".to_string()),
    ]))?;

    assert_eq!(config.batch_size, 50);
    assert_eq!(config.create_disposition, CreateDisposition::CreateNever);
    assert_eq!(config.retry.max_attempts, 1);
    assert_eq!(config.exec_mode(), ExecMode::Parallel { threads: Some(2) });

    let options = config.pipeline_options();
    assert_eq!(options.batch_size, 50);
    let write = config.write_options();
    assert_eq!(write.create_disposition, CreateDisposition::CreateNever);
    Ok(())
}

#[test]
fn test_validation() {
    for bad in [
        PipelineConfig {
            batch_size: 0,
            ..PipelineConfig::default()
        },
        PipelineConfig {
            threads: Some(0),
            ..PipelineConfig::default()
        },
    ] {
        assert!(bad.validate().is_err());
    }
}

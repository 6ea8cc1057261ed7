//! Generic helpers shared by the storage and warehouse implementations.
//!
//! - [`retry_with_backoff`] - Retry transient failures with exponential backoff
//! - [`batch_in_chunks`] - Split a request into provider-sized chunks
//! - [`parse_object_uri`] - Split `scheme://bucket/key` into its parts
//! - [`config_from_env`] - Collect prefixed environment variables

use crate::io::cloud::traits::{CloudIOError, CloudResult, ErrorKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::warn;

// ============================================================================
// Retry Helper
// ============================================================================

/// Configuration for retry behavior
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 100,
            max_delay_ms: 5000,
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// No waiting between attempts; used by tests.
    #[must_use]
    pub const fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay_ms: 0,
            max_delay_ms: 0,
            backoff_multiplier: 1.0,
        }
    }

    fn next_delay(&self, delay_ms: u64) -> u64 {
        #[allow(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            clippy::cast_precision_loss
        )]
        let scaled = (delay_ms as f64 * self.backoff_multiplier.max(1.0)) as u64;
        scaled.min(self.max_delay_ms)
    }
}

/// Retry a function with exponential backoff
///
/// Only errors whose kind [is transient](ErrorKind::is_transient) are retried.
/// Repeating a request that already reached the service can apply it twice,
/// so callers must tolerate duplicates.
///
/// # Errors
///
/// Returns the last error if it is not transient or `max_attempts` is reached.
pub fn retry_with_backoff<F, T>(config: &RetryConfig, mut operation: F) -> CloudResult<T>
where
    F: FnMut() -> CloudResult<T>,
{
    let mut attempt = 0;
    let mut delay_ms = config.initial_delay_ms;

    loop {
        attempt += 1;
        match operation() {
            Ok(result) => return Ok(result),
            Err(err) => {
                if !err.kind.is_transient() || attempt >= config.max_attempts {
                    return Err(err);
                }
                warn!(attempt, delay_ms, error = %err, "transient failure, retrying");
                if delay_ms > 0 {
                    std::thread::sleep(Duration::from_millis(delay_ms));
                }
                delay_ms = config.next_delay(delay_ms);
            }
        }
    }
}

// ============================================================================
// Batch Helper
// ============================================================================

/// Split a batch operation into smaller chunks
///
/// Many warehouse APIs limit request sizes. Chunks are processed in order and
/// the first failing chunk aborts the rest.
///
/// # Errors
///
/// Returns an error if any chunk processing operation fails
pub fn batch_in_chunks<T, R, F>(
    items: &[T],
    chunk_size: usize,
    mut process_chunk: F,
) -> CloudResult<Vec<R>>
where
    F: FnMut(&[T]) -> CloudResult<R>,
{
    let mut results = Vec::new();
    for chunk in items.chunks(chunk_size.max(1)) {
        results.push(process_chunk(chunk)?);
    }
    Ok(results)
}

// ============================================================================
// Environment Helpers
// ============================================================================

/// Helper for loading config from environment variables
///
/// Keys are returned without the prefix and lower-cased.
#[must_use]
pub fn config_from_env(prefix: &str) -> HashMap<String, String> {
    std::env::vars()
        .filter_map(|(key, value)| {
            key.strip_prefix(prefix)
                .map(|name| (name.to_lowercase(), value))
        })
        .collect()
}

// ============================================================================
// Resource Identifier Parsing
// ============================================================================

/// An object location of the form `scheme://bucket/key`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectUri {
    pub scheme: String,
    pub bucket: String,
    pub key: String,
}

/// Whether `path` looks like `scheme://...`.
#[must_use]
pub fn is_object_uri(path: &str) -> bool {
    path.split_once("://").is_some_and(|(scheme, _)| {
        !scheme.is_empty() && scheme.chars().all(|c| c.is_ascii_alphanumeric())
    })
}

/// Parse an object URI
///
/// # Examples
/// - `gs://bucket/trips/*.csv` -> scheme `gs`, bucket `bucket`, key `trips/*.csv`
///
/// # Errors
///
/// Returns an error if the `://` separator, the bucket or the key is missing
pub fn parse_object_uri(uri: &str) -> CloudResult<ObjectUri> {
    let invalid = || {
        CloudIOError::new(
            ErrorKind::InvalidInput,
            format!("Invalid object URI format: {uri}"),
        )
    };
    let (scheme, rest) = uri.split_once("://").ok_or_else(invalid)?;
    let (bucket, key) = rest.split_once('/').ok_or_else(invalid)?;
    if scheme.is_empty() || bucket.is_empty() || key.is_empty() {
        return Err(invalid());
    }
    Ok(ObjectUri {
        scheme: scheme.to_string(),
        bucket: bucket.to_string(),
        key: key.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_with_backoff() {
        let config = RetryConfig::immediate(3);
        let mut attempts = 0;

        let result = retry_with_backoff(&config, || {
            attempts += 1;
            if attempts < 3 {
                Err(CloudIOError::new(ErrorKind::Network, "Temporary failure"))
            } else {
                Ok(42)
            }
        });

        assert_eq!(result, Ok(42));
        assert_eq!(attempts, 3);
    }

    #[test]
    fn test_retry_stops_on_permanent_error() {
        let config = RetryConfig::immediate(5);
        let mut attempts = 0;

        let result: CloudResult<()> = retry_with_backoff(&config, || {
            attempts += 1;
            Err(CloudIOError::new(ErrorKind::Authentication, "bad token"))
        });

        assert_eq!(result.unwrap_err().kind, ErrorKind::Authentication);
        assert_eq!(attempts, 1);
    }

    #[test]
    fn test_retry_gives_up_after_max_attempts() {
        let config = RetryConfig::immediate(2);
        let mut attempts = 0;

        let result: CloudResult<()> = retry_with_backoff(&config, || {
            attempts += 1;
            Err(CloudIOError::new(ErrorKind::RateLimited, "slow down"))
        });

        assert!(result.is_err());
        assert_eq!(attempts, 2);
    }

    #[test]
    fn test_backoff_is_capped() {
        let config = RetryConfig {
            max_attempts: 10,
            initial_delay_ms: 100,
            max_delay_ms: 250,
            backoff_multiplier: 2.0,
        };
        assert_eq!(config.next_delay(100), 200);
        assert_eq!(config.next_delay(200), 250);
    }

    #[test]
    fn test_batch_in_chunks() {
        let items: Vec<i32> = (1..=10).collect();
        let sizes = batch_in_chunks(&items, 3, |chunk| Ok(chunk.len())).unwrap();
        assert_eq!(sizes, vec![3, 3, 3, 1]);
    }

    #[test]
    fn test_parse_object_uri() {
        let uri = parse_object_uri("gs://taxi-bucket/trips/2015/*.csv").unwrap();
        assert_eq!(uri.scheme, "gs");
        assert_eq!(uri.bucket, "taxi-bucket");
        assert_eq!(uri.key, "trips/2015/*.csv");

        assert!(parse_object_uri("gs://bucket-only").is_err());
        assert!(parse_object_uri("/local/path.csv").is_err());
    }

    #[test]
    fn test_is_object_uri() {
        assert!(is_object_uri("gs://bucket/key"));
        assert!(is_object_uri("s3://bucket/key"));
        assert!(!is_object_uri("data/trips.csv"));
        assert!(!is_object_uri("C:\\data\\trips.csv"));
    }
}

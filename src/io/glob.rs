//! Glob expansion for local files and object-store keys.
//!
//! Both flavors return matches in sorted order so a run reads its sources in a
//! deterministic sequence.
//!
//! # Pattern Syntax
//!
//! - `*` matches any sequence of characters within a path component
//! - `?` matches any single character
//! - `**` matches zero or more directories
//! - `[abc]` matches any character in the set (local paths only)
//!
//! ```no_run
//! use taxibeam::io::glob::expand_glob;
//!
//! let files = expand_glob("exports/yellow_tripdata_2015-*.csv")?;
//! # use anyhow::Error; Ok::<(), Error>(())
//! ```

use crate::io::cloud::{CloudIOError, CloudResult, ErrorKind, ObjectIO};
use anyhow::{Context, Result};
use glob::glob;
use regex::Regex;
use std::path::PathBuf;

/// Expand a glob pattern into a sorted vector of matching file paths.
///
/// Directories are skipped. Zero matches is not an error here.
///
/// # Errors
///
/// Returns an error if the pattern is invalid or a directory cannot be read.
pub fn expand_glob(pattern: &str) -> Result<Vec<PathBuf>> {
    let paths = glob(pattern).with_context(|| format!("invalid glob pattern: {pattern}"))?;

    let mut result = Vec::new();
    for entry in paths {
        let path =
            entry.with_context(|| format!("error reading glob entry for pattern: {pattern}"))?;
        if path.is_file() {
            result.push(path);
        }
    }

    result.sort();
    Ok(result)
}

/// Expand a key pattern against an object store bucket.
///
/// Objects are listed under the literal prefix before the first wildcard, then
/// filtered by the full pattern.
///
/// # Errors
///
/// Returns an error if the pattern cannot be compiled or listing fails.
pub fn expand_object_glob<O>(storage: &O, bucket: &str, pattern: &str) -> CloudResult<Vec<String>>
where
    O: ObjectIO + ?Sized,
{
    let regex = Regex::new(&glob_to_regex(pattern)).map_err(|e| {
        CloudIOError::new(
            ErrorKind::InvalidInput,
            format!("Invalid glob pattern '{pattern}': {e}"),
        )
    })?;
    let prefix = prefix_before_wildcard(pattern);

    let mut matched: Vec<String> = storage
        .list_objects(bucket, prefix)?
        .into_iter()
        .filter(|obj| regex.is_match(&obj.key))
        .map(|obj| obj.key)
        .collect();
    matched.sort();
    Ok(matched)
}

fn prefix_before_wildcard(pattern: &str) -> Option<&str> {
    let end = pattern.find(['*', '?']).unwrap_or(pattern.len());
    let prefix = &pattern[..end];
    (!prefix.is_empty()).then_some(prefix)
}

fn glob_to_regex(pattern: &str) -> String {
    let mut regex = String::from("^");
    let mut chars = pattern.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '*' => {
                if chars.peek() == Some(&'*') {
                    chars.next();
                    // `**/` may also match nothing at all
                    if chars.peek() == Some(&'/') {
                        chars.next();
                        regex.push_str("(?:.*/)?");
                    } else {
                        regex.push_str(".*");
                    }
                } else {
                    regex.push_str("[^/]*");
                }
            }
            '?' => regex.push_str("[^/]"),
            '.' | '+' | '(' | ')' | '|' | '[' | ']' | '{' | '}' | '^' | '$' | '\\' => {
                regex.push('\\');
                regex.push(ch);
            }
            _ => regex.push(ch),
        }
    }

    regex.push('$');
    regex
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glob_to_regex() {
        let re = Regex::new(&glob_to_regex("trips/*.csv")).unwrap();
        assert!(re.is_match("trips/2015-01.csv"));
        assert!(!re.is_match("trips/2015/01.csv"));

        let re = Regex::new(&glob_to_regex("trips/**/*.csv")).unwrap();
        assert!(re.is_match("trips/a.csv"));
        assert!(re.is_match("trips/2015/01/a.csv"));

        let re = Regex::new(&glob_to_regex("trips/part-?.csv")).unwrap();
        assert!(re.is_match("trips/part-1.csv"));
        assert!(!re.is_match("trips/part-10.csv"));
    }

    #[test]
    fn test_prefix_before_wildcard() {
        assert_eq!(prefix_before_wildcard("trips/2015-*.csv"), Some("trips/2015-"));
        assert_eq!(prefix_before_wildcard("*.csv"), None);
        assert_eq!(prefix_before_wildcard("trips/a.csv"), Some("trips/a.csv"));
    }
}

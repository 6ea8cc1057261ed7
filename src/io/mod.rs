//! Reader and writer plumbing.
//!
//! - [`text`] - lazy line sources over local globs and object-store URIs
//! - [`sink`] - record sinks and the warehouse writer
//! - [`cloud`] - storage/warehouse traits with fake and directory backends
//! - [`compression`] - transparent decompression of sources
//! - [`glob`] - pattern expansion

pub mod cloud;
pub mod compression;
pub mod glob;
pub mod sink;
pub mod text;

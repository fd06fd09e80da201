//! Error types for dump loading
//!
//! Only loading can fail. Once a graph is loaded every query and compute
//! pass is total.

use std::path::PathBuf;
use thiserror::Error;

/// A record that is not a JSON object, lacks `address`/`type`/`size`, or has
/// a field of the wrong shape.
#[derive(Error, Debug)]
#[error("malformed record: {source}")]
pub struct MalformedRecordError {
    #[from]
    source: serde_json::Error,
}

impl MalformedRecordError {
    /// Column within the record where decoding stopped
    pub fn column(&self) -> usize {
        self.source.column()
    }

    /// True when the text was not JSON at all, as opposed to JSON of the
    /// wrong shape.
    pub fn is_syntax(&self) -> bool {
        self.source.is_syntax() || self.source.is_eof()
    }
}

/// Errors that abort a load. No partial graph is ever returned.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("record {line}: {source}")]
    MalformedRecord {
        /// 1-based line number within the (decompressed) dump
        line: usize,
        #[source]
        source: MalformedRecordError,
    },

    #[error("failed to open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read dump: {0}")]
    Io(#[from] std::io::Error),
}

pub type LoadResult<T> = Result<T, LoadError>;

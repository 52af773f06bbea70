//! Errors raised while loading an endpoint document.

use std::path::PathBuf;
use thiserror::Error;

/// Failure to produce an endpoint collection from a document on disk.
///
/// Parsing itself cannot fail: malformed headings are skipped and malformed
/// code blocks are kept verbatim. Only reading the document can go wrong.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read endpoint document {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

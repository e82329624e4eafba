use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result alias for archive curation operations.
pub type Result<T> = std::result::Result<T, ArchiveError>;

/// Failures surfaced by the curation pipeline.
///
/// Unrecognized request tokens are not errors; they are collected and
/// reported by the resolver. Everything here signals a problem with the
/// archive layout, the metadata table, or local I/O, and aborts the run.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("could not open archive '{archive}': {source}")]
    ArchiveOpen {
        archive: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    /// The metadata index references a member the archive does not contain.
    #[error("entry '{member}' not found in archive '{archive}'")]
    MissingEntry { archive: String, member: String },

    #[error("archive entry '{member}' has an unsafe path")]
    UnsafeEntry { member: String },

    #[error("metadata table: {0}")]
    Metadata(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

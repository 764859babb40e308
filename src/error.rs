//! Per-file ingestion failures
//!
//! Malformed lines and duplicate messages are not errors; they never reach
//! this type. What remains decides how a failed file is logged and retried.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    /// No project path could be derived; the file is deferred to a later pass.
    #[error("could not determine project path for {}", .0.display())]
    UnresolvedIdentity(PathBuf),

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl IngestError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        IngestError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type IngestResult<T> = Result<T, IngestError>;

use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    /// The backing file is missing or is not a well formed table.
    #[error("failed to load table from {path}: {reason}")]
    Load { path: PathBuf, reason: String },
    #[error("column `{0}` does not exist")]
    ColumnNotFound(String),
    #[error("cannot generate an id for an empty table")]
    EmptyTable,
    /// Unlocking, writing or relocking a file failed.
    #[error("failed to write {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed row: {0}")]
    MalformedRow(String),
    #[error("id column `{0}` has no ids left to assign")]
    IdOverflow(String),
    #[error("serializer error")]
    Serializer(#[from] serde_json::Error),
}

impl StoreError {
    pub(crate) fn load(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Load {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn write(path: impl Into<PathBuf>, source: impl Into<io::Error>) -> Self {
        Self::Write {
            path: path.into(),
            source: source.into(),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

// ⚠️ Import Errors
//
// Fatal setup errors (unreadable source, bad header, bad window) abort before
// any row is touched. Row-level errors may be absorbed by the skip policy.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HeaderError {
    #[error("source has no header row")]
    Empty,

    #[error("Field {0} not found in file, but should exist for matching to work")]
    MissingMatchKey(String),

    #[error("Field {0} not found in file, but should exist to import subjects")]
    MissingRequired(String),
}

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("cannot read source {path}: {source}")]
    SourceUnreadable {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("invalid header: {0}")]
    InvalidHeader(#[from] HeaderError),

    #[error("invalid window: {reason}")]
    InvalidWindow { reason: String },

    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("line {line}: malformed row: {source}")]
    MalformedRow {
        line: u64,
        #[source]
        source: csv::Error,
    },

    #[error("line {line}: column {column} is missing")]
    IncompleteRow { line: u64, column: String },

    #[error("invalid value {value:?} for field {field}")]
    InvalidValue { field: String, value: String },

    #[error("store rejected {entity} write: {reason}")]
    StoreWriteRejected { entity: &'static str, reason: String },

    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),
}

impl ImportError {
    pub fn rejected(entity: &'static str, reason: impl Into<String>) -> Self {
        ImportError::StoreWriteRejected {
            entity,
            reason: reason.into(),
        }
    }

    /// Errors confined to a single row; everything else halts the run.
    pub fn is_row_level(&self) -> bool {
        matches!(
            self,
            ImportError::MalformedRow { .. }
                | ImportError::IncompleteRow { .. }
                | ImportError::InvalidValue { .. }
                | ImportError::StoreWriteRejected { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, ImportError>;

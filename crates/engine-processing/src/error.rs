use codecs::{ConversionError, UnsupportedConversion};
use engine_core::error::StoreError;
use std::path::PathBuf;
use thiserror::Error;

/// Problems with the mapping itself, detected before any record is read.
#[derive(Error, Debug)]
pub enum MapperSetupError {
    #[error(transparent)]
    Unsupported(#[from] UnsupportedConversion),

    #[error("Mapped column '{column}' does not exist in table {table}")]
    UnknownColumn { table: String, column: String },
}

/// A record that could not be turned into bound values, or a row that could
/// not be turned back into a record.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MappingError {
    #[error("Required column '{column}' is not mapped and has no default")]
    UnmappedColumn { column: String },

    #[error("Field '{field}' mapped to column '{column}' is missing from the record")]
    MissingField { field: String, column: String },

    #[error("Primary key column '{column}' cannot be null")]
    NullPrimaryKey { column: String },

    #[error("Could not convert field '{field}' to column '{column}': {source}")]
    Conversion {
        field: String,
        column: String,
        #[source]
        source: ConversionError,
    },
}

impl MappingError {
    pub fn kind(&self) -> &'static str {
        match self {
            MappingError::UnmappedColumn { .. } => "UnmappedColumn",
            MappingError::MissingField { .. } => "MissingField",
            MappingError::NullPrimaryKey { .. } => "NullPrimaryKey",
            MappingError::Conversion { .. } => "ConversionError",
        }
    }

    /// The record field the failure is attributed to, when there is one.
    pub fn field(&self) -> Option<&str> {
        match self {
            MappingError::MissingField { field, .. } | MappingError::Conversion { field, .. } => {
                Some(field)
            }
            MappingError::UnmappedColumn { .. } | MappingError::NullPrimaryKey { .. } => None,
        }
    }
}

/// A unit of work that reached a terminal failure.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExecutionError {
    #[error("Statement failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: usize,
        #[source]
        source: StoreError,
    },

    #[error("Statement rejected by the store: {source}")]
    Rejected {
        attempts: usize,
        #[source]
        source: StoreError,
    },
}

impl ExecutionError {
    pub fn kind(&self) -> &'static str {
        match self {
            ExecutionError::RetriesExhausted { .. } => "RetriesExhausted",
            ExecutionError::Rejected { .. } => "Rejected",
        }
    }

    pub fn attempts(&self) -> usize {
        match self {
            ExecutionError::RetriesExhausted { attempts, .. }
            | ExecutionError::Rejected { attempts, .. } => *attempts,
        }
    }

    pub fn store_error(&self) -> &StoreError {
        match self {
            ExecutionError::RetriesExhausted { source, .. }
            | ExecutionError::Rejected { source, .. } => source,
        }
    }

    /// Whether the store condition affects the whole run rather than this unit.
    pub fn is_fatal_to_run(&self) -> bool {
        self.store_error().is_fatal_to_run()
    }
}

#[derive(Error, Debug)]
pub enum QuarantineError {
    #[error("Failed to create quarantine directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write quarantine file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize failed record: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Quarantine file lock poisoned: {0}")]
    Poisoned(PathBuf),
}

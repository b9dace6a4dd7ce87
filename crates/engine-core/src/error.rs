use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by a store session.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("No response from the store within {0:?}")]
    Timeout(Duration),

    #[error("Write timed out on the coordinator: {0}")]
    WriteTimeout(String),

    #[error("Coordinator is overloaded: {0}")]
    Overloaded(String),

    #[error("Not enough replicas available: {0}")]
    Unavailable(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Invalid value for column {column}: {message}")]
    TypeMismatch { column: String, message: String },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Table {0} does not exist")]
    UnknownTable(String),

    #[error("Connection to the store was lost: {0}")]
    ConnectionLost(String),
}

impl StoreError {
    /// Conditions that may clear up if the same request is sent again.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StoreError::Timeout(_)
                | StoreError::WriteTimeout(_)
                | StoreError::Overloaded(_)
                | StoreError::Unavailable(_)
        )
    }

    /// Conditions that affect every request of the run, not one record.
    pub fn is_fatal_to_run(&self) -> bool {
        matches!(
            self,
            StoreError::Unauthorized(_) | StoreError::UnknownTable(_) | StoreError::ConnectionLost(_)
        )
    }

    pub fn kind(&self) -> &'static str {
        match self {
            StoreError::Timeout(_) => "Timeout",
            StoreError::WriteTimeout(_) => "WriteTimeout",
            StoreError::Overloaded(_) => "Overloaded",
            StoreError::Unavailable(_) => "Unavailable",
            StoreError::InvalidQuery(_) => "InvalidQuery",
            StoreError::TypeMismatch { .. } => "TypeMismatch",
            StoreError::Unauthorized(_) => "Unauthorized",
            StoreError::UnknownTable(_) => "UnknownTable",
            StoreError::ConnectionLost(_) => "ConnectionLost",
        }
    }
}

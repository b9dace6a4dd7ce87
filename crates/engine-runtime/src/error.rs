use engine_config::settings::error::SettingsError;
use engine_core::error::StoreError;
use engine_processing::{MapperSetupError, QuarantineError};
use std::fmt;
use thiserror::Error;

/// Top-level errors of a load or unload run.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),

    #[error("Mapping setup failed: {0}")]
    Mapping(#[from] MapperSetupError),

    #[error("Could not reach the target table: {0}")]
    Store(#[from] StoreError),

    #[error("Quarantine error: {0}")]
    Quarantine(#[from] QuarantineError),

    #[error("Run aborted: {0}")]
    Aborted(AbortReason),
}

/// Why a run stopped before consuming all of its input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortReason {
    TooManyErrors { max_errors: u64, failed: u64 },
    /// A condition that affects every request, such as a lost connection.
    Fatal(String),
    Interrupted,
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::TooManyErrors { max_errors, failed } => write!(
                f,
                "too many errors: {failed} failed records, the maximum allowed is {max_errors}"
            ),
            AbortReason::Fatal(message) => write!(f, "fatal error: {message}"),
            AbortReason::Interrupted => f.write_str("interrupted by operator"),
        }
    }
}

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading or validating run settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Failed to read settings file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid settings document: {0}")]
    Parse(#[from] serde_json::Error),

    /// One entry per offending setting.
    #[error("Invalid settings: {}", .0.join("; "))]
    ValidationFailed(Vec<String>),
}

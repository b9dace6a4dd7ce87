use super::{BatchMode, LogFormat};
use codecs::ConversionContext;
use engine_core::{retry::RetryPolicy, statement::StatementPrinter};
use model::transform::mapping::FieldMapping;
use std::{path::PathBuf, time::Duration};

/// Immutable, validated configuration used throughout a run.
#[derive(Debug, Clone)]
pub struct ValidatedSettings {
    pub keyspace: String,
    pub table: String,
    /// Explicit mapping; `None` maps every column from the same-named field.
    pub mapping: Option<FieldMapping>,
    pub allow_missing_fields: bool,
    pub conversion: ConversionContext,
    pub batch: BatchOptions,
    pub executor: ExecutorOptions,
    pub log: LogOptions,
    pub monitoring: MonitoringOptions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOptions {
    pub mode: BatchMode,
    pub max_rows: usize,
    pub max_bytes: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct ExecutorOptions {
    /// Admission limit: units of work outstanding against the store.
    pub max_in_flight: usize,
    pub retry: RetryPolicy,
    pub request_timeout: Duration,
    pub drain_timeout: Duration,
    pub fetch_size: usize,
}

#[derive(Debug, Clone)]
pub struct LogOptions {
    pub directory: PathBuf,
    /// `None` never aborts.
    pub max_errors: Option<u64>,
    pub format: LogFormat,
    pub printer: StatementPrinter,
}

#[derive(Debug, Clone)]
pub struct MonitoringOptions {
    pub report_interval: Duration,
    pub expected_total: Option<u64>,
}

impl ValidatedSettings {
    pub fn qualified_table(&self) -> String {
        format!("{}.{}", self.keyspace, self.table)
    }
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            mode: BatchMode::PartitionKey,
            max_rows: 32,
            max_bytes: None,
        }
    }
}

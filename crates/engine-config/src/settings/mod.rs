use codecs::TimeUnit;
use error::SettingsError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub mod error;
pub mod validated;
pub mod validator;

/// Raw run settings as written by the operator. Every section and field is
/// optional; [`validator::SettingsValidator`] turns this into
/// [`validated::ValidatedSettings`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoaderSettings {
    pub schema: SchemaSettings,
    pub codec: CodecSettings,
    pub batch: BatchSettings,
    pub executor: ExecutorSettings,
    pub log: LogSettings,
    pub monitoring: MonitoringSettings,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SchemaSettings {
    pub keyspace: String,
    pub table: String,
    /// `field=column` pairs; when absent, fields map to columns of the same name.
    pub mapping: Option<String>,
    /// Whether columns with no mapped field and no default are bound as absent
    /// instead of failing the record.
    pub allow_missing_fields: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CodecSettings {
    pub null_strings: Vec<String>,
    pub null_output: Option<String>,
    /// `CQL_TIMESTAMP` (ISO-8601) or a chrono pattern.
    pub timestamp_format: String,
    /// `ISO_LOCAL_DATE` or a chrono pattern.
    pub date_format: String,
    /// `ISO_LOCAL_TIME` or a chrono pattern.
    pub time_format: String,
    pub time_zone: String,
    pub time_unit: TimeUnit,
    pub epoch: String,
    /// `true:false` word pairs.
    pub boolean_strings: Vec<String>,
    pub grouping_separator: Option<String>,
    pub decimal_separator: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchMode {
    /// Every statement is its own unit of work.
    Disabled,
    /// Consecutive statements for the same partition share an atomic batch.
    PartitionKey,
    /// Consecutive statements share a non-atomic batch regardless of partition.
    Unlogged,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BatchSettings {
    pub mode: BatchMode,
    pub max_batch_rows: usize,
    pub max_batch_bytes: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExecutorSettings {
    pub max_in_flight: usize,
    pub max_attempts: usize,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub request_timeout_ms: u64,
    pub drain_timeout_ms: u64,
    /// Rows per page when unloading.
    pub fetch_size: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogSettings {
    pub directory: PathBuf,
    /// Failed records tolerated before the run aborts; `-1` never aborts.
    pub max_errors: i64,
    pub format: LogFormat,
    pub max_inner_statements: usize,
    pub max_value_length: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MonitoringSettings {
    pub report_interval_ms: u64,
    pub expected_total: Option<u64>,
}

impl Default for CodecSettings {
    fn default() -> Self {
        Self {
            null_strings: Vec::new(),
            null_output: None,
            timestamp_format: "CQL_TIMESTAMP".to_string(),
            date_format: "ISO_LOCAL_DATE".to_string(),
            time_format: "ISO_LOCAL_TIME".to_string(),
            time_zone: "UTC".to_string(),
            time_unit: TimeUnit::Milliseconds,
            epoch: "1970-01-01T00:00:00Z".to_string(),
            boolean_strings: ["1:0", "Y:N", "T:F", "YES:NO", "TRUE:FALSE"]
                .map(String::from)
                .to_vec(),
            grouping_separator: None,
            decimal_separator: ".".to_string(),
        }
    }
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            mode: BatchMode::PartitionKey,
            max_batch_rows: 32,
            max_batch_bytes: None,
        }
    }
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            max_in_flight: 64,
            max_attempts: 3,
            base_delay_ms: 100,
            max_delay_ms: 2_000,
            request_timeout_ms: 10_000,
            drain_timeout_ms: 30_000,
            fetch_size: 5_000,
        }
    }
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("./logs"),
            max_errors: 100,
            format: LogFormat::Text,
            max_inner_statements: 10,
            max_value_length: 50,
        }
    }
}

impl Default for MonitoringSettings {
    fn default() -> Self {
        Self {
            report_interval_ms: 5_000,
            expected_total: None,
        }
    }
}

impl LoaderSettings {
    pub fn from_json_str(json: &str) -> Result<Self, SettingsError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn sections_default_independently() {
        let settings = LoaderSettings::from_json_str(
            r#"{
                "schema": {"keyspace": "geo", "table": "ip_by_country"},
                "batch": {"max_batch_rows": 8}
            }"#,
        )
        .unwrap();

        assert_eq!(settings.schema.table, "ip_by_country");
        assert_eq!(settings.batch.max_batch_rows, 8);
        assert_eq!(settings.batch.mode, BatchMode::PartitionKey);
        assert_eq!(settings.executor.max_attempts, 3);
        assert_eq!(settings.codec.timestamp_format, "CQL_TIMESTAMP");
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = LoaderSettings::from_json_str(r#"{"batch": {"max_rows": 8}}"#).unwrap_err();
        assert!(matches!(err, SettingsError::Parse(_)));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"log": {{"max_errors": -1, "format": "json"}}, "codec": {{"time_unit": "seconds"}}}}"#
        )
        .unwrap();

        let settings = LoaderSettings::from_file(file.path()).unwrap();
        assert_eq!(settings.log.max_errors, -1);
        assert_eq!(settings.log.format, LogFormat::Json);
        assert_eq!(settings.codec.time_unit, TimeUnit::Seconds);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = LoaderSettings::from_file("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, SettingsError::Io { .. }));
    }
}

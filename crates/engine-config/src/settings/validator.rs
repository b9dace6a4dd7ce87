use super::{
    BatchSettings, CodecSettings, ExecutorSettings, LoaderSettings, LogSettings,
    MonitoringSettings, SchemaSettings,
    error::SettingsError,
    validated::{BatchOptions, ExecutorOptions, LogOptions, MonitoringOptions, ValidatedSettings},
};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use codecs::{ConversionContext, NumberFormat, TemporalFormat, text::temporal::is_valid_pattern};
use engine_core::{retry::RetryPolicy, statement::StatementPrinter};
use model::transform::mapping::FieldMapping;
use std::time::Duration;
use tracing::{info, warn};

const ISO_TIMESTAMP_ALIASES: &[&str] = &["CQL_TIMESTAMP", "ISO_ZONED_DATE_TIME", "ISO"];
const ISO_DATE_ALIASES: &[&str] = &["ISO_LOCAL_DATE", "ISO"];
const ISO_TIME_ALIASES: &[&str] = &["ISO_LOCAL_TIME", "ISO"];

/// Validates run settings before anything touches the store. All problems
/// are collected and reported together.
#[derive(Debug, Default)]
pub struct SettingsValidator;

impl SettingsValidator {
    pub fn validate(&self, settings: &LoaderSettings) -> Result<ValidatedSettings, SettingsError> {
        let mut errors: Vec<String> = Vec::new();

        let mapping = self.validate_schema(&settings.schema, &mut errors);
        let conversion = self.validate_codec(&settings.codec, &mut errors);
        let batch = self.validate_batch(&settings.batch, &mut errors);
        let executor = self.validate_executor(&settings.executor, &mut errors);
        let log = self.validate_log(&settings.log, &mut errors);
        let monitoring = self.validate_monitoring(&settings.monitoring, &mut errors);

        if !errors.is_empty() {
            return Err(SettingsError::ValidationFailed(errors));
        }

        let validated = ValidatedSettings {
            keyspace: settings.schema.keyspace.clone(),
            table: settings.schema.table.clone(),
            mapping,
            allow_missing_fields: settings.schema.allow_missing_fields,
            conversion,
            batch,
            executor,
            log,
            monitoring,
        };
        info!(
            table = %validated.qualified_table(),
            batch_mode = ?validated.batch.mode,
            max_in_flight = validated.executor.max_in_flight,
            "Settings validation completed successfully"
        );
        Ok(validated)
    }

    fn validate_schema(
        &self,
        schema: &SchemaSettings,
        errors: &mut Vec<String>,
    ) -> Option<FieldMapping> {
        if schema.keyspace.trim().is_empty() {
            errors.push("schema.keyspace is required".to_string());
        }
        if schema.table.trim().is_empty() {
            errors.push("schema.table is required".to_string());
        }

        let raw = schema.mapping.as_deref()?;
        match FieldMapping::parse(raw) {
            Ok(mapping) => Some(mapping),
            Err(e) => {
                errors.push(format!("schema.mapping: {e}"));
                None
            }
        }
    }

    fn validate_codec(&self, codec: &CodecSettings, errors: &mut Vec<String>) -> ConversionContext {
        let mut ctx = ConversionContext {
            null_strings: codec.null_strings.clone(),
            null_output: codec.null_output.clone(),
            time_unit: codec.time_unit,
            ..Default::default()
        };

        ctx.timestamp_format = temporal_format(
            "codec.timestamp_format",
            &codec.timestamp_format,
            ISO_TIMESTAMP_ALIASES,
            errors,
        );
        ctx.date_format =
            temporal_format("codec.date_format", &codec.date_format, ISO_DATE_ALIASES, errors);
        ctx.time_format =
            temporal_format("codec.time_format", &codec.time_format, ISO_TIME_ALIASES, errors);

        match codec.time_zone.parse::<Tz>() {
            Ok(tz) => ctx.time_zone = tz,
            Err(_) => errors.push(format!("codec.time_zone: unknown zone '{}'", codec.time_zone)),
        }
        match DateTime::parse_from_rfc3339(&codec.epoch) {
            Ok(epoch) => ctx.epoch = epoch.with_timezone(&Utc),
            Err(e) => errors.push(format!("codec.epoch: '{}' is not ISO-8601: {e}", codec.epoch)),
        }

        let mut words = Vec::with_capacity(codec.boolean_strings.len());
        for pair in &codec.boolean_strings {
            match pair.split_once(':') {
                Some((yes, no))
                    if !yes.is_empty() && !no.is_empty() && !yes.eq_ignore_ascii_case(no) =>
                {
                    words.push((yes.to_string(), no.to_string()));
                }
                _ => errors.push(format!(
                    "codec.boolean_strings: '{pair}' is not a true:false pair"
                )),
            }
        }
        if words.is_empty() {
            errors.push("codec.boolean_strings must contain at least one pair".to_string());
        }
        ctx.boolean_words = words;

        let decimal = single_char("codec.decimal_separator", &codec.decimal_separator, errors);
        let grouping = codec
            .grouping_separator
            .as_deref()
            .and_then(|g| single_char("codec.grouping_separator", g, errors));
        if let (Some(d), Some(g)) = (decimal, grouping)
            && d == g
        {
            errors.push("codec.grouping_separator must differ from decimal_separator".to_string());
        }
        ctx.number_format = NumberFormat {
            grouping_separator: grouping,
            decimal_separator: decimal.unwrap_or('.'),
        };

        ctx
    }

    fn validate_batch(&self, batch: &BatchSettings, errors: &mut Vec<String>) -> BatchOptions {
        if batch.max_batch_rows == 0 {
            errors.push("batch.max_batch_rows must be at least 1".to_string());
        }
        if batch.max_batch_bytes == Some(0) {
            errors.push("batch.max_batch_bytes must be at least 1".to_string());
        }
        BatchOptions {
            mode: batch.mode,
            max_rows: batch.max_batch_rows.max(1),
            max_bytes: batch.max_batch_bytes,
        }
    }

    fn validate_executor(
        &self,
        executor: &ExecutorSettings,
        errors: &mut Vec<String>,
    ) -> ExecutorOptions {
        if executor.max_in_flight == 0 {
            errors.push("executor.max_in_flight must be at least 1".to_string());
        } else if executor.max_in_flight > 4_096 {
            warn!(
                max_in_flight = executor.max_in_flight,
                "Admission limit is very large, the store may be overwhelmed"
            );
        }
        if executor.max_attempts == 0 {
            errors.push("executor.max_attempts must be at least 1".to_string());
        }
        if executor.max_delay_ms < executor.base_delay_ms {
            errors.push("executor.max_delay_ms must not be below base_delay_ms".to_string());
        }
        if executor.request_timeout_ms == 0 {
            errors.push("executor.request_timeout_ms must be positive".to_string());
        }
        if executor.fetch_size == 0 {
            errors.push("executor.fetch_size must be at least 1".to_string());
        }

        ExecutorOptions {
            max_in_flight: executor.max_in_flight,
            retry: RetryPolicy::new(
                executor.max_attempts,
                Duration::from_millis(executor.base_delay_ms),
                Duration::from_millis(executor.max_delay_ms),
            ),
            request_timeout: Duration::from_millis(executor.request_timeout_ms),
            drain_timeout: Duration::from_millis(executor.drain_timeout_ms),
            fetch_size: executor.fetch_size,
        }
    }

    fn validate_log(&self, log: &LogSettings, errors: &mut Vec<String>) -> LogOptions {
        let max_errors = match log.max_errors {
            -1 => None,
            n if n >= 0 => Some(n as u64),
            n => {
                errors.push(format!("log.max_errors must be -1 or positive, got {n}"));
                None
            }
        };
        if log.max_value_length == 0 {
            errors.push("log.max_value_length must be at least 1".to_string());
        }
        LogOptions {
            directory: log.directory.clone(),
            max_errors,
            format: log.format,
            printer: StatementPrinter {
                max_inner_statements: log.max_inner_statements,
                max_value_length: log.max_value_length,
            },
        }
    }

    fn validate_monitoring(
        &self,
        monitoring: &MonitoringSettings,
        errors: &mut Vec<String>,
    ) -> MonitoringOptions {
        if monitoring.report_interval_ms == 0 {
            errors.push("monitoring.report_interval_ms must be positive".to_string());
        }
        MonitoringOptions {
            report_interval: Duration::from_millis(monitoring.report_interval_ms.max(1)),
            expected_total: monitoring.expected_total,
        }
    }
}

impl LoaderSettings {
    pub fn validate(&self) -> Result<ValidatedSettings, SettingsError> {
        SettingsValidator.validate(self)
    }
}

fn temporal_format(
    key: &str,
    raw: &str,
    iso_aliases: &[&str],
    errors: &mut Vec<String>,
) -> TemporalFormat {
    if iso_aliases.iter().any(|alias| alias.eq_ignore_ascii_case(raw)) {
        return TemporalFormat::Iso;
    }
    if raw.is_empty() || !is_valid_pattern(raw) {
        errors.push(format!("{key}: '{raw}' is not a valid pattern"));
        return TemporalFormat::Iso;
    }
    TemporalFormat::Pattern(raw.to_string())
}

fn single_char(key: &str, raw: &str, errors: &mut Vec<String>) -> Option<char> {
    let mut chars = raw.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Some(c),
        _ => {
            errors.push(format!("{key} must be a single character, got '{raw}'"));
            None
        }
    }
}

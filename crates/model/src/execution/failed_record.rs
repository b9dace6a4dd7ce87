use crate::records::record::{Record, SourceLocator};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Represents a record that failed during a load or unload.
///
/// Carries the original source of the record, never the partially converted
/// internal values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedRecord {
    pub id: String,
    pub category: FailureCategory,
    pub locator: SourceLocator,
    pub source: String,
    pub error: FailureError,
    /// Field or column the failure is attributed to, if any.
    pub field: Option<String>,
    /// Rendering of the unit of work that was rejected, for execution failures.
    pub statement: Option<String>,
    pub failed_at: DateTime<Utc>,
    pub attempt_number: Option<u32>,
}

/// The stage of the pipeline where the failure occurred. Each category has
/// its own quarantine log.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FailureCategory {
    /// Record could not be converted to bound values.
    Mapping,

    /// Store rejected or never acknowledged the write.
    Load,

    /// Row read from the store could not be converted back to a record.
    Unload,
}

/// Error information for a failed record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureError {
    pub error_type: String,
    pub message: String,
    pub details: Option<String>,
    pub is_retryable: bool,
}

/// The result of one attempt to move one record through the pipeline.
#[derive(Debug, Clone)]
pub enum Outcome {
    Success(SourceLocator),
    Failed(Box<FailedRecord>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeStatus {
    Success,
    /// Failed on a transient condition; a later run may succeed.
    RecoverableFailure,
    /// Failed on a condition that will not go away by retrying.
    FatalFailure,
}

impl FailedRecord {
    /// Create a new FailedRecord with minimal required information
    pub fn new(
        category: FailureCategory,
        record: &Record,
        error_type: impl Into<String>,
        error_message: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            category,
            locator: record.locator.clone(),
            source: record.source_text(),
            error: FailureError {
                error_type: error_type.into(),
                message: error_message.into(),
                details: None,
                is_retryable: false,
            },
            field: None,
            statement: None,
            failed_at: Utc::now(),
            attempt_number: None,
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn with_statement(mut self, statement: String) -> Self {
        self.statement = Some(statement);
        self
    }

    /// Add attempt number for retry tracking
    pub fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt_number = Some(attempt);
        self
    }

    /// Mark error as retryable
    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.error.is_retryable = retryable;
        self
    }

    /// Add detailed error information
    pub fn with_error_details(mut self, details: String) -> Self {
        self.error.details = Some(details);
        self
    }
}

impl Outcome {
    pub fn success(record: &Record) -> Self {
        Outcome::Success(record.locator.clone())
    }

    pub fn failed(failed: FailedRecord) -> Self {
        Outcome::Failed(Box::new(failed))
    }

    pub fn status(&self) -> OutcomeStatus {
        match self {
            Outcome::Success(_) => OutcomeStatus::Success,
            Outcome::Failed(f) if f.error.is_retryable => OutcomeStatus::RecoverableFailure,
            Outcome::Failed(_) => OutcomeStatus::FatalFailure,
        }
    }

    pub fn locator(&self) -> &SourceLocator {
        match self {
            Outcome::Success(locator) => locator,
            Outcome::Failed(f) => &f.locator,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }
}

impl FailureCategory {
    /// Base name of the quarantine files for this category.
    pub fn log_name(&self) -> &'static str {
        match self {
            FailureCategory::Mapping => "mapping",
            FailureCategory::Load => "load",
            FailureCategory::Unload => "unload",
        }
    }
}

impl std::fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureCategory::Mapping => write!(f, "Mapping"),
            FailureCategory::Load => write!(f, "Load"),
            FailureCategory::Unload => write!(f, "Unload"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::external::ExternalValue;

    fn record() -> Record {
        Record::named(
            SourceLocator::new("ip-by-country.json", 7),
            [("country_code", ExternalValue::text("FR"))],
        )
        .with_source(r#"{"country_code":"FR"}"#)
    }

    #[test]
    fn test_failed_record_creation() {
        let failed = FailedRecord::new(
            FailureCategory::Mapping,
            &record(),
            "ConversionError",
            "Could not convert",
        )
        .with_field("country_code")
        .with_attempt(2)
        .with_retryable(true)
        .with_error_details("caused by ...".to_string());

        assert_eq!(failed.locator, SourceLocator::new("ip-by-country.json", 7));
        assert_eq!(failed.source, r#"{"country_code":"FR"}"#);
        assert_eq!(failed.field.as_deref(), Some("country_code"));
        assert_eq!(failed.attempt_number, Some(2));
        assert!(failed.error.is_retryable);
        assert!(!failed.id.is_empty());
    }

    #[test]
    fn test_outcome_status() {
        let rec = record();
        assert_eq!(Outcome::success(&rec).status(), OutcomeStatus::Success);

        let fatal = FailedRecord::new(FailureCategory::Load, &rec, "Rejected", "bad");
        assert_eq!(
            Outcome::failed(fatal.clone()).status(),
            OutcomeStatus::FatalFailure
        );
        assert_eq!(
            Outcome::failed(fatal.with_retryable(true)).status(),
            OutcomeStatus::RecoverableFailure
        );
    }

    #[test]
    fn test_category_display() {
        assert_eq!(FailureCategory::Mapping.to_string(), "Mapping");
        assert_eq!(FailureCategory::Load.log_name(), "load");
    }
}

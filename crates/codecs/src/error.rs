use model::{core::data_type::DataType, records::external::ExternalFormat};
use thiserror::Error;

/// A single value could not be converted in either direction.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConversionError {
    #[error("Could not convert '{raw}' to {target}: {reason}")]
    InvalidExternal {
        raw: String,
        target: String,
        reason: String,
    },

    #[error("Could not render {value} as {format}: {reason}")]
    InvalidInternal {
        value: String,
        format: ExternalFormat,
        reason: String,
    },

    #[error("Expected a value of type {expected}, got {found}")]
    TypeMismatch { expected: String, found: String },
}

/// No codec is registered for the requested (format, type) pair.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("No codec registered to convert between {format} and {data_type}")]
pub struct UnsupportedConversion {
    pub format: ExternalFormat,
    pub data_type: DataType,
}

impl ConversionError {
    pub fn invalid_external(
        raw: impl Into<String>,
        target: &DataType,
        reason: impl Into<String>,
    ) -> Self {
        ConversionError::InvalidExternal {
            raw: raw.into(),
            target: target.to_string(),
            reason: reason.into(),
        }
    }

    pub fn invalid_internal(
        value: impl ToString,
        format: ExternalFormat,
        reason: impl Into<String>,
    ) -> Self {
        ConversionError::InvalidInternal {
            value: value.to_string(),
            format,
            reason: reason.into(),
        }
    }

    pub fn type_mismatch(expected: &DataType, found: impl ToString) -> Self {
        ConversionError::TypeMismatch {
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }
}

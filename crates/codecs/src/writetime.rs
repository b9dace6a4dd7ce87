use crate::{codec::{Codec, CodecRef}, error::ConversionError};
use chrono::DateTime;
use model::{
    core::{data_type::DataType, value::Value},
    records::external::{ExternalFormat, ExternalValue},
};

/// Binds a field to the statement write time. Reads the field with the
/// timestamp codec of its format and yields microseconds since the epoch.
#[derive(Debug)]
pub struct WriteTimeCodec {
    data_type: DataType,
    timestamp: CodecRef,
}

impl WriteTimeCodec {
    pub fn new(timestamp: CodecRef) -> Self {
        Self {
            data_type: DataType::BigInt,
            timestamp,
        }
    }
}

impl Codec for WriteTimeCodec {
    fn external_format(&self) -> ExternalFormat {
        self.timestamp.external_format()
    }

    fn internal_type(&self) -> &DataType {
        &self.data_type
    }

    fn external_to_internal(
        &self,
        external: &ExternalValue,
    ) -> Result<Option<Value>, ConversionError> {
        match self.timestamp.external_to_internal(external)? {
            None => Ok(None),
            Some(Value::Timestamp(ts)) => Ok(Some(Value::BigInt(ts.timestamp_micros()))),
            Some(other) => Err(ConversionError::type_mismatch(&DataType::Timestamp, other)),
        }
    }

    fn internal_to_external(
        &self,
        internal: Option<&Value>,
    ) -> Result<ExternalValue, ConversionError> {
        let ts = match internal {
            None => None,
            Some(Value::BigInt(micros)) => Some(DateTime::from_timestamp_micros(*micros).ok_or_else(
                || {
                    ConversionError::invalid_internal(
                        micros,
                        self.external_format(),
                        "write time out of range",
                    )
                },
            )?),
            Some(other) => return Err(ConversionError::type_mismatch(&self.data_type, other)),
        };
        self.timestamp
            .internal_to_external(ts.map(Value::Timestamp).as_ref())
    }
}

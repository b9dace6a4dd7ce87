use crate::error::ConversionError;
use model::{
    core::{data_type::DataType, value::Value},
    records::external::{ExternalFormat, ExternalValue},
};
use serde_json::Value as JsonValue;
use std::{fmt, sync::Arc};

/// Bidirectional conversion between one external syntax and one internal
/// type. Implementations are stateless apart from their options, so a single
/// instance is shared by every worker.
pub trait Codec: Send + Sync + fmt::Debug {
    fn external_format(&self) -> ExternalFormat;

    fn internal_type(&self) -> &DataType;

    /// Load direction. `Ok(None)` means the value is absent.
    fn external_to_internal(&self, external: &ExternalValue)
    -> Result<Option<Value>, ConversionError>;

    /// Unload direction. An absent internal value maps to the external null.
    fn internal_to_external(&self, internal: Option<&Value>)
    -> Result<ExternalValue, ConversionError>;
}

pub type CodecRef = Arc<dyn Codec>;

/// Flattens an external value into a JSON node, for codecs that nest other
/// codecs inside a JSON document.
pub(crate) fn into_json(external: ExternalValue) -> JsonValue {
    match external {
        ExternalValue::Null => JsonValue::Null,
        ExternalValue::Text(s) => JsonValue::String(s),
        ExternalValue::Json(node) => node,
    }
}


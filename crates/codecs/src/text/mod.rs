//! Codecs for delimited text, where every external field is a string.

pub mod families;
pub mod temporal;

use crate::{
    codec::{Codec, CodecRef, into_json},
    context::ConversionContext,
    error::ConversionError,
};
use model::{
    core::{data_type::DataType, value::Value},
    records::external::{ExternalFormat, ExternalValue},
};
use serde_json::Value as JsonValue;
use std::{fmt, sync::Arc};

/// Parse and render rules for one family of scalar types.
pub trait TextFamily: Send + Sync + fmt::Debug {
    /// `raw` is never a null marker, and is already trimmed unless the
    /// target type is textual.
    fn parse(&self, ctx: &ConversionContext, data_type: &DataType, raw: &str)
    -> Result<Value, String>;

    fn render(&self, ctx: &ConversionContext, value: &Value) -> Result<String, String>;
}

/// A text codec for scalar types, driven by a [`TextFamily`].
#[derive(Debug)]
pub struct StringCodec<F> {
    data_type: DataType,
    context: Arc<ConversionContext>,
    family: F,
}

impl<F: TextFamily> StringCodec<F> {
    pub fn new(data_type: DataType, context: Arc<ConversionContext>, family: F) -> Self {
        Self {
            data_type,
            context,
            family,
        }
    }
}

impl<F: TextFamily> Codec for StringCodec<F> {
    fn external_format(&self) -> ExternalFormat {
        ExternalFormat::Text
    }

    fn internal_type(&self) -> &DataType {
        &self.data_type
    }

    fn external_to_internal(
        &self,
        external: &ExternalValue,
    ) -> Result<Option<Value>, ConversionError> {
        let Some(raw) = text_input(&self.context, &self.data_type, external)? else {
            return Ok(None);
        };
        self.family
            .parse(&self.context, &self.data_type, raw)
            .map(Some)
            .map_err(|reason| ConversionError::invalid_external(raw, &self.data_type, reason))
    }

    fn internal_to_external(
        &self,
        internal: Option<&Value>,
    ) -> Result<ExternalValue, ConversionError> {
        let Some(value) = internal else {
            return Ok(null_output(&self.context));
        };
        if !value.conforms_to(&self.data_type) {
            return Err(ConversionError::type_mismatch(&self.data_type, value));
        }
        self.family
            .render(&self.context, value)
            .map(ExternalValue::Text)
            .map_err(|reason| ConversionError::invalid_internal(value, ExternalFormat::Text, reason))
    }
}

/// Text codec for collections and UDTs: the field holds a JSON document
/// that is handed to the JSON codec of the same type.
#[derive(Debug)]
pub struct JsonDocumentCodec {
    data_type: DataType,
    context: Arc<ConversionContext>,
    json: CodecRef,
}

impl JsonDocumentCodec {
    pub fn new(data_type: DataType, context: Arc<ConversionContext>, json: CodecRef) -> Self {
        Self {
            data_type,
            context,
            json,
        }
    }
}

impl Codec for JsonDocumentCodec {
    fn external_format(&self) -> ExternalFormat {
        ExternalFormat::Text
    }

    fn internal_type(&self) -> &DataType {
        &self.data_type
    }

    fn external_to_internal(
        &self,
        external: &ExternalValue,
    ) -> Result<Option<Value>, ConversionError> {
        let Some(raw) = text_input(&self.context, &self.data_type, external)? else {
            return Ok(None);
        };
        let node: JsonValue = serde_json::from_str(raw).map_err(|e| {
            ConversionError::invalid_external(raw, &self.data_type, format!("invalid JSON: {e}"))
        })?;
        self.json.external_to_internal(&ExternalValue::Json(node))
    }

    fn internal_to_external(
        &self,
        internal: Option<&Value>,
    ) -> Result<ExternalValue, ConversionError> {
        if internal.is_none() {
            return Ok(null_output(&self.context));
        }
        let node = into_json(self.json.internal_to_external(internal)?);
        Ok(ExternalValue::Text(node.to_string()))
    }
}

/// Extracts the string to parse, or `None` when the input reads as absent:
/// the external null, a null marker, or blank text for a non-textual type.
pub(crate) fn text_input<'a>(
    ctx: &ConversionContext,
    data_type: &DataType,
    external: &'a ExternalValue,
) -> Result<Option<&'a str>, ConversionError> {
    if external.is_null() {
        return Ok(None);
    }
    let Some(raw) = external.as_str() else {
        return Err(ConversionError::invalid_external(
            external.to_string(),
            data_type,
            "expected a string",
        ));
    };

    if ctx.is_null_marker(raw) {
        return Ok(None);
    }
    if data_type.is_textual() {
        return Ok(Some(raw));
    }

    let trimmed = raw.trim();
    if trimmed.is_empty() {
        Ok(None)
    } else {
        Ok(Some(trimmed))
    }
}

pub(crate) fn null_output(ctx: &ConversionContext) -> ExternalValue {
    match &ctx.null_output {
        Some(marker) => ExternalValue::Text(marker.clone()),
        None => ExternalValue::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::CodecRegistry;
    use model::core::geo::Point;

    fn registry(ctx: ConversionContext) -> CodecRegistry {
        CodecRegistry::new(ctx)
    }

    fn text(s: &str) -> ExternalValue {
        ExternalValue::text(s)
    }

    #[test]
    fn empty_text_is_absent_except_for_textual_types() {
        let reg = registry(ConversionContext::default());
        let int = reg.codec_for(ExternalFormat::Text, &DataType::Int).unwrap();
        let txt = reg.codec_for(ExternalFormat::Text, &DataType::Text).unwrap();

        assert_eq!(int.external_to_internal(&text("")).unwrap(), None);
        assert_eq!(int.external_to_internal(&text("   ")).unwrap(), None);
        assert_eq!(
            txt.external_to_internal(&text("")).unwrap(),
            Some(Value::Text(String::new()))
        );
        assert_eq!(int.external_to_internal(&ExternalValue::Null).unwrap(), None);
    }

    #[test]
    fn null_markers_apply_to_every_type() {
        let reg = registry(ConversionContext {
            null_strings: vec!["NULL".into()],
            null_output: Some("NULL".into()),
            ..Default::default()
        });
        let txt = reg.codec_for(ExternalFormat::Text, &DataType::Text).unwrap();

        assert_eq!(txt.external_to_internal(&text("NULL")).unwrap(), None);
        assert_eq!(txt.external_to_internal(&text(" NULL ")).unwrap(), None);
        assert_eq!(txt.internal_to_external(None).unwrap(), text("NULL"));
    }

    #[test]
    fn numbers_reject_lossy_and_out_of_range_input() {
        let reg = registry(ConversionContext::default());
        let int = reg.codec_for(ExternalFormat::Text, &DataType::Int).unwrap();

        assert_eq!(
            int.external_to_internal(&text(" 42 ")).unwrap(),
            Some(Value::Int(42))
        );
        assert_eq!(
            int.external_to_internal(&text("42.0")).unwrap(),
            Some(Value::Int(42))
        );
        assert!(int.external_to_internal(&text("42.5")).is_err());
        assert!(int.external_to_internal(&text("3000000000")).is_err());
        assert!(int.external_to_internal(&text("forty-two")).is_err());
    }

    #[test]
    fn decimals_keep_their_scale() {
        let reg = registry(ConversionContext::default());
        let dec = reg
            .codec_for(ExternalFormat::Text, &DataType::Decimal)
            .unwrap();

        let value = dec.external_to_internal(&text("12.3400")).unwrap().unwrap();
        assert_eq!(
            dec.internal_to_external(Some(&value)).unwrap(),
            text("12.3400")
        );
    }

    #[test]
    fn blobs_use_hex_literals() {
        let reg = registry(ConversionContext::default());
        let blob = reg.codec_for(ExternalFormat::Text, &DataType::Blob).unwrap();

        assert_eq!(
            blob.external_to_internal(&text("0xCAFE")).unwrap(),
            Some(Value::Blob(vec![0xca, 0xfe]))
        );
        assert_eq!(
            blob.internal_to_external(Some(&Value::Blob(vec![0, 1, 255])))
                .unwrap(),
            text("0x0001ff")
        );
        assert!(blob.external_to_internal(&text("0xABC")).is_err());
    }

    #[test]
    fn points_accept_every_syntax_and_emit_geo_json() {
        let reg = registry(ConversionContext {
            null_strings: vec!["NULL".into()],
            ..Default::default()
        });
        let codec = reg.codec_for(ExternalFormat::Text, &DataType::Point).unwrap();
        let expected = Some(Value::Point(Point::new(-1.1, -2.2)));

        for input in [
            "POINT (-1.1 -2.2)",
            "'POINT (-1.1 -2.2)'",
            " point (-1.1 -2.2) ",
            r#"{"type":"Point","coordinates":[-1.1,-2.2]}"#,
        ] {
            assert_eq!(codec.external_to_internal(&text(input)).unwrap(), expected);
        }
        assert_eq!(codec.external_to_internal(&text("NULL")).unwrap(), None);
        assert!(
            codec
                .external_to_internal(&text("not a valid point literal"))
                .is_err()
        );

        let rendered = codec
            .internal_to_external(Some(&Value::Point(Point::new(-1.1, -2.2))))
            .unwrap();
        assert_eq!(
            rendered,
            text(r#"{"coordinates":[-1.1,-2.2],"type":"Point"}"#)
        );
    }

    #[test]
    fn collections_read_json_documents() {
        let reg = registry(ConversionContext::default());
        let list_type = DataType::List(Box::new(DataType::Int));
        let codec = reg.codec_for(ExternalFormat::Text, &list_type).unwrap();

        let value = codec.external_to_internal(&text("[1, 2, 3]")).unwrap();
        assert_eq!(
            value,
            Some(Value::List(vec![Value::Int(1), Value::Int(2), Value::Int(3)]))
        );
        assert_eq!(
            codec.internal_to_external(value.as_ref()).unwrap(),
            text("[1,2,3]")
        );
        assert!(codec.external_to_internal(&text("[1, 2")).is_err());
    }

    #[test]
    fn rendering_rejects_values_of_another_type() {
        let reg = registry(ConversionContext::default());
        let codec = reg.codec_for(ExternalFormat::Text, &DataType::Int).unwrap();
        assert!(matches!(
            codec.internal_to_external(Some(&Value::Text("x".into()))),
            Err(ConversionError::TypeMismatch { .. })
        ));
    }
}

//! Codecs for JSON documents, where every external field is a parsed node.

pub mod collection;

use crate::{
    codec::{Codec, CodecRef},
    context::ConversionContext,
    error::ConversionError,
    text::text_input,
};
use model::{
    core::{data_type::DataType, geo::Point, value::Value},
    records::external::{ExternalFormat, ExternalValue},
};
use serde_json::{Number, Value as JsonValue};
use std::sync::Arc;

/// JSON codec for scalar types. String nodes and literal nodes are read
/// through the text codec of the same type; booleans and finite numbers are
/// written back as native JSON literals, everything else as strings.
#[derive(Debug)]
pub struct JsonScalarCodec {
    text: CodecRef,
}

impl JsonScalarCodec {
    pub fn new(text: CodecRef) -> Self {
        Self { text }
    }
}

impl Codec for JsonScalarCodec {
    fn external_format(&self) -> ExternalFormat {
        ExternalFormat::Json
    }

    fn internal_type(&self) -> &DataType {
        self.text.internal_type()
    }

    fn external_to_internal(
        &self,
        external: &ExternalValue,
    ) -> Result<Option<Value>, ConversionError> {
        let node = match external {
            ExternalValue::Json(node) => node,
            other => return self.text.external_to_internal(other),
        };
        match node {
            JsonValue::Null => Ok(None),
            JsonValue::String(s) => self.text.external_to_internal(&ExternalValue::text(s.as_str())),
            JsonValue::Bool(_) | JsonValue::Number(_) => self
                .text
                .external_to_internal(&ExternalValue::Text(node.to_string())),
            JsonValue::Array(_) | JsonValue::Object(_) if self.internal_type().is_textual() => {
                Ok(Some(Value::Text(node.to_string())))
            }
            _ => Err(ConversionError::invalid_external(
                node.to_string(),
                self.internal_type(),
                "expected a JSON scalar",
            )),
        }
    }

    fn internal_to_external(
        &self,
        internal: Option<&Value>,
    ) -> Result<ExternalValue, ConversionError> {
        let Some(value) = internal else {
            return Ok(ExternalValue::Json(JsonValue::Null));
        };
        if !value.conforms_to(self.internal_type()) {
            return Err(ConversionError::type_mismatch(self.internal_type(), value));
        }

        let native = match value {
            Value::Boolean(b) => Some(JsonValue::Bool(*b)),
            Value::Int(n) => Some(JsonValue::from(*n)),
            Value::BigInt(n) => Some(JsonValue::from(*n)),
            Value::Float(n) => Number::from_f64(f64::from(*n)).map(JsonValue::Number),
            Value::Double(n) => Number::from_f64(*n).map(JsonValue::Number),
            _ => None,
        };
        if let Some(node) = native {
            return Ok(ExternalValue::Json(node));
        }

        match self.text.internal_to_external(Some(value))? {
            ExternalValue::Text(s) => Ok(ExternalValue::Json(JsonValue::String(s))),
            other => Ok(other),
        }
    }
}

/// Points from a WKT or GeoJSON string, or from an inline GeoJSON object.
/// Always written as a GeoJSON object.
#[derive(Debug)]
pub struct JsonPointCodec {
    data_type: DataType,
    context: Arc<ConversionContext>,
}

impl JsonPointCodec {
    pub fn new(context: Arc<ConversionContext>) -> Self {
        Self {
            data_type: DataType::Point,
            context,
        }
    }
}

impl Codec for JsonPointCodec {
    fn external_format(&self) -> ExternalFormat {
        ExternalFormat::Json
    }

    fn internal_type(&self) -> &DataType {
        &self.data_type
    }

    fn external_to_internal(
        &self,
        external: &ExternalValue,
    ) -> Result<Option<Value>, ConversionError> {
        let parsed = match external {
            ExternalValue::Json(node @ JsonValue::Object(_)) => Point::from_geo_json(node),
            other => match text_input(&self.context, &DataType::Point, other)? {
                Some(raw) => Point::parse(raw),
                None => return Ok(None),
            },
        };
        parsed.map(|p| Some(Value::Point(p))).map_err(|e| {
            ConversionError::invalid_external(external.to_string(), &DataType::Point, e.to_string())
        })
    }

    fn internal_to_external(
        &self,
        internal: Option<&Value>,
    ) -> Result<ExternalValue, ConversionError> {
        match internal {
            None => Ok(ExternalValue::Json(JsonValue::Null)),
            Some(Value::Point(p)) => Ok(ExternalValue::Json(p.as_geo_json())),
            Some(other) => Err(ConversionError::type_mismatch(&DataType::Point, other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::CodecRegistry;
    use serde_json::json;

    fn codec(data_type: DataType) -> CodecRef {
        let registry = CodecRegistry::new(ConversionContext {
            null_strings: vec!["NULL".into()],
            ..Default::default()
        });
        registry.codec_for(ExternalFormat::Json, &data_type).unwrap()
    }

    fn node(v: JsonValue) -> ExternalValue {
        ExternalValue::Json(v)
    }

    #[test]
    fn scalars_accept_literals_and_strings() {
        let int = codec(DataType::Int);
        assert_eq!(int.external_to_internal(&node(json!(7))).unwrap(), Some(Value::Int(7)));
        assert_eq!(
            int.external_to_internal(&node(json!("7"))).unwrap(),
            Some(Value::Int(7))
        );
        assert_eq!(int.external_to_internal(&node(json!(null))).unwrap(), None);
        assert_eq!(int.external_to_internal(&node(json!(""))).unwrap(), None);
        assert!(int.external_to_internal(&node(json!([7]))).is_err());

        let flag = codec(DataType::Boolean);
        assert_eq!(
            flag.external_to_internal(&node(json!(true))).unwrap(),
            Some(Value::Boolean(true))
        );
        assert_eq!(
            flag.internal_to_external(Some(&Value::Boolean(false))).unwrap(),
            node(json!(false))
        );
    }

    #[test]
    fn text_columns_keep_nested_documents_verbatim() {
        let txt = codec(DataType::Text);
        assert_eq!(
            txt.external_to_internal(&node(json!({"a": 1}))).unwrap(),
            Some(Value::Text(r#"{"a":1}"#.into()))
        );
        assert_eq!(
            txt.external_to_internal(&node(json!(""))).unwrap(),
            Some(Value::Text(String::new()))
        );
    }

    #[test]
    fn non_finite_doubles_are_written_as_strings() {
        let dbl = codec(DataType::Double);
        assert_eq!(
            dbl.internal_to_external(Some(&Value::Double(1.5))).unwrap(),
            node(json!(1.5))
        );
        assert_eq!(
            dbl.internal_to_external(Some(&Value::Double(f64::NAN))).unwrap(),
            node(json!("NaN"))
        );
    }

    #[test]
    fn points_from_every_representation() {
        let point = codec(DataType::Point);
        let expected = Some(Value::Point(Point::new(-1.1, -2.2)));
        let geo = json!({"type": "Point", "coordinates": [-1.1, -2.2]});

        assert_eq!(
            point.external_to_internal(&node(json!("POINT (-1.1 -2.2)"))).unwrap(),
            expected
        );
        assert_eq!(
            point.external_to_internal(&node(json!(geo.to_string()))).unwrap(),
            expected
        );
        assert_eq!(point.external_to_internal(&node(geo.clone())).unwrap(), expected);
        assert_eq!(point.external_to_internal(&node(json!(""))).unwrap(), None);
        assert_eq!(point.external_to_internal(&node(json!("NULL"))).unwrap(), None);
        assert!(
            point
                .external_to_internal(&node(json!("not a valid point literal")))
                .is_err()
        );
        assert_eq!(
            point.internal_to_external(expected.as_ref()).unwrap(),
            node(geo)
        );
    }
}

use crate::{
    codec::{Codec, CodecRef, into_json},
    error::ConversionError,
};
use model::{
    core::{data_type::DataType, value::Value},
    records::external::{ExternalFormat, ExternalValue},
};
use serde_json::{Map, Value as JsonValue};
use std::collections::HashSet;

/// Lists and sets as JSON arrays. Sets drop duplicate elements, keeping the
/// first occurrence.
#[derive(Debug)]
pub struct JsonArrayCodec {
    data_type: DataType,
    element: CodecRef,
}

/// Maps as JSON objects. Keys go through the key codec as JSON strings.
#[derive(Debug)]
pub struct JsonMapCodec {
    data_type: DataType,
    key: CodecRef,
    value: CodecRef,
}

/// UDTs as JSON objects keyed by field name. Missing fields are absent,
/// unknown fields are an error.
#[derive(Debug)]
pub struct JsonUdtCodec {
    data_type: DataType,
    fields: Vec<(String, CodecRef)>,
}

impl JsonArrayCodec {
    pub fn new(data_type: DataType, element: CodecRef) -> Self {
        Self { data_type, element }
    }

    fn is_set(&self) -> bool {
        matches!(self.data_type, DataType::Set(_))
    }
}

impl JsonMapCodec {
    pub fn new(data_type: DataType, key: CodecRef, value: CodecRef) -> Self {
        Self {
            data_type,
            key,
            value,
        }
    }
}

impl JsonUdtCodec {
    pub fn new(data_type: DataType, fields: Vec<(String, CodecRef)>) -> Self {
        Self { data_type, fields }
    }
}

impl Codec for JsonArrayCodec {
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
        let Some(node) = document(external, &self.data_type)? else {
            return Ok(None);
        };
        let JsonValue::Array(items) = &node else {
            return Err(ConversionError::invalid_external(
                node.to_string(),
                &self.data_type,
                "expected a JSON array",
            ));
        };

        let mut values: Vec<Value> = Vec::with_capacity(items.len());
        let mut seen: HashSet<Value> = HashSet::new();
        for item in items {
            let value = self
                .element
                .external_to_internal(&ExternalValue::Json(item.clone()))?
                .ok_or_else(|| null_element(&node, &self.data_type))?;
            if self.is_set() && !seen.insert(value.clone()) {
                continue;
            }
            values.push(value);
        }

        Ok(Some(if self.is_set() {
            Value::Set(values)
        } else {
            Value::List(values)
        }))
    }

    fn internal_to_external(
        &self,
        internal: Option<&Value>,
    ) -> Result<ExternalValue, ConversionError> {
        let items = match internal {
            None => return Ok(ExternalValue::Json(JsonValue::Null)),
            Some(Value::List(items)) | Some(Value::Set(items)) => items,
            Some(other) => return Err(ConversionError::type_mismatch(&self.data_type, other)),
        };
        let nodes = items
            .iter()
            .map(|item| self.element.internal_to_external(Some(item)).map(into_json))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ExternalValue::Json(JsonValue::Array(nodes)))
    }
}

impl Codec for JsonMapCodec {
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
        let Some(node) = document(external, &self.data_type)? else {
            return Ok(None);
        };
        let JsonValue::Object(members) = &node else {
            return Err(ConversionError::invalid_external(
                node.to_string(),
                &self.data_type,
                "expected a JSON object",
            ));
        };

        let mut entries = Vec::with_capacity(members.len());
        for (k, v) in members {
            let key = self
                .key
                .external_to_internal(&ExternalValue::Json(JsonValue::String(k.clone())))?
                .ok_or_else(|| null_element(&node, &self.data_type))?;
            let value = self
                .value
                .external_to_internal(&ExternalValue::Json(v.clone()))?
                .ok_or_else(|| null_element(&node, &self.data_type))?;
            entries.push((key, value));
        }
        Ok(Some(Value::Map(entries)))
    }

    fn internal_to_external(
        &self,
        internal: Option<&Value>,
    ) -> Result<ExternalValue, ConversionError> {
        let entries = match internal {
            None => return Ok(ExternalValue::Json(JsonValue::Null)),
            Some(Value::Map(entries)) => entries,
            Some(other) => return Err(ConversionError::type_mismatch(&self.data_type, other)),
        };

        let mut members = Map::new();
        for (k, v) in entries {
            let key = match into_json(self.key.internal_to_external(Some(k))?) {
                JsonValue::String(s) => s,
                other => other.to_string(),
            };
            let value = into_json(self.value.internal_to_external(Some(v))?);
            members.insert(key, value);
        }
        Ok(ExternalValue::Json(JsonValue::Object(members)))
    }
}

impl Codec for JsonUdtCodec {
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
        let Some(node) = document(external, &self.data_type)? else {
            return Ok(None);
        };
        let JsonValue::Object(members) = &node else {
            return Err(ConversionError::invalid_external(
                node.to_string(),
                &self.data_type,
                "expected a JSON object",
            ));
        };

        if let Some(unknown) = members
            .keys()
            .find(|k| !self.fields.iter().any(|(name, _)| name.eq_ignore_ascii_case(k)))
        {
            return Err(ConversionError::invalid_external(
                node.to_string(),
                &self.data_type,
                format!("unknown field '{unknown}'"),
            ));
        }

        let mut fields = Vec::with_capacity(self.fields.len());
        for (name, codec) in &self.fields {
            let member = members
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v);
            let value = match member {
                Some(v) => codec.external_to_internal(&ExternalValue::Json(v.clone()))?,
                None => None,
            };
            fields.push((name.clone(), value));
        }
        Ok(Some(Value::Udt(fields)))
    }

    fn internal_to_external(
        &self,
        internal: Option<&Value>,
    ) -> Result<ExternalValue, ConversionError> {
        let values = match internal {
            None => return Ok(ExternalValue::Json(JsonValue::Null)),
            Some(Value::Udt(values)) => values,
            Some(other) => return Err(ConversionError::type_mismatch(&self.data_type, other)),
        };

        let mut members = Map::new();
        for (name, codec) in &self.fields {
            let value = values
                .iter()
                .find(|(n, _)| n.eq_ignore_ascii_case(name))
                .and_then(|(_, v)| v.as_ref());
            members.insert(name.clone(), into_json(codec.internal_to_external(value)?));
        }
        Ok(ExternalValue::Json(JsonValue::Object(members)))
    }
}

/// The JSON document held by `external`. A string node or plain text is
/// parsed as embedded JSON; null and blank input read as absent.
fn document(
    external: &ExternalValue,
    data_type: &DataType,
) -> Result<Option<JsonValue>, ConversionError> {
    let raw = match external {
        ExternalValue::Null | ExternalValue::Json(JsonValue::Null) => return Ok(None),
        ExternalValue::Json(JsonValue::String(s)) | ExternalValue::Text(s) => s,
        ExternalValue::Json(node) => return Ok(Some(node.clone())),
    };
    if raw.trim().is_empty() {
        return Ok(None);
    }
    serde_json::from_str(raw)
        .map(Some)
        .map_err(|e| ConversionError::invalid_external(raw.as_str(), data_type, format!("invalid JSON: {e}")))
}

fn null_element(node: &JsonValue, data_type: &DataType) -> ConversionError {
    ConversionError::invalid_external(
        node.to_string(),
        data_type,
        "collection elements cannot be null",
    )
}

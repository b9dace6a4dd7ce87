use crate::core::value::{FieldValue, Value};
use serde::{Deserialize, Serialize};

/// A result row read back from the store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Row {
    pub field_values: Vec<FieldValue>,
    /// Write timestamp of the row in microseconds, when requested.
    pub write_time: Option<i64>,
}

impl Row {
    pub fn new(field_values: Vec<FieldValue>) -> Self {
        Row {
            field_values,
            write_time: None,
        }
    }

    pub fn with_write_time(mut self, micros: i64) -> Self {
        self.write_time = Some(micros);
        self
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.field_values
            .iter()
            .find(|f| f.name.eq_ignore_ascii_case(field))
    }

    pub fn get_value(&self, field: &str) -> Option<&Value> {
        self.get(field).and_then(|f| f.value.as_ref())
    }

    pub fn size_bytes(&self) -> usize {
        self.field_values.iter().map(FieldValue::size_bytes).sum()
    }
}

use crate::core::{data_type::DataType, geo::Point};
use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, hash::Hash, net::IpAddr};
use uuid::Uuid;

/// A present, typed internal value. Absence is modelled as `Option::None`
/// wherever a value may be missing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Value {
    Boolean(bool),
    Int(i32),
    BigInt(i64),
    Float(f32),
    Double(f64),
    Decimal(BigDecimal),
    Text(String),
    Uuid(Uuid),
    Inet(IpAddr),
    Date(NaiveDate),
    Time(NaiveTime),
    Timestamp(DateTime<Utc>),
    Blob(Vec<u8>),
    Point(Point),
    List(Vec<Value>),
    Set(Vec<Value>),
    Map(Vec<(Value, Value)>),
    Udt(Vec<(String, Option<Value>)>),
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        use Value::*;
        std::mem::discriminant(self).hash(state);
        match self {
            Boolean(v) => v.hash(state),
            Int(v) => v.hash(state),
            BigInt(v) => v.hash(state),
            Float(v) => v.to_bits().hash(state),
            Double(v) => v.to_bits().hash(state),
            Decimal(v) => v.hash(state),
            Text(v) => v.hash(state),
            Uuid(v) => v.hash(state),
            Inet(v) => v.hash(state),
            Date(v) => v.hash(state),
            Time(v) => v.hash(state),
            Timestamp(v) => v.hash(state),
            Blob(v) => v.hash(state),
            Point(v) => v.hash(state),
            List(v) | Set(v) => v.hash(state),
            Map(entries) => entries.hash(state),
            Udt(fields) => fields.hash(state),
        }
    }
}

impl Value {
    /// Whether this value is an acceptable instance of `data_type`. The store
    /// uses this to reject statements whose bound values do not fit the table.
    pub fn conforms_to(&self, data_type: &DataType) -> bool {
        match (self, data_type) {
            (Value::Boolean(_), DataType::Boolean)
            | (Value::Int(_), DataType::Int)
            | (Value::BigInt(_), DataType::BigInt)
            | (Value::Float(_), DataType::Float)
            | (Value::Double(_), DataType::Double)
            | (Value::Decimal(_), DataType::Decimal)
            | (Value::Text(_), DataType::Text)
            | (Value::Uuid(_), DataType::Uuid)
            | (Value::Inet(_), DataType::Inet)
            | (Value::Date(_), DataType::Date)
            | (Value::Time(_), DataType::Time)
            | (Value::Timestamp(_), DataType::Timestamp)
            | (Value::Blob(_), DataType::Blob)
            | (Value::Point(_), DataType::Point) => true,
            (Value::List(items), DataType::List(elem)) | (Value::Set(items), DataType::Set(elem)) => {
                items.iter().all(|item| item.conforms_to(elem))
            }
            (Value::Map(entries), DataType::Map(key, value)) => entries
                .iter()
                .all(|(k, v)| k.conforms_to(key) && v.conforms_to(value)),
            (Value::Udt(fields), DataType::Udt(udt)) => fields.iter().all(|(name, v)| {
                match (udt.field(name), v) {
                    (Some(field_type), Some(v)) => v.conforms_to(field_type),
                    (Some(_), None) => true,
                    (None, _) => false,
                }
            }),
            _ => false,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v as i64),
            Value::BigInt(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::Timestamp(ts) => Some(*ts),
            _ => None,
        }
    }

    /// Stable byte form used to fingerprint routing keys.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        match self {
            Value::Blob(bytes) => bytes.clone(),
            Value::Text(s) => s.as_bytes().to_vec(),
            other => other.to_string().into_bytes(),
        }
    }

    pub fn size_bytes(&self) -> usize {
        match self {
            Value::Boolean(_) => 1,
            Value::Int(_) | Value::Float(_) | Value::Date(_) => 4,
            Value::BigInt(_) | Value::Double(_) | Value::Time(_) | Value::Timestamp(_) => 8,
            Value::Decimal(d) => d.to_string().len(),
            Value::Text(s) => s.len(),
            Value::Uuid(_) => 16,
            Value::Inet(IpAddr::V4(_)) => 4,
            Value::Inet(IpAddr::V6(_)) => 16,
            Value::Blob(b) => b.len(),
            Value::Point(_) => 21, // WKB: byte order + type + two doubles
            Value::List(items) | Value::Set(items) => items.iter().map(Value::size_bytes).sum(),
            Value::Map(entries) => entries
                .iter()
                .map(|(k, v)| k.size_bytes() + v.size_bytes())
                .sum(),
            Value::Udt(fields) => fields
                .iter()
                .map(|(_, v)| v.as_ref().map_or(0, Value::size_bytes))
                .sum(),
        }
    }
}

/// A named, typed slot of a statement or result row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldValue {
    pub name: String,
    pub value: Option<Value>,
    pub data_type: DataType,
}

impl FieldValue {
    pub fn new(name: impl Into<String>, value: Option<Value>, data_type: DataType) -> Self {
        FieldValue {
            name: name.into(),
            value,
            data_type,
        }
    }

    pub fn size_bytes(&self) -> usize {
        self.value.as_ref().map_or(0, Value::size_bytes)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Boolean(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::BigInt(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Double(v) => write!(f, "{v}"),
            Value::Decimal(v) => write!(f, "{v}"),
            Value::Text(v) => write!(f, "'{}'", v.replace('\'', "''")),
            Value::Uuid(v) => write!(f, "{v}"),
            Value::Inet(v) => write!(f, "'{v}'"),
            Value::Date(v) => write!(f, "'{v}'"),
            Value::Time(v) => write!(f, "'{v}'"),
            Value::Timestamp(v) => write!(f, "'{}'", v.to_rfc3339()),
            Value::Blob(v) => {
                let hex = v
                    .iter()
                    .fold(String::new(), |acc, byte: &u8| acc + &format!("{byte:02x}"));
                write!(f, "0x{hex}")
            }
            Value::Point(p) => write!(f, "'{p}'"),
            Value::List(items) => write!(f, "[{}]", join(items)),
            Value::Set(items) => write!(f, "{{{}}}", join(items)),
            Value::Map(entries) => {
                let body = entries
                    .iter()
                    .map(|(k, v)| format!("{k}: {v}"))
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "{{{body}}}")
            }
            Value::Udt(fields) => {
                let body = fields
                    .iter()
                    .map(|(name, v)| match v {
                        Some(v) => format!("{name}: {v}"),
                        None => format!("{name}: null"),
                    })
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "{{{body}}}")
            }
        }
    }
}

fn join(items: &[Value]) -> String {
    items
        .iter()
        .map(Value::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::data_type::UdtType;

    #[test]
    fn conformance_checks_nested_types() {
        let list = Value::List(vec![Value::Int(1), Value::Int(2)]);
        assert!(list.conforms_to(&DataType::List(Box::new(DataType::Int))));
        assert!(!list.conforms_to(&DataType::List(Box::new(DataType::BigInt))));

        let udt = DataType::Udt(UdtType::new(
            "address",
            vec![("street".into(), DataType::Text), ("zip".into(), DataType::Int)],
        ));
        let value = Value::Udt(vec![
            ("street".into(), Some(Value::Text("Main".into()))),
            ("zip".into(), None),
        ]);
        assert!(value.conforms_to(&udt));
    }

    #[test]
    fn display_escapes_quotes() {
        assert_eq!(Value::Text("it's".into()).to_string(), "'it''s'");
        assert_eq!(Value::Blob(vec![0xca, 0xfe]).to_string(), "0xcafe");
    }
}

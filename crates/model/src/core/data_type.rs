use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::{borrow::Cow, collections::HashMap, fmt};

/// Internal column type as understood by the target store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum DataType {
    Boolean,
    Int,
    BigInt,
    Float,
    Double,
    Decimal,
    Text,
    Uuid,
    Inet,
    Date,
    Time,
    Timestamp,
    Blob,
    Point,
    List(Box<DataType>),
    Set(Box<DataType>),
    Map(Box<DataType>, Box<DataType>),
    Udt(UdtType),
}

/// A user-defined type: an ordered set of named, typed fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct UdtType {
    pub name: String,
    pub fields: Vec<(String, DataType)>,
}

/// Coarse classification used as the registry key for codec lookup.
///
/// Collections are keyed by their shape only; element codecs are resolved
/// recursively from the element types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeKind {
    Boolean,
    Int,
    BigInt,
    Float,
    Double,
    Decimal,
    Text,
    Uuid,
    Inet,
    Date,
    Time,
    Timestamp,
    Blob,
    Point,
    List,
    Set,
    Map,
    Udt,
}

lazy_static! {
    static ref SCALAR_TYPE_MAP: HashMap<&'static str, DataType> = build_scalar_type_map();
}

impl DataType {
    /// Parses a store type name such as `bigint`, `list<int>` or
    /// `frozen<map<text, timestamp>>`. UDTs cannot be described by name alone
    /// and are built through [`UdtType`].
    pub fn from_cql(type_name: &str) -> Result<Self, String> {
        let trimmed = type_name.trim();
        let lower = trimmed.to_ascii_lowercase();

        if let Some(inner) = strip_generic(&lower, "frozen") {
            return Self::from_cql(inner);
        }
        if let Some(inner) = strip_generic(&lower, "list") {
            return Ok(DataType::List(Box::new(Self::from_cql(inner)?)));
        }
        if let Some(inner) = strip_generic(&lower, "set") {
            return Ok(DataType::Set(Box::new(Self::from_cql(inner)?)));
        }
        if let Some(inner) = strip_generic(&lower, "map") {
            let (key, value) = split_top_level(inner)
                .ok_or_else(|| format!("Malformed map type: {type_name}"))?;
            return Ok(DataType::Map(
                Box::new(Self::from_cql(key)?),
                Box::new(Self::from_cql(value)?),
            ));
        }

        let normalized = lower.trim_matches('\'');
        SCALAR_TYPE_MAP
            .get(normalized)
            .cloned()
            .ok_or_else(|| format!("Unknown column type: {type_name}"))
    }

    pub fn kind(&self) -> TypeKind {
        match self {
            DataType::Boolean => TypeKind::Boolean,
            DataType::Int => TypeKind::Int,
            DataType::BigInt => TypeKind::BigInt,
            DataType::Float => TypeKind::Float,
            DataType::Double => TypeKind::Double,
            DataType::Decimal => TypeKind::Decimal,
            DataType::Text => TypeKind::Text,
            DataType::Uuid => TypeKind::Uuid,
            DataType::Inet => TypeKind::Inet,
            DataType::Date => TypeKind::Date,
            DataType::Time => TypeKind::Time,
            DataType::Timestamp => TypeKind::Timestamp,
            DataType::Blob => TypeKind::Blob,
            DataType::Point => TypeKind::Point,
            DataType::List(_) => TypeKind::List,
            DataType::Set(_) => TypeKind::Set,
            DataType::Map(_, _) => TypeKind::Map,
            DataType::Udt(_) => TypeKind::Udt,
        }
    }

    pub fn cql_name(&self) -> Cow<'_, str> {
        match self {
            DataType::Boolean => Cow::Borrowed("boolean"),
            DataType::Int => Cow::Borrowed("int"),
            DataType::BigInt => Cow::Borrowed("bigint"),
            DataType::Float => Cow::Borrowed("float"),
            DataType::Double => Cow::Borrowed("double"),
            DataType::Decimal => Cow::Borrowed("decimal"),
            DataType::Text => Cow::Borrowed("text"),
            DataType::Uuid => Cow::Borrowed("uuid"),
            DataType::Inet => Cow::Borrowed("inet"),
            DataType::Date => Cow::Borrowed("date"),
            DataType::Time => Cow::Borrowed("time"),
            DataType::Timestamp => Cow::Borrowed("timestamp"),
            DataType::Blob => Cow::Borrowed("blob"),
            DataType::Point => Cow::Borrowed("'PointType'"),
            DataType::List(elem) => Cow::Owned(format!("list<{}>", elem.cql_name())),
            DataType::Set(elem) => Cow::Owned(format!("set<{}>", elem.cql_name())),
            DataType::Map(key, value) => {
                Cow::Owned(format!("map<{}, {}>", key.cql_name(), value.cql_name()))
            }
            DataType::Udt(udt) => Cow::Owned(format!("frozen<{}>", udt.name)),
        }
    }

    pub fn is_collection(&self) -> bool {
        matches!(
            self,
            DataType::List(_) | DataType::Set(_) | DataType::Map(_, _) | DataType::Udt(_)
        )
    }

    /// Types whose external form is free text: an empty string is a legal
    /// value rather than an absent one.
    pub fn is_textual(&self) -> bool {
        matches!(self, DataType::Text)
    }
}

impl UdtType {
    pub fn new(name: impl Into<String>, fields: Vec<(String, DataType)>) -> Self {
        Self {
            name: name.into(),
            fields,
        }
    }

    pub fn field(&self, name: &str) -> Option<&DataType> {
        self.fields
            .iter()
            .find(|(field, _)| field.eq_ignore_ascii_case(name))
            .map(|(_, data_type)| data_type)
    }
}

impl TryFrom<&str> for DataType {
    type Error = String;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        DataType::from_cql(s)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.cql_name())
    }
}

fn strip_generic<'a>(type_name: &'a str, prefix: &str) -> Option<&'a str> {
    let rest = type_name.strip_prefix(prefix)?.trim_start();
    let inner = rest.strip_prefix('<')?.strip_suffix('>')?;
    Some(inner.trim())
}

/// Splits `k, v` on the first comma that is not nested inside `<...>`.
fn split_top_level(inner: &str) -> Option<(&str, &str)> {
    let mut depth = 0usize;
    for (idx, ch) in inner.char_indices() {
        match ch {
            '<' => depth += 1,
            '>' => depth = depth.checked_sub(1)?,
            ',' if depth == 0 => return Some((inner[..idx].trim(), inner[idx + 1..].trim())),
            _ => {}
        }
    }
    None
}

fn build_scalar_type_map() -> HashMap<&'static str, DataType> {
    use DataType::*;

    let entries = [
        ("boolean", Boolean),
        ("int", Int),
        ("bigint", BigInt),
        ("counter", BigInt),
        ("float", Float),
        ("double", Double),
        ("decimal", Decimal),
        ("text", Text),
        ("varchar", Text),
        ("ascii", Text),
        ("uuid", Uuid),
        ("timeuuid", Uuid),
        ("inet", Inet),
        ("date", Date),
        ("time", Time),
        ("timestamp", Timestamp),
        ("blob", Blob),
        ("point", Point),
        ("pointtype", Point),
        ("org.apache.cassandra.db.marshal.pointtype", Point),
    ];

    let mut map = HashMap::new();
    for (name, data_type) in entries {
        map.insert(name, data_type);
    }
    map
}

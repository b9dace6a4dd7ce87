use crate::records::external::ExternalValue;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Where a record came from: a resource (file, URL) and a position in it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocator {
    pub resource: String,
    pub position: u64,
}

impl SourceLocator {
    pub fn new(resource: impl Into<String>, position: u64) -> Self {
        Self {
            resource: resource.into(),
            position,
        }
    }
}

impl fmt::Display for SourceLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.resource, self.position)
    }
}

/// Identifies a record field either by name or by zero-based position.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldRef {
    Named(String),
    Indexed(usize),
}

impl FromStr for FieldRef {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(());
        }
        match trimmed.parse::<usize>() {
            Ok(index) => Ok(FieldRef::Indexed(index)),
            Err(_) => Ok(FieldRef::Named(unquote(trimmed).to_string())),
        }
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldRef::Named(name) => f.write_str(name),
            FieldRef::Indexed(index) => write!(f, "{index}"),
        }
    }
}

/// One external record: raw field values plus the locator used for error
/// attribution. Immutable once built by a connector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub locator: SourceLocator,
    /// The record as it appeared in the source, when the connector kept it.
    pub source: Option<String>,
    names: Vec<String>,
    values: Vec<ExternalValue>,
}

impl Record {
    /// A record whose fields are addressable by name and by position.
    pub fn named<I, K>(locator: SourceLocator, fields: I) -> Self
    where
        I: IntoIterator<Item = (K, ExternalValue)>,
        K: Into<String>,
    {
        let (names, values) = fields.into_iter().map(|(k, v)| (k.into(), v)).unzip();
        Self {
            locator,
            source: None,
            names,
            values,
        }
    }

    /// A record whose fields are addressable by position only.
    pub fn indexed(locator: SourceLocator, values: Vec<ExternalValue>) -> Self {
        Self {
            locator,
            source: None,
            names: Vec::new(),
            values,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn get(&self, field: &FieldRef) -> Option<&ExternalValue> {
        match field {
            FieldRef::Indexed(index) => self.values.get(*index),
            FieldRef::Named(name) => self
                .names
                .iter()
                .position(|n| n == name)
                .or_else(|| self.names.iter().position(|n| n.eq_ignore_ascii_case(name)))
                .and_then(|idx| self.values.get(idx)),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn field_names(&self) -> &[String] {
        &self.names
    }

    pub fn values(&self) -> &[ExternalValue] {
        &self.values
    }

    /// The raw source when available, otherwise a rendering of the fields.
    pub fn source_text(&self) -> String {
        if let Some(source) = &self.source {
            return source.clone();
        }
        if self.names.is_empty() {
            return self
                .values
                .iter()
                .map(ExternalValue::to_string)
                .collect::<Vec<_>>()
                .join(",");
        }
        let fields = self
            .names
            .iter()
            .zip(&self.values)
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(", ");
        format!("{{{fields}}}")
    }
}

fn unquote(s: &str) -> &str {
    s.strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .unwrap_or(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_records_resolve_by_name_and_position() {
        let record = Record::named(
            SourceLocator::new("file.json", 1),
            [
                ("key", ExternalValue::text("1")),
                ("Value", ExternalValue::text("a")),
            ],
        );
        assert_eq!(
            record.get(&FieldRef::Named("value".into())),
            Some(&ExternalValue::text("a"))
        );
        assert_eq!(
            record.get(&FieldRef::Indexed(0)),
            Some(&ExternalValue::text("1"))
        );
        assert_eq!(record.get(&FieldRef::Named("missing".into())), None);
    }

    #[test]
    fn field_refs_parse_indexes_and_quoted_names() {
        assert_eq!("2".parse::<FieldRef>(), Ok(FieldRef::Indexed(2)));
        assert_eq!(
            "\"my source\"".parse::<FieldRef>(),
            Ok(FieldRef::Named("my source".into()))
        );
        assert!("  ".parse::<FieldRef>().is_err());
    }
}

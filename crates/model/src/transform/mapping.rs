use crate::{execution::errors::MappingParseError, records::record::FieldRef};
use std::{collections::HashMap, fmt};

/// Pseudo-column that binds a field to the statement's write timestamp.
pub const WRITE_TIME_COLUMN: &str = "writetime(*)";

/// What a record field is bound to on the store side.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MappingTarget {
    Column(String),
    WriteTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingEntry {
    pub field: FieldRef,
    pub target: MappingTarget,
}

/// Fixed, bidirectional association between record fields and columns.
///
/// Every field maps to exactly one target and every target is mapped from
/// exactly one field. Column lookups are case-insensitive.
#[derive(Debug, Clone, Default)]
pub struct FieldMapping {
    entries: Vec<MappingEntry>,
    field_to_entry: HashMap<FieldRef, usize>,
    target_to_entry: HashMap<MappingTarget, usize>,
}

impl FieldMapping {
    pub fn new(entries: Vec<MappingEntry>) -> Result<Self, MappingParseError> {
        let mut mapping = FieldMapping::default();
        for entry in entries {
            mapping.push(entry)?;
        }
        Ok(mapping)
    }

    /// Parses `field=column` pairs separated by commas. Fields may be names or
    /// zero-based indexes; either side may be double-quoted to keep commas,
    /// `=` or spaces.
    pub fn parse(input: &str) -> Result<Self, MappingParseError> {
        let mut entries = Vec::new();
        for pair in split_unquoted(input, ',') {
            let pair = pair.trim();
            if pair.is_empty() {
                continue;
            }

            let parts = split_unquoted(pair, '=');
            let [field, column] = parts.as_slice() else {
                return Err(MappingParseError::MalformedEntry(pair.to_string()));
            };

            let field = field
                .parse::<FieldRef>()
                .map_err(|_| MappingParseError::MalformedEntry(pair.to_string()))?;
            let column = unquote(column.trim());
            if column.is_empty() {
                return Err(MappingParseError::MalformedEntry(pair.to_string()));
            }

            let target = if column.eq_ignore_ascii_case(WRITE_TIME_COLUMN) {
                MappingTarget::WriteTime
            } else {
                MappingTarget::Column(column.to_string())
            };
            entries.push(MappingEntry { field, target });
        }

        if entries.is_empty() {
            return Err(MappingParseError::Empty);
        }
        Self::new(entries)
    }

    /// Maps each column from the record field of the same name.
    pub fn identity<'a>(columns: impl IntoIterator<Item = &'a str>) -> Self {
        let mut mapping = FieldMapping::default();
        for column in columns {
            // Column names are unique in a table, so this cannot collide.
            let _ = mapping.push(MappingEntry {
                field: FieldRef::Named(column.to_string()),
                target: MappingTarget::Column(column.to_string()),
            });
        }
        mapping
    }

    fn push(&mut self, entry: MappingEntry) -> Result<(), MappingParseError> {
        let target_key = normalize(&entry.target);
        if self.field_to_entry.contains_key(&entry.field) {
            return Err(MappingParseError::DuplicateField(entry.field.to_string()));
        }
        if self.target_to_entry.contains_key(&target_key) {
            return Err(MappingParseError::DuplicateColumn(entry.target.to_string()));
        }

        let idx = self.entries.len();
        self.field_to_entry.insert(entry.field.clone(), idx);
        self.target_to_entry.insert(target_key, idx);
        self.entries.push(entry);
        Ok(())
    }

    pub fn entries(&self) -> &[MappingEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve field -> target (load direction).
    pub fn target_for(&self, field: &FieldRef) -> Option<&MappingTarget> {
        self.field_to_entry
            .get(field)
            .map(|idx| &self.entries[*idx].target)
    }

    /// Reverse resolve column -> field (unload direction).
    pub fn field_for(&self, column: &str) -> Option<&FieldRef> {
        self.target_to_entry
            .get(&normalize(&MappingTarget::Column(column.to_string())))
            .map(|idx| &self.entries[*idx].field)
    }

    pub fn write_time_field(&self) -> Option<&FieldRef> {
        self.target_to_entry
            .get(&MappingTarget::WriteTime)
            .map(|idx| &self.entries[*idx].field)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().filter_map(|e| match &e.target {
            MappingTarget::Column(c) => Some(c.as_str()),
            MappingTarget::WriteTime => None,
        })
    }
}

impl fmt::Display for MappingTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MappingTarget::Column(c) => f.write_str(c),
            MappingTarget::WriteTime => f.write_str(WRITE_TIME_COLUMN),
        }
    }
}

fn normalize(target: &MappingTarget) -> MappingTarget {
    match target {
        MappingTarget::Column(c) => MappingTarget::Column(c.to_ascii_lowercase()),
        MappingTarget::WriteTime => MappingTarget::WriteTime,
    }
}

fn unquote(s: &str) -> &str {
    s.strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .unwrap_or(s)
}

fn split_unquoted(s: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut in_quotes = false;
    let mut start = 0;
    for (idx, ch) in s.char_indices() {
        if ch == '"' {
            in_quotes = !in_quotes;
        } else if ch == sep && !in_quotes {
            parts.push(&s[start..idx]);
            start = idx + ch.len_utf8();
        }
    }
    parts.push(&s[start..]);
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_named_indexed_and_quoted_entries() {
        let mapping =
            FieldMapping::parse(r#"0=key, "my source"="my destination", ts=writetime(*)"#)
                .unwrap();
        assert_eq!(mapping.len(), 3);
        assert_eq!(
            mapping.target_for(&FieldRef::Indexed(0)),
            Some(&MappingTarget::Column("key".into()))
        );
        assert_eq!(
            mapping.field_for("MY DESTINATION"),
            Some(&FieldRef::Named("my source".into()))
        );
        assert_eq!(
            mapping.write_time_field(),
            Some(&FieldRef::Named("ts".into()))
        );
        assert_eq!(mapping.columns().collect::<Vec<_>>(), ["key", "my destination"]);
    }

    #[test]
    fn rejects_fan_out_in_either_direction() {
        assert_eq!(
            FieldMapping::parse("a=x,a=y").unwrap_err(),
            MappingParseError::DuplicateField("a".into())
        );
        assert_eq!(
            FieldMapping::parse("a=x,b=X").unwrap_err(),
            MappingParseError::DuplicateColumn("X".into())
        );
    }

    #[test]
    fn rejects_malformed_entries() {
        assert!(matches!(
            FieldMapping::parse("a=b=c"),
            Err(MappingParseError::MalformedEntry(_))
        ));
        assert!(matches!(
            FieldMapping::parse("a="),
            Err(MappingParseError::MalformedEntry(_))
        ));
        assert_eq!(FieldMapping::parse(" , ").unwrap_err(), MappingParseError::Empty);
    }
}

use crate::core::{data_type::DataType, value::Value};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ColumnKind {
    PartitionKey,
    Clustering,
    Regular,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ColumnMetadata {
    pub name: String,
    pub data_type: DataType,
    pub kind: ColumnKind,
    /// Value bound when the record provides none.
    pub default: Option<Value>,
}

/// Shape of the target table, supplied by the session at setup time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TableMetadata {
    pub keyspace: String,
    pub name: String,
    pub columns: Vec<ColumnMetadata>,
}

impl ColumnMetadata {
    pub fn new(name: impl Into<String>, data_type: DataType, kind: ColumnKind) -> Self {
        Self {
            name: name.into(),
            data_type,
            kind,
            default: None,
        }
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn is_primary_key(&self) -> bool {
        matches!(self.kind, ColumnKind::PartitionKey | ColumnKind::Clustering)
    }
}

impl TableMetadata {
    pub fn new(keyspace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            keyspace: keyspace.into(),
            name: name.into(),
            columns: Vec::new(),
        }
    }

    pub fn column(mut self, column: ColumnMetadata) -> Self {
        self.columns.push(column);
        self
    }

    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.keyspace, self.name)
    }

    pub fn get(&self, column: &str) -> Option<&ColumnMetadata> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(column))
    }

    pub fn partition_key(&self) -> impl Iterator<Item = &ColumnMetadata> {
        self.columns
            .iter()
            .filter(|c| c.kind == ColumnKind::PartitionKey)
    }

    pub fn primary_key(&self) -> impl Iterator<Item = &ColumnMetadata> {
        self.partition_key().chain(
            self.columns
                .iter()
                .filter(|c| c.kind == ColumnKind::Clustering),
        )
    }
}

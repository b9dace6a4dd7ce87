use crate::error::{MapperSetupError, MappingError};
use codecs::{CodecRef, CodecRegistry};
use engine_core::{
    metrics::Metrics,
    statement::{BoundStatement, RoutingKey},
};
use model::{
    core::{
        table::{ColumnKind, ColumnMetadata, TableMetadata},
        value::{FieldValue, Value},
    },
    records::{
        external::{ExternalFormat, ExternalValue},
        record::{FieldRef, Record, SourceLocator},
        row::Row,
    },
    transform::mapping::{FieldMapping, WRITE_TIME_COLUMN},
};
use std::sync::Arc;
use tracing::{debug, warn};

/// Binds record fields to table columns and back.
///
/// Every codec is resolved when the mapper is built, so an unsupported
/// (format, type) pair fails the run before the first record is read.
pub struct RecordMapper {
    table: Arc<str>,
    bindings: Vec<ColumnBinding>,
    write_time: Option<(FieldRef, CodecRef)>,
    allow_missing_fields: bool,
    metrics: Metrics,
}

struct ColumnBinding {
    column: ColumnMetadata,
    field: Option<FieldRef>,
    codec: CodecRef,
    partition_key: bool,
}

impl RecordMapper {
    /// `mapping` defaults to binding every column from the field of the
    /// same name.
    pub fn new(
        table: &TableMetadata,
        mapping: Option<&FieldMapping>,
        registry: &CodecRegistry,
        format: ExternalFormat,
        allow_missing_fields: bool,
        metrics: Metrics,
    ) -> Result<Self, MapperSetupError> {
        let identity;
        let mapping = match mapping {
            Some(mapping) => mapping,
            None => {
                identity = FieldMapping::identity(table.columns.iter().map(|c| c.name.as_str()));
                &identity
            }
        };

        for column in mapping.columns() {
            if table.get(column).is_none() {
                return Err(MapperSetupError::UnknownColumn {
                    table: table.qualified_name(),
                    column: column.to_string(),
                });
            }
        }

        let mut bindings = Vec::with_capacity(table.columns.len());
        for column in &table.columns {
            let codec = registry.codec_for(format, &column.data_type)?;
            let field = mapping.field_for(&column.name).cloned();
            if field.is_none() && column.default.is_none() && column.is_primary_key() {
                warn!(
                    table = %table.qualified_name(),
                    column = %column.name,
                    "Primary key column is not mapped; every record will fail"
                );
            }
            bindings.push(ColumnBinding {
                partition_key: column.kind == ColumnKind::PartitionKey,
                column: column.clone(),
                field,
                codec,
            });
        }

        let write_time = match mapping.write_time_field() {
            Some(field) => Some((field.clone(), registry.write_time_codec(format)?)),
            None => None,
        };

        debug!(
            table = %table.qualified_name(),
            format = %format,
            columns = bindings.len(),
            write_time = write_time.is_some(),
            "Record mapper ready"
        );

        Ok(Self {
            table: Arc::from(table.qualified_name()),
            bindings,
            write_time,
            allow_missing_fields,
            metrics,
        })
    }

    pub fn table(&self) -> &Arc<str> {
        &self.table
    }

    /// Columns the mapper reads back on unload, in table order.
    pub fn mapped_columns(&self) -> Vec<String> {
        self.bindings
            .iter()
            .filter(|b| b.field.is_some())
            .map(|b| b.column.name.clone())
            .collect()
    }

    pub fn maps_write_time(&self) -> bool {
        self.write_time.is_some()
    }

    /// Converts every mapped field of `record`. The record either converts
    /// fully or is rejected; nothing is bound from a failed record.
    pub fn map(&self, record: Arc<Record>) -> Result<BoundStatement, MappingError> {
        self.metrics.increment_records(1);

        let mut values = Vec::with_capacity(self.bindings.len());
        let mut partition_values = Vec::new();

        for binding in &self.bindings {
            let column = &binding.column;
            let raw = binding
                .field
                .as_ref()
                .and_then(|f| record.get(f).map(|raw| (f, raw)));

            let value = match raw {
                Some((field, raw)) => binding.codec.external_to_internal(raw).map_err(|source| {
                    MappingError::Conversion {
                        field: field.to_string(),
                        column: column.name.clone(),
                        source,
                    }
                })?,
                None => match &column.default {
                    Some(default) => Some(default.clone()),
                    None if self.allow_missing_fields && !column.is_primary_key() => continue,
                    None => return Err(missing(binding)),
                },
            };

            if value.is_none() && column.is_primary_key() {
                return Err(MappingError::NullPrimaryKey {
                    column: column.name.clone(),
                });
            }
            if binding.partition_key
                && let Some(v) = &value
            {
                partition_values.push(v.clone());
            }
            values.push(FieldValue::new(
                column.name.clone(),
                value,
                column.data_type.clone(),
            ));
        }

        let write_time = match &self.write_time {
            Some((field, codec)) => match record.get(field) {
                Some(raw) => codec
                    .external_to_internal(raw)
                    .map_err(|source| MappingError::Conversion {
                        field: field.to_string(),
                        column: WRITE_TIME_COLUMN.to_string(),
                        source,
                    })?
                    .as_ref()
                    .and_then(Value::as_i64),
                None => None,
            },
            None => None,
        };

        let routing_key =
            (!partition_values.is_empty()).then(|| RoutingKey::from_values(&partition_values));

        Ok(BoundStatement {
            record,
            table: self.table.clone(),
            values,
            routing_key,
            write_time,
        })
    }

    /// Converts a row read from the store back into a record located at
    /// `locator`.
    pub fn unmap(&self, row: &Row, locator: SourceLocator) -> Result<Record, MappingError> {
        self.metrics.increment_records(1);

        let mut fields: Vec<(FieldRef, ExternalValue)> = Vec::with_capacity(self.bindings.len());
        for binding in &self.bindings {
            let Some(field) = &binding.field else {
                continue;
            };
            let value = row.get_value(&binding.column.name);
            let external = binding.codec.internal_to_external(value).map_err(|source| {
                MappingError::Conversion {
                    field: field.to_string(),
                    column: binding.column.name.clone(),
                    source,
                }
            })?;
            fields.push((field.clone(), external));
        }

        if let Some((field, codec)) = &self.write_time {
            let micros = row.write_time.map(Value::BigInt);
            let external = codec.internal_to_external(micros.as_ref()).map_err(|source| {
                MappingError::Conversion {
                    field: field.to_string(),
                    column: WRITE_TIME_COLUMN.to_string(),
                    source,
                }
            })?;
            fields.push((field.clone(), external));
        }

        Ok(into_record(locator, fields))
    }
}

/// Builds a named record, or a positional one when every field is an index.
fn into_record(locator: SourceLocator, mut fields: Vec<(FieldRef, ExternalValue)>) -> Record {
    let all_indexed = fields.iter().all(|(f, _)| matches!(f, FieldRef::Indexed(_)));
    if all_indexed && !fields.is_empty() {
        fields.sort_by_key(|(f, _)| match f {
            FieldRef::Indexed(i) => *i,
            FieldRef::Named(_) => usize::MAX,
        });
        let width = fields
            .last()
            .map_or(0, |(f, _)| match f {
                FieldRef::Indexed(i) => i + 1,
                FieldRef::Named(_) => 0,
            });
        let mut values = vec![ExternalValue::Null; width];
        for (field, value) in fields {
            if let FieldRef::Indexed(i) = field {
                values[i] = value;
            }
        }
        return Record::indexed(locator, values);
    }
    Record::named(
        locator,
        fields.into_iter().map(|(f, v)| (f.to_string(), v)),
    )
}

fn missing(binding: &ColumnBinding) -> MappingError {
    let column = binding.column.name.clone();
    match &binding.field {
        Some(field) => MappingError::MissingField {
            field: field.to_string(),
            column,
        },
        None => MappingError::UnmappedColumn { column },
    }
}

use crate::{
    error::StoreError,
    session::Session,
    statement::{BoundStatement, Page, PagingState, ReadStatement, UnitOfWork},
};
use async_trait::async_trait;
use chrono::Utc;
use model::{
    core::{
        table::TableMetadata,
        value::{FieldValue, Value},
    },
    records::row::Row,
};
use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};
use tokio::sync::RwLock;
use tracing::debug;

pub type FaultInjector = dyn Fn(&BoundStatement) -> Option<StoreError> + Send + Sync;

/// An in-process store with typed tables.
///
/// Statements are validated against the table schema the way a real store
/// would validate them. Every unit is applied atomically: if any member
/// fails, nothing from the unit is written.
pub struct MemorySession {
    tables: RwLock<HashMap<String, MemoryTable>>,
    fault: Option<Arc<FaultInjector>>,
    latency: Duration,
    requests: AtomicU64,
    in_flight: Arc<AtomicU64>,
    peak_in_flight: AtomicU64,
}

struct MemoryTable {
    metadata: TableMetadata,
    rows: Vec<StoredRow>,
    index: HashMap<Vec<Value>, usize>,
}

struct StoredRow {
    values: Vec<Option<Value>>,
    write_time: i64,
}

impl MemorySession {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            fault: None,
            latency: Duration::ZERO,
            requests: AtomicU64::new(0),
            in_flight: Arc::new(AtomicU64::new(0)),
            peak_in_flight: AtomicU64::new(0),
        }
    }

    pub fn with_table(mut self, metadata: TableMetadata) -> Self {
        let key = table_key(&metadata.qualified_name());
        self.tables.get_mut().insert(
            key,
            MemoryTable {
                metadata,
                rows: Vec::new(),
                index: HashMap::new(),
            },
        );
        self
    }

    /// Consulted for every statement of every unit; returning an error
    /// fails the whole unit with it.
    pub fn with_fault<F>(mut self, fault: F) -> Self
    where
        F: Fn(&BoundStatement) -> Option<StoreError> + Send + Sync + 'static,
    {
        self.fault = Some(Arc::new(fault));
        self
    }

    /// Delay applied to every request before it is processed.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::SeqCst)
    }

    /// Highest number of requests observed in progress at the same time.
    pub fn peak_in_flight(&self) -> u64 {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    pub async fn row_count(&self, table: &str) -> usize {
        let tables = self.tables.read().await;
        tables.get(&table_key(table)).map_or(0, |t| t.rows.len())
    }

    /// All rows of `table` in insertion order, every column included.
    pub async fn rows(&self, table: &str) -> Vec<Row> {
        let tables = self.tables.read().await;
        let Some(t) = tables.get(&table_key(table)) else {
            return Vec::new();
        };
        t.rows
            .iter()
            .map(|row| t.to_row(row, &[], true))
            .collect()
    }

    /// Writes a row directly, bypassing fault injection.
    pub async fn insert_row(&self, table: &str, row: Row) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let t = tables
            .get_mut(&table_key(table))
            .ok_or_else(|| StoreError::UnknownTable(table.to_string()))?;
        t.validate(&row.field_values)?;
        let write_time = row.write_time.unwrap_or_else(now_micros);
        t.upsert(&row.field_values, write_time);
        Ok(())
    }

    fn enter(&self) -> InFlight {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        InFlight(self.in_flight.clone())
    }
}

impl Default for MemorySession {
    fn default() -> Self {
        Self::new()
    }
}

struct InFlight(Arc<AtomicU64>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Session for MemorySession {
    async fn table_metadata(
        &self,
        keyspace: &str,
        table: &str,
    ) -> Result<TableMetadata, StoreError> {
        let qualified = format!("{keyspace}.{table}");
        let tables = self.tables.read().await;
        tables
            .get(&table_key(&qualified))
            .map(|t| t.metadata.clone())
            .ok_or(StoreError::UnknownTable(qualified))
    }

    async fn execute(&self, unit: &UnitOfWork) -> Result<(), StoreError> {
        let _in_flight = self.enter();
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        if let Some(fault) = &self.fault {
            for stmt in unit.statements() {
                if let Some(err) = fault(stmt) {
                    debug!(table = %stmt.table, error = %err, "Injected fault");
                    return Err(err);
                }
            }
        }

        let mut tables = self.tables.write().await;
        for stmt in unit.statements() {
            let table = tables
                .get(&table_key(&stmt.table))
                .ok_or_else(|| StoreError::UnknownTable(stmt.table.to_string()))?;
            table.validate(&stmt.values)?;
        }

        let now = now_micros();
        for stmt in unit.statements() {
            if let Some(table) = tables.get_mut(&table_key(&stmt.table)) {
                table.upsert(&stmt.values, stmt.write_time.unwrap_or(now));
            }
        }
        Ok(())
    }

    async fn fetch_page(
        &self,
        statement: &ReadStatement,
        paging_state: Option<PagingState>,
    ) -> Result<Page, StoreError> {
        let _in_flight = self.enter();
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let tables = self.tables.read().await;
        let table = tables
            .get(&table_key(&statement.table))
            .ok_or_else(|| StoreError::UnknownTable(statement.table.to_string()))?;

        let offset = match paging_state {
            Some(PagingState(bytes)) => {
                let raw: [u8; 8] = bytes
                    .as_slice()
                    .try_into()
                    .map_err(|_| StoreError::InvalidQuery("corrupt paging state".into()))?;
                u64::from_le_bytes(raw) as usize
            }
            None => 0,
        };
        let page_size = statement.page_size.max(1);
        let end = (offset + page_size).min(table.rows.len());

        let rows = table.rows[offset.min(end)..end]
            .iter()
            .map(|row| table.to_row(row, &statement.columns, statement.with_write_time))
            .collect();
        let paging_state =
            (end < table.rows.len()).then(|| PagingState((end as u64).to_le_bytes().to_vec()));
        Ok(Page { rows, paging_state })
    }
}

impl MemoryTable {
    fn validate(&self, values: &[FieldValue]) -> Result<(), StoreError> {
        for fv in values {
            let column = self.metadata.get(&fv.name).ok_or_else(|| {
                StoreError::InvalidQuery(format!("Undefined column name {}", fv.name))
            })?;
            if let Some(value) = &fv.value
                && !value.conforms_to(&column.data_type)
            {
                return Err(StoreError::TypeMismatch {
                    column: column.name.clone(),
                    message: format!("expected {}, got {value}", column.data_type),
                });
            }
        }

        for pk in self.metadata.primary_key() {
            let bound = values
                .iter()
                .find(|fv| fv.name.eq_ignore_ascii_case(&pk.name))
                .and_then(|fv| fv.value.as_ref());
            if bound.is_none() {
                return Err(StoreError::InvalidQuery(format!(
                    "Invalid null value for primary key column {}",
                    pk.name
                )));
            }
        }
        Ok(())
    }

    fn upsert(&mut self, values: &[FieldValue], write_time: i64) {
        let lookup = |name: &str| {
            values
                .iter()
                .find(|fv| fv.name.eq_ignore_ascii_case(name))
        };
        let key: Vec<Value> = self
            .metadata
            .primary_key()
            .filter_map(|pk| lookup(&pk.name).and_then(|fv| fv.value.clone()))
            .collect();

        let idx = match self.index.get(&key) {
            Some(idx) => *idx,
            None => {
                self.rows.push(StoredRow {
                    values: vec![None; self.metadata.columns.len()],
                    write_time: i64::MIN,
                });
                self.index.insert(key, self.rows.len() - 1);
                self.rows.len() - 1
            }
        };

        let row = &mut self.rows[idx];
        // Last write wins, judged by write timestamp.
        if write_time < row.write_time {
            return;
        }
        row.write_time = write_time;
        for (slot, column) in row.values.iter_mut().zip(&self.metadata.columns) {
            if let Some(fv) = lookup(&column.name) {
                *slot = fv.value.clone();
            }
        }
    }

    fn to_row(&self, row: &StoredRow, columns: &[String], with_write_time: bool) -> Row {
        let field_values = self
            .metadata
            .columns
            .iter()
            .zip(&row.values)
            .filter(|(column, _)| {
                columns.is_empty() || columns.iter().any(|c| c.eq_ignore_ascii_case(&column.name))
            })
            .map(|(column, value)| {
                FieldValue::new(column.name.clone(), value.clone(), column.data_type.clone())
            })
            .collect();
        let out = Row::new(field_values);
        if with_write_time {
            out.with_write_time(row.write_time)
        } else {
            out
        }
    }
}

fn table_key(qualified: &str) -> String {
    qualified.to_ascii_lowercase()
}

fn now_micros() -> i64 {
    Utc::now().timestamp_micros()
}

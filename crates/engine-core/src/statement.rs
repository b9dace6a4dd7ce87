use model::{
    core::value::{FieldValue, Value},
    records::{record::Record, row::Row},
};
use std::{fmt::Write, sync::Arc};

/// Fingerprint of a statement's partition key values. Statements with equal
/// keys target the same partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RoutingKey(pub u64);

/// One record fully converted and bound to an insert into `table`.
#[derive(Debug, Clone)]
pub struct BoundStatement {
    pub record: Arc<Record>,
    pub table: Arc<str>,
    pub values: Vec<FieldValue>,
    pub routing_key: Option<RoutingKey>,
    /// Write timestamp in microseconds, when the mapping binds one.
    pub write_time: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchKind {
    /// Atomic: all members are applied or none are.
    Logged,
    /// Grouped for transport only.
    Unlogged,
}

#[derive(Debug, Clone)]
pub struct BatchStatement {
    pub kind: BatchKind,
    pub statements: Vec<BoundStatement>,
}

/// What the coordinator submits to the store in one request.
#[derive(Debug, Clone)]
pub enum UnitOfWork {
    Single(BoundStatement),
    Batch(BatchStatement),
}

/// A paged read of whole rows.
#[derive(Debug, Clone)]
pub struct ReadStatement {
    pub table: Arc<str>,
    pub columns: Vec<String>,
    pub with_write_time: bool,
    pub page_size: usize,
}

/// Opaque resume point handed back by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PagingState(pub Vec<u8>);

#[derive(Debug, Clone)]
pub struct Page {
    pub rows: Vec<Row>,
    pub paging_state: Option<PagingState>,
}

impl RoutingKey {
    pub fn from_values<'a>(values: impl IntoIterator<Item = &'a Value>) -> Self {
        let mut h = blake3::Hasher::new();
        for value in values {
            h.update(&value.canonical_bytes());
            h.update(b"\x00");
        }
        let digest = h.finalize();
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&digest.as_bytes()[..8]);
        RoutingKey(u64::from_le_bytes(prefix))
    }
}

impl BoundStatement {
    pub fn size_bytes(&self) -> usize {
        self.values.iter().map(FieldValue::size_bytes).sum()
    }
}

impl UnitOfWork {
    pub fn statements(&self) -> &[BoundStatement] {
        match self {
            UnitOfWork::Single(stmt) => std::slice::from_ref(stmt),
            UnitOfWork::Batch(batch) => &batch.statements,
        }
    }

    pub fn len(&self) -> usize {
        self.statements().len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements().is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = &Arc<Record>> {
        self.statements().iter().map(|s| &s.record)
    }

    pub fn size_bytes(&self) -> usize {
        self.statements().iter().map(BoundStatement::size_bytes).sum()
    }

    /// Whether a failure leaves none of the members applied.
    pub fn is_atomic(&self) -> bool {
        match self {
            UnitOfWork::Single(_) => true,
            UnitOfWork::Batch(batch) => batch.kind == BatchKind::Logged,
        }
    }
}

/// Renders units of work for error logs, bounded so that a large batch or a
/// huge blob cannot blow up a log entry.
#[derive(Debug, Clone, Copy)]
pub struct StatementPrinter {
    pub max_inner_statements: usize,
    pub max_value_length: usize,
}

impl Default for StatementPrinter {
    fn default() -> Self {
        Self {
            max_inner_statements: 10,
            max_value_length: 50,
        }
    }
}

impl StatementPrinter {
    pub fn print(&self, unit: &UnitOfWork) -> String {
        let mut out = String::new();
        match unit {
            UnitOfWork::Single(stmt) => self.print_statement(&mut out, stmt),
            UnitOfWork::Batch(batch) => {
                let kind = match batch.kind {
                    BatchKind::Logged => "BEGIN BATCH",
                    BatchKind::Unlogged => "BEGIN UNLOGGED BATCH",
                };
                let _ = writeln!(out, "{kind} [{} statements]", batch.statements.len());
                for stmt in batch.statements.iter().take(self.max_inner_statements) {
                    out.push_str("  ");
                    self.print_statement(&mut out, stmt);
                    out.push_str(";\n");
                }
                let hidden = batch
                    .statements
                    .len()
                    .saturating_sub(self.max_inner_statements);
                if hidden > 0 {
                    let _ = writeln!(out, "  ...({hidden} statements truncated)");
                }
                out.push_str("APPLY BATCH");
            }
        }
        out
    }

    fn print_statement(&self, out: &mut String, stmt: &BoundStatement) {
        let columns = stmt
            .values
            .iter()
            .map(|fv| fv.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let values = stmt
            .values
            .iter()
            .map(|fv| match &fv.value {
                Some(v) => self.truncate(v.to_string()),
                None => "NULL".to_string(),
            })
            .collect::<Vec<_>>()
            .join(", ");
        let _ = write!(out, "INSERT INTO {} ({columns}) VALUES ({values})", stmt.table);
        if let Some(ts) = stmt.write_time {
            let _ = write!(out, " USING TIMESTAMP {ts}");
        }
    }

    fn truncate(&self, rendered: String) -> String {
        if rendered.chars().count() <= self.max_value_length {
            return rendered;
        }
        let kept: String = rendered.chars().take(self.max_value_length).collect();
        format!("{kept}...")
    }
}

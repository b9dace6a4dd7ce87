use engine_config::settings::{BatchMode, validated::BatchOptions};
use engine_core::statement::{BatchKind, BatchStatement, BoundStatement, RoutingKey, UnitOfWork};
use std::mem;

/// Groups bound statements into units of work.
///
/// Single pass and order preserving: a statement joins the open batch only
/// when it is eligible for it, otherwise the open batch is flushed first.
/// Statements are never reordered to improve grouping.
#[derive(Debug)]
pub struct StatementAssembler {
    options: BatchOptions,
    pending: Vec<BoundStatement>,
    pending_key: Option<RoutingKey>,
    pending_bytes: usize,
}

impl StatementAssembler {
    pub fn new(options: BatchOptions) -> Self {
        Self {
            options,
            pending: Vec::new(),
            pending_key: None,
            pending_bytes: 0,
        }
    }

    /// Adds one statement and returns the units it completed, in order.
    pub fn push(&mut self, statement: BoundStatement) -> Vec<UnitOfWork> {
        if self.options.mode == BatchMode::Disabled || self.options.max_rows <= 1 {
            return vec![UnitOfWork::Single(statement)];
        }

        let mut ready = Vec::new();
        let size = statement.size_bytes();
        if !self.pending.is_empty() && !self.fits(&statement, size) {
            ready.extend(self.flush());
        }

        if self.pending.is_empty() {
            self.pending_key = statement.routing_key;
        }
        self.pending_bytes += size;
        self.pending.push(statement);

        if self.pending.len() >= self.options.max_rows {
            ready.extend(self.flush());
        }
        ready
    }

    /// Closes the open batch, if any.
    pub fn flush(&mut self) -> Option<UnitOfWork> {
        if self.pending.is_empty() {
            return None;
        }
        let mut statements = mem::take(&mut self.pending);
        self.pending_key = None;
        self.pending_bytes = 0;

        if statements.len() == 1 {
            return statements.pop().map(UnitOfWork::Single);
        }
        let kind = match self.options.mode {
            BatchMode::Unlogged => BatchKind::Unlogged,
            BatchMode::PartitionKey | BatchMode::Disabled => BatchKind::Logged,
        };
        Some(UnitOfWork::Batch(BatchStatement { kind, statements }))
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    fn fits(&self, statement: &BoundStatement, size: usize) -> bool {
        if self.options.mode == BatchMode::PartitionKey
            && (statement.routing_key.is_none() || statement.routing_key != self.pending_key)
        {
            return false;
        }
        match self.options.max_bytes {
            Some(max) => self.pending_bytes + size <= max,
            None => true,
        }
    }
}

/// Assembles a finite sequence of statements in one go.
pub fn assemble(
    options: BatchOptions,
    statements: impl IntoIterator<Item = BoundStatement>,
) -> Vec<UnitOfWork> {
    let mut assembler = StatementAssembler::new(options);
    let mut units = Vec::new();
    for statement in statements {
        units.extend(assembler.push(statement));
    }
    units.extend(assembler.flush());
    units
}

use crate::{
    error::StoreError,
    statement::{Page, PagingState, ReadStatement, UnitOfWork},
};
use async_trait::async_trait;
use model::core::table::TableMetadata;

/// Connection to the target store, supplied by the driver layer.
///
/// Implementations must be safe to call from many tasks at once; the
/// coordinator bounds how many calls are outstanding.
#[async_trait]
pub trait Session: Send + Sync {
    async fn table_metadata(&self, keyspace: &str, table: &str)
    -> Result<TableMetadata, StoreError>;

    /// Applies one unit of work. A batch is all or nothing when logged.
    async fn execute(&self, unit: &UnitOfWork) -> Result<(), StoreError>;

    async fn fetch_page(
        &self,
        statement: &ReadStatement,
        paging_state: Option<PagingState>,
    ) -> Result<Page, StoreError>;
}

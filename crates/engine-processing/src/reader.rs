use crate::retry::classify_store_error;
use engine_core::{
    error::StoreError,
    retry::RetryPolicy,
    session::Session,
    statement::{Page, PagingState, ReadStatement},
};
use futures::{Stream, StreamExt, stream};
use model::records::row::Row;
use std::{sync::Arc, time::Duration};
use tokio::time::timeout;
use tracing::debug;

/// Paged read of a table, fetched lazily as the stream is polled.
pub struct RowReader {
    session: Arc<dyn Session>,
    statement: ReadStatement,
    retry: RetryPolicy,
    request_timeout: Duration,
}

enum Cursor {
    Start,
    Next(PagingState),
    Done,
}

impl RowReader {
    pub fn new(
        session: Arc<dyn Session>,
        statement: ReadStatement,
        retry: RetryPolicy,
        request_timeout: Duration,
    ) -> Self {
        Self {
            session,
            statement,
            retry,
            request_timeout,
        }
    }

    /// Pages in store order. A fetch with no answer within the request
    /// timeout fails with [`StoreError::Timeout`] and is retried. A page that
    /// still fails after retries ends the stream with that error.
    pub fn pages(self) -> impl Stream<Item = Result<Page, StoreError>> + Send {
        let RowReader {
            session,
            statement,
            retry,
            request_timeout,
        } = self;

        stream::unfold(Cursor::Start, move |cursor| {
            let session = session.clone();
            let statement = statement.clone();
            let retry = retry.clone();
            async move {
                let paging_state = match cursor {
                    Cursor::Start => None,
                    Cursor::Next(state) => Some(state),
                    Cursor::Done => return None,
                };

                let fetched = retry
                    .run(
                        |_| {
                            let session = session.clone();
                            let statement = statement.clone();
                            let paging_state = paging_state.clone();
                            async move {
                                match timeout(
                                    request_timeout,
                                    session.fetch_page(&statement, paging_state),
                                )
                                .await
                                {
                                    Ok(result) => result,
                                    Err(_) => Err(StoreError::Timeout(request_timeout)),
                                }
                            }
                        },
                        classify_store_error,
                    )
                    .await;

                match fetched {
                    Ok(page) => {
                        debug!(
                            table = %statement.table,
                            rows = page.rows.len(),
                            more = page.paging_state.is_some(),
                            "Fetched page"
                        );
                        let next = match &page.paging_state {
                            Some(state) => Cursor::Next(state.clone()),
                            None => Cursor::Done,
                        };
                        Some((Ok(page), next))
                    }
                    Err(err) => Some((Err(err.into_inner()), Cursor::Done)),
                }
            }
        })
    }

    /// Rows in store order, flattened across pages.
    pub fn rows(self) -> impl Stream<Item = Result<Row, StoreError>> + Send {
        self.pages().flat_map(|page| match page {
            Ok(page) => stream::iter(page.rows.into_iter().map(Ok)).left_stream(),
            Err(err) => stream::once(async move { Err(err) }).right_stream(),
        })
    }
}

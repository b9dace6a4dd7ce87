use super::{
    setup::{self, RunContext},
    writer::RecordWriter,
};
use crate::{error::RunError, status::RunSummary};
use engine_config::settings::validated::ValidatedSettings;
use engine_core::{retry::RetryPolicy, session::Session, statement::ReadStatement};
use engine_processing::{MappingError, reader::RowReader};
use futures::StreamExt;
use model::{
    execution::failed_record::{FailedRecord, FailureCategory, Outcome},
    records::{
        external::ExternalFormat,
        record::{Record, SourceLocator},
        row::Row,
    },
};
use std::{error::Error as _, pin::pin, sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Reads the configured table and hands every row, converted back to a
/// record, to `writer`.
pub async fn unload<W>(
    settings: ValidatedSettings,
    session: Arc<dyn Session>,
    format: ExternalFormat,
    writer: &mut W,
    cancel: CancellationToken,
) -> Result<RunSummary, RunError>
where
    W: RecordWriter + ?Sized,
{
    UnloadExecutor::new(settings, session, format, cancel)
        .await?
        .execute(writer)
        .await
}

pub struct UnloadExecutor {
    ctx: RunContext,
    session: Arc<dyn Session>,
    statement: ReadStatement,
    retry: RetryPolicy,
    request_timeout: Duration,
    cancel: CancellationToken,
}

impl UnloadExecutor {
    pub async fn new(
        settings: ValidatedSettings,
        session: Arc<dyn Session>,
        format: ExternalFormat,
        cancel: CancellationToken,
    ) -> Result<Self, RunError> {
        let ctx = setup::prepare("UNLOAD", &settings, session.as_ref(), format).await?;
        let statement = ReadStatement {
            table: ctx.mapper.table().clone(),
            columns: ctx.mapper.mapped_columns(),
            with_write_time: ctx.mapper.maps_write_time(),
            page_size: settings.executor.fetch_size,
        };

        Ok(Self {
            ctx,
            session,
            statement,
            retry: settings.executor.retry,
            request_timeout: settings.executor.request_timeout,
            cancel,
        })
    }

    pub fn operation_id(&self) -> &str {
        &self.ctx.operation_id
    }

    pub async fn execute<W>(self, writer: &mut W) -> Result<RunSummary, RunError>
    where
        W: RecordWriter + ?Sized,
    {
        let UnloadExecutor {
            ctx,
            session,
            statement,
            retry,
            request_timeout,
            cancel,
        } = self;

        let resource = statement.table.to_string();
        let mut rows = pin!(RowReader::new(session, statement, retry, request_timeout).rows());
        let mut position = 0u64;
        let mut fatal = None;

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ctx.abort.cancelled() => break,
                next = rows.next() => next,
            };
            let row = match next {
                Some(Ok(row)) => row,
                Some(Err(err)) => {
                    error!(error = %err, "Read failed, stopping the run");
                    fatal = Some(err.to_string());
                    break;
                }
                None => break,
            };

            position += 1;
            let locator = SourceLocator::new(resource.clone(), position);
            match ctx.mapper.unmap(&row, locator.clone()) {
                Ok(record) => {
                    if let Err(err) = writer.write(record).await {
                        error!(error = %err, "Writer failed, stopping the run");
                        fatal = Some(format!("writer failed: {err}"));
                        break;
                    }
                    ctx.sink.record(Outcome::Success(locator));
                }
                Err(err) => ctx.sink.record(unmapping_failure(&row, locator, err)),
            }
        }

        if let Err(err) = writer.flush().await {
            error!(error = %err, "Writer flush failed");
            fatal.get_or_insert_with(|| format!("writer flush failed: {err}"));
        }
        info!(rows = position, "Read finished");

        let interrupted = cancel.is_cancelled();
        ctx.finish(interrupted, fatal).await
    }
}

fn unmapping_failure(row: &Row, locator: SourceLocator, err: MappingError) -> Outcome {
    let source = row
        .field_values
        .iter()
        .map(|fv| match &fv.value {
            Some(value) => format!("{}={}", fv.name, value),
            None => format!("{}=null", fv.name),
        })
        .collect::<Vec<_>>()
        .join(", ");
    let record = Record::named(locator, Vec::<(String, _)>::new()).with_source(source);

    let mut failed =
        FailedRecord::new(FailureCategory::Unload, &record, err.kind(), err.to_string());
    if let Some(field) = err.field() {
        failed = failed.with_field(field);
    }
    if let Some(cause) = err.source() {
        failed = failed.with_error_details(cause.to_string());
    }
    Outcome::failed(failed)
}

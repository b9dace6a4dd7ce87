use super::setup::{self, RunContext};
use crate::{error::RunError, status::RunSummary};
use engine_config::settings::validated::ValidatedSettings;
use engine_core::{session::Session, statement::UnitOfWork};
use engine_processing::{
    ExecutionError, MappingError, assembler::StatementAssembler,
    coordinator::ExecutionCoordinator,
};
use futures::{Stream, StreamExt};
use model::{
    execution::failed_record::{FailedRecord, FailureCategory, Outcome},
    records::{external::ExternalFormat, record::Record},
};
use std::{error::Error as _, pin::pin, sync::Arc, time::Duration};
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Loads `records` into the configured table.
pub async fn load<S>(
    settings: ValidatedSettings,
    session: Arc<dyn Session>,
    format: ExternalFormat,
    records: S,
    cancel: CancellationToken,
) -> Result<RunSummary, RunError>
where
    S: Stream<Item = Record> + Send,
{
    LoadExecutor::new(settings, session, format, cancel)
        .await?
        .execute(records)
        .await
}

pub struct LoadExecutor {
    ctx: RunContext,
    coordinator: Arc<ExecutionCoordinator>,
    assembler: StatementAssembler,
    drain_timeout: Duration,
    cancel: CancellationToken,
    tasks: JoinSet<Option<ExecutionError>>,
    fatal: Option<String>,
    /// Statements of units refused admission because the run was stopping.
    discarded: usize,
}

impl LoadExecutor {
    pub async fn new(
        settings: ValidatedSettings,
        session: Arc<dyn Session>,
        format: ExternalFormat,
        cancel: CancellationToken,
    ) -> Result<Self, RunError> {
        let ctx = setup::prepare("LOAD", &settings, session.as_ref(), format).await?;
        let coordinator = Arc::new(ExecutionCoordinator::new(
            session,
            &settings.executor,
            settings.log.printer,
            ctx.metrics.clone(),
        ));

        Ok(Self {
            coordinator,
            assembler: StatementAssembler::new(settings.batch),
            drain_timeout: settings.executor.drain_timeout,
            cancel,
            tasks: JoinSet::new(),
            fatal: None,
            discarded: 0,
            ctx,
        })
    }

    pub fn operation_id(&self) -> &str {
        &self.ctx.operation_id
    }

    pub async fn execute<S>(mut self, records: S) -> Result<RunSummary, RunError>
    where
        S: Stream<Item = Record> + Send,
    {
        let mut records = pin!(records);

        let exhausted = loop {
            self.collect_finished();
            if self.stopping() {
                break false;
            }

            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break false,
                _ = self.ctx.abort.cancelled() => break false,
                next = records.next() => next,
            };
            let Some(record) = next else {
                break true;
            };

            let record = Arc::new(record);
            match self.ctx.mapper.map(record.clone()) {
                Ok(statement) => {
                    let mut units = self.assembler.push(statement).into_iter();
                    while let Some(unit) = units.next() {
                        if !self.submit(unit).await {
                            self.discarded += units.by_ref().map(|u| u.len()).sum::<usize>();
                            break;
                        }
                    }
                }
                Err(err) => self.ctx.sink.record(mapping_failure(&record, err)),
            }
        };

        if exhausted
            && !self.stopping()
            && let Some(unit) = self.assembler.flush()
        {
            self.submit(unit).await;
        }
        let discarded = self.discarded + self.assembler.pending();
        if discarded > 0 {
            warn!(
                statements = discarded,
                refused = self.discarded,
                "Discarding statements that were never submitted"
            );
        }

        self.drain().await;

        let interrupted = self.cancel.is_cancelled();
        self.ctx.finish(interrupted, self.fatal).await
    }

    /// Waits for admission and starts `unit`. Returns `false` when the run
    /// stopped before the unit could be admitted.
    async fn submit(&mut self, unit: UnitOfWork) -> bool {
        let permit = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            _ = self.ctx.abort.cancelled() => None,
            permit = self.coordinator.admit() => permit,
        };
        let Some(permit) = permit else {
            debug!(statements = unit.len(), "Unit not admitted, run is stopping");
            self.discarded += unit.len();
            return false;
        };
        self.coordinator
            .spawn(unit, permit, self.ctx.sink.clone(), &mut self.tasks);
        true
    }

    fn collect_finished(&mut self) {
        while let Some(result) = self.tasks.try_join_next() {
            self.on_unit_finished(result);
        }
    }

    /// Lets in-flight units finish, abandoning whatever is left after the
    /// drain timeout.
    async fn drain(&mut self) {
        let in_flight = self.tasks.len();
        if in_flight == 0 {
            return;
        }
        info!(units = in_flight, "Waiting for in-flight units");

        let deadline = tokio::time::sleep(self.drain_timeout);
        let mut deadline = pin!(deadline);
        loop {
            tokio::select! {
                _ = &mut deadline => {
                    warn!(
                        units = self.tasks.len(),
                        timeout_ms = self.drain_timeout.as_millis() as u64,
                        "Drain timed out, abandoning in-flight units"
                    );
                    self.tasks.abort_all();
                    while self.tasks.join_next().await.is_some() {}
                    break;
                }
                next = self.tasks.join_next() => match next {
                    Some(result) => self.on_unit_finished(result),
                    None => break,
                },
            }
        }
    }

    fn on_unit_finished(&mut self, result: Result<Option<ExecutionError>, JoinError>) {
        let message = match result {
            Ok(Some(err)) if err.is_fatal_to_run() => err.store_error().to_string(),
            Ok(_) => return,
            Err(err) if err.is_cancelled() => return,
            Err(err) => format!("execution task failed: {err}"),
        };
        if self.fatal.is_none() {
            error!(error = %message, "Fatal error, stopping the run");
            self.fatal = Some(message);
            self.ctx.abort.cancel();
        }
    }

    fn stopping(&self) -> bool {
        self.cancel.is_cancelled() || self.ctx.abort.is_cancelled()
    }
}

fn mapping_failure(record: &Record, err: MappingError) -> Outcome {
    let mut failed =
        FailedRecord::new(FailureCategory::Mapping, record, err.kind(), err.to_string());
    if let Some(field) = err.field() {
        failed = failed.with_field(field);
    }
    if let Some(cause) = err.source() {
        failed = failed.with_error_details(cause.to_string());
    }
    Outcome::failed(failed)
}

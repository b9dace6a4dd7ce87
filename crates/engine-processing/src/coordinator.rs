use crate::{error::ExecutionError, retry::classify_store_error, sink::OutcomeSink};
use engine_config::settings::validated::ExecutorOptions;
use engine_core::{
    error::StoreError,
    metrics::Metrics,
    retry::{RetryError, RetryPolicy},
    session::Session,
    statement::{StatementPrinter, UnitOfWork},
};
use model::execution::failed_record::{FailedRecord, FailureCategory, Outcome};
use std::{sync::Arc, time::Duration};
use tokio::{
    sync::{OwnedSemaphorePermit, Semaphore},
    task::JoinSet,
    time::timeout,
};
use tracing::{debug, warn};

/// Per-record outcomes of one unit of work, plus the terminal error when
/// the unit failed.
#[derive(Debug)]
pub struct ExecutionReport {
    pub outcomes: Vec<Outcome>,
    pub error: Option<ExecutionError>,
}

/// Submits units of work to the store under a global admission limit.
///
/// A unit holds an admission slot only while a request is outstanding; the
/// slot is given back during retry backoff and taken again before the next
/// attempt.
pub struct ExecutionCoordinator {
    session: Arc<dyn Session>,
    retry: RetryPolicy,
    request_timeout: Duration,
    printer: StatementPrinter,
    metrics: Metrics,
    admission: Arc<Semaphore>,
    max_in_flight: usize,
}

impl ExecutionCoordinator {
    pub fn new(
        session: Arc<dyn Session>,
        options: &ExecutorOptions,
        printer: StatementPrinter,
        metrics: Metrics,
    ) -> Self {
        let max_in_flight = options.max_in_flight.max(1);
        Self {
            session,
            retry: options.retry.clone(),
            request_timeout: options.request_timeout,
            printer,
            metrics,
            admission: Arc::new(Semaphore::new(max_in_flight)),
            max_in_flight,
        }
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight
    }

    /// Waits for a free admission slot.
    pub async fn admit(&self) -> Option<OwnedSemaphorePermit> {
        self.admission.clone().acquire_owned().await.ok()
    }

    /// Runs `unit` on the task set and hands its outcomes to `sink`. The
    /// task yields the unit's terminal error, if any.
    pub fn spawn(
        self: &Arc<Self>,
        unit: UnitOfWork,
        permit: OwnedSemaphorePermit,
        sink: Arc<OutcomeSink>,
        tasks: &mut JoinSet<Option<ExecutionError>>,
    ) {
        let this = self.clone();
        tasks.spawn(async move {
            let report = this.execute(unit, permit).await;
            sink.record_all(report.outcomes);
            report.error
        });
    }

    /// Executes `unit` to a terminal state: succeeded, or failed with one
    /// outcome per contained record.
    pub async fn execute(&self, unit: UnitOfWork, permit: OwnedSemaphorePermit) -> ExecutionReport {
        let statements = unit.len();
        let bytes = unit.size_bytes();
        let mut held = Some(permit);
        let unit_ref = &unit;

        let result = self
            .retry
            .run(
                |attempt| {
                    let permit = held.take();
                    let admission = self.admission.clone();
                    async move {
                        let _permit = match permit {
                            Some(permit) => permit,
                            None => admission.acquire_owned().await.map_err(|_| {
                                StoreError::ConnectionLost("admission closed".to_string())
                            })?,
                        };
                        if attempt > 1 {
                            self.metrics.increment_retries(1);
                            debug!(attempt, statements, "Retrying unit of work");
                        }
                        let _in_flight = self.metrics.track_in_flight();
                        match timeout(self.request_timeout, self.session.execute(unit_ref)).await {
                            Ok(result) => result,
                            Err(_) => Err(StoreError::Timeout(self.request_timeout)),
                        }
                    }
                },
                classify_store_error,
            )
            .await;

        match result {
            Ok(()) => {
                self.metrics.increment_units(statements, bytes);
                debug!(statements, bytes, "Unit of work applied");
                ExecutionReport {
                    outcomes: unit.records().map(|r| Outcome::success(r)).collect(),
                    error: None,
                }
            }
            Err(err) => {
                let error = match err {
                    RetryError::Fatal { error, attempts } => ExecutionError::Rejected {
                        attempts,
                        source: error,
                    },
                    RetryError::AttemptsExceeded { error, attempts } => {
                        ExecutionError::RetriesExhausted {
                            attempts,
                            source: error,
                        }
                    }
                };
                warn!(
                    statements,
                    attempts = error.attempts(),
                    kind = error.store_error().kind(),
                    error = %error,
                    "Unit of work failed"
                );
                ExecutionReport {
                    outcomes: self.failed_outcomes(&unit, &error),
                    error: Some(error),
                }
            }
        }
    }

    /// Expands a failed unit into one attributed failure per record.
    fn failed_outcomes(&self, unit: &UnitOfWork, error: &ExecutionError) -> Vec<Outcome> {
        let statement = self.printer.print(unit);
        let store_error = error.store_error();
        unit.records()
            .map(|record| {
                Outcome::failed(
                    FailedRecord::new(
                        FailureCategory::Load,
                        record,
                        error.kind(),
                        error.to_string(),
                    )
                    .with_statement(statement.clone())
                    .with_attempt(error.attempts() as u32)
                    .with_retryable(store_error.is_transient())
                    .with_error_details(format!("{}: {}", store_error.kind(), store_error)),
                )
            })
            .collect()
    }
}

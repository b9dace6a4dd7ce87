use crate::quarantine::QuarantineLog;
use engine_core::metrics::Metrics;
use model::execution::failed_record::{FailedRecord, Outcome};
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

/// Terminal destination of every outcome.
///
/// Counts successes and failures, quarantines failed records and trips the
/// abort token once the failure count exceeds the configured threshold.
pub struct OutcomeSink {
    metrics: Metrics,
    quarantine: Arc<QuarantineLog>,
    max_errors: Option<u64>,
    abort: CancellationToken,
    threshold_exceeded: AtomicBool,
}

impl OutcomeSink {
    pub fn new(
        metrics: Metrics,
        quarantine: Arc<QuarantineLog>,
        max_errors: Option<u64>,
        abort: CancellationToken,
    ) -> Self {
        Self {
            metrics,
            quarantine,
            max_errors,
            abort,
            threshold_exceeded: AtomicBool::new(false),
        }
    }

    pub fn record(&self, outcome: Outcome) {
        match outcome {
            Outcome::Success(_) => self.metrics.increment_successes(1),
            Outcome::Failed(failed) => self.record_failure(&failed),
        }
    }

    pub fn record_all(&self, outcomes: impl IntoIterator<Item = Outcome>) {
        for outcome in outcomes {
            self.record(outcome);
        }
    }

    /// Whether failures went past the abort threshold.
    pub fn threshold_exceeded(&self) -> bool {
        self.threshold_exceeded.load(Ordering::SeqCst)
    }

    pub fn quarantine(&self) -> &QuarantineLog {
        &self.quarantine
    }

    fn record_failure(&self, failed: &FailedRecord) {
        self.metrics.increment_failures(failed.category, 1);

        if let Err(err) = self.quarantine.append(failed) {
            error!(
                locator = %failed.locator,
                error = %err,
                "Could not quarantine failed record"
            );
        }

        if let Some(max) = self.max_errors
            && self.metrics.failed() > max
            && !self.threshold_exceeded.swap(true, Ordering::SeqCst)
        {
            warn!(
                max_errors = max,
                failed = self.metrics.failed(),
                "Too many errors, aborting"
            );
            self.abort.cancel();
        }
    }
}

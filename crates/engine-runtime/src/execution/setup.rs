use crate::{
    error::RunError,
    status::{self, RunSummary},
};
use chrono::Utc;
use codecs::CodecRegistry;
use engine_config::settings::validated::ValidatedSettings;
use engine_core::{metrics::Metrics, session::Session};
use engine_processing::{
    mapper::RecordMapper, quarantine::QuarantineLog, reporter::ProgressReporter,
    reporter::ReporterHandle, sink::OutcomeSink,
};
use model::records::external::ExternalFormat;
use std::{path::PathBuf, sync::Arc};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Everything a run needs once setup succeeded.
pub(crate) struct RunContext {
    pub operation_id: String,
    pub operation_dir: PathBuf,
    pub metrics: Metrics,
    pub mapper: RecordMapper,
    pub sink: Arc<OutcomeSink>,
    /// Tripped by the sink when failures exceed the threshold.
    pub abort: CancellationToken,
    pub max_errors: Option<u64>,
    pub reporter: ReporterHandle,
}

/// Fails fast on anything that would fail every record: unknown table,
/// unsupported conversions, unknown mapped columns, unusable log directory.
pub(crate) async fn prepare(
    kind: &str,
    settings: &ValidatedSettings,
    session: &dyn Session,
    format: ExternalFormat,
) -> Result<RunContext, RunError> {
    let table = session
        .table_metadata(&settings.keyspace, &settings.table)
        .await?;

    let metrics = Metrics::new();
    let registry = CodecRegistry::new(settings.conversion.clone());
    let mapper = RecordMapper::new(
        &table,
        settings.mapping.as_ref(),
        &registry,
        format,
        settings.allow_missing_fields,
        metrics.clone(),
    )?;

    let operation_id = operation_id(kind);
    let operation_dir = settings.log.directory.join(&operation_id);
    let quarantine = Arc::new(QuarantineLog::open(&operation_dir, settings.log.format)?);

    let abort = CancellationToken::new();
    let sink = Arc::new(OutcomeSink::new(
        metrics.clone(),
        quarantine,
        settings.log.max_errors,
        abort.clone(),
    ));
    let reporter = ProgressReporter::new(metrics.clone(), &settings.monitoring).start();

    info!(
        operation_id = %operation_id,
        table = %table.qualified_name(),
        format = %format,
        operation_dir = %operation_dir.display(),
        "Operation started"
    );

    Ok(RunContext {
        operation_id,
        operation_dir,
        metrics,
        mapper,
        sink,
        abort,
        max_errors: settings.log.max_errors,
        reporter,
    })
}

impl RunContext {
    /// Stops reporting, flushes the quarantine files and resolves the status.
    pub async fn finish(
        self,
        interrupted: bool,
        fatal: Option<String>,
    ) -> Result<RunSummary, RunError> {
        let metrics = self.reporter.stop().await;
        self.sink.quarantine().flush()?;

        let too_many_errors = if self.sink.threshold_exceeded() {
            self.max_errors.map(|max| (max, metrics.records_failed))
        } else {
            None
        };
        let (status, abort_reason) = status::resolve(
            interrupted,
            fatal.as_deref(),
            too_many_errors,
            metrics.records_failed,
        );

        if let Some(reason) = &abort_reason {
            warn!(
                operation_id = %self.operation_id,
                reason = %reason,
                successful = metrics.records_successful,
                failed = metrics.records_failed,
                "Operation aborted"
            );
        } else {
            info!(
                operation_id = %self.operation_id,
                status = %status,
                successful = metrics.records_successful,
                failed = metrics.records_failed,
                elapsed_ms = metrics.elapsed.as_millis() as u64,
                "Operation finished"
            );
        }
        if metrics.records_failed > 0 {
            info!(
                operation_dir = %self.operation_dir.display(),
                "Rejected records can be found in the operation directory"
            );
        }

        Ok(RunSummary {
            operation_id: self.operation_id,
            status,
            abort_reason,
            metrics,
            operation_dir: self.operation_dir,
        })
    }
}

fn operation_id(kind: &str) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!(
        "{kind}_{}_{}",
        Utc::now().format("%Y%m%d-%H%M%S-%6f"),
        &suffix[..8]
    )
}

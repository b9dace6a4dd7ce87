#[cfg(test)]
mod tests {
    use crate::{
        memory_store, settings,
        utils::{
            IP_BY_COUNTRY_RESOURCE, ip_by_country_docs, ip_by_country_docs_with_malformed,
            ip_by_country_table, json_records, quarantine_entries, record_stream,
        },
    };
    use engine_core::{error::StoreError, memory::MemorySession};
    use engine_runtime::{AbortReason, RunError, RunStatus, load, unload};
    use futures::{StreamExt, stream};
    use model::records::{
        external::{ExternalFormat, ExternalValue},
        record::{FieldRef, Record, SourceLocator},
    };
    use serde_json::json;
    use std::{sync::Arc, time::Duration};
    use tokio_util::sync::CancellationToken;
    use tracing_test::traced_test;

    const TABLE: &str = "geo.ip_by_country";

    // Scenario: 24 well-formed JSON records, identity mapping, default batching.
    // Expected Outcome: every record succeeds, one logged batch per country.
    #[traced_test]
    #[tokio::test]
    async fn tc01() {
        let dir = tempfile::tempdir().unwrap();
        let store = memory_store();

        let summary = load(
            settings(dir.path(), json!({})),
            store.clone(),
            ExternalFormat::Json,
            record_stream(json_records(ip_by_country_docs())),
            CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(summary.status, RunStatus::Ok);
        assert_eq!(summary.exit_code(), 0);
        assert_eq!(summary.metrics.records_successful, 24);
        assert_eq!(summary.metrics.records_failed, 0);
        assert_eq!(summary.metrics.batches_executed, 4);
        assert_eq!(store.row_count(TABLE).await, 24);
        assert!(logs_contain("Operation finished"));
    }

    // Scenario: the same 24 records, three of them with an unparsable number.
    // Expected Outcome: 21 rows loaded, three mapping-error entries carrying
    // the source locator, run completes with errors.
    #[traced_test]
    #[tokio::test]
    async fn tc02() {
        let dir = tempfile::tempdir().unwrap();
        let store = memory_store();

        let summary = load(
            settings(dir.path(), json!({})),
            store.clone(),
            ExternalFormat::Json,
            record_stream(json_records(ip_by_country_docs_with_malformed(&[2, 9, 17]))),
            CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(summary.status, RunStatus::CompletedWithErrors);
        assert_eq!(summary.exit_code(), 1);
        assert_eq!(summary.metrics.records_successful, 21);
        assert_eq!(summary.metrics.mapping_failures, 3);
        assert_eq!(store.row_count(TABLE).await, 21);

        let entries = quarantine_entries(&summary.operation_dir.join("mapping-errors.log"));
        assert_eq!(entries.len(), 3);
        for (entry, position) in entries.iter().zip([3, 10, 18]) {
            assert!(entry.contains(&format!("Resource: {IP_BY_COUNTRY_RESOURCE}")));
            assert!(entry.contains(&format!("Position: {position}")));
            assert!(entry.contains("Source  : {"));
            assert!(entry.contains("beginning_ip_number"));
        }

        let bad = std::fs::read_to_string(summary.operation_dir.join("mapping.bad")).unwrap();
        assert_eq!(bad.lines().count(), 3);
        assert!(summary.into_result().is_ok());
    }

    // Scenario: abort threshold of 2, three unmappable records among the
    // first six of ten.
    // Expected Outcome: the run stops after the third failure without
    // reading the whole input and reports too many errors.
    #[traced_test]
    #[tokio::test]
    async fn tc03() {
        let dir = tempfile::tempdir().unwrap();
        let store = memory_store();
        let mut docs = ip_by_country_docs_with_malformed(&[1, 3, 5]);
        docs.truncate(10);

        let summary = load(
            settings(dir.path(), json!({"log": {"max_errors": 2}})),
            store.clone(),
            ExternalFormat::Json,
            record_stream(json_records(docs)),
            CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(summary.status, RunStatus::AbortedTooManyErrors);
        assert_eq!(summary.exit_code(), 2);
        assert_eq!(summary.metrics.mapping_failures, 3);
        assert!(summary.metrics.records_total < 10);
        assert_eq!(
            quarantine_entries(&summary.operation_dir.join("mapping-errors.log")).len(),
            3
        );
        assert!(matches!(
            summary.into_result(),
            Err(RunError::Aborted(AbortReason::TooManyErrors {
                max_errors: 2,
                failed: 3
            }))
        ));
    }

    // Scenario: the store is permanently overloaded, three attempts allowed,
    // batching disabled.
    // Expected Outcome: each unit is attempted exactly three times and each
    // record fails once in the load-error log.
    #[traced_test]
    #[tokio::test]
    async fn tc04() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(
            MemorySession::new()
                .with_table(ip_by_country_table())
                .with_fault(|_| Some(StoreError::Overloaded("too many requests".into()))),
        );
        let mut docs = ip_by_country_docs();
        docs.truncate(6);

        let summary = load(
            settings(
                dir.path(),
                json!({
                    "batch": {"mode": "disabled"},
                    "executor": {"max_attempts": 3},
                    "log": {"max_errors": -1}
                }),
            ),
            store.clone(),
            ExternalFormat::Json,
            record_stream(json_records(docs)),
            CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(summary.status, RunStatus::CompletedWithErrors);
        assert_eq!(summary.metrics.records_successful, 0);
        assert_eq!(summary.metrics.load_failures, 6);
        assert_eq!(summary.metrics.retry_count, 12);
        assert_eq!(store.requests(), 18);
        assert_eq!(store.row_count(TABLE).await, 0);

        let entries = quarantine_entries(&summary.operation_dir.join("load-errors.log"));
        assert_eq!(entries.len(), 6);
        assert!(entries.iter().all(|e| e.contains("RetriesExhausted")));
        assert!(entries.iter().all(|e| e.contains("Attempts: 3")));
    }

    // Scenario: the store rejects one statement of the China batch.
    // Expected Outcome: the six members of that batch fail individually,
    // none of them is written, the other countries load.
    #[traced_test]
    #[tokio::test]
    async fn tc05() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(
            MemorySession::new()
                .with_table(ip_by_country_table())
                .with_fault(|stmt| {
                    (stmt.record.locator.position == 9).then(|| StoreError::TypeMismatch {
                        column: "ending_ip_number".into(),
                        message: "value out of range".into(),
                    })
                }),
        );

        let summary = load(
            settings(dir.path(), json!({})),
            store.clone(),
            ExternalFormat::Json,
            record_stream(json_records(ip_by_country_docs())),
            CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(summary.status, RunStatus::CompletedWithErrors);
        assert_eq!(summary.metrics.load_failures, 6);
        assert_eq!(summary.metrics.records_successful, 18);
        assert_eq!(store.row_count(TABLE).await, 18);

        let entries = quarantine_entries(&summary.operation_dir.join("load-errors.log"));
        let mut positions: Vec<u64> = entries
            .iter()
            .filter_map(|e| {
                e.lines()
                    .find_map(|l| l.strip_prefix("Position: "))
                    .and_then(|p| p.parse().ok())
            })
            .collect();
        positions.sort_unstable();
        assert_eq!(positions, [7, 8, 9, 10, 11, 12]);
        assert!(entries.iter().all(|e| e.contains("Statement: BEGIN BATCH")));
    }

    // Scenario: slow store, admission limit of 3, one statement per unit.
    // Expected Outcome: never more than 3 requests in flight.
    #[traced_test]
    #[tokio::test]
    async fn tc06() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(
            MemorySession::new()
                .with_table(ip_by_country_table())
                .with_latency(Duration::from_millis(10)),
        );

        let summary = load(
            settings(
                dir.path(),
                json!({"batch": {"mode": "disabled"}, "executor": {"max_in_flight": 3}}),
            ),
            store.clone(),
            ExternalFormat::Json,
            record_stream(json_records(ip_by_country_docs())),
            CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(summary.status, RunStatus::Ok);
        assert_eq!(store.requests(), 24);
        assert!(store.peak_in_flight() <= 3);
        assert!(summary.metrics.peak_in_flight <= 3);
    }

    // Scenario: load the sample, then unload the table as JSON.
    // Expected Outcome: the unloaded records carry the loaded values.
    #[traced_test]
    #[tokio::test]
    async fn tc07() {
        let dir = tempfile::tempdir().unwrap();
        let store = memory_store();
        let docs = ip_by_country_docs();

        load(
            settings(dir.path(), json!({})),
            store.clone(),
            ExternalFormat::Json,
            record_stream(json_records(docs.clone())),
            CancellationToken::new(),
        )
        .await
        .unwrap();

        let mut unloaded: Vec<Record> = Vec::new();
        let summary = unload(
            settings(dir.path(), json!({"executor": {"fetch_size": 5}})),
            store.clone(),
            ExternalFormat::Json,
            &mut unloaded,
            CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(summary.status, RunStatus::Ok);
        assert_eq!(summary.metrics.records_successful, 24);
        assert_eq!(unloaded.len(), 24);

        let number = FieldRef::Named("beginning_ip_number".into());
        let mut loaded: Vec<_> = docs.iter().map(|d| d["beginning_ip_number"].clone()).collect();
        let mut read: Vec<_> = unloaded
            .iter()
            .map(|r| match r.get(&number) {
                Some(ExternalValue::Json(v)) => v.clone(),
                other => panic!("unexpected value {other:?}"),
            })
            .collect();
        loaded.sort_by_key(|v| v.as_u64());
        read.sort_by_key(|v| v.as_u64());
        assert_eq!(loaded, read);

        let first = &unloaded[0];
        assert!(matches!(
            first.get(&FieldRef::Named("beginning_ip_address".into())),
            Some(ExternalValue::Json(serde_json::Value::String(_)))
        ));
    }

    // Scenario: an endless source, interrupted by the operator.
    // Expected Outcome: admission stops, in-flight work drains and the run
    // ends as interrupted.
    #[traced_test]
    #[tokio::test]
    async fn tc08() {
        let dir = tempfile::tempdir().unwrap();
        let store = memory_store();
        let cancel = CancellationToken::new();
        let records = stream::iter(json_records(ip_by_country_docs())).chain(stream::pending());

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let summary = load(
            settings(dir.path(), json!({})),
            store.clone(),
            ExternalFormat::Json,
            records,
            cancel,
        )
        .await
        .unwrap();

        assert_eq!(summary.status, RunStatus::Interrupted);
        assert_eq!(summary.exit_code(), 4);
        assert_eq!(summary.metrics.in_flight, 0);
    }

    // Scenario: the connection drops on the first request.
    // Expected Outcome: the run aborts with a fatal error.
    #[traced_test]
    #[tokio::test]
    async fn tc09() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(
            MemorySession::new()
                .with_table(ip_by_country_table())
                .with_fault(|_| Some(StoreError::ConnectionLost("connection reset".into()))),
        );

        let summary = load(
            settings(dir.path(), json!({"batch": {"mode": "disabled"}})),
            store.clone(),
            ExternalFormat::Json,
            record_stream(json_records(ip_by_country_docs())),
            CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(summary.status, RunStatus::AbortedFatalError);
        assert_eq!(summary.exit_code(), 3);
        assert!(matches!(summary.abort_reason, Some(AbortReason::Fatal(_))));
        assert!(logs_contain("Fatal error, stopping the run"));
    }

    // Scenario: setup problems, an unknown table and a mapping naming a
    // column that does not exist.
    // Expected Outcome: both fail before any record is read.
    #[traced_test]
    #[tokio::test]
    async fn tc10() {
        let dir = tempfile::tempdir().unwrap();
        let store = memory_store();

        let err = load(
            settings(dir.path(), json!({"schema": {"table": "nope"}})),
            store.clone(),
            ExternalFormat::Json,
            record_stream(json_records(ip_by_country_docs())),
            CancellationToken::new(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, RunError::Store(StoreError::UnknownTable(_))));

        let err = load(
            settings(
                dir.path(),
                json!({"schema": {"mapping": "code=country_code, region=region_name"}}),
            ),
            store.clone(),
            ExternalFormat::Json,
            record_stream(json_records(ip_by_country_docs())),
            CancellationToken::new(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, RunError::Mapping(_)));
        assert_eq!(store.requests(), 0);
    }

    // Scenario: delimited text input with positional mapping and a field
    // bound to the write timestamp.
    // Expected Outcome: rows carry the converted write time in microseconds.
    #[traced_test]
    #[tokio::test]
    async fn tc11() {
        let dir = tempfile::tempdir().unwrap();
        let store = memory_store();
        let records = vec![Record::indexed(
            SourceLocator::new("ip-by-country.csv", 1),
            [
                "1.0.0.0",
                "1.0.0.255",
                "16777216",
                "16777471",
                "AU",
                "Australia",
                "2017-11-30T14:46:56+01:00",
            ]
            .into_iter()
            .map(ExternalValue::text)
            .collect(),
        )];

        let summary = load(
            settings(
                dir.path(),
                json!({"schema": {"mapping": "0=beginning_ip_address, 1=ending_ip_address, 2=beginning_ip_number, 3=ending_ip_number, 4=country_code, 5=country_name, 6=writetime(*)"}}),
            ),
            store.clone(),
            ExternalFormat::Text,
            record_stream(records),
            CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(summary.status, RunStatus::Ok);
        let rows = store.rows(TABLE).await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].write_time, Some(1_512_049_616_000_000));
    }

    // Scenario: admission limit of 1 on a slow store, batches of two rows, and
    // an interruption while a full batch waits for admission.
    // Expected Outcome: the waiting batch is never sent and its statements
    // are reported as discarded.
    #[traced_test]
    #[tokio::test]
    async fn tc12() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(
            MemorySession::new()
                .with_table(ip_by_country_table())
                .with_latency(Duration::from_millis(300)),
        );
        let cancel = CancellationToken::new();
        let records = stream::iter(json_records(ip_by_country_docs())).chain(stream::pending());

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let summary = load(
            settings(
                dir.path(),
                json!({
                    "batch": {"mode": "partition_key", "max_batch_rows": 2},
                    "executor": {"max_in_flight": 1}
                }),
            ),
            store.clone(),
            ExternalFormat::Json,
            records,
            cancel,
        )
        .await
        .unwrap();

        assert_eq!(summary.status, RunStatus::Interrupted);
        assert_eq!(store.requests(), 1);
        assert_eq!(summary.metrics.records_successful, 2);
        assert!(logs_contain("Discarding statements that were never submitted"));
        assert!(logs_contain("refused=2"));
    }
}

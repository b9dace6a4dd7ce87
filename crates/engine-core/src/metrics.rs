use model::execution::failed_record::FailureCategory;
use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

#[derive(Debug)]
struct InnerMetrics {
    started: Instant,
    records_total: AtomicU64,
    records_successful: AtomicU64,
    records_failed: AtomicU64,
    mapping_failures: AtomicU64,
    load_failures: AtomicU64,
    unload_failures: AtomicU64,
    units_executed: AtomicU64,
    batches_executed: AtomicU64,
    bytes_written: AtomicU64,
    retry_count: AtomicU64,
    in_flight: AtomicU64,
    peak_in_flight: AtomicU64,
}

/// Run-wide counters. Cheap to clone; every clone updates the same totals.
#[derive(Debug, Clone)]
pub struct Metrics {
    inner: Arc<InnerMetrics>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MetricsSnapshot {
    pub records_total: u64,
    pub records_successful: u64,
    pub records_failed: u64,
    pub mapping_failures: u64,
    pub load_failures: u64,
    pub unload_failures: u64,
    pub units_executed: u64,
    pub batches_executed: u64,
    pub bytes_written: u64,
    pub retry_count: u64,
    pub in_flight: u64,
    pub peak_in_flight: u64,
    pub elapsed: Duration,
}

impl Metrics {
    pub fn new() -> Self {
        Metrics {
            inner: Arc::new(InnerMetrics {
                started: Instant::now(),
                records_total: AtomicU64::new(0),
                records_successful: AtomicU64::new(0),
                records_failed: AtomicU64::new(0),
                mapping_failures: AtomicU64::new(0),
                load_failures: AtomicU64::new(0),
                unload_failures: AtomicU64::new(0),
                units_executed: AtomicU64::new(0),
                batches_executed: AtomicU64::new(0),
                bytes_written: AtomicU64::new(0),
                retry_count: AtomicU64::new(0),
                in_flight: AtomicU64::new(0),
                peak_in_flight: AtomicU64::new(0),
            }),
        }
    }

    /// A record entered the pipeline.
    pub fn increment_records(&self, count: u64) {
        self.inner.records_total.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_successes(&self, count: u64) {
        self.inner
            .records_successful
            .fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_failures(&self, category: FailureCategory, count: u64) {
        self.inner.records_failed.fetch_add(count, Ordering::Relaxed);
        let per_category = match category {
            FailureCategory::Mapping => &self.inner.mapping_failures,
            FailureCategory::Load => &self.inner.load_failures,
            FailureCategory::Unload => &self.inner.unload_failures,
        };
        per_category.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_units(&self, statements: usize, bytes: usize) {
        self.inner.units_executed.fetch_add(1, Ordering::Relaxed);
        if statements > 1 {
            self.inner.batches_executed.fetch_add(1, Ordering::Relaxed);
        }
        self.inner
            .bytes_written
            .fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn increment_retries(&self, count: u64) {
        self.inner.retry_count.fetch_add(count, Ordering::Relaxed);
    }

    /// Tracks one admitted unit until the returned guard is dropped.
    pub fn track_in_flight(&self) -> InFlightGuard {
        let now = self.inner.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        InFlightGuard {
            metrics: self.clone(),
        }
    }

    /// Failed records so far, across all categories.
    pub fn failed(&self) -> u64 {
        self.inner.records_failed.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            records_total: self.inner.records_total.load(Ordering::Relaxed),
            records_successful: self.inner.records_successful.load(Ordering::Relaxed),
            records_failed: self.inner.records_failed.load(Ordering::Relaxed),
            mapping_failures: self.inner.mapping_failures.load(Ordering::Relaxed),
            load_failures: self.inner.load_failures.load(Ordering::Relaxed),
            unload_failures: self.inner.unload_failures.load(Ordering::Relaxed),
            units_executed: self.inner.units_executed.load(Ordering::Relaxed),
            batches_executed: self.inner.batches_executed.load(Ordering::Relaxed),
            bytes_written: self.inner.bytes_written.load(Ordering::Relaxed),
            retry_count: self.inner.retry_count.load(Ordering::Relaxed),
            in_flight: self.inner.in_flight.load(Ordering::SeqCst),
            peak_in_flight: self.inner.peak_in_flight.load(Ordering::SeqCst),
            elapsed: self.inner.started.elapsed(),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
pub struct InFlightGuard {
    metrics: Metrics,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.metrics.inner.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MetricsSnapshot {
    /// Records that reached a terminal outcome.
    pub fn completed(&self) -> u64 {
        self.records_successful + self.records_failed
    }

    /// Completed records per second since the run started.
    pub fn mean_rate(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs <= f64::EPSILON {
            0.0
        } else {
            self.completed() as f64 / secs
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failures_are_counted_per_category() {
        let metrics = Metrics::new();
        metrics.increment_records(5);
        metrics.increment_successes(3);
        metrics.increment_failures(FailureCategory::Mapping, 1);
        metrics.increment_failures(FailureCategory::Load, 1);

        let snap = metrics.snapshot();
        assert_eq!(snap.records_total, 5);
        assert_eq!(snap.completed(), 5);
        assert_eq!(snap.records_failed, 2);
        assert_eq!(snap.mapping_failures, 1);
        assert_eq!(snap.load_failures, 1);
    }

    #[test]
    fn in_flight_guard_tracks_peak() {
        let metrics = Metrics::new();
        let a = metrics.track_in_flight();
        let b = metrics.track_in_flight();
        assert_eq!(metrics.snapshot().in_flight, 2);
        drop(a);
        drop(b);

        let snap = metrics.snapshot();
        assert_eq!(snap.in_flight, 0);
        assert_eq!(snap.peak_in_flight, 2);
    }

    #[test]
    fn clones_share_counters() {
        let metrics = Metrics::new();
        let clone = metrics.clone();
        clone.increment_units(3, 120);
        clone.increment_units(1, 40);

        let snap = metrics.snapshot();
        assert_eq!(snap.units_executed, 2);
        assert_eq!(snap.batches_executed, 1);
        assert_eq!(snap.bytes_written, 160);
    }
}

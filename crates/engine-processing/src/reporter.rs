use engine_config::settings::validated::MonitoringOptions;
use engine_core::metrics::{Metrics, MetricsSnapshot};
use std::time::Duration;
use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Periodically logs run counters. Advisory only: it reads the counters and
/// never influences the run.
pub struct ProgressReporter {
    metrics: Metrics,
    interval: Duration,
    expected_total: Option<u64>,
}

/// A started reporter; stopping it logs one final line.
pub struct ReporterHandle {
    stop: CancellationToken,
    task: JoinHandle<()>,
    metrics: Metrics,
    expected_total: Option<u64>,
}

impl ProgressReporter {
    pub fn new(metrics: Metrics, options: &MonitoringOptions) -> Self {
        Self {
            metrics,
            interval: options.report_interval,
            expected_total: options.expected_total,
        }
    }

    pub fn start(self) -> ReporterHandle {
        let stop = CancellationToken::new();
        let token = stop.clone();
        let metrics = self.metrics.clone();
        let expected_total = self.expected_total;
        let period = self.interval.max(Duration::from_millis(1));

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        info!("{}", render(&metrics.snapshot(), expected_total));
                    }
                }
            }
            debug!("Progress reporter stopped");
        });

        ReporterHandle {
            stop,
            task,
            metrics: self.metrics,
            expected_total: self.expected_total,
        }
    }
}

impl ReporterHandle {
    /// Stops the periodic task and logs the final counters.
    pub async fn stop(self) -> MetricsSnapshot {
        self.stop.cancel();
        if let Err(err) = self.task.await {
            debug!(error = %err, "Progress reporter task ended abnormally");
        }
        let snapshot = self.metrics.snapshot();
        info!("{}", render(&snapshot, self.expected_total));
        snapshot
    }
}

/// One progress line: counters and mean rate, plus percent complete when the
/// expected total is known.
pub fn render(snapshot: &MetricsSnapshot, expected_total: Option<u64>) -> String {
    let completed = snapshot.completed();
    let line = format!(
        "Records: total: {}, successful: {}, failed: {}, mean: {} records/second",
        group_thousands(completed),
        group_thousands(snapshot.records_successful),
        group_thousands(snapshot.records_failed),
        group_thousands(snapshot.mean_rate().round() as u64),
    );
    match expected_total {
        Some(expected) => {
            let percent = if expected == 0 {
                100.0
            } else {
                completed as f64 * 100.0 / expected as f64
            };
            format!("{line}, progression: {percent:.0}%")
        }
        None => line,
    }
}

fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(successful: u64, failed: u64, elapsed: Duration) -> MetricsSnapshot {
        MetricsSnapshot {
            records_total: successful + failed,
            records_successful: successful,
            records_failed: failed,
            elapsed,
            ..Default::default()
        }
    }

    #[test]
    fn renders_rate_without_expected_total() {
        let line = render(&snapshot(12_000, 345, Duration::from_secs(2)), None);
        assert_eq!(
            line,
            "Records: total: 12,345, successful: 12,000, failed: 345, mean: 6,173 records/second"
        );
    }

    #[test]
    fn renders_progression_with_expected_total() {
        let line = render(&snapshot(40, 10, Duration::from_secs(1)), Some(200));
        assert_eq!(
            line,
            "Records: total: 50, successful: 40, failed: 10, mean: 50 records/second, progression: 25%"
        );
    }

    #[test]
    fn groups_thousands() {
        assert_eq!(group_thousands(0), "0");
        assert_eq!(group_thousands(999), "999");
        assert_eq!(group_thousands(1_000), "1,000");
        assert_eq!(group_thousands(1_234_567), "1,234,567");
    }

    #[tokio::test]
    async fn stop_returns_the_final_counters() {
        let metrics = Metrics::new();
        let handle = ProgressReporter::new(
            metrics.clone(),
            &MonitoringOptions {
                report_interval: Duration::from_millis(5),
                expected_total: None,
            },
        )
        .start();

        metrics.increment_successes(3);
        tokio::time::sleep(Duration::from_millis(20)).await;
        let snapshot = handle.stop().await;
        assert_eq!(snapshot.records_successful, 3);
    }
}

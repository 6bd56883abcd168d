//! Worker metrics and monitoring

use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;

/// Worker metrics, shared across source loops.
#[derive(Clone)]
pub struct WorkerMetrics {
    inner: Arc<RwLock<MetricsInner>>,
}

#[derive(Default)]
struct MetricsInner {
    /// Total number of entries dispatched
    jobs_processed: u64,
    /// Entries processed and acknowledged
    jobs_succeeded: u64,
    /// Entries left pending (processing or decode failure)
    jobs_failed: u64,
    /// Entries reclaimed from a prior crashed instance
    jobs_recovered: u64,
    /// Callbacks that could not be delivered (job still acknowledged)
    callbacks_failed: u64,
    /// Processing durations (for percentiles)
    durations: Vec<Duration>,
}

impl WorkerMetrics {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(MetricsInner::default())),
        }
    }

    pub fn increment_jobs_processed(&self) {
        self.inner.write().jobs_processed += 1;
    }

    pub fn increment_jobs_succeeded(&self) {
        self.inner.write().jobs_succeeded += 1;
    }

    pub fn increment_jobs_failed(&self) {
        self.inner.write().jobs_failed += 1;
    }

    pub fn add_jobs_recovered(&self, count: u64) {
        self.inner.write().jobs_recovered += count;
    }

    pub fn increment_callbacks_failed(&self) {
        self.inner.write().callbacks_failed += 1;
    }

    /// Record how long one processing attempt took.
    pub fn record_job_duration(&self, duration: Duration) {
        let mut inner = self.inner.write();
        inner.durations.push(duration);

        // Keep only the last 1000 durations to prevent unbounded growth
        if inner.durations.len() > 1000 {
            inner.durations.drain(0..500);
        }
    }

    pub fn jobs_processed(&self) -> u64 {
        self.inner.read().jobs_processed
    }

    pub fn jobs_succeeded(&self) -> u64 {
        self.inner.read().jobs_succeeded
    }

    pub fn jobs_failed(&self) -> u64 {
        self.inner.read().jobs_failed
    }

    pub fn jobs_recovered(&self) -> u64 {
        self.inner.read().jobs_recovered
    }

    pub fn callbacks_failed(&self) -> u64 {
        self.inner.read().callbacks_failed
    }

    /// Average processing duration over the retained window.
    pub fn average_duration(&self) -> Option<Duration> {
        let inner = self.inner.read();
        if inner.durations.is_empty() {
            return None;
        }

        let total: Duration = inner.durations.iter().sum();
        Some(total / inner.durations.len() as u32)
    }

    /// p95 processing duration over the retained window.
    pub fn p95_duration(&self) -> Option<Duration> {
        let inner = self.inner.read();
        if inner.durations.is_empty() {
            return None;
        }

        let mut sorted = inner.durations.clone();
        sorted.sort();
        let index = (sorted.len() as f64 * 0.95) as usize;
        Some(sorted[index.min(sorted.len() - 1)])
    }

    /// Snapshot for the periodic metrics log line.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let inner = self.inner.read();
        MetricsSnapshot {
            jobs_processed: inner.jobs_processed,
            jobs_succeeded: inner.jobs_succeeded,
            jobs_failed: inner.jobs_failed,
            jobs_recovered: inner.jobs_recovered,
            callbacks_failed: inner.callbacks_failed,
            average_duration: {
                if inner.durations.is_empty() {
                    None
                } else {
                    let total: Duration = inner.durations.iter().sum();
                    Some(total / inner.durations.len() as u32)
                }
            },
        }
    }
}

impl Default for WorkerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time.
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub jobs_processed: u64,
    pub jobs_succeeded: u64,
    pub jobs_failed: u64,
    pub jobs_recovered: u64,
    pub callbacks_failed: u64,
    pub average_duration: Option<Duration>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_start_at_zero_and_increment() {
        let metrics = WorkerMetrics::new();

        assert_eq!(metrics.jobs_processed(), 0);

        metrics.increment_jobs_processed();
        metrics.increment_jobs_succeeded();
        metrics.add_jobs_recovered(3);

        assert_eq!(metrics.jobs_processed(), 1);
        assert_eq!(metrics.jobs_succeeded(), 1);
        assert_eq!(metrics.jobs_recovered(), 3);
    }

    #[test]
    fn duration_metrics() {
        let metrics = WorkerMetrics::new();

        metrics.record_job_duration(Duration::from_millis(100));
        metrics.record_job_duration(Duration::from_millis(300));

        assert_eq!(metrics.average_duration(), Some(Duration::from_millis(200)));
        assert!(metrics.p95_duration().is_some());
    }

    #[test]
    fn snapshot_reflects_counters() {
        let metrics = WorkerMetrics::new();
        metrics.increment_jobs_processed();
        metrics.increment_callbacks_failed();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.jobs_processed, 1);
        assert_eq!(snapshot.callbacks_failed, 1);
        assert!(snapshot.average_duration.is_none());
    }
}

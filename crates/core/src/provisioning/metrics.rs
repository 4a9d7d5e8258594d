//! Pipeline outcome counters
//!
//! Every terminal provisioning outcome is observable here as a counter, per
//! the pipeline contract: metrics, not logs, are the required signal. The
//! deferred counters additionally split by trigger (breaker-open vs
//! retries-exhausted) for observability of *why* a request was deferred.

use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic counters for terminal provisioning outcomes
#[derive(Debug, Default)]
pub struct PipelineMetrics {
    completed: AtomicU64,
    deferred: AtomicU64,
    failed: AtomicU64,
    breaker_rejections: AtomicU64,
    retries_exhausted: AtomicU64,
    fallback_publishes: AtomicU64,
}

/// Point-in-time copy of the pipeline counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineMetricsSnapshot {
    pub completed: u64,
    pub deferred: u64,
    pub failed: u64,
    pub breaker_rejections: u64,
    pub retries_exhausted: u64,
    pub fallback_publishes: u64,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_completed(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_deferred(&self) {
        self.deferred.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_breaker_rejection(&self) {
        self.breaker_rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retries_exhausted(&self) {
        self.retries_exhausted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fallback_publish(&self) {
        self.fallback_publishes.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a consistent-enough snapshot for reporting
    pub fn snapshot(&self) -> PipelineMetricsSnapshot {
        PipelineMetricsSnapshot {
            completed: self.completed.load(Ordering::Relaxed),
            deferred: self.deferred.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            breaker_rejections: self.breaker_rejections.load(Ordering::Relaxed),
            retries_exhausted: self.retries_exhausted.load(Ordering::Relaxed),
            fallback_publishes: self.fallback_publishes.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let metrics = PipelineMetrics::new();
        metrics.record_completed();
        metrics.record_completed();
        metrics.record_deferred();
        metrics.record_failed();
        metrics.record_breaker_rejection();
        metrics.record_fallback_publish();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.completed, 2);
        assert_eq!(snapshot.deferred, 1);
        assert_eq!(snapshot.failed, 1);
        assert_eq!(snapshot.breaker_rejections, 1);
        assert_eq!(snapshot.retries_exhausted, 0);
        assert_eq!(snapshot.fallback_publishes, 1);
    }
}

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::caller::CallError;
use crate::dispatch::CallResult;

/// Latencies above this land in the last histogram bucket.
const LATENCY_CAP_MS: usize = 10_000;

/// Per-run aggregation with an integer-millisecond latency histogram
pub struct StatsCollector {
    expect_status: u16,
    total: u64,
    ok: u64,
    http_errors: u64,
    transport_errors: u64,
    latency_buckets: Vec<u64>,
}

impl StatsCollector {
    pub fn new(expect_status: u16) -> Self {
        Self {
            expect_status,
            total: 0,
            ok: 0,
            http_errors: 0,
            transport_errors: 0,
            latency_buckets: vec![0; LATENCY_CAP_MS],
        }
    }

    pub fn record(&mut self, result: &CallResult) {
        self.total += 1;

        match (&result.error, result.status) {
            (Some(CallError::Transport { .. }), _) => self.transport_errors += 1,
            (None, Some(status)) if status == self.expect_status => self.ok += 1,
            _ => self.http_errors += 1,
        }

        self.record_latency(result.latency_ms);
    }

    fn record_latency(&mut self, latency_ms: u64) {
        let bucket_idx = latency_ms.min((self.latency_buckets.len() - 1) as u64) as usize;
        self.latency_buckets[bucket_idx] += 1;
    }

    /// Calculate percentile from the histogram (integer ms)
    pub fn percentile(&self, p: u64) -> u64 {
        let total: u64 = self.latency_buckets.iter().sum();
        if total == 0 {
            return 0;
        }

        let target = (total * p) / 100;
        let mut cumulative = 0u64;

        for (bucket_idx, &count) in self.latency_buckets.iter().enumerate() {
            cumulative += count;
            if cumulative >= target {
                return bucket_idx as u64;
            }
        }

        self.latency_buckets.len() as u64
    }

    pub fn summary(&self, total_duration: Duration, peak_in_flight: u64) -> RunSummary {
        RunSummary {
            total_tasks: self.total,
            success_count: self.ok,
            http_errors: self.http_errors,
            transport_errors: self.transport_errors,
            latency_p50_ms: self.percentile(50),
            latency_p95_ms: self.percentile(95),
            latency_p99_ms: self.percentile(99),
            duration_ms: total_duration.as_millis() as u64,
            peak_in_flight,
        }
    }
}

/// Aggregate outcome of one dispatcher run, computed only after every task
/// has reported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total_tasks: u64,
    pub success_count: u64,
    pub http_errors: u64,
    pub transport_errors: u64,
    pub latency_p50_ms: u64,
    pub latency_p95_ms: u64,
    pub latency_p99_ms: u64,
    pub duration_ms: u64,
    pub peak_in_flight: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(task_index: u64, status: Option<u16>, latency_ms: u64, error: Option<CallError>) -> CallResult {
        CallResult {
            task_index,
            status,
            latency_ms,
            error,
        }
    }

    #[test]
    fn test_bucket_counts_partition_total() {
        let mut stats = StatsCollector::new(200);

        stats.record(&result(0, Some(200), 10, None));
        stats.record(&result(1, Some(200), 12, None));
        stats.record(&result(2, Some(500), 8, Some(CallError::HttpStatus { status: 500 })));
        // 204 is not an error from the transport's view, but it is not the
        // expected status either.
        stats.record(&result(3, Some(204), 9, None));
        stats.record(&result(
            4,
            None,
            30,
            Some(CallError::Transport {
                message: "connection refused".into(),
            }),
        ));

        let summary = stats.summary(Duration::from_millis(100), 2);
        assert_eq!(summary.total_tasks, 5);
        assert_eq!(summary.success_count, 2);
        assert_eq!(summary.http_errors, 2);
        assert_eq!(summary.transport_errors, 1);
        assert_eq!(
            summary.success_count + summary.http_errors + summary.transport_errors,
            summary.total_tasks
        );
        assert_eq!(summary.duration_ms, 100);
        assert_eq!(summary.peak_in_flight, 2);
    }

    #[test]
    fn test_percentile_calculation() {
        let mut stats = StatsCollector::new(200);

        for i in 0..50 {
            stats.record(&result(i, Some(200), 10, None));
        }
        for i in 50..80 {
            stats.record(&result(i, Some(200), 20, None));
        }
        for i in 80..100 {
            stats.record(&result(i, Some(200), 50, None));
        }

        let p50 = stats.percentile(50);
        let p95 = stats.percentile(95);

        assert!(p50 <= 20, "p50 should be around 10-20ms, got {}", p50);
        assert!(p95 >= 20, "p95 should be >= 20ms, got {}", p95);
    }

    #[test]
    fn test_empty_run_summary_is_zero() {
        let stats = StatsCollector::new(200);
        let summary = stats.summary(Duration::ZERO, 0);

        assert_eq!(summary.total_tasks, 0);
        assert_eq!(summary.success_count, 0);
        assert_eq!(summary.latency_p50_ms, 0);
        assert_eq!(summary.duration_ms, 0);
    }

    #[test]
    fn test_latency_cap() {
        let mut stats = StatsCollector::new(200);
        stats.record(&result(0, Some(200), 60_000, None));

        // An absurd latency saturates the last bucket instead of panicking.
        assert_eq!(stats.percentile(100), (LATENCY_CAP_MS - 1) as u64);
    }
}

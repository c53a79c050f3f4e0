//! Rolling per-model call statistics.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Success and latency counters for a single model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub success_count: u64,
    pub total_count: u64,
    /// Running mean of call latency in milliseconds.
    pub avg_response_ms: f64,
}

impl PerformanceMetrics {
    /// Fold one completed call into the counters.
    pub fn record(&mut self, success: bool, elapsed: Duration) {
        self.total_count += 1;
        if success {
            self.success_count += 1;
        }
        let ms = elapsed.as_secs_f64() * 1000.0;
        self.avg_response_ms += (ms - self.avg_response_ms) / self.total_count as f64;
    }

    /// Observed success rate, or `None` before the first call.
    pub fn success_rate(&self) -> Option<f64> {
        if self.total_count == 0 {
            None
        } else {
            Some(self.success_count as f64 / self.total_count as f64)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn running_average_tracks_latency() {
        let mut metrics = PerformanceMetrics::default();
        metrics.record(true, Duration::from_millis(100));
        metrics.record(false, Duration::from_millis(300));

        assert_eq!(metrics.total_count, 2);
        assert_eq!(metrics.success_count, 1);
        assert!((metrics.avg_response_ms - 200.0).abs() < 1e-9);
        assert_eq!(metrics.success_rate(), Some(0.5));
    }

    #[test]
    fn no_rate_before_first_call() {
        assert_eq!(PerformanceMetrics::default().success_rate(), None);
    }
}

//! Session performance metrics: searches, compression, iterations.
//!
//! Fed by the workers and the controller, exported as part of the
//! per-session JSON snapshot for post-hoc analysis.

use crate::providers::SearchProvider;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// One search attempt, successful or not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchMetric {
    pub provider: SearchProvider,
    pub query: String,
    pub success: bool,
    /// True when the failure was rate-limit admission or a provider
    /// rate-limit response.
    pub rate_limited: bool,
}

/// One compression operation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CompressionMetric {
    pub original_size: usize,
    pub compressed_size: usize,
    /// True when the deterministic truncation fallback produced the digest.
    pub fallback: bool,
}

/// Aggregates for one completed research iteration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IterationMetrics {
    pub iteration: u32,
    pub angles: u32,
    pub searches_attempted: u32,
    pub searches_failed: u32,
    pub new_findings: u32,
    pub confidence: f64,
    pub spend_usd: f64,
    pub duration_secs: f64,
    pub gaps: Vec<String>,
}

#[derive(Debug, Default)]
struct Inner {
    searches: Vec<SearchMetric>,
    compressions: Vec<CompressionMetric>,
    iterations: Vec<IterationMetrics>,
}

/// Serializable export of everything tracked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsExport {
    pub searches: Vec<SearchMetric>,
    pub compressions: Vec<CompressionMetric>,
    pub iterations: Vec<IterationMetrics>,
    pub search_success_rate: f64,
    pub avg_compression_ratio: f64,
}

/// Thread-safe metrics sink shared by the controller and all workers.
#[derive(Debug, Default)]
pub struct MetricsTracker {
    inner: Mutex<Inner>,
}

impl MetricsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_search(&self, metric: SearchMetric) {
        self.inner.lock().expect("metrics lock poisoned").searches.push(metric);
    }

    pub fn record_compression(&self, metric: CompressionMetric) {
        self.inner
            .lock()
            .expect("metrics lock poisoned")
            .compressions
            .push(metric);
    }

    pub fn record_iteration(&self, metric: IterationMetrics) {
        self.inner
            .lock()
            .expect("metrics lock poisoned")
            .iterations
            .push(metric);
    }

    /// (attempted, failed) across all searches so far.
    pub fn search_totals(&self) -> (u32, u32) {
        let inner = self.inner.lock().expect("metrics lock poisoned");
        let attempted = inner.searches.len() as u32;
        let failed = inner.searches.iter().filter(|s| !s.success).count() as u32;
        (attempted, failed)
    }

    pub fn iterations(&self) -> Vec<IterationMetrics> {
        self.inner.lock().expect("metrics lock poisoned").iterations.clone()
    }

    pub fn export(&self) -> MetricsExport {
        let inner = self.inner.lock().expect("metrics lock poisoned");
        let successes = inner.searches.iter().filter(|s| s.success).count();
        let search_success_rate = if inner.searches.is_empty() {
            0.0
        } else {
            successes as f64 / inner.searches.len() as f64
        };
        let ratios: Vec<f64> = inner
            .compressions
            .iter()
            .filter(|c| c.original_size > 0)
            .map(|c| c.compressed_size as f64 / c.original_size as f64)
            .collect();
        let avg_compression_ratio = if ratios.is_empty() {
            0.0
        } else {
            ratios.iter().sum::<f64>() / ratios.len() as f64
        };
        MetricsExport {
            searches: inner.searches.clone(),
            compressions: inner.compressions.clone(),
            iterations: inner.iterations.clone(),
            search_success_rate,
            avg_compression_ratio,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn search(success: bool) -> SearchMetric {
        SearchMetric {
            provider: SearchProvider::Brave,
            query: "q".to_string(),
            success,
            rate_limited: false,
        }
    }

    #[test]
    fn test_search_totals() {
        let tracker = MetricsTracker::new();
        tracker.record_search(search(true));
        tracker.record_search(search(false));
        tracker.record_search(search(true));
        assert_eq!(tracker.search_totals(), (3, 1));
    }

    #[test]
    fn test_export_rates() {
        let tracker = MetricsTracker::new();
        tracker.record_search(search(true));
        tracker.record_search(search(false));
        tracker.record_compression(CompressionMetric {
            original_size: 1000,
            compressed_size: 100,
            fallback: false,
        });
        tracker.record_compression(CompressionMetric {
            original_size: 1000,
            compressed_size: 300,
            fallback: true,
        });
        let export = tracker.export();
        assert!((export.search_success_rate - 0.5).abs() < 1e-9);
        assert!((export.avg_compression_ratio - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_empty_export_is_zeroed() {
        let export = MetricsTracker::new().export();
        assert_eq!(export.search_success_rate, 0.0);
        assert_eq!(export.avg_compression_ratio, 0.0);
    }
}

//! Thread-safe running-total cost accumulator with one-shot threshold
//! alerts.

use super::pricing::{ModelClass, price_for};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Mutex;
use tracing::warn;

/// Record of a single priced capability call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageRecord {
    pub timestamp: DateTime<Utc>,
    pub model_class: ModelClass,
    /// What the call was for: "search", "compression", "planning", ...
    pub operation: String,
    pub input_units: u64,
    pub output_units: u64,
    pub cost_usd: f64,
}

/// Point-in-time view of session spend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostSummary {
    pub total_usd: f64,
    pub limit_usd: f64,
    pub limit_used_pct: f64,
    pub total_input_units: u64,
    pub total_output_units: u64,
    pub total_calls: usize,
    pub by_operation: BTreeMap<String, f64>,
}

#[derive(Debug, Default)]
struct LedgerState {
    total_usd: f64,
    total_input_units: u64,
    total_output_units: u64,
    by_operation: BTreeMap<String, f64>,
    history: Vec<UsageRecord>,
    fired_thresholds: Vec<f64>,
}

/// Running-total monetary tracker.
///
/// `spend() >= limit` is the authoritative termination signal consumed
/// by the iteration controller; the ledger only reports state. Alerts
/// fire at most once per threshold per session, via `tracing::warn`.
///
/// Safe for concurrent use from all angle workers.
#[derive(Debug)]
pub struct CostLedger {
    limit_usd: f64,
    alert_thresholds: Vec<f64>,
    state: Mutex<LedgerState>,
}

impl CostLedger {
    pub fn new(limit_usd: f64, alert_thresholds: Vec<f64>) -> Self {
        Self {
            limit_usd,
            alert_thresholds,
            state: Mutex::new(LedgerState::default()),
        }
    }

    /// Record one priced call and return its incremental cost in USD.
    pub fn add_usage(
        &self,
        model_class: ModelClass,
        operation: &str,
        input_units: u64,
        output_units: u64,
    ) -> f64 {
        let cost = price_for(model_class).cost(input_units, output_units);

        let mut state = self.state.lock().expect("ledger lock poisoned");
        state.total_usd += cost;
        state.total_input_units += input_units;
        state.total_output_units += output_units;
        *state.by_operation.entry(operation.to_string()).or_insert(0.0) += cost;
        state.history.push(UsageRecord {
            timestamp: Utc::now(),
            model_class,
            operation: operation.to_string(),
            input_units,
            output_units,
            cost_usd: cost,
        });

        self.check_alerts(&mut state);
        cost
    }

    /// Current cumulative spend in USD. Non-decreasing across a session.
    pub fn spend(&self) -> f64 {
        self.state.lock().expect("ledger lock poisoned").total_usd
    }

    /// Whether the hard ceiling has been reached.
    pub fn limit_reached(&self) -> bool {
        self.spend() >= self.limit_usd
    }

    pub fn limit_usd(&self) -> f64 {
        self.limit_usd
    }

    pub fn summary(&self) -> CostSummary {
        let state = self.state.lock().expect("ledger lock poisoned");
        CostSummary {
            total_usd: state.total_usd,
            limit_usd: self.limit_usd,
            limit_used_pct: if self.limit_usd > 0.0 {
                state.total_usd / self.limit_usd * 100.0
            } else {
                0.0
            },
            total_input_units: state.total_input_units,
            total_output_units: state.total_output_units,
            total_calls: state.history.len(),
            by_operation: state.by_operation.clone(),
        }
    }

    /// Full usage history, for the session snapshot.
    pub fn history(&self) -> Vec<UsageRecord> {
        self.state.lock().expect("ledger lock poisoned").history.clone()
    }

    fn check_alerts(&self, state: &mut LedgerState) {
        if self.limit_usd <= 0.0 {
            return;
        }
        let used = state.total_usd / self.limit_usd;
        for &threshold in &self.alert_thresholds {
            if used >= threshold && !state.fired_thresholds.contains(&threshold) {
                state.fired_thresholds.push(threshold);
                warn!(
                    threshold_pct = threshold * 100.0,
                    spend_usd = state.total_usd,
                    limit_usd = self.limit_usd,
                    "budget threshold crossed"
                );
            }
        }
        if used >= 1.0 && !state.fired_thresholds.contains(&1.0) {
            state.fired_thresholds.push(1.0);
            warn!(
                spend_usd = state.total_usd,
                limit_usd = self.limit_usd,
                "budget ceiling reached"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger(limit: f64) -> CostLedger {
        CostLedger::new(limit, vec![0.5, 0.75, 0.9])
    }

    #[test]
    fn test_add_usage_returns_incremental_cost() {
        let ledger = ledger(1.0);
        let cost = ledger.add_usage(ModelClass::Small, "search", 1_000_000, 0);
        assert!((cost - 0.25).abs() < 1e-9);
        assert!((ledger.spend() - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_spend_is_monotonic() {
        let ledger = ledger(1.0);
        let mut last = 0.0;
        for _ in 0..10 {
            ledger.add_usage(ModelClass::Small, "search", 100_000, 50_000);
            let now = ledger.spend();
            assert!(now >= last);
            last = now;
        }
    }

    #[test]
    fn test_limit_reached_at_ceiling() {
        let ledger = ledger(0.5);
        assert!(!ledger.limit_reached());
        ledger.add_usage(ModelClass::Large, "synthesis", 100_000, 10_000);
        // 0.3 + 0.15 = 0.45 USD, still under
        assert!(!ledger.limit_reached());
        ledger.add_usage(ModelClass::Large, "synthesis", 100_000, 0);
        // + 0.3 USD, over
        assert!(ledger.limit_reached());
    }

    #[test]
    fn test_threshold_fires_once() {
        let ledger = ledger(1.0);
        ledger.add_usage(ModelClass::Large, "planning", 200_000, 0); // 0.6
        ledger.add_usage(ModelClass::Large, "planning", 10_000, 0);
        let state = ledger.state.lock().unwrap();
        let fired_50 = state.fired_thresholds.iter().filter(|t| **t == 0.5).count();
        assert_eq!(fired_50, 1);
    }

    #[test]
    fn test_summary_breaks_down_by_operation() {
        let ledger = ledger(1.0);
        ledger.add_usage(ModelClass::Small, "search", 1_000_000, 0);
        ledger.add_usage(ModelClass::Small, "compression", 1_000_000, 0);
        ledger.add_usage(ModelClass::Small, "search", 1_000_000, 0);
        let summary = ledger.summary();
        assert_eq!(summary.total_calls, 3);
        assert!((summary.by_operation["search"] - 0.5).abs() < 1e-9);
        assert!((summary.by_operation["compression"] - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_concurrent_additions_are_safe() {
        use std::sync::Arc;
        let ledger = Arc::new(ledger(100.0));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let ledger = ledger.clone();
            handles.push(std::thread::spawn(move || {
                for _ in 0..100 {
                    ledger.add_usage(ModelClass::Small, "search", 1000, 1000);
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(ledger.summary().total_calls, 800);
    }
}

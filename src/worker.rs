//! Angle worker: one research angle, a fixed-size batch of searches.
//!
//! Each worker runs independently of its siblings. Per search it
//! selects a provider, acquires rate-limit admission, executes the
//! query, and compresses the result into a finding. Every failure mode
//! is soft: a rejected admission or a failed search skips that one
//! search and the angle continues. Workers never touch the shared
//! findings set; they hand their batch back to the controller.

use crate::budget::{CostLedger, ModelClass};
use crate::capability::{Angle, SearchBackend};
use crate::compress::CompressionStage;
use crate::findings::Finding;
use crate::govern::RateGovernor;
use crate::metrics::{MetricsTracker, SearchMetric};
use crate::providers::{ProviderSelector, QueryType, SelectionConstraints};
use std::sync::Arc;
use tracing::{Instrument, debug, info_span, warn};

/// Query phrasings layered over the angle description so a batch of
/// searches covers distinct facets instead of repeating one query.
const QUERY_VARIATIONS: [&str; 5] = [
    "overview",
    "latest developments",
    "research papers",
    "industry applications",
    "future trends",
];

/// Rough bytes-per-token ratio for cost estimation.
const BYTES_PER_UNIT: u64 = 4;

/// What one worker hands back to the controller.
#[derive(Debug, Default)]
pub struct WorkerOutcome {
    pub angle: String,
    pub findings: Vec<Finding>,
    pub searches_attempted: u32,
    pub searches_failed: u32,
}

impl WorkerOutcome {
    /// Outcome for a worker that produced nothing, used when a spawned
    /// task itself fails.
    pub fn empty(angle: &str) -> Self {
        Self {
            angle: angle.to_string(),
            ..Self::default()
        }
    }
}

/// Executes the search batch for one angle.
pub struct AngleWorker {
    search: Arc<dyn SearchBackend>,
    governor: Arc<RateGovernor>,
    selector: Arc<ProviderSelector>,
    compression: CompressionStage,
    ledger: Arc<CostLedger>,
    metrics: Arc<MetricsTracker>,
    searches_per_angle: u32,
}

impl AngleWorker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        search: Arc<dyn SearchBackend>,
        governor: Arc<RateGovernor>,
        selector: Arc<ProviderSelector>,
        compression: CompressionStage,
        ledger: Arc<CostLedger>,
        metrics: Arc<MetricsTracker>,
        searches_per_angle: u32,
    ) -> Self {
        Self {
            search,
            governor,
            selector,
            compression,
            ledger,
            metrics,
            searches_per_angle,
        }
    }

    /// Run the full search batch for `angle` during `iteration`.
    ///
    /// Infallible: individual search failures are counted and skipped.
    pub async fn run(&self, angle: &Angle, iteration: u32) -> WorkerOutcome {
        let span = info_span!("angle_worker", angle = %angle.name, iteration);
        // Instrument the future rather than entering the span: an
        // entered guard held across an await would leak the span onto
        // whatever task runs next on this thread.
        self.run_batch(angle, iteration).instrument(span).await
    }

    async fn run_batch(&self, angle: &Angle, iteration: u32) -> WorkerOutcome {
        let query_type = angle
            .strategy_hint
            .as_deref()
            .map(QueryType::from_hint)
            .unwrap_or_default();
        let constraints = SelectionConstraints::for_query_type(query_type);

        let mut outcome = WorkerOutcome::empty(&angle.name);

        for i in 0..self.searches_per_angle {
            let variation = QUERY_VARIATIONS[i as usize % QUERY_VARIATIONS.len()];
            let query = format!("{} {}", angle.description, variation);
            outcome.searches_attempted += 1;

            let provider = self.selector.next(&constraints);
            let estimated_units = (query.len() as u64 / BYTES_PER_UNIT).max(1) as u32;

            if let Err(err) = self.governor.acquire(provider, estimated_units).await {
                warn!(provider = %provider, error = %err, "admission rejected, skipping search");
                outcome.searches_failed += 1;
                self.metrics.record_search(SearchMetric {
                    provider,
                    query,
                    success: false,
                    rate_limited: true,
                });
                continue;
            }

            let raw = match self.search.execute(provider, &query).await {
                Ok(raw) => raw,
                Err(err) => {
                    debug!(provider = %provider, error = %err, "search failed, skipping");
                    outcome.searches_failed += 1;
                    self.metrics.record_search(SearchMetric {
                        provider,
                        query,
                        success: false,
                        rate_limited: err.is_rate_limited(),
                    });
                    continue;
                }
            };

            self.metrics.record_search(SearchMetric {
                provider,
                query,
                success: true,
                rate_limited: false,
            });

            let finding = self.compression.compress(&raw, &angle.name, iteration).await;
            self.ledger.add_usage(
                ModelClass::Small,
                "compression",
                finding.original_size as u64 / BYTES_PER_UNIT,
                finding.compressed_size as u64 / BYTES_PER_UNIT,
            );
            outcome.findings.push(finding);
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{Capabilities, RawSearchResult};
    use crate::compress::CompressionConfig;
    use crate::config::ResearchConfig;
    use crate::errors::SearchError;
    use crate::providers::SearchProvider;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CountingBackend {
        calls: AtomicU32,
        fail_every: Option<u32>,
    }

    #[async_trait]
    impl SearchBackend for CountingBackend {
        async fn execute(
            &self,
            provider: SearchProvider,
            query: &str,
        ) -> Result<RawSearchResult, SearchError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(n) = self.fail_every
                && call % n == 0
            {
                return Err(SearchError::Unavailable("backend down".into()));
            }
            Ok(RawSearchResult {
                provider,
                url: format!("https://example.com/{call}"),
                title: "result".to_string(),
                content: format!("content for {query} ").repeat(50),
            })
        }
    }

    fn worker(search: Arc<dyn SearchBackend>, searches: u32) -> AngleWorker {
        let config = ResearchConfig::default();
        let caps = Capabilities::offline();
        let metrics = Arc::new(MetricsTracker::new());
        AngleWorker::new(
            search,
            Arc::new(RateGovernor::new(&config)),
            Arc::new(ProviderSelector::new()),
            CompressionStage::new(
                caps.summarizer,
                metrics.clone(),
                CompressionConfig {
                    target_ratio: 0.1,
                    min_bytes: 64,
                },
            ),
            Arc::new(CostLedger::new(10.0, vec![])),
            metrics,
            searches,
        )
    }

    fn angle() -> Angle {
        Angle {
            name: "market size".to_string(),
            description: "market size and growth".to_string(),
            priority: 1,
            strategy_hint: Some("factual".to_string()),
        }
    }

    #[tokio::test]
    async fn test_successful_batch_produces_findings() {
        let backend = Arc::new(CountingBackend {
            calls: AtomicU32::new(1),
            fail_every: None,
        });
        let outcome = worker(backend, 3).run(&angle(), 1).await;
        assert_eq!(outcome.searches_attempted, 3);
        assert_eq!(outcome.searches_failed, 0);
        assert_eq!(outcome.findings.len(), 3);
        for finding in &outcome.findings {
            assert_eq!(finding.iteration, 1);
            assert_eq!(finding.angle, "market size");
        }
    }

    #[tokio::test]
    async fn test_search_failures_are_soft() {
        let backend = Arc::new(CountingBackend {
            calls: AtomicU32::new(0),
            fail_every: Some(2), // calls 0, 2, 4 fail
        });
        let outcome = worker(backend, 5).run(&angle(), 1).await;
        assert_eq!(outcome.searches_attempted, 5);
        assert_eq!(outcome.searches_failed, 3);
        assert_eq!(outcome.findings.len(), 2);
    }

    #[tokio::test]
    async fn test_all_searches_failing_yields_empty_outcome() {
        let caps = Capabilities::offline();
        let outcome = worker(caps.search, 4).run(&angle(), 2).await;
        assert_eq!(outcome.searches_attempted, 4);
        assert_eq!(outcome.searches_failed, 4);
        assert!(outcome.findings.is_empty());
    }

    #[tokio::test]
    async fn test_findings_are_charged_to_the_ledger() {
        let backend = Arc::new(CountingBackend {
            calls: AtomicU32::new(1),
            fail_every: None,
        });
        let config = ResearchConfig::default();
        let caps = Capabilities::offline();
        let metrics = Arc::new(MetricsTracker::new());
        let ledger = Arc::new(CostLedger::new(10.0, vec![]));
        let worker = AngleWorker::new(
            backend,
            Arc::new(RateGovernor::new(&config)),
            Arc::new(ProviderSelector::new()),
            CompressionStage::new(
                caps.summarizer,
                metrics.clone(),
                CompressionConfig {
                    target_ratio: 0.1,
                    min_bytes: 64,
                },
            ),
            ledger.clone(),
            metrics,
            2,
        );
        worker.run(&angle(), 1).await;
        assert!(ledger.spend() > 0.0);
        assert_eq!(ledger.summary().by_operation.len(), 1);
        assert!(ledger.summary().by_operation.contains_key("compression"));
    }
}

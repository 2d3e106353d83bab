//! The iteration controller: plan → fan out → join → score → decide.
//!
//! The controller owns all loop-carried state. Workers receive one
//! angle each and hand back their batch; the scorer and compactor see
//! the findings set read-only. Termination is decided in a fixed
//! order (cost, then iterations, then confidence) so the cost ceiling
//! always dominates the quality check.

mod snapshot;

pub use snapshot::SessionSnapshot;

use crate::budget::{CostLedger, ModelClass};
use crate::capability::{Angle, Capabilities};
use crate::compact::ContextCompactor;
use crate::compress::{CompressionConfig, CompressionStage};
use crate::config::ResearchConfig;
use crate::errors::ConfigError;
use crate::findings::FindingsSet;
use crate::govern::RateGovernor;
use crate::metrics::{IterationMetrics, MetricsTracker};
use crate::providers::ProviderSelector;
use crate::score::{ConfidenceScorer, Decision, VerificationResult};
use crate::worker::{AngleWorker, WorkerOutcome};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

/// Rough bytes-per-token ratio for cost estimation of LLM calls.
const BYTES_PER_UNIT: u64 = 4;

/// Where the loop currently is. Informational: drives logging, not
/// control flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoopState {
    Planning,
    Searching,
    Verifying,
    Continuing,
    Finalizing,
    Done,
}

/// Why the session stopped iterating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerminationReason {
    #[serde(rename = "cost-exceeded")]
    CostExceeded,
    #[serde(rename = "iteration-exceeded")]
    IterationsExhausted,
    #[serde(rename = "satisfied")]
    Satisfied,
}

impl std::fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::CostExceeded => "cost-exceeded",
            Self::IterationsExhausted => "iteration-exceeded",
            Self::Satisfied => "satisfied",
        };
        write!(f, "{s}")
    }
}

/// Controller-owned loop state, created at session start and discarded
/// at session end.
#[derive(Debug)]
struct SessionState {
    iteration: u32,
    findings: FindingsSet,
    last_verification: Option<VerificationResult>,
}

/// Metadata accompanying the terminal report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub session_id: Uuid,
    pub query: String,
    pub total_iterations: u32,
    pub total_searches: u32,
    pub failed_searches: u32,
    pub total_cost_usd: f64,
    pub final_confidence: f64,
    pub termination_reason: TerminationReason,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// The session's only durable output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchReport {
    pub report: String,
    pub metadata: ReportMetadata,
}

/// Drives the research loop end to end.
pub struct IterationController {
    config: ResearchConfig,
    capabilities: Capabilities,
    ledger: Arc<CostLedger>,
    governor: Arc<RateGovernor>,
    selector: Arc<ProviderSelector>,
    metrics: Arc<MetricsTracker>,
    compression: CompressionStage,
    scorer: ConfidenceScorer,
    compactor: ContextCompactor,
}

impl IterationController {
    /// Build a controller, validating the configuration first. An
    /// invalid configuration is the only fatal error in the system.
    pub fn new(config: ResearchConfig, capabilities: Capabilities) -> Result<Self, ConfigError> {
        config.validate()?;

        let ledger = Arc::new(CostLedger::new(
            config.cost_limit_usd,
            config.alert_thresholds.clone(),
        ));
        let governor = Arc::new(RateGovernor::new(&config));
        let selector = Arc::new(ProviderSelector::new());
        let metrics = Arc::new(MetricsTracker::new());
        let compression = CompressionStage::new(
            capabilities.summarizer.clone(),
            metrics.clone(),
            CompressionConfig {
                target_ratio: config.compression_target_ratio,
                min_bytes: config.min_compressed_bytes,
            },
        );
        let scorer = ConfidenceScorer::new(capabilities.evaluator.clone(), config.score_weights);
        let compactor = ContextCompactor::new(compression.clone());

        Ok(Self {
            config,
            capabilities,
            ledger,
            governor,
            selector,
            metrics,
            compression,
            scorer,
            compactor,
        })
    }

    /// Run one full research session for `query`.
    ///
    /// Infallible by construction: every capability failure degrades
    /// locally, and the budget guarantees the loop terminates within
    /// `max_iterations` batches.
    pub async fn run(&self, query: &str) -> ResearchReport {
        let session_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!(%session_id, query, "research session started");

        let mut state = SessionState {
            iteration: 0,
            findings: FindingsSet::new(),
            last_verification: None,
        };
        let mut verifications = Vec::new();
        let mut gaps: Vec<String> = Vec::new();

        let reason = loop {
            state.iteration += 1;
            let iteration_start = Instant::now();
            info!(state = ?LoopState::Planning, iteration = state.iteration, "iteration started");

            let angles = self.plan(query, &state, &gaps).await;
            info!(state = ?LoopState::Searching, angles = angles.len(), "fanning out workers");
            let outcomes = self.fan_out(&angles, state.iteration).await;

            let mut attempted = 0;
            let mut failed = 0;
            let mut new_findings = 0;
            for outcome in outcomes {
                attempted += outcome.searches_attempted;
                failed += outcome.searches_failed;
                new_findings += outcome.findings.len() as u32;
                state.findings.extend(outcome.findings);
            }

            info!(state = ?LoopState::Verifying, findings = state.findings.len(), "scoring findings");
            let mut verification = self.verify(query, &state.findings).await;

            // The decision reflects the threshold comparison alone,
            // even when a ceiling fires in the same iteration.
            if verification.confidence >= self.config.confidence_threshold {
                verification.decision = Decision::Complete;
            }

            // Decision rule, fixed order: cost dominates iterations
            // dominates confidence.
            let decision = if self.ledger.limit_reached() {
                Some(TerminationReason::CostExceeded)
            } else if state.iteration >= self.config.max_iterations {
                Some(TerminationReason::IterationsExhausted)
            } else if verification.decision == Decision::Complete {
                Some(TerminationReason::Satisfied)
            } else {
                None
            };

            self.metrics.record_iteration(IterationMetrics {
                iteration: state.iteration,
                angles: angles.len() as u32,
                searches_attempted: attempted,
                searches_failed: failed,
                new_findings,
                confidence: verification.confidence,
                spend_usd: self.ledger.spend(),
                duration_secs: iteration_start.elapsed().as_secs_f64(),
                gaps: verification.gaps.clone(),
            });

            gaps = verification.gaps.clone();
            let mut next_angles = verification.recommended_angles.clone();
            gaps.append(&mut next_angles);
            verifications.push(verification.clone());
            state.last_verification = Some(verification);

            if let Some(reason) = decision {
                info!(state = ?LoopState::Finalizing, %reason, "loop terminating");
                break reason;
            }
            info!(
                state = ?LoopState::Continuing,
                iteration = state.iteration,
                spend_usd = self.ledger.spend(),
                "continuing to next iteration"
            );
        };

        let report = self.finalize(query, &state.findings).await;
        let finished_at = Utc::now();
        let (total_searches, failed_searches) = self.metrics.search_totals();
        let final_confidence = state
            .last_verification
            .as_ref()
            .map(|v| v.confidence)
            .unwrap_or(0.0);

        self.write_snapshot(
            session_id,
            query,
            started_at,
            finished_at,
            reason,
            final_confidence,
            verifications,
        );

        info!(state = ?LoopState::Done, %session_id, %reason, "research session finished");
        ResearchReport {
            report,
            metadata: ReportMetadata {
                session_id,
                query: query.to_string(),
                total_iterations: state.iteration,
                total_searches,
                failed_searches,
                total_cost_usd: self.ledger.spend(),
                final_confidence,
                termination_reason: reason,
                started_at,
                finished_at,
            },
        }
    }

    /// Plan the next batch of angles, degrading to the single fallback
    /// angle when the planner fails or returns nothing.
    async fn plan(&self, query: &str, state: &SessionState, gaps: &[String]) -> Vec<Angle> {
        let summary = state.findings.summary(20);
        let planned = self
            .capabilities
            .planner
            .plan(query, &summary, state.iteration, gaps)
            .await;

        self.ledger.add_usage(
            ModelClass::Large,
            "planning",
            (query.len() + summary.len()) as u64 / BYTES_PER_UNIT,
            256,
        );

        match planned {
            Ok(angles) if !angles.is_empty() => angles
                .into_iter()
                .take(self.config.num_angles as usize)
                .collect(),
            Ok(_) => {
                warn!("planner returned no angles, using fallback");
                vec![Angle::fallback(query)]
            }
            Err(err) => {
                warn!(error = %err, "planning failed, using fallback angle");
                vec![Angle::fallback(query)]
            }
        }
    }

    /// Spawn one worker per angle and join the whole batch. A failed
    /// worker task contributes an empty outcome; its siblings merge
    /// normally.
    async fn fan_out(&self, angles: &[Angle], iteration: u32) -> Vec<WorkerOutcome> {
        let mut handles = Vec::with_capacity(angles.len());
        for angle in angles {
            let worker = AngleWorker::new(
                self.capabilities.search.clone(),
                self.governor.clone(),
                self.selector.clone(),
                self.compression.clone(),
                self.ledger.clone(),
                self.metrics.clone(),
                self.config.searches_per_angle,
            );
            let angle = angle.clone();
            handles.push((
                angle.name.clone(),
                tokio::spawn(async move { worker.run(&angle, iteration).await }),
            ));
        }

        futures::future::join_all(handles.into_iter().map(|(name, handle)| async move {
            match handle.await {
                Ok(outcome) => outcome,
                Err(err) => {
                    warn!(angle = %name, error = %err, "worker task failed");
                    WorkerOutcome::empty(&name)
                }
            }
        }))
        .await
    }

    async fn verify(&self, query: &str, findings: &FindingsSet) -> VerificationResult {
        let result = self.scorer.score(query, findings).await;
        self.ledger.add_usage(
            ModelClass::Large,
            "verification",
            findings.total_compressed_size() as u64 / BYTES_PER_UNIT,
            512,
        );
        result
    }

    /// Compact the findings, then synthesize the terminal report.
    /// Synthesizer failure degrades to the deterministic fallback
    /// report; a session always produces a report.
    async fn finalize(&self, query: &str, findings: &FindingsSet) -> String {
        let compacted = self
            .compactor
            .compact(
                findings,
                self.config.synthesis_budget_bytes,
                self.config.compaction_strategy,
            )
            .await;

        let written = self.capabilities.synthesizer.write(query, &compacted).await;
        self.ledger.add_usage(
            ModelClass::Large,
            "synthesis",
            compacted.total_compressed_size() as u64 / BYTES_PER_UNIT,
            2048,
        );

        match written {
            Ok(report) => report,
            Err(err) => {
                warn!(error = %err, "synthesis failed, writing fallback report");
                fallback_report(query, &compacted)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn write_snapshot(
        &self,
        session_id: Uuid,
        query: &str,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        reason: TerminationReason,
        final_confidence: f64,
        verifications: Vec<VerificationResult>,
    ) {
        let Some(dir) = self.config.snapshot_dir.as_deref() else {
            return;
        };
        let snapshot = SessionSnapshot {
            session_id,
            query: query.to_string(),
            started_at,
            finished_at,
            termination_reason: reason,
            final_confidence,
            config: self.config.clone(),
            verifications,
            cost: self.ledger.summary(),
            usage_history: self.ledger.history(),
            governor: self.governor.stats(),
            metrics: self.metrics.export(),
        };
        match snapshot.write(dir) {
            Ok(path) => info!(path = %path.display(), "session snapshot written"),
            Err(err) => warn!(error = %err, "snapshot write failed"),
        }
    }
}

/// Deterministic report assembled from the findings themselves, used
/// when the synthesis capability is unavailable.
fn fallback_report(query: &str, findings: &FindingsSet) -> String {
    let mut out = String::new();
    out.push_str(&format!("# Research Report: {query}\n\n"));

    if findings.is_empty() {
        out.push_str("No findings were collected for this query.\n");
        return out;
    }

    out.push_str(&format!(
        "Assembled from {} findings across {} sources.\n\n## Key Points\n\n",
        findings.len(),
        findings.distinct_urls().len()
    ));
    for finding in findings.iter() {
        for point in finding.key_points.iter().take(3) {
            out.push_str(&format!("- {point} ({})\n", finding.source_url));
        }
        for (metric, value) in &finding.numerical_data {
            out.push_str(&format!("- {metric}: {value} ({})\n", finding.source_url));
        }
    }

    out.push_str("\n## Sources\n\n");
    for url in findings.distinct_urls() {
        out.push_str(&format!("- {url}\n"));
    }
    out
}

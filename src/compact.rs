//! Findings compaction before final synthesis.
//!
//! The compactor never mutates the controller's set in place; it
//! produces a new, reduced set and the controller swaps it in right
//! before the synthesis call. Compaction never runs during active
//! iteration, so the scorer always sees the full accumulation.

use crate::capability::RawSearchResult;
use crate::compress::CompressionStage;
use crate::findings::{Finding, FindingsSet};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::info;

/// How the findings set is reduced when it overshoots the synthesis
/// input budget.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompactionStrategy {
    /// Keep the two most recent iterations verbatim; older findings
    /// survive only if relevant enough.
    #[default]
    RecentAndRelevant,
    /// Re-compress every finding's digest down to a tighter budget.
    Recompress,
    /// Drop duplicate source URLs, first occurrence wins. Idempotent.
    DedupeOnly,
}

/// Relevance floor older findings must clear under
/// [`CompactionStrategy::RecentAndRelevant`].
const RELEVANCE_FLOOR: f64 = 0.6;

pub struct ContextCompactor {
    compression: CompressionStage,
}

impl ContextCompactor {
    pub fn new(compression: CompressionStage) -> Self {
        Self { compression }
    }

    /// Produce a reduced set whose total digest size fits
    /// `target_size` as closely as the strategy allows.
    ///
    /// A set already within budget is returned unchanged apart from
    /// strategy-inherent effects (dedupe always drops duplicates).
    pub async fn compact(
        &self,
        findings: &FindingsSet,
        target_size: usize,
        strategy: CompactionStrategy,
    ) -> FindingsSet {
        let before = findings.total_compressed_size();
        let compacted = match strategy {
            CompactionStrategy::DedupeOnly => dedupe(findings),
            CompactionStrategy::RecentAndRelevant => {
                if before <= target_size {
                    findings.clone()
                } else {
                    recent_and_relevant(findings)
                }
            }
            CompactionStrategy::Recompress => {
                if before <= target_size {
                    findings.clone()
                } else {
                    self.recompress(findings, target_size).await
                }
            }
        };
        info!(
            strategy = ?strategy,
            before_bytes = before,
            after_bytes = compacted.total_compressed_size(),
            kept = compacted.len(),
            dropped = findings.len() - compacted.len(),
            "compacted findings"
        );
        compacted
    }

    /// Run every digest back through the compression stage with a
    /// per-finding share of the target budget.
    async fn recompress(&self, findings: &FindingsSet, target_size: usize) -> FindingsSet {
        let per_finding = (target_size / findings.len().max(1)).max(1);
        let mut out = Vec::with_capacity(findings.len());
        for finding in findings.iter() {
            if finding.compressed_size <= per_finding {
                out.push(finding.clone());
                continue;
            }
            // Feed the digest's own text back through the stage as if
            // it were raw content; sizes stay anchored to the original.
            let raw = RawSearchResult {
                provider: finding.provider,
                url: finding.source_url.clone(),
                title: finding.angle.clone(),
                content: finding.key_points.join("\n"),
            };
            let mut tighter = self
                .compression
                .compress(&raw, &finding.angle, finding.iteration)
                .await;
            tighter.original_size = finding.original_size;
            tighter.compressed_size = tighter.compressed_size.min(finding.compressed_size);
            tighter.credibility = finding.credibility;
            tighter.relevance = finding.relevance;
            tighter.numerical_data = finding.numerical_data.clone();
            out.push(tighter);
        }
        out.into()
    }
}

/// First occurrence of each source URL wins; order is preserved.
fn dedupe(findings: &FindingsSet) -> FindingsSet {
    let mut seen = BTreeSet::new();
    let kept: Vec<Finding> = findings
        .iter()
        .filter(|f| seen.insert(f.source_url.clone()))
        .cloned()
        .collect();
    kept.into()
}

fn recent_and_relevant(findings: &FindingsSet) -> FindingsSet {
    let latest = findings.latest_iteration();
    let verbatim_floor = latest.saturating_sub(1);
    let kept: Vec<Finding> = findings
        .iter()
        .filter(|f| f.iteration >= verbatim_floor || effective_relevance(f) >= RELEVANCE_FLOOR)
        .cloned()
        .collect();
    kept.into()
}

/// Relevance boosted for findings that carry substance: extracted key
/// points and preserved numeric facts.
fn effective_relevance(finding: &Finding) -> f64 {
    let mut score = finding.relevance;
    if finding.key_points.len() >= 3 {
        score += 0.05;
    }
    if !finding.numerical_data.is_empty() {
        score += 0.1;
    }
    score.clamp(0.0, 1.0)
}

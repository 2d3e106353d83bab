//! Confidence scoring over the accumulated findings.
//!
//! The four sub-scores come from one batched evaluation call, never
//! four separate ones. The scorer reports the combined scalar only;
//! it does not see the confidence threshold. The controller owns the
//! threshold comparison and stamps the decision onto the result, so
//! measurement and policy stay separate.

use crate::capability::{Evaluation, Evaluator};
use crate::config::ScoreWeights;
use crate::findings::FindingsSet;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

/// Continue researching or stop and synthesize.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    #[default]
    Continue,
    Complete,
}

/// Full verification output for one iteration, recomputed fresh from
/// the entire findings set each time. Later findings can retroactively
/// resolve or introduce inconsistency with earlier ones, so nothing is
/// carried over incrementally.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerificationResult {
    pub coverage: f64,
    pub depth: f64,
    pub source_quality: f64,
    pub consistency: f64,
    /// Weighted combination of the four sub-scores, in [0, 1].
    pub confidence: f64,
    pub gaps: Vec<String>,
    pub recommended_angles: Vec<String>,
    /// Stamped by the controller after the threshold comparison.
    pub decision: Decision,
}

/// Combines evaluator sub-scores into one confidence scalar.
pub struct ConfidenceScorer {
    evaluator: Arc<dyn Evaluator>,
    weights: ScoreWeights,
}

impl ConfidenceScorer {
    pub fn new(evaluator: Arc<dyn Evaluator>, weights: ScoreWeights) -> Self {
        Self { evaluator, weights }
    }

    /// Score the current findings against the query.
    ///
    /// Infallible: evaluator failure yields the conservative default
    /// (confidence 0, decision continue) rather than an error, so a
    /// broken evaluator can never terminate a session early.
    pub async fn score(&self, query: &str, findings: &FindingsSet) -> VerificationResult {
        match self.evaluator.verify(query, findings).await {
            Ok(evaluation) => self.combine(evaluation),
            Err(err) => {
                warn!(error = %err, "evaluation failed, using conservative default");
                VerificationResult {
                    gaps: vec!["verification unavailable".to_string()],
                    ..VerificationResult::default()
                }
            }
        }
    }

    fn combine(&self, evaluation: Evaluation) -> VerificationResult {
        let coverage = clamp_unit(evaluation.coverage);
        let depth = clamp_unit(evaluation.depth);
        let source_quality = clamp_unit(evaluation.source_quality);
        let consistency = clamp_unit(evaluation.consistency);

        let confidence = self.weights.coverage * coverage
            + self.weights.depth * depth
            + self.weights.source_quality * source_quality
            + self.weights.consistency * consistency;

        VerificationResult {
            coverage,
            depth,
            source_quality,
            consistency,
            confidence: confidence.clamp(0.0, 1.0),
            gaps: evaluation.gaps,
            recommended_angles: evaluation.recommended_angles,
            decision: Decision::Continue,
        }
    }
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::Capabilities;
    use crate::errors::CapabilityError;
    use async_trait::async_trait;

    struct FixedEvaluator(Evaluation);

    #[async_trait]
    impl Evaluator for FixedEvaluator {
        async fn verify(
            &self,
            _query: &str,
            _findings: &FindingsSet,
        ) -> Result<Evaluation, CapabilityError> {
            Ok(self.0.clone())
        }
    }

    fn scorer(evaluation: Evaluation) -> ConfidenceScorer {
        ConfidenceScorer::new(Arc::new(FixedEvaluator(evaluation)), ScoreWeights::default())
    }

    #[tokio::test]
    async fn test_weighted_combination() {
        let result = scorer(Evaluation {
            coverage: 0.9,
            depth: 0.6,
            source_quality: 0.9,
            consistency: 0.75,
            ..Evaluation::default()
        })
        .score("q", &FindingsSet::new())
        .await;
        // 0.30*0.9 + 0.25*0.6 + 0.25*0.9 + 0.20*0.75
        assert!((result.confidence - 0.795).abs() < 1e-9);
        assert_eq!(result.decision, Decision::Continue);
    }

    #[tokio::test]
    async fn test_sub_scores_are_clamped() {
        let result = scorer(Evaluation {
            coverage: 1.7,
            depth: -0.4,
            source_quality: f64::NAN,
            consistency: 0.5,
            ..Evaluation::default()
        })
        .score("q", &FindingsSet::new())
        .await;
        assert!((result.coverage - 1.0).abs() < f64::EPSILON);
        assert_eq!(result.depth, 0.0);
        assert_eq!(result.source_quality, 0.0);
        // 0.30*1.0 + 0.20*0.5
        assert!((result.confidence - 0.40).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_evaluator_failure_is_conservative_default() {
        let caps = Capabilities::offline();
        let scorer = ConfidenceScorer::new(caps.evaluator, ScoreWeights::default());
        let result = scorer.score("q", &FindingsSet::new()).await;
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.decision, Decision::Continue);
        assert_eq!(result.gaps, vec!["verification unavailable".to_string()]);
    }

    #[tokio::test]
    async fn test_gaps_and_recommendations_pass_through() {
        let result = scorer(Evaluation {
            coverage: 0.5,
            gaps: vec!["pricing data missing".to_string()],
            recommended_angles: vec!["regulatory landscape".to_string()],
            ..Evaluation::default()
        })
        .score("q", &FindingsSet::new())
        .await;
        assert_eq!(result.gaps.len(), 1);
        assert_eq!(result.recommended_angles.len(), 1);
    }
}

//! Trait seams for the external collaborators the loop orchestrates.
//!
//! The controller treats "ask a language model to do X" and "call
//! search provider P with query Q" as opaque capability calls with a
//! declared input/output contract. Every call returns an explicit
//! `Result` so failure handling is visible in the type signature; each
//! call site owns its degraded default.

use crate::errors::{CapabilityError, SearchError};
use crate::findings::{Credibility, FindingsSet};
use crate::providers::SearchProvider;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// One distinct research sub-question pursued by one worker in an
/// iteration. Produced by the planner, consumed by exactly one worker,
/// discarded after its findings are merged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Angle {
    pub name: String,
    pub description: String,
    /// 1 (highest) to 5 (lowest). Informational; all angles in a batch run.
    pub priority: u8,
    /// Free-form hint biasing provider selection ("technical", "academic", ...).
    pub strategy_hint: Option<String>,
}

impl Angle {
    /// Deterministic single generic angle derived from the raw query.
    ///
    /// Used when the planner fails, so the loop never stalls on
    /// planner failure.
    pub fn fallback(query: &str) -> Self {
        Self {
            name: "general".to_string(),
            description: format!("General background and overview of: {query}"),
            priority: 1,
            strategy_hint: None,
        }
    }
}

/// Raw sub-score bundle from one batched evaluation call.
///
/// Scalars are expected in [0, 1] but are clamped again by the scorer;
/// an evaluator that returns junk is treated as malformed upstream.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Evaluation {
    pub coverage: f64,
    pub depth: f64,
    pub source_quality: f64,
    pub consistency: f64,
    pub gaps: Vec<String>,
    pub recommended_angles: Vec<String>,
}

/// One raw search result blob before compression.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawSearchResult {
    pub provider: SearchProvider,
    pub url: String,
    pub title: String,
    pub content: String,
}

/// Structured digest produced by the summarization capability (or the
/// deterministic fallback compressor).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Digest {
    pub key_points: Vec<String>,
    pub summary: String,
    pub numerical_data: BTreeMap<String, String>,
    pub credibility: Credibility,
    /// Relevance to the query, [0, 1].
    pub relevance: f64,
}

/// Produces research angles for the next iteration.
#[async_trait]
pub trait Planner: Send + Sync {
    async fn plan(
        &self,
        query: &str,
        findings_summary: &str,
        iteration: u32,
        gaps: &[String],
    ) -> Result<Vec<Angle>, CapabilityError>;
}

/// Scores the accumulated findings for sufficiency in one batched call.
#[async_trait]
pub trait Evaluator: Send + Sync {
    async fn verify(&self, query: &str, findings: &FindingsSet)
    -> Result<Evaluation, CapabilityError>;
}

/// Executes one search against one provider.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn execute(
        &self,
        provider: SearchProvider,
        query: &str,
    ) -> Result<RawSearchResult, SearchError>;
}

/// Compresses raw content into a structured digest of roughly
/// `target_size` bytes.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn compress(&self, content: &str, target_size: usize)
    -> Result<Digest, CapabilityError>;
}

/// Writes the terminal report from the compacted findings.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    async fn write(&self, query: &str, findings: &FindingsSet)
    -> Result<String, CapabilityError>;
}

/// The full set of external collaborators a session runs against.
#[derive(Clone)]
pub struct Capabilities {
    pub planner: Arc<dyn Planner>,
    pub evaluator: Arc<dyn Evaluator>,
    pub search: Arc<dyn SearchBackend>,
    pub summarizer: Arc<dyn Summarizer>,
    pub synthesizer: Arc<dyn Synthesizer>,
}

impl Capabilities {
    /// A capability set with no live backends.
    ///
    /// Every call reports `Unavailable`, which exercises the loop's
    /// degraded paths end to end: fallback angle, zero-confidence
    /// verification, skipped searches, deterministic report.
    pub fn offline() -> Self {
        let offline = Arc::new(Offline);
        Self {
            planner: offline.clone(),
            evaluator: offline.clone(),
            search: offline.clone(),
            summarizer: offline.clone(),
            synthesizer: offline,
        }
    }
}

/// Unit collaborator that reports every capability as unavailable.
struct Offline;

#[async_trait]
impl Planner for Offline {
    async fn plan(
        &self,
        _query: &str,
        _findings_summary: &str,
        _iteration: u32,
        _gaps: &[String],
    ) -> Result<Vec<Angle>, CapabilityError> {
        Err(CapabilityError::Unavailable("no planner configured".into()))
    }
}

#[async_trait]
impl Evaluator for Offline {
    async fn verify(
        &self,
        _query: &str,
        _findings: &FindingsSet,
    ) -> Result<Evaluation, CapabilityError> {
        Err(CapabilityError::Unavailable("no evaluator configured".into()))
    }
}

#[async_trait]
impl SearchBackend for Offline {
    async fn execute(
        &self,
        provider: SearchProvider,
        _query: &str,
    ) -> Result<RawSearchResult, SearchError> {
        Err(SearchError::Unavailable(format!(
            "no search backend configured for {provider}"
        )))
    }
}

#[async_trait]
impl Summarizer for Offline {
    async fn compress(
        &self,
        _content: &str,
        _target_size: usize,
    ) -> Result<Digest, CapabilityError> {
        Err(CapabilityError::Unavailable("no summarizer configured".into()))
    }
}

#[async_trait]
impl Synthesizer for Offline {
    async fn write(
        &self,
        _query: &str,
        _findings: &FindingsSet,
    ) -> Result<String, CapabilityError> {
        Err(CapabilityError::Unavailable("no synthesizer configured".into()))
    }
}

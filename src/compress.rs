//! Compression stage: raw search result → bounded structured digest.
//!
//! Summarization is delegated to an external capability. When that
//! capability fails or returns garbage, a deterministic truncation
//! compressor takes over (head of the content plus any detected
//! numeric tokens), so compression can never block the pipeline.
//! Original and compressed sizes are recorded either way.

use crate::capability::{Digest, RawSearchResult, Summarizer};
use crate::findings::{Credibility, Finding};
use crate::metrics::{CompressionMetric, MetricsTracker};
use regex::Regex;
use std::sync::Arc;
use std::sync::LazyLock;
use tracing::debug;

/// Matches numeric facts worth preserving verbatim: percentages,
/// dollar amounts, and large or decimal numbers with optional
/// magnitude suffixes.
static NUMERIC_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$?\d[\d,]*\.?\d*\s*(?:%|percent|billion|million|thousand|[kMB])?")
        .expect("numeric token pattern is valid")
});

#[derive(Debug, Clone, Copy)]
pub struct CompressionConfig {
    /// Target digest size as a fraction of the raw size.
    pub target_ratio: f64,
    /// Absolute floor for the target, protecting short content.
    pub min_bytes: usize,
}

/// Reduces one raw result blob to a bounded-size [`Finding`].
#[derive(Clone)]
pub struct CompressionStage {
    summarizer: Arc<dyn Summarizer>,
    metrics: Arc<MetricsTracker>,
    config: CompressionConfig,
}

impl CompressionStage {
    pub fn new(
        summarizer: Arc<dyn Summarizer>,
        metrics: Arc<MetricsTracker>,
        config: CompressionConfig,
    ) -> Self {
        Self {
            summarizer,
            metrics,
            config,
        }
    }

    /// Digest target size for raw content of `original_size` bytes.
    fn target_size(&self, original_size: usize) -> usize {
        let scaled = (original_size as f64 * self.config.target_ratio) as usize;
        scaled.max(self.config.min_bytes)
    }

    /// Compress one raw result into a finding attributed to `angle`
    /// and `iteration`. Infallible: capability failure falls back to
    /// deterministic truncation.
    pub async fn compress(
        &self,
        raw: &RawSearchResult,
        angle: &str,
        iteration: u32,
    ) -> Finding {
        let original_size = raw.content.len();
        let target = self.target_size(original_size);

        let (digest, fallback) = match self.summarizer.compress(&raw.content, target).await {
            Ok(digest) => (digest, false),
            Err(err) => {
                debug!(url = %raw.url, error = %err, "summarizer failed, using truncation fallback");
                (fallback_digest(&raw.content, target), true)
            }
        };

        // Digest byte size is what actually lands in context.
        let digest_size = serde_json::to_string(&digest)
            .map(|s| s.len())
            .unwrap_or(target);
        let compressed_size = digest_size.min(original_size);

        self.metrics.record_compression(CompressionMetric {
            original_size,
            compressed_size,
            fallback,
        });

        Finding {
            source_url: raw.url.clone(),
            provider: raw.provider,
            key_points: digest.key_points,
            numerical_data: digest.numerical_data,
            credibility: digest.credibility,
            relevance: digest.relevance.clamp(0.0, 1.0),
            original_size,
            compressed_size,
            iteration,
            angle: angle.to_string(),
        }
    }
}

/// Deterministic truncation compressor: keep the head of the content
/// up to the target size plus any detected numeric tokens.
fn fallback_digest(content: &str, target_size: usize) -> Digest {
    let head = truncate_at_char_boundary(content, target_size);

    let mut numerical_data = std::collections::BTreeMap::new();
    for (i, token) in NUMERIC_TOKEN
        .find_iter(content)
        .map(|m| m.as_str().trim())
        .filter(|t| t.len() > 1)
        .take(10)
        .enumerate()
    {
        numerical_data.insert(format!("figure_{}", i + 1), token.to_string());
    }

    Digest {
        key_points: vec![head.to_string()],
        summary: truncate_at_char_boundary(head, 200).to_string(),
        numerical_data,
        // Truncation preserves nothing about the source; score it low.
        credibility: Credibility::Low,
        relevance: 0.5,
    }
}

fn truncate_at_char_boundary(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

//! Findings data model: the compressed digests accumulated across
//! research iterations.
//!
//! A [`Finding`] is immutable once built. The [`FindingsSet`] is an
//! append-only ordered sequence owned exclusively by the iteration
//! controller; workers only ever hand back their own batches. The set
//! never shrinks during active iteration — only the compactor produces
//! a new, reduced set right before final synthesis.

use crate::providers::SearchProvider;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::collections::BTreeSet;

/// Source credibility assessed at compression time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Credibility {
    High,
    #[default]
    Medium,
    Low,
}

/// One compressed, structured digest of a single search result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub source_url: String,
    pub provider: SearchProvider,
    /// 5–10 extracted key points, in source order.
    pub key_points: Vec<String>,
    /// Preserved numeric facts, metric name → value.
    pub numerical_data: BTreeMap<String, String>,
    pub credibility: Credibility,
    /// Relevance to the research query, clamped to [0, 1].
    pub relevance: f64,
    /// Size of the raw search result in bytes.
    pub original_size: usize,
    /// Size of the digest in bytes. Never exceeds `original_size`.
    pub compressed_size: usize,
    /// Iteration that produced this finding (1-based).
    pub iteration: u32,
    /// Name of the research angle that ran the search.
    pub angle: String,
}

impl Finding {
    /// Achieved compression ratio, 0 for empty input.
    pub fn compression_ratio(&self) -> f64 {
        if self.original_size == 0 {
            0.0
        } else {
            self.compressed_size as f64 / self.original_size as f64
        }
    }
}

/// Append-only ordered sequence of findings across all iterations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FindingsSet {
    findings: Vec<Finding>,
}

impl FindingsSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, finding: Finding) {
        self.findings.push(finding);
    }

    pub fn extend(&mut self, findings: Vec<Finding>) {
        self.findings.extend(findings);
    }

    pub fn len(&self) -> usize {
        self.findings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.findings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter()
    }

    /// Total digest bytes held by the set.
    pub fn total_compressed_size(&self) -> usize {
        self.findings.iter().map(|f| f.compressed_size).sum()
    }

    /// Highest iteration number present, 0 for an empty set.
    pub fn latest_iteration(&self) -> u32 {
        self.findings.iter().map(|f| f.iteration).max().unwrap_or(0)
    }

    /// Distinct source URLs, in first-seen order.
    pub fn distinct_urls(&self) -> Vec<&str> {
        let mut seen = BTreeSet::new();
        let mut urls = Vec::new();
        for finding in &self.findings {
            if seen.insert(finding.source_url.as_str()) {
                urls.push(finding.source_url.as_str());
            }
        }
        urls
    }

    /// Compact text summary of the set for feeding back into planning.
    ///
    /// Shows the first `max_entries` findings as one-liners plus a
    /// trailing count, mirroring what the planner actually needs: a
    /// sense of what is already covered, not the full digests.
    pub fn summary(&self, max_entries: usize) -> String {
        if self.findings.is_empty() {
            return String::new();
        }

        let mut lines = Vec::new();
        for (i, finding) in self.findings.iter().take(max_entries).enumerate() {
            let lead = finding
                .key_points
                .first()
                .map(String::as_str)
                .unwrap_or("no key points");
            lines.push(format!(
                "{}. [{}] {}: {}",
                i + 1,
                finding.provider,
                finding.angle,
                truncate(lead, 100)
            ));
        }
        if self.findings.len() > max_entries {
            lines.push(format!(
                "... and {} more findings",
                self.findings.len() - max_entries
            ));
        }
        lines.join("\n")
    }
}

impl From<Vec<Finding>> for FindingsSet {
    fn from(findings: Vec<Finding>) -> Self {
        Self { findings }
    }
}

fn truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn sample_finding(url: &str, iteration: u32) -> Finding {
        Finding {
            source_url: url.to_string(),
            provider: SearchProvider::Tavily,
            key_points: vec!["point one".to_string(), "point two".to_string()],
            numerical_data: BTreeMap::new(),
            credibility: Credibility::High,
            relevance: 0.8,
            original_size: 10_000,
            compressed_size: 1_000,
            iteration,
            angle: "background".to_string(),
        }
    }

    #[test]
    fn test_compression_ratio() {
        let finding = sample_finding("https://a.example", 1);
        assert!((finding.compression_ratio() - 0.1).abs() < f64::EPSILON);
    }

    #[test]
    fn test_set_is_append_only_ordered() {
        let mut set = FindingsSet::new();
        set.push(sample_finding("https://a.example", 1));
        set.extend(vec![
            sample_finding("https://b.example", 1),
            sample_finding("https://c.example", 2),
        ]);
        let urls: Vec<_> = set.iter().map(|f| f.source_url.as_str()).collect();
        assert_eq!(urls, vec!["https://a.example", "https://b.example", "https://c.example"]);
        assert_eq!(set.latest_iteration(), 2);
    }

    #[test]
    fn test_distinct_urls_first_seen_order() {
        let mut set = FindingsSet::new();
        set.push(sample_finding("https://a.example", 1));
        set.push(sample_finding("https://b.example", 1));
        set.push(sample_finding("https://a.example", 2));
        assert_eq!(set.distinct_urls(), vec!["https://a.example", "https://b.example"]);
    }

    #[test]
    fn test_summary_truncates_and_counts_remainder() {
        let mut set = FindingsSet::new();
        for i in 0..12 {
            set.push(sample_finding(&format!("https://{i}.example"), 1));
        }
        let summary = set.summary(10);
        assert!(summary.contains("1. [tavily]"));
        assert!(summary.contains("and 2 more findings"));
    }

    #[test]
    fn test_empty_summary_is_empty() {
        assert_eq!(FindingsSet::new().summary(10), "");
    }
}

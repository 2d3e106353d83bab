//! Search provider metadata and selection.
//!
//! Each external search backend is described by a static capability
//! entry (quality score, typical latency bucket, cost bucket). The
//! [`ProviderSelector`] filters and ranks that table for a query
//! descriptor, guaranteeing a non-empty candidate list.

mod selector;
mod table;

pub use selector::{ProviderSelector, SelectionConstraints};
pub use table::{PROVIDER_TABLE, ProviderSpec, spec_for};

use serde::{Deserialize, Serialize};
use std::fmt;

/// The search backends the orchestrator knows how to route to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchProvider {
    Tavily,
    Brave,
    Kagi,
    Exa,
    Perplexity,
    Jina,
    Firecrawl,
}

impl SearchProvider {
    /// All known providers, in table order.
    pub const ALL: [SearchProvider; 7] = [
        SearchProvider::Tavily,
        SearchProvider::Brave,
        SearchProvider::Kagi,
        SearchProvider::Exa,
        SearchProvider::Perplexity,
        SearchProvider::Jina,
        SearchProvider::Firecrawl,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tavily => "tavily",
            Self::Brave => "brave",
            Self::Kagi => "kagi",
            Self::Exa => "exa",
            Self::Perplexity => "perplexity",
            Self::Jina => "jina",
            Self::Firecrawl => "firecrawl",
        }
    }
}

impl fmt::Display for SearchProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Broad classification of a research sub-question, used to bias
/// provider ranking.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryType {
    Factual,
    Technical,
    Academic,
    Extraction,
    #[default]
    General,
}

impl QueryType {
    /// Derive a query type from a free-form strategy hint.
    ///
    /// Unrecognized hints fall back to `General` rather than failing;
    /// the hint is advisory.
    pub fn from_hint(hint: &str) -> Self {
        let hint = hint.to_ascii_lowercase();
        if hint.contains("factual") || hint.contains("fact") || hint.contains("citation") {
            Self::Factual
        } else if hint.contains("technical") || hint.contains("code") {
            Self::Technical
        } else if hint.contains("academic") || hint.contains("research") || hint.contains("paper") {
            Self::Academic
        } else if hint.contains("extract") || hint.contains("scrape") {
            Self::Extraction
        } else {
            Self::General
        }
    }
}

/// Typical latency bucket for a provider. Ordered fast → slow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LatencyClass {
    Fast,
    Medium,
    Slow,
}

/// Cost bucket for a provider. Ordered cheap → expensive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CostTier {
    /// "$" — cheapest bucket.
    #[serde(rename = "$")]
    Light,
    /// "$$" — mid bucket.
    #[serde(rename = "$$")]
    Standard,
    /// "$$$" — premium bucket.
    #[serde(rename = "$$$")]
    Premium,
}

//! Provider selection: three-stage filter, progressive relaxation,
//! query-type ranking, and round-robin rotation.

use super::{CostTier, LatencyClass, PROVIDER_TABLE, QueryType, SearchProvider, spec_for};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Constraints applied to the provider table for one selection.
#[derive(Debug, Clone, Copy)]
pub struct SelectionConstraints {
    pub query_type: QueryType,
    /// Minimum acceptable quality, 1–5. Never relaxed.
    pub quality_floor: u8,
    /// Slowest acceptable latency bucket. Relaxed first.
    pub latency_ceiling: LatencyClass,
    /// Most expensive acceptable cost bucket. Relaxed second.
    pub budget_tier: CostTier,
}

impl Default for SelectionConstraints {
    fn default() -> Self {
        Self {
            query_type: QueryType::General,
            quality_floor: 4,
            latency_ceiling: LatencyClass::Medium,
            budget_tier: CostTier::Standard,
        }
    }
}

impl SelectionConstraints {
    pub fn for_query_type(query_type: QueryType) -> Self {
        Self {
            query_type,
            ..Self::default()
        }
    }
}

/// Providers preferred for a query type, in preference order.
///
/// Applied as a ranking within the eligible set, never as a filter:
/// an ineligible preferred provider is simply skipped.
fn preferred_for(query_type: QueryType) -> &'static [SearchProvider] {
    match query_type {
        QueryType::Factual => &[SearchProvider::Tavily, SearchProvider::Perplexity],
        QueryType::Technical => &[SearchProvider::Brave, SearchProvider::Kagi],
        QueryType::Academic => &[SearchProvider::Exa, SearchProvider::Kagi],
        QueryType::Extraction => &[SearchProvider::Jina, SearchProvider::Firecrawl],
        QueryType::General => &[
            SearchProvider::Tavily,
            SearchProvider::Brave,
            SearchProvider::Exa,
        ],
    }
}

/// Maps a query descriptor to a ranked set of eligible providers and
/// round-robins across calls so consecutive searches diversify their
/// source coverage instead of always hitting the top-ranked backend.
///
/// Selection is a pure function of the static table plus constraints;
/// the only mutable state is the rotation cursor.
#[derive(Debug, Default)]
pub struct ProviderSelector {
    cursor: AtomicUsize,
}

impl ProviderSelector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ranked eligible providers for the given constraints.
    ///
    /// Three-stage filter in fixed order: quality ≥ floor, latency ≤
    /// ceiling, cost ≤ tier. If the filtered set is empty, latency is
    /// relaxed one bucket at a time, then cost; quality is never
    /// relaxed. The result is never empty for any floor in 1–5.
    pub fn eligible(&self, constraints: &SelectionConstraints) -> Vec<SearchProvider> {
        let mut latency = constraints.latency_ceiling;
        let mut cost = constraints.budget_tier;

        loop {
            let candidates = Self::filter(constraints.quality_floor, latency, cost);
            if !candidates.is_empty() {
                return Self::rank(candidates, constraints.query_type);
            }

            // Relax latency first, then cost. Quality holds.
            if latency < LatencyClass::Slow {
                latency = match latency {
                    LatencyClass::Fast => LatencyClass::Medium,
                    _ => LatencyClass::Slow,
                };
            } else if cost < CostTier::Premium {
                cost = match cost {
                    CostTier::Light => CostTier::Standard,
                    _ => CostTier::Premium,
                };
            } else {
                // Fully relaxed: the quality filter alone always matches
                // at least one entry for floors in 1-5.
                let fallback = Self::filter(constraints.quality_floor.min(5), latency, cost);
                return Self::rank(fallback, constraints.query_type);
            }
        }
    }

    /// Next provider for the given constraints, rotating across calls.
    pub fn next(&self, constraints: &SelectionConstraints) -> SearchProvider {
        let candidates = self.eligible(constraints);
        let index = self.cursor.fetch_add(1, Ordering::Relaxed);
        candidates[index % candidates.len()]
    }

    fn filter(quality_floor: u8, latency: LatencyClass, cost: CostTier) -> Vec<SearchProvider> {
        PROVIDER_TABLE
            .iter()
            .filter(|s| s.quality >= quality_floor)
            .filter(|s| s.latency <= latency)
            .filter(|s| s.cost <= cost)
            .map(|s| s.provider)
            .collect()
    }

    /// Stable ranking: query-type preferences first (in preference
    /// order), then the rest by quality descending, cheaper first on
    /// ties.
    fn rank(mut candidates: Vec<SearchProvider>, query_type: QueryType) -> Vec<SearchProvider> {
        let preferred = preferred_for(query_type);
        candidates.sort_by_key(|p| {
            let spec = spec_for(*p);
            let preference = preferred
                .iter()
                .position(|pref| pref == p)
                .unwrap_or(preferred.len());
            (preference, std::cmp::Reverse(spec.quality), spec.cost)
        });
        candidates
    }
}

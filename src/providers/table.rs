//! Static per-provider capability table.

use super::{CostTier, LatencyClass, SearchProvider};

/// Static characteristics of one search backend.
#[derive(Debug, Clone, Copy)]
pub struct ProviderSpec {
    pub provider: SearchProvider,
    /// Result quality, 1 (worst) to 5 (best).
    pub quality: u8,
    pub latency: LatencyClass,
    pub cost: CostTier,
    /// Whether the backend understands search operators (site:, filetype:).
    pub supports_operators: bool,
}

/// Capability table for all known providers.
///
/// Quality, latency, and cost buckets reflect observed behavior; the
/// selector treats them as policy inputs, not measurements.
pub const PROVIDER_TABLE: [ProviderSpec; 7] = [
    ProviderSpec {
        provider: SearchProvider::Tavily,
        quality: 5,
        latency: LatencyClass::Fast,
        cost: CostTier::Standard,
        supports_operators: false,
    },
    ProviderSpec {
        provider: SearchProvider::Brave,
        quality: 4,
        latency: LatencyClass::Fast,
        cost: CostTier::Light,
        supports_operators: true,
    },
    ProviderSpec {
        provider: SearchProvider::Kagi,
        quality: 5,
        latency: LatencyClass::Medium,
        cost: CostTier::Premium,
        supports_operators: true,
    },
    ProviderSpec {
        provider: SearchProvider::Exa,
        quality: 5,
        latency: LatencyClass::Medium,
        cost: CostTier::Standard,
        supports_operators: false,
    },
    ProviderSpec {
        provider: SearchProvider::Perplexity,
        quality: 5,
        latency: LatencyClass::Slow,
        cost: CostTier::Premium,
        supports_operators: false,
    },
    ProviderSpec {
        provider: SearchProvider::Jina,
        quality: 4,
        latency: LatencyClass::Fast,
        cost: CostTier::Light,
        supports_operators: false,
    },
    ProviderSpec {
        provider: SearchProvider::Firecrawl,
        quality: 5,
        latency: LatencyClass::Slow,
        cost: CostTier::Premium,
        supports_operators: false,
    },
];

/// Look up the capability entry for a provider.
pub fn spec_for(provider: SearchProvider) -> &'static ProviderSpec {
    PROVIDER_TABLE
        .iter()
        .find(|s| s.provider == provider)
        .expect("every provider has a table entry")
}

//! Typed error hierarchy for the Scout orchestrator.
//!
//! Three top-level enums cover the three failure classes:
//! - `CapabilityError` — an external LLM capability (planner, evaluator,
//!   summarizer, synthesizer) is down or returned garbage; always
//!   recoverable with a degraded fallback
//! - `SearchError` — a search backend call failed; discriminates rate
//!   limiting from other failures so the governor can react distinctly
//! - `ConfigError` — invalid initial configuration; the only fatal
//!   condition, rejected at session start before any work begins

use thiserror::Error;

/// Errors from an opaque LLM capability call.
///
/// These are never propagated as fatal session errors. Every call site
/// converts them into an explicit degraded default (empty plan, zero
/// confidence, truncation-based compression, fallback report).
#[derive(Debug, Error)]
pub enum CapabilityError {
    #[error("capability unavailable: {0}")]
    Unavailable(String),

    #[error("malformed capability response: {0}")]
    Malformed(String),
}

/// Errors from a single search backend call.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("rate limited by provider {provider}")]
    RateLimited { provider: String },

    #[error("search backend unavailable: {0}")]
    Unavailable(String),

    #[error("malformed search response: {0}")]
    Malformed(String),
}

impl SearchError {
    /// Whether this failure came from the provider's own rate limiting.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}

/// Invalid initial configuration. Validated once at session start.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("confidence_threshold must be within [0, 1], got {value}")]
    ThresholdOutOfRange { value: f64 },

    #[error("max_iterations must be at least 1")]
    ZeroIterations,

    #[error("num_angles must be at least 1")]
    ZeroAngles,

    #[error("searches_per_angle must be at least 1")]
    ZeroSearches,

    #[error("cost_limit_usd must be positive, got {value}")]
    NonPositiveCostLimit { value: f64 },

    #[error("compression_target_ratio must be within (0, 1], got {value}")]
    RatioOutOfRange { value: f64 },

    #[error("score weights must be non-negative and sum to a positive value")]
    InvalidWeights,

    #[error("requests_per_minute for provider {provider} must be at least 1")]
    ZeroRequestRate { provider: String },

    #[error("tokens_per_minute for provider {provider} must be at least 1 when set")]
    ZeroTokenRate { provider: String },

    #[error("failed to read config file at {path}: {source}")]
    ReadFailed {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file at {path}: {source}")]
    ParseFailed {
        path: std::path::PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_error_rate_limited_is_discriminated() {
        let err = SearchError::RateLimited {
            provider: "tavily".to_string(),
        };
        assert!(err.is_rate_limited());
        assert!(err.to_string().contains("tavily"));

        let other = SearchError::Unavailable("connection refused".to_string());
        assert!(!other.is_rate_limited());
    }

    #[test]
    fn config_error_threshold_carries_value() {
        let err = ConfigError::ThresholdOutOfRange { value: 1.5 };
        match &err {
            ConfigError::ThresholdOutOfRange { value } => assert_eq!(*value, 1.5),
            _ => panic!("Expected ThresholdOutOfRange"),
        }
        assert!(err.to_string().contains("1.5"));
    }

    #[test]
    fn all_error_types_implement_std_error_trait() {
        fn assert_std_error<E: std::error::Error>(_: &E) {}
        assert_std_error(&CapabilityError::Unavailable("x".into()));
        assert_std_error(&SearchError::Malformed("x".into()));
        assert_std_error(&ConfigError::ZeroIterations);
    }
}

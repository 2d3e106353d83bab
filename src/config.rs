//! Session configuration and budget validation.
//!
//! Every knob has a sane default so `ResearchConfig::default()` runs a
//! usable session. Validation happens exactly once, at session start;
//! an invalid configuration is the only fatal error in the system.

use crate::compact::CompactionStrategy;
use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Per-provider rate limits.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ProviderLimits {
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,
    /// Optional LLM token budget per minute (secondary bucket).
    #[serde(default)]
    pub tokens_per_minute: Option<u32>,
}

impl Default for ProviderLimits {
    fn default() -> Self {
        Self {
            requests_per_minute: default_requests_per_minute(),
            tokens_per_minute: None,
        }
    }
}

/// Weights combining the four verification sub-scores into one scalar.
///
/// The defaults are policy constants carried over from the reference
/// behavior, not derived values. They are configurable precisely so
/// they can be tuned; nothing in the loop assumes they are optimal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScoreWeights {
    #[serde(default = "default_coverage_weight")]
    pub coverage: f64,
    #[serde(default = "default_depth_weight")]
    pub depth: f64,
    #[serde(default = "default_source_quality_weight")]
    pub source_quality: f64,
    #[serde(default = "default_consistency_weight")]
    pub consistency: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            coverage: default_coverage_weight(),
            depth: default_depth_weight(),
            source_quality: default_source_quality_weight(),
            consistency: default_consistency_weight(),
        }
    }
}

impl ScoreWeights {
    fn is_valid(&self) -> bool {
        let all = [self.coverage, self.depth, self.source_quality, self.consistency];
        all.iter().all(|w| w.is_finite() && *w >= 0.0) && all.iter().sum::<f64>() > 0.0
    }
}

/// The budget triple (plus search floor) gating termination.
///
/// Fixed at session start; read-only to every component except the
/// cost ledger, which owns the running spend.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Budget {
    pub cost_limit_usd: f64,
    pub max_iterations: u32,
    pub confidence_threshold: f64,
    pub min_searches_per_iteration: u32,
}

/// Complete session configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResearchConfig {
    /// Research angles fanned out per iteration.
    pub num_angles: u32,
    /// Searches each angle worker performs.
    pub searches_per_angle: u32,
    pub max_iterations: u32,
    pub confidence_threshold: f64,
    pub cost_limit_usd: f64,
    pub min_searches_per_iteration: u32,
    /// Target digest size as a fraction of the raw result size.
    pub compression_target_ratio: f64,
    /// Absolute floor for the digest target, so already-short content
    /// is not compressed into nothing.
    pub min_compressed_bytes: usize,
    /// Input-size budget for the final synthesis call, in bytes.
    pub synthesis_budget_bytes: usize,
    pub compaction_strategy: CompactionStrategy,
    pub score_weights: ScoreWeights,
    /// Budget fractions that fire a one-shot alert when crossed.
    pub alert_thresholds: Vec<f64>,
    /// Longest a worker will wait on rate-limit admission before
    /// skipping the search.
    pub max_rate_wait_secs: u64,
    /// Per-provider overrides, keyed by provider name.
    pub providers: BTreeMap<String, ProviderLimits>,
    /// Where to write the per-session JSON snapshot; disabled if unset.
    pub snapshot_dir: Option<PathBuf>,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            num_angles: 5,
            searches_per_angle: 5,
            max_iterations: 5,
            confidence_threshold: 0.85,
            cost_limit_usd: 1.00,
            min_searches_per_iteration: 5,
            compression_target_ratio: 0.10,
            min_compressed_bytes: 256,
            synthesis_budget_bytes: 120_000,
            compaction_strategy: CompactionStrategy::RecentAndRelevant,
            score_weights: ScoreWeights::default(),
            alert_thresholds: vec![0.5, 0.75, 0.9],
            max_rate_wait_secs: 30,
            providers: BTreeMap::new(),
            snapshot_dir: None,
        }
    }
}

impl ResearchConfig {
    /// Load configuration from a TOML file, filling missing fields
    /// with defaults, then validate it.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&raw).map_err(|source| ConfigError::ParseFailed {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject invalid configuration before any work begins.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) || !self.confidence_threshold.is_finite()
        {
            return Err(ConfigError::ThresholdOutOfRange {
                value: self.confidence_threshold,
            });
        }
        if self.max_iterations == 0 {
            return Err(ConfigError::ZeroIterations);
        }
        if self.num_angles == 0 {
            return Err(ConfigError::ZeroAngles);
        }
        if self.searches_per_angle == 0 {
            return Err(ConfigError::ZeroSearches);
        }
        if !self.cost_limit_usd.is_finite() || self.cost_limit_usd <= 0.0 {
            return Err(ConfigError::NonPositiveCostLimit {
                value: self.cost_limit_usd,
            });
        }
        if !self.compression_target_ratio.is_finite()
            || self.compression_target_ratio <= 0.0
            || self.compression_target_ratio > 1.0
        {
            return Err(ConfigError::RatioOutOfRange {
                value: self.compression_target_ratio,
            });
        }
        if !self.score_weights.is_valid() {
            return Err(ConfigError::InvalidWeights);
        }
        for (name, limits) in &self.providers {
            if limits.requests_per_minute == 0 {
                return Err(ConfigError::ZeroRequestRate {
                    provider: name.clone(),
                });
            }
            if limits.tokens_per_minute == Some(0) {
                return Err(ConfigError::ZeroTokenRate {
                    provider: name.clone(),
                });
            }
        }
        Ok(())
    }

    /// The termination budget view consumed by the controller.
    pub fn budget(&self) -> Budget {
        Budget {
            cost_limit_usd: self.cost_limit_usd,
            max_iterations: self.max_iterations,
            confidence_threshold: self.confidence_threshold,
            min_searches_per_iteration: self.min_searches_per_iteration,
        }
    }

    /// Limits for one provider, falling back to defaults when the
    /// config carries no override.
    pub fn limits_for(&self, provider: &str) -> ProviderLimits {
        self.providers.get(provider).copied().unwrap_or_default()
    }
}

fn default_requests_per_minute() -> u32 {
    60
}

fn default_coverage_weight() -> f64 {
    0.30
}

fn default_depth_weight() -> f64 {
    0.25
}

fn default_source_quality_weight() -> f64 {
    0.25
}

fn default_consistency_weight() -> f64 {
    0.20
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ResearchConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.num_angles, 5);
        assert_eq!(config.max_iterations, 5);
        assert!((config.confidence_threshold - 0.85).abs() < f64::EPSILON);
    }

    #[test]
    fn test_threshold_out_of_range_is_rejected() {
        let config = ResearchConfig {
            confidence_threshold: 1.2,
            ..ResearchConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ThresholdOutOfRange { .. })
        ));
    }

    #[test]
    fn test_zero_iterations_is_rejected() {
        let config = ResearchConfig {
            max_iterations: 0,
            ..ResearchConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::ZeroIterations)));
    }

    #[test]
    fn test_zero_provider_rate_is_rejected() {
        let mut config = ResearchConfig::default();
        config.providers.insert(
            "tavily".to_string(),
            ProviderLimits {
                requests_per_minute: 0,
                tokens_per_minute: None,
            },
        );
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ZeroRequestRate { .. })
        ));
    }

    #[test]
    fn test_zero_token_rate_is_rejected() {
        let mut config = ResearchConfig::default();
        config.providers.insert(
            "brave".to_string(),
            ProviderLimits {
                requests_per_minute: 60,
                tokens_per_minute: Some(0),
            },
        );
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ZeroTokenRate { .. })
        ));
    }

    #[test]
    fn test_load_from_toml_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scout.toml");
        std::fs::write(
            &path,
            r#"
max_iterations = 3
confidence_threshold = 0.9

[providers.brave]
requests_per_minute = 20
tokens_per_minute = 10000
"#,
        )
        .unwrap();

        let config = ResearchConfig::load(&path).unwrap();
        assert_eq!(config.max_iterations, 3);
        assert_eq!(config.num_angles, 5); // default preserved
        assert_eq!(config.limits_for("brave").requests_per_minute, 20);
        assert_eq!(config.limits_for("brave").tokens_per_minute, Some(10_000));
        assert_eq!(config.limits_for("tavily").requests_per_minute, 60);
    }

    #[test]
    fn test_load_missing_file_is_read_error() {
        let result = ResearchConfig::load(Path::new("/nonexistent/scout.toml"));
        assert!(matches!(result, Err(ConfigError::ReadFailed { .. })));
    }

    #[test]
    fn test_budget_view_mirrors_config() {
        let config = ResearchConfig::default();
        let budget = config.budget();
        assert_eq!(budget.max_iterations, config.max_iterations);
        assert!((budget.cost_limit_usd - config.cost_limit_usd).abs() < f64::EPSILON);
    }
}

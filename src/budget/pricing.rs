//! Static per-model-class price table.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The two model classes the orchestrator routes work to: a small,
/// fast class for search and compression, and a large class for
/// planning, verification, and synthesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelClass {
    Small,
    Large,
}

impl fmt::Display for ModelClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Small => write!(f, "small"),
            Self::Large => write!(f, "large"),
        }
    }
}

/// USD per one million input/output units.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ModelPricing {
    pub input_per_million: f64,
    pub output_per_million: f64,
}

impl ModelPricing {
    /// Cost of a single call in USD.
    pub fn cost(&self, input_units: u64, output_units: u64) -> f64 {
        (input_units as f64 * self.input_per_million
            + output_units as f64 * self.output_per_million)
            / 1_000_000.0
    }
}

/// Price table entry for a model class.
pub fn price_for(class: ModelClass) -> ModelPricing {
    match class {
        ModelClass::Small => ModelPricing {
            input_per_million: 0.25,
            output_per_million: 1.25,
        },
        ModelClass::Large => ModelPricing {
            input_per_million: 3.00,
            output_per_million: 15.00,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cost_scales_with_units() {
        let pricing = price_for(ModelClass::Small);
        let one = pricing.cost(1_000_000, 0);
        assert!((one - 0.25).abs() < 1e-9);
        let mixed = pricing.cost(1_000_000, 1_000_000);
        assert!((mixed - 1.50).abs() < 1e-9);
    }

    #[test]
    fn test_large_class_costs_more() {
        let small = price_for(ModelClass::Small).cost(1000, 1000);
        let large = price_for(ModelClass::Large).cost(1000, 1000);
        assert!(large > small);
    }

    #[test]
    fn test_zero_units_cost_nothing() {
        assert_eq!(price_for(ModelClass::Large).cost(0, 0), 0.0);
    }
}

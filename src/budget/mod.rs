//! Monetary budget tracking.
//!
//! The [`CostLedger`] is the single source of truth for session spend.
//! It reports state (including the authoritative "ceiling reached"
//! signal the controller consumes) but never halts execution itself.

mod ledger;
mod pricing;

pub use ledger::{CostLedger, CostSummary, UsageRecord};
pub use pricing::{ModelClass, ModelPricing, price_for};

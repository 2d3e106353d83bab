pub mod budget;
pub mod capability;
pub mod compact;
pub mod compress;
pub mod config;
pub mod errors;
pub mod findings;
pub mod govern;
pub mod metrics;
pub mod providers;
pub mod score;
pub mod session;
pub mod worker;

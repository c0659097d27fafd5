pub mod claim_analyzer;
pub mod market_cache;
pub mod monitor;
pub mod notifier;
pub mod state_store;

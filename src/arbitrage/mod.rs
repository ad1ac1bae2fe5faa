//! Cross-venue arbitrage core.
//!
//! Monitors the spread between the two venues per symbol, debounces
//! triggers, gates on position limits and rate limits, and fires paired
//! opposing market orders. Partial failures feed the auto-rebalancer.

pub mod engine;
pub mod monitor;
pub mod rebalance;
pub mod spread;

pub use engine::ArbEngine;
pub use monitor::{evaluate, Action, EvalInput, MonitorPhase, SymbolMonitorState};
pub use spread::{spread_between, weighted_price};

/// External "please refresh venue connections" signal. The core rate
/// limits how often it pulls this; implementations just do it.
pub trait RefreshRequester: Send + Sync {
    fn request_refresh(&self);
}

//! Trade execution seam.
//!
//! The monitor loop never talks to a venue directly: it hands a
//! [`TradeIntent`] to a [`TradeExecutor`] and moves on. Executors resolve
//! asynchronously; their outcomes flow back through the engine's result
//! handler keyed by correlation id. Failures MUST carry the originating
//! venue - auto-rebalance needs to know which leg died.

pub mod rest;

use async_trait::async_trait;
use parking_lot::Mutex;
use thiserror::Error;
use tracing::info;

use crate::models::{TradeIntent, VenueId};

pub use rest::RestExecutor;

/// Venue-tagged execution failure.
#[derive(Debug, Clone, Error)]
#[error("[{venue:?}] {message}")]
pub struct ExecError {
    pub venue: VenueId,
    pub message: String,
}

impl ExecError {
    pub fn new(venue: VenueId, message: impl Into<String>) -> Self {
        Self {
            venue,
            message: message.into(),
        }
    }
}

/// Acknowledgement of one placed leg.
#[derive(Debug, Clone)]
pub struct ExecutionReceipt {
    pub venue: VenueId,
    pub order_id: String,
    pub filled_size: f64,
}

/// One venue's order entry. Implementations either call a signed API or
/// replay a scripted UI interaction; the core does not care which.
#[async_trait]
pub trait TradeExecutor: Send + Sync {
    async fn execute(&self, intent: &TradeIntent) -> Result<ExecutionReceipt, ExecError>;
}

/// Executor that fills everything instantly and remembers what it saw.
/// Used for dry-run mode and tests.
#[derive(Default)]
pub struct PaperExecutor {
    venue_override: Option<VenueId>,
    executed: Mutex<Vec<TradeIntent>>,
}

impl PaperExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_venue(venue: VenueId) -> Self {
        Self {
            venue_override: Some(venue),
            executed: Mutex::new(Vec::new()),
        }
    }

    pub fn executed(&self) -> Vec<TradeIntent> {
        self.executed.lock().clone()
    }
}

#[async_trait]
impl TradeExecutor for PaperExecutor {
    async fn execute(&self, intent: &TradeIntent) -> Result<ExecutionReceipt, ExecError> {
        let venue = self.venue_override.unwrap_or(intent.platform);
        info!(
            symbol = %intent.symbol,
            direction = intent.direction.as_str(),
            size = intent.size,
            venue = ?venue,
            "📝 paper fill"
        );
        self.executed.lock().push(intent.clone());
        Ok(ExecutionReceipt {
            venue,
            order_id: format!("paper-{}", intent.correlation_id),
            filled_size: intent.size,
        })
    }
}

/// Executor that always fails; test aid for the rebalance path.
#[cfg(test)]
pub struct FailingExecutor {
    pub venue: VenueId,
}

#[cfg(test)]
#[async_trait]
impl TradeExecutor for FailingExecutor {
    async fn execute(&self, _intent: &TradeIntent) -> Result<ExecutionReceipt, ExecError> {
        Err(ExecError::new(self.venue, "order rejected"))
    }
}

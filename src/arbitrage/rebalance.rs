//! Auto-rebalance after a partial arbitrage failure.
//!
//! When one leg fills and the other dies, the book is directional. The
//! fix is a single corrective trade on the venue that DID accept the
//! order, sized to close the actual net imbalance - not the failed leg's
//! size, because other activity may have moved the book in the meantime.
//! The 3 s delay respects venue rate limits after a rejection; the
//! re-check at fire time makes a deferred rebalance that became moot
//! abort itself.

use std::time::Duration;

use chrono::Utc;
use tokio::time::sleep;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::{Side, TradeIntent, VenueId};
use crate::positions::IMBALANCE_EPSILON;

use super::engine::TradeContext;
use super::monitor::position_allows;

/// Wait after the failed pair before correcting.
pub const REBALANCE_DELAY_MS: u64 = 3_000;

/// Minimum spacing between corrective trades.
pub const REBALANCE_COOLDOWN_MS: i64 = 300_000;

/// One-shot deferred rebalance. The only scheduled callback in the core
/// besides refresh signalling; everything else is timestamp comparisons.
pub(crate) fn schedule(ctx: TradeContext, symbol: String, surviving_venue: VenueId) {
    info!(symbol, venue = ?surviving_venue, "⏳ auto-rebalance scheduled");
    tokio::spawn(async move {
        sleep(Duration::from_millis(REBALANCE_DELAY_MS)).await;
        run_once(&ctx, &symbol, surviving_venue, Utc::now().timestamp_millis()).await;
    });
}

/// The deferred body, clock injected for tests.
pub(crate) async fn run_once(
    ctx: &TradeContext,
    symbol: &str,
    surviving_venue: VenueId,
    now_ms: i64,
) {
    {
        let runtime = ctx.runtime.lock();
        if let Some(last) = runtime.last_rebalance_ms {
            if now_ms - last < REBALANCE_COOLDOWN_MS {
                warn!(symbol, "auto-rebalance deferred: within cooldown");
                ctx.activity
                    .warn(format!("{symbol}: auto-rebalance deferred (cooldown)"));
                return;
            }
        }
    }

    // Recompute the ACTUAL net position at fire time, not schedule time.
    let net = ctx.positions.net_position(symbol);
    if net.abs() <= IMBALANCE_EPSILON {
        debug!(symbol, "auto-rebalance moot: already balanced");
        return;
    }

    let settings = ctx.settings.symbol_settings(symbol);
    let direction = if net > 0.0 { Side::Short } else { Side::Long };
    let size = net.abs();

    // Same position-limit gate as normal trades, applied to the venue the
    // corrective order lands on.
    let venue_net = ctx.positions.venue_net_position(symbol, surviving_venue);
    let delta = direction.sign() * size;
    if !position_allows(venue_net, delta, settings.position_min, settings.position_max) {
        warn!(symbol, venue = ?surviving_venue, "auto-rebalance blocked by position limit");
        ctx.activity.warn(format!(
            "{symbol}: auto-rebalance blocked by position limit on {surviving_venue:?}"
        ));
        return;
    }

    let Some(executor) = ctx.executors.get(&surviving_venue).cloned() else {
        warn!(venue = ?surviving_venue, "no executor for rebalance venue");
        return;
    };

    ctx.runtime.lock().last_rebalance_ms = Some(now_ms);

    let intent = TradeIntent {
        correlation_id: Uuid::new_v4(),
        symbol: symbol.to_string(),
        direction,
        size,
        platform: surviving_venue,
    };
    info!(
        symbol,
        venue = ?surviving_venue,
        side = direction.as_str(),
        size,
        "🔧 auto-rebalance executing"
    );
    ctx.activity.info(format!(
        "{symbol}: auto-rebalance {} {size} on {surviving_venue:?}",
        direction.as_str()
    ));

    match executor.execute(&intent).await {
        Ok(receipt) => {
            ctx.activity.info(format!(
                "{symbol}: auto-rebalance filled ({})",
                receipt.order_id
            ));
        }
        Err(e) => {
            ctx.activity
                .error_for(e.venue, format!("{symbol}: auto-rebalance failed: {e}"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;

    use parking_lot::Mutex;

    use crate::activity::ActivityLog;
    use crate::arbitrage::engine::EngineRuntime;
    use crate::config::{GlobalSettings, SettingsProvider, SharedSettings, SymbolSettings};
    use crate::execution::{PaperExecutor, TradeExecutor};
    use crate::models::Position;
    use crate::positions::PositionBook;

    fn context(paper: Arc<PaperExecutor>) -> TradeContext {
        let mut executors: HashMap<VenueId, Arc<dyn TradeExecutor>> = HashMap::new();
        executors.insert(VenueId::One, paper.clone());
        executors.insert(VenueId::Two, paper);

        let settings = SharedSettings::new(GlobalSettings::default());
        settings.set_symbol(
            "BTC-USD",
            SymbolSettings {
                trade_size: 1.0,
                position_min: -10.0,
                position_max: 10.0,
                ..Default::default()
            },
        );

        let settings: Arc<dyn SettingsProvider> = Arc::new(settings);
        TradeContext {
            executors: Arc::new(executors),
            activity: Arc::new(ActivityLog::new()),
            positions: Arc::new(PositionBook::new()),
            settings,
            runtime: Arc::new(Mutex::new(EngineRuntime::default())),
        }
    }

    fn long_position(symbol: &str, size: f64, venue: VenueId) -> Position {
        Position {
            symbol: symbol.to_string(),
            position: size,
            side: Side::Long,
            avg_entry_price: 100.0,
            mark_price: 100.0,
            position_value: size * 100.0,
            unrealized_pnl: 0.0,
            unrealized_pnl_percent: 0.0,
            funding: 0.0,
            liquidation_price: None,
            exchange_id: venue,
            last_updated_ms: 0,
        }
    }

    #[tokio::test]
    async fn test_corrective_trade_closes_net_imbalance() {
        let paper = Arc::new(PaperExecutor::new());
        let ctx = context(paper.clone());

        // long 1.5 on venue one, nothing on venue two: net +1.5
        ctx.positions.apply_position_update(
            VenueId::One,
            vec![long_position("BTC-USD", 1.5, VenueId::One)],
            true,
        );

        run_once(&ctx, "BTC-USD", VenueId::Two, 1_000_000).await;

        let executed = paper.executed();
        assert_eq!(executed.len(), 1);
        assert_eq!(executed[0].direction, Side::Short);
        assert_eq!(executed[0].size, 1.5);
        assert_eq!(executed[0].platform, VenueId::Two);
        assert_eq!(ctx.runtime.lock().last_rebalance_ms, Some(1_000_000));
    }

    #[tokio::test]
    async fn test_moot_rebalance_self_aborts() {
        let paper = Arc::new(PaperExecutor::new());
        let ctx = context(paper.clone());
        // balanced book by the time the deferred callback fires

        run_once(&ctx, "BTC-USD", VenueId::Two, 1_000_000).await;

        assert!(paper.executed().is_empty());
        assert_eq!(ctx.runtime.lock().last_rebalance_ms, None);
    }

    #[tokio::test]
    async fn test_cooldown_defers_with_log_only() {
        let paper = Arc::new(PaperExecutor::new());
        let ctx = context(paper.clone());
        ctx.positions.apply_position_update(
            VenueId::One,
            vec![long_position("BTC-USD", 1.0, VenueId::One)],
            true,
        );
        ctx.runtime.lock().last_rebalance_ms = Some(900_000);

        // 100s after the last rebalance: inside the 5 min cooldown
        run_once(&ctx, "BTC-USD", VenueId::Two, 1_000_000).await;

        assert!(paper.executed().is_empty());
        assert!(ctx
            .activity
            .snapshot()
            .iter()
            .any(|e| e.message.contains("deferred")));
    }

    #[tokio::test]
    async fn test_position_limit_blocks_corrective_trade() {
        let paper = Arc::new(PaperExecutor::new());
        let ctx = context(paper.clone());

        // net is -2.0 (short 12 on venue one, long 10 on venue two); the
        // corrective buy would push venue two past its max of 10
        let mut short = long_position("BTC-USD", 12.0, VenueId::One);
        short.side = Side::Short;
        ctx.positions
            .apply_position_update(VenueId::One, vec![short], true);
        ctx.positions.apply_position_update(
            VenueId::Two,
            vec![long_position("BTC-USD", 10.0, VenueId::Two)],
            true,
        );

        run_once(&ctx, "BTC-USD", VenueId::Two, 1_000_000).await;

        assert!(paper.executed().is_empty());
        assert!(ctx
            .activity
            .snapshot()
            .iter()
            .any(|e| e.message.contains("blocked by position limit")));
    }
}

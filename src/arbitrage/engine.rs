//! Arbitrage trading engine.
//!
//! Glue between the stores, the pure monitor state machine, and the
//! executor seams. Every incoming message (market data tick or position
//! push) drives one evaluation pass for the touched symbols; the pass
//! reads a snapshot, decides, and fires intents without awaiting anything
//! mid-evaluation. Executor outcomes come back through spawned
//! continuations that only log and adjust cooldown/rebalance state.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use tracing::{error, info, warn};

use crate::activity::{ActivityLevel, ActivityLog};
use crate::books::MarketStore;
use crate::config::SettingsProvider;
use crate::execution::{ExecError, ExecutionReceipt, TradeExecutor};
use crate::feeds::{FeedSink, PositionSink, VenueAdapter};
use crate::models::{
    ArbDirection, Position, RawFrame, Side, TradeIntent, VenueId, VenueInfo,
};
use crate::positions::PositionBook;

use super::monitor::{evaluate, Action, EvalInput, SymbolMonitorState};
use super::rebalance;
use super::spread::spread_between;
use super::RefreshRequester;

/// Cross-symbol mutable state. Deliberately tiny: the global trade and
/// refresh timestamps exist to serialize bursts across symbols, the
/// rebalance timestamp to space out corrective trades. Everything else is
/// per-symbol.
#[derive(Default)]
pub(crate) struct EngineRuntime {
    pub(crate) symbols: HashMap<String, SymbolMonitorState>,
    pub(crate) global_last_trade_ms: Option<i64>,
    pub(crate) last_refresh_ms: Option<i64>,
    pub(crate) last_rebalance_ms: Option<i64>,
}

/// The Arc'd slice of the engine that async continuations need. Cloning
/// is cheap; the evaluation loop itself never crosses an await with any
/// of these locked.
#[derive(Clone)]
pub(crate) struct TradeContext {
    pub(crate) executors: Arc<HashMap<VenueId, Arc<dyn TradeExecutor>>>,
    pub(crate) activity: Arc<ActivityLog>,
    pub(crate) positions: Arc<PositionBook>,
    pub(crate) settings: Arc<dyn SettingsProvider>,
    pub(crate) runtime: Arc<Mutex<EngineRuntime>>,
}

pub struct ArbEngine {
    adapters: HashMap<VenueId, Arc<dyn VenueAdapter>>,
    venue1_info: VenueInfo,
    venue2_info: VenueInfo,
    market: Arc<MarketStore>,
    refresh: Arc<dyn RefreshRequester>,
    ctx: TradeContext,
}

impl ArbEngine {
    pub fn new(
        adapter1: Arc<dyn VenueAdapter>,
        adapter2: Arc<dyn VenueAdapter>,
        settings: Arc<dyn SettingsProvider>,
        executor1: Arc<dyn TradeExecutor>,
        executor2: Arc<dyn TradeExecutor>,
        refresh: Arc<dyn RefreshRequester>,
    ) -> Arc<Self> {
        let venue1_info = adapter1.info();
        let venue2_info = adapter2.info();

        let mut adapters: HashMap<VenueId, Arc<dyn VenueAdapter>> = HashMap::new();
        adapters.insert(adapter1.venue(), adapter1);
        adapters.insert(adapter2.venue(), adapter2);

        let mut executors: HashMap<VenueId, Arc<dyn TradeExecutor>> = HashMap::new();
        executors.insert(VenueId::One, executor1);
        executors.insert(VenueId::Two, executor2);

        Arc::new(Self {
            adapters,
            venue1_info,
            venue2_info,
            market: Arc::new(MarketStore::new()),
            refresh,
            ctx: TradeContext {
                executors: Arc::new(executors),
                activity: Arc::new(ActivityLog::new()),
                positions: Arc::new(PositionBook::new()),
                settings,
                runtime: Arc::new(Mutex::new(EngineRuntime::default())),
            },
        })
    }

    pub fn market(&self) -> &MarketStore {
        &self.market
    }

    pub fn positions(&self) -> &PositionBook {
        &self.ctx.positions
    }

    pub fn activity(&self) -> &ActivityLog {
        &self.ctx.activity
    }

    /// One raw feed frame. Unparseable frames drop silently; parsed ones
    /// update the store and drive an evaluation tick for their symbol.
    pub fn handle_frame(&self, venue: VenueId, frame: RawFrame) {
        let Some(adapter) = self.adapters.get(&venue) else {
            return;
        };
        let Some(msg) = adapter.parse(&frame) else {
            return;
        };
        let now_ms = Utc::now().timestamp_millis();
        let symbol = self.market.apply(venue, adapter.merge_policy(), &msg, now_ms);
        self.evaluate_symbol(&symbol, now_ms);
    }

    /// One venue's position push. Reconciles, then re-evaluates every
    /// known symbol - an imbalance can show up on a symbol whose market
    /// data is quiet right now.
    pub fn handle_positions(
        &self,
        venue: VenueId,
        positions: Vec<Position>,
        is_full_update: bool,
    ) {
        self.ctx
            .positions
            .apply_position_update(venue, positions, is_full_update);
        let now_ms = Utc::now().timestamp_millis();

        let mut symbols = self.market.symbols();
        symbols.extend(self.ctx.positions.symbols());
        symbols.sort();
        symbols.dedup();
        for symbol in symbols {
            self.evaluate_symbol(&symbol, now_ms);
        }
    }

    /// Operator-initiated "execute once": bypasses cooldowns and position
    /// gating entirely, still logged, still sets the cooldown timestamps
    /// (it is a real trade).
    pub fn execute_manual(&self, symbol: &str, direction: ArbDirection, size: f64) {
        if size <= 0.0 {
            self.ctx
                .activity
                .warn(format!("{symbol}: manual trade ignored, size {size} invalid"));
            return;
        }
        let now_ms = Utc::now().timestamp_millis();
        {
            let mut runtime = self.ctx.runtime.lock();
            runtime.global_last_trade_ms = Some(now_ms);
            runtime
                .symbols
                .entry(symbol.to_string())
                .or_default()
                .direction_mut(direction)
                .last_trade_ms = Some(now_ms);
        }

        let correlation_id = uuid::Uuid::new_v4();
        let buy = TradeIntent {
            correlation_id,
            symbol: symbol.to_string(),
            direction: Side::Long,
            size,
            platform: direction.buy_venue(),
        };
        let sell = TradeIntent {
            correlation_id,
            symbol: symbol.to_string(),
            direction: Side::Short,
            size,
            platform: direction.sell_venue(),
        };

        self.ctx.activity.info(format!(
            "{symbol} {}: manual execution, size {size}",
            direction.as_str()
        ));
        info!(symbol, direction = direction.as_str(), size, "🖐 manual trade");
        dispatch_pair(self.ctx.clone(), buy, sell);
    }

    /// Evaluation tick for one symbol: assemble the snapshot, run the
    /// pure transition, perform the side effects.
    pub fn evaluate_symbol(&self, symbol: &str, now_ms: i64) {
        let settings = self.ctx.settings.symbol_settings(symbol);
        let global = self.ctx.settings.global_settings();

        let stats1 = self.market.get(symbol, VenueId::One);
        let stats2 = self.market.get(symbol, VenueId::Two);
        let diff = match (&stats1, &stats2) {
            (Some(s1), Some(s2)) => spread_between(
                &self.venue1_info,
                &self.venue2_info,
                s1,
                s2,
                settings.trade_size,
            ),
            _ => None,
        };

        let unbalanced = self.ctx.positions.is_unbalanced(symbol);
        let primary_net = self.ctx.positions.venue_net_position(symbol, VenueId::One);

        let actions = {
            let mut runtime = self.ctx.runtime.lock();
            let global_last_trade_ms = runtime.global_last_trade_ms;
            let last_refresh_ms = runtime.last_refresh_ms;
            let state = runtime.symbols.entry(symbol.to_string()).or_default();
            let input = EvalInput {
                symbol,
                diff: diff.as_ref(),
                unbalanced,
                primary_net,
                settings: &settings,
                global: &global,
                global_last_trade_ms,
                last_refresh_ms,
            };
            evaluate(&input, state, now_ms)
        };

        for action in actions {
            self.perform(symbol, action, now_ms);
        }
    }

    fn perform(&self, symbol: &str, action: Action, now_ms: i64) {
        match action {
            Action::Log { level, message } => {
                match level {
                    ActivityLevel::Info => info!("{message}"),
                    ActivityLevel::Warn => warn!("{message}"),
                    ActivityLevel::Error => error!("{message}"),
                }
                self.ctx.activity.push(level, None, message);
            }
            Action::RequestRefresh => {
                self.ctx.runtime.lock().last_refresh_ms = Some(now_ms);
                metrics::increment_counter!("mirrorbot_refresh_requests_total");
                self.refresh.request_refresh();
            }
            Action::StopMonitors { reason } => {
                self.ctx.settings.disable_monitoring(symbol);
                warn!("{reason}");
                self.ctx.activity.warn(reason);
            }
            Action::EmitTrade { buy, sell, .. } => {
                self.ctx.runtime.lock().global_last_trade_ms = Some(now_ms);
                metrics::increment_counter!("mirrorbot_trades_total");
                dispatch_pair(self.ctx.clone(), buy, sell);
            }
        }
    }
}

impl FeedSink for ArbEngine {
    fn on_frame(&self, venue: VenueId, frame: RawFrame) {
        self.handle_frame(venue, frame);
    }
}

impl PositionSink for ArbEngine {
    fn on_positions(&self, venue: VenueId, positions: Vec<Position>, is_full_update: bool) {
        self.handle_positions(venue, positions, is_full_update);
    }
}

/// Fire both legs concurrently and hand the paired outcome to the result
/// handler. Fire-and-forget from the evaluation loop's perspective.
pub(crate) fn dispatch_pair(ctx: TradeContext, buy: TradeIntent, sell: TradeIntent) {
    tokio::spawn(async move {
        let Some(buy_exec) = ctx.executors.get(&buy.platform).cloned() else {
            error!(venue = ?buy.platform, "no executor wired for venue");
            return;
        };
        let Some(sell_exec) = ctx.executors.get(&sell.platform).cloned() else {
            error!(venue = ?sell.platform, "no executor wired for venue");
            return;
        };

        let symbol = buy.symbol.clone();
        let (buy_result, sell_result) =
            tokio::join!(buy_exec.execute(&buy), sell_exec.execute(&sell));

        handle_pair_outcome(&ctx, &symbol, buy_result, sell_result);
    });
}

/// Log both legs; a partial failure hands the surviving venue to the
/// auto-rebalancer. Nothing here ever propagates - a dead leg must not
/// take the monitoring loop with it.
fn handle_pair_outcome(
    ctx: &TradeContext,
    symbol: &str,
    buy_result: Result<ExecutionReceipt, ExecError>,
    sell_result: Result<ExecutionReceipt, ExecError>,
) {
    match (buy_result, sell_result) {
        (Ok(buy), Ok(sell)) => {
            info!(
                symbol,
                buy_order = %buy.order_id,
                sell_order = %sell.order_id,
                "✅ both legs filled"
            );
            ctx.activity
                .info(format!("{symbol}: both legs filled ({}/{})", buy.order_id, sell.order_id));
        }
        (Ok(survivor), Err(failed)) | (Err(failed), Ok(survivor)) => {
            metrics::increment_counter!("mirrorbot_leg_failures_total");
            error!(symbol, venue = ?failed.venue, error = %failed, "❌ one leg failed");
            ctx.activity
                .error_for(failed.venue, format!("{symbol}: leg failed: {failed}"));

            if ctx.settings.global_settings().auto_rebalance_enabled {
                rebalance::schedule(ctx.clone(), symbol.to_string(), survivor.venue);
            } else {
                ctx.activity
                    .warn(format!("{symbol}: auto-rebalance disabled, position may be unbalanced"));
            }
        }
        (Err(buy_err), Err(sell_err)) => {
            metrics::increment_counter!("mirrorbot_leg_failures_total");
            error!(symbol, buy = %buy_err, sell = %sell_err, "❌ both legs failed");
            ctx.activity
                .error_for(buy_err.venue, format!("{symbol}: leg failed: {buy_err}"));
            ctx.activity
                .error_for(sell_err.venue, format!("{symbol}: leg failed: {sell_err}"));
            // no fill happened on either side, nothing to rebalance
        }
    }
}

//! Per-(symbol, direction) monitor state machine.
//!
//! The transition function is pure: it reads a fully-formed snapshot of
//! market data, positions and settings, takes the current wall clock as a
//! parameter, mutates only its own state record, and describes everything
//! else it wants done as [`Action`]s. No timers, no locks, no I/O - the
//! engine owns those, and the tests inject `now_ms` directly.
//!
//! Every timing rule in here is a timestamp comparison evaluated on the
//! tick, not a scheduled callback: the imbalance timeout, the staleness
//! skew, the refresh rate limit, and both trade cooldowns.

use serde::Serialize;
use uuid::Uuid;

use crate::activity::ActivityLevel;
use crate::config::{GlobalSettings, SpreadUnit, SymbolSettings, ThresholdCondition};
use crate::models::{ArbDirection, PriceDiff, Side, TradeIntent};

/// Market data older than this (vs wall clock) is stale; the tick is
/// skipped and a refresh requested instead of trading on dead prices.
pub const STALE_SKEW_MS: i64 = 5_000;

/// Continuous position imbalance longer than this triggers
/// refresh-or-stop.
pub const IMBALANCE_TIMEOUT_MS: i64 = 10_000;

/// Minimum spacing between external refresh requests.
pub const REFRESH_MIN_INTERVAL_MS: i64 = 300_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitorPhase {
    /// Not monitoring; no evaluation.
    Idle,
    /// Evaluating on every data tick, condition not currently met.
    Monitoring,
    /// Condition met, consecutive counter still below the trigger count.
    TriggeredPending,
    /// Trigger count reached this tick; intents emitted.
    Executing,
    /// Trigger reached but suppressed by a trade cooldown.
    CoolingDown,
}

/// Runtime state for one direction of one symbol. Owned exclusively by
/// that symbol's state machine; never shared.
#[derive(Debug, Clone)]
pub struct DirectionState {
    pub phase: MonitorPhase,
    pub consecutive_hits: u32,
    pub last_trade_ms: Option<i64>,
}

impl Default for DirectionState {
    fn default() -> Self {
        Self {
            phase: MonitorPhase::Idle,
            consecutive_hits: 0,
            last_trade_ms: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SymbolMonitorState {
    pub one_to_two: DirectionState,
    pub two_to_one: DirectionState,
    /// Set the first tick an imbalance is seen; cleared the instant
    /// balance is restored.
    pub unbalanced_since_ms: Option<i64>,
}

impl SymbolMonitorState {
    pub fn direction_mut(&mut self, direction: ArbDirection) -> &mut DirectionState {
        match direction {
            ArbDirection::OneToTwo => &mut self.one_to_two,
            ArbDirection::TwoToOne => &mut self.two_to_one,
        }
    }

    fn reset_to_idle(&mut self) {
        for direction in ArbDirection::ALL {
            let state = self.direction_mut(direction);
            state.phase = MonitorPhase::Idle;
            state.consecutive_hits = 0;
        }
    }
}

/// Snapshot the engine assembles for one evaluation tick.
pub struct EvalInput<'a> {
    pub symbol: &'a str,
    /// `None` when either venue has no usable data - the tick is skipped.
    pub diff: Option<&'a PriceDiff>,
    /// Net position across venues is outside the epsilon band.
    pub unbalanced: bool,
    /// Signed net position on the primary venue (venue 1); position-limit
    /// gating runs against this.
    pub primary_net: f64,
    pub settings: &'a SymbolSettings,
    pub global: &'a GlobalSettings,
    pub global_last_trade_ms: Option<i64>,
    pub last_refresh_ms: Option<i64>,
}

/// Side effects the engine performs after a tick.
#[derive(Debug, Clone)]
pub enum Action {
    /// Fire both legs concurrently. `buy` and `sell` share a correlation
    /// id so the result handler can pair them back up.
    EmitTrade {
        direction: ArbDirection,
        buy: TradeIntent,
        sell: TradeIntent,
    },
    /// Pull the external refresh signal (already rate-limit checked).
    RequestRefresh,
    /// Force the symbol's monitors off in the settings store.
    StopMonitors { reason: String },
    Log {
        level: ActivityLevel,
        message: String,
    },
}

/// One evaluation tick for one symbol. Mutates `state`, returns the side
/// effects. Never panics, never blocks.
pub fn evaluate(input: &EvalInput<'_>, state: &mut SymbolMonitorState, now_ms: i64) -> Vec<Action> {
    let mut actions = Vec::new();

    let monitoring_active = input.settings.monitor_1_to_2.is_monitoring
        || input.settings.monitor_2_to_1.is_monitoring;

    // Rule 1: persistent imbalance. Transient imbalance (the window
    // between the two legs of a fill, one venue reporting before the
    // other) must not interrupt monitoring, so nothing happens until the
    // timeout elapses without a single balanced tick in between.
    if monitoring_active && input.unbalanced {
        match state.unbalanced_since_ms {
            None => state.unbalanced_since_ms = Some(now_ms),
            Some(since) if now_ms - since >= IMBALANCE_TIMEOUT_MS => {
                if input.global.auto_restart_enabled {
                    if refresh_allowed(input.last_refresh_ms, now_ms) {
                        actions.push(Action::Log {
                            level: ActivityLevel::Warn,
                            message: format!(
                                "{}: positions unbalanced for {}ms; requesting venue refresh",
                                input.symbol,
                                now_ms - since
                            ),
                        });
                        actions.push(Action::RequestRefresh);
                    }
                    // restart the window either way so this fires once
                    // per timeout, not once per tick
                    state.unbalanced_since_ms = Some(now_ms);
                } else {
                    actions.push(Action::StopMonitors {
                        reason: format!(
                            "{}: positions unbalanced for {}ms with auto-restart off",
                            input.symbol,
                            now_ms - since
                        ),
                    });
                    state.reset_to_idle();
                    state.unbalanced_since_ms = None;
                    return actions;
                }
            }
            Some(_) => {}
        }
    } else {
        state.unbalanced_since_ms = None;
    }

    // No usable spread: cannot evaluate this tick. Counters are left
    // alone - a skipped tick is not a failed condition.
    let Some(diff) = input.diff else {
        return actions;
    };

    // Rule 2: staleness. Never trade on prices one venue stopped
    // updating; ask for a refresh instead.
    let stale1 = now_ms - diff.last_updated_1_ms > STALE_SKEW_MS;
    let stale2 = now_ms - diff.last_updated_2_ms > STALE_SKEW_MS;
    if stale1 || stale2 {
        if monitoring_active && refresh_allowed(input.last_refresh_ms, now_ms) {
            let which = match (stale1, stale2) {
                (true, true) => "both venues",
                (true, false) => "venue 1",
                _ => "venue 2",
            };
            actions.push(Action::Log {
                level: ActivityLevel::Warn,
                message: format!("{}: stale market data from {which}; requesting refresh", input.symbol),
            });
            actions.push(Action::RequestRefresh);
        }
        return actions;
    }

    // Rules 3-6: per-direction threshold evaluation. A fire in one
    // direction moves the (local copy of the) global trade timestamp so
    // the second direction of the same tick is serialized too.
    let mut global_last_trade_ms = input.global_last_trade_ms;

    for direction in ArbDirection::ALL {
        let monitor = input.settings.monitor(direction);
        let dir_state = state.direction_mut(direction);

        if !monitor.is_monitoring {
            dir_state.phase = MonitorPhase::Idle;
            dir_state.consecutive_hits = 0;
            continue;
        }

        let Some(threshold) = monitor.parsed_threshold() else {
            // operator typed something unparseable; never satisfied
            dir_state.phase = MonitorPhase::Monitoring;
            dir_state.consecutive_hits = 0;
            continue;
        };

        let spread = match direction {
            ArbDirection::OneToTwo => diff.spread_1_to_2,
            ArbDirection::TwoToOne => diff.spread_2_to_1,
        };
        let reference_ask = match direction {
            ArbDirection::OneToTwo => diff.ask1_weighted,
            ArbDirection::TwoToOne => diff.ask2_weighted,
        };
        let value = match monitor.unit {
            SpreadUnit::Absolute => spread,
            SpreadUnit::Percent => {
                if reference_ask.abs() < f64::EPSILON {
                    dir_state.phase = MonitorPhase::Monitoring;
                    dir_state.consecutive_hits = 0;
                    continue;
                }
                spread / reference_ask * 100.0
            }
        };

        let satisfied = match monitor.condition {
            ThresholdCondition::Above => value > threshold,
            ThresholdCondition::Below => value < threshold,
        };
        if !satisfied {
            dir_state.phase = MonitorPhase::Monitoring;
            dir_state.consecutive_hits = 0;
            continue;
        }

        dir_state.consecutive_hits += 1;
        let required = input.global.consecutive_trigger_count.max(1);
        if dir_state.consecutive_hits < required {
            dir_state.phase = MonitorPhase::TriggeredPending;
            continue;
        }
        // Trigger count reached: the debounce restarts here whether or
        // not the gates let the trade through.
        dir_state.consecutive_hits = 0;

        if input.settings.trade_size <= 0.0 {
            dir_state.phase = MonitorPhase::Monitoring;
            actions.push(Action::Log {
                level: ActivityLevel::Warn,
                message: format!(
                    "{} {}: trigger met but trade size is not configured",
                    input.symbol,
                    direction.as_str()
                ),
            });
            continue;
        }

        // Rule 5: per-direction and global rate limits.
        if let Some(last) = dir_state.last_trade_ms {
            if now_ms - last < input.settings.trade_interval_ms {
                dir_state.phase = MonitorPhase::CoolingDown;
                continue;
            }
        }
        if let Some(last) = global_last_trade_ms {
            if now_ms - last < input.global.global_trade_interval_ms {
                dir_state.phase = MonitorPhase::CoolingDown;
                continue;
            }
        }

        // Rule 4: position-limit gating on the primary venue. Corrective
        // trades are allowed from outside the band as long as they move
        // toward it.
        let delta = direction.primary_delta_sign() * input.settings.trade_size;
        if !position_allows(
            input.primary_net,
            delta,
            input.settings.position_min,
            input.settings.position_max,
        ) {
            dir_state.phase = MonitorPhase::Monitoring;
            actions.push(Action::Log {
                level: ActivityLevel::Warn,
                message: format!(
                    "{} {}: trigger met but position limit blocks the trade (net {:.4})",
                    input.symbol,
                    direction.as_str(),
                    input.primary_net
                ),
            });
            continue;
        }

        // Fire.
        dir_state.phase = MonitorPhase::Executing;
        dir_state.last_trade_ms = Some(now_ms);
        global_last_trade_ms = Some(now_ms);

        let correlation_id = Uuid::new_v4();
        let buy = TradeIntent {
            correlation_id,
            symbol: input.symbol.to_string(),
            direction: Side::Long,
            size: input.settings.trade_size,
            platform: direction.buy_venue(),
        };
        let sell = TradeIntent {
            correlation_id,
            symbol: input.symbol.to_string(),
            direction: Side::Short,
            size: input.settings.trade_size,
            platform: direction.sell_venue(),
        };
        actions.push(Action::Log {
            level: ActivityLevel::Info,
            message: format!(
                "{} {}: spread {value:.4} {} {threshold} for {required} ticks; executing size {}",
                input.symbol,
                direction.as_str(),
                match monitor.condition {
                    ThresholdCondition::Above => ">",
                    ThresholdCondition::Below => "<",
                },
                input.settings.trade_size
            ),
        });
        actions.push(Action::EmitTrade {
            direction,
            buy,
            sell,
        });
    }

    actions
}

/// Position-limit gate. A trade is allowed when the post-trade position
/// stays inside `[min, max]`, or when it strictly shrinks the distance to
/// the band from outside - corrective trades must never be locked out.
pub fn position_allows(current: f64, delta: f64, min: f64, max: f64) -> bool {
    let next = current + delta;
    if next >= min && next <= max {
        return true;
    }
    distance_to_band(next, min, max) < distance_to_band(current, min, max)
}

fn distance_to_band(position: f64, min: f64, max: f64) -> f64 {
    if position < min {
        min - position
    } else if position > max {
        position - max
    } else {
        0.0
    }
}

fn refresh_allowed(last_refresh_ms: Option<i64>, now_ms: i64) -> bool {
    last_refresh_ms.map_or(true, |last| now_ms - last >= REFRESH_MIN_INTERVAL_MS)
}

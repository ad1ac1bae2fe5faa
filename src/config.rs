//! Operator settings.
//!
//! The trading core never caches settings across evaluation ticks: every
//! tick re-reads the provider, so a change the operator makes lands on the
//! very next evaluation. Settings are persisted outside this core (the
//! extension surface owns them); here they arrive through a TOML file plus
//! environment overrides, or programmatically via [`SharedSettings`].

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::models::ArbDirection;

/// Threshold comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdCondition {
    /// Spread must exceed the threshold (`>`).
    Above,
    /// Spread must stay below the threshold (`<`).
    Below,
}

/// Unit the threshold is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpreadUnit {
    /// Percent of the buy-side venue's weighted ask.
    Percent,
    /// Absolute quote-currency units.
    Absolute,
}

/// Per-(symbol, direction) monitor settings, operator controlled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorSettings {
    pub condition: ThresholdCondition,
    pub unit: SpreadUnit,
    /// Raw operator input; parsed defensively on every tick. An
    /// unparseable threshold never satisfies the condition.
    pub threshold: String,
    pub is_monitoring: bool,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            condition: ThresholdCondition::Above,
            unit: SpreadUnit::Percent,
            threshold: "0".to_string(),
            is_monitoring: false,
        }
    }
}

impl MonitorSettings {
    pub fn parsed_threshold(&self) -> Option<f64> {
        self.threshold.trim().parse::<f64>().ok()
    }
}

/// Per-symbol trading settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolSettings {
    pub trade_size: f64,
    pub position_min: f64,
    pub position_max: f64,
    /// Minimum spacing between trades in the same direction (ms).
    pub trade_interval_ms: i64,
    #[serde(default)]
    pub monitor_1_to_2: MonitorSettings,
    #[serde(default)]
    pub monitor_2_to_1: MonitorSettings,
}

impl Default for SymbolSettings {
    fn default() -> Self {
        Self {
            trade_size: 0.0,
            position_min: 0.0,
            position_max: 0.0,
            trade_interval_ms: 30_000,
            monitor_1_to_2: MonitorSettings::default(),
            monitor_2_to_1: MonitorSettings::default(),
        }
    }
}

impl SymbolSettings {
    pub fn monitor(&self, direction: ArbDirection) -> &MonitorSettings {
        match direction {
            ArbDirection::OneToTwo => &self.monitor_1_to_2,
            ArbDirection::TwoToOne => &self.monitor_2_to_1,
        }
    }
}

/// Global (cross-symbol) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalSettings {
    /// Minimum spacing between trades on ANY symbol (ms). Serializes
    /// cross-symbol bursts so neither venue's order entry gets slammed.
    pub global_trade_interval_ms: i64,
    /// Consecutive satisfying ticks required before a trade fires.
    pub consecutive_trigger_count: u32,
    pub auto_rebalance_enabled: bool,
    /// When on, a persistent position imbalance requests a connection
    /// refresh instead of stopping the symbol's monitors.
    pub auto_restart_enabled: bool,
    /// Passed through to operator surfaces; the core only logs.
    pub sound_enabled: bool,
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            global_trade_interval_ms: 5_000,
            consecutive_trigger_count: 3,
            auto_rebalance_enabled: true,
            auto_restart_enabled: true,
            sound_enabled: false,
        }
    }
}

impl GlobalSettings {
    /// Environment overrides on top of whatever was loaded, parsed
    /// defensively: a malformed value keeps the current setting.
    pub fn apply_env(mut self) -> Self {
        if let Ok(v) = std::env::var("MIRRORBOT_GLOBAL_TRADE_INTERVAL_MS") {
            if let Ok(ms) = v.parse() {
                self.global_trade_interval_ms = ms;
            }
        }
        if let Ok(v) = std::env::var("MIRRORBOT_CONSECUTIVE_TRIGGER_COUNT") {
            if let Ok(n) = v.parse::<u32>() {
                if n > 0 {
                    self.consecutive_trigger_count = n;
                }
            }
        }
        if let Ok(v) = std::env::var("MIRRORBOT_AUTO_REBALANCE") {
            self.auto_rebalance_enabled = matches!(v.as_str(), "1" | "true" | "TRUE" | "on" | "ON");
        }
        if let Ok(v) = std::env::var("MIRRORBOT_AUTO_RESTART") {
            self.auto_restart_enabled = matches!(v.as_str(), "1" | "true" | "TRUE" | "on" | "ON");
        }
        self
    }
}

/// What the trading core reads every tick.
pub trait SettingsProvider: Send + Sync {
    fn global_settings(&self) -> GlobalSettings;
    fn symbol_settings(&self, symbol: &str) -> SymbolSettings;

    /// Force both of a symbol's monitors off. The core invokes this when a
    /// persistent position imbalance makes continued monitoring unsafe;
    /// the change must be visible to the next tick's reads.
    fn disable_monitoring(&self, symbol: &str);
}

/// Settings file shape (TOML).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsFile {
    #[serde(default)]
    pub global: Option<GlobalSettings>,
    #[serde(default)]
    pub symbols: HashMap<String, SymbolSettings>,
}

/// In-memory provider behind locks so operator surfaces can mutate at
/// runtime; the next evaluation tick sees the change.
#[derive(Default)]
pub struct SharedSettings {
    global: RwLock<GlobalSettings>,
    symbols: RwLock<HashMap<String, SymbolSettings>>,
}

impl SharedSettings {
    pub fn new(global: GlobalSettings) -> Self {
        Self {
            global: RwLock::new(global),
            symbols: RwLock::new(HashMap::new()),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read settings file {}", path.display()))?;
        let file: SettingsFile = toml::from_str(&raw)
            .with_context(|| format!("parse settings file {}", path.display()))?;

        let settings = Self::new(file.global.unwrap_or_default().apply_env());
        for (symbol, symbol_settings) in file.symbols {
            settings.set_symbol(&symbol, symbol_settings);
        }
        Ok(settings)
    }

    pub fn set_global(&self, global: GlobalSettings) {
        *self.global.write() = global;
    }

    pub fn set_symbol(&self, symbol: &str, settings: SymbolSettings) {
        self.symbols.write().insert(symbol.to_string(), settings);
    }

    pub fn set_monitor(&self, symbol: &str, direction: ArbDirection, monitor: MonitorSettings) {
        let mut symbols = self.symbols.write();
        let entry = symbols.entry(symbol.to_string()).or_default();
        match direction {
            ArbDirection::OneToTwo => entry.monitor_1_to_2 = monitor,
            ArbDirection::TwoToOne => entry.monitor_2_to_1 = monitor,
        }
    }
}

impl SettingsProvider for SharedSettings {
    fn global_settings(&self) -> GlobalSettings {
        self.global.read().clone()
    }

    fn symbol_settings(&self, symbol: &str) -> SymbolSettings {
        self.symbols
            .read()
            .get(symbol)
            .cloned()
            .unwrap_or_default()
    }

    fn disable_monitoring(&self, symbol: &str) {
        let mut symbols = self.symbols.write();
        if let Some(entry) = symbols.get_mut(symbol) {
            entry.monitor_1_to_2.is_monitoring = false;
            entry.monitor_2_to_1.is_monitoring = false;
        }
    }
}

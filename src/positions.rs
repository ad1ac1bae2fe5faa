//! Position reconciliation across the two venues.
//!
//! Each venue pushes its positions independently and on its own cadence. A
//! full update is authoritative for that venue: everything it previously
//! reported, on any symbol, is dropped first. Incremental updates upsert
//! per (symbol, venue); neither current venue adapter sends them, but the
//! contract supports them.

use std::collections::HashMap;

use parking_lot::RwLock;
use tracing::debug;

use crate::models::{Position, VenueId};

/// Net positions inside this band count as balanced.
pub const IMBALANCE_EPSILON: f64 = 0.0001;

#[derive(Default)]
pub struct PositionBook {
    /// At most one position per (symbol, venue).
    by_symbol: RwLock<HashMap<String, Vec<Position>>>,
}

impl PositionBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one venue's position push.
    ///
    /// `is_full_update` means the payload is authoritative for that venue.
    /// Incremental updates upsert each entry; a pushed position of size 0
    /// removes it.
    pub fn apply_position_update(
        &self,
        venue: VenueId,
        positions: Vec<Position>,
        is_full_update: bool,
    ) {
        let mut by_symbol = self.by_symbol.write();

        if is_full_update {
            for entries in by_symbol.values_mut() {
                entries.retain(|p| p.exchange_id != venue);
            }
        }

        for position in positions {
            let entries = by_symbol.entry(position.symbol.clone()).or_default();
            entries.retain(|p| p.exchange_id != venue);
            if position.position > 0.0 {
                entries.push(position);
            }
        }

        by_symbol.retain(|_, entries| !entries.is_empty());
        debug!(venue = ?venue, full = is_full_update, "positions reconciled");
    }

    /// All positions currently known for a symbol (at most one per venue).
    pub fn positions(&self, symbol: &str) -> Vec<Position> {
        self.by_symbol
            .read()
            .get(symbol)
            .cloned()
            .unwrap_or_default()
    }

    /// One venue's position on a symbol, if open.
    pub fn venue_position(&self, symbol: &str, venue: VenueId) -> Option<Position> {
        self.by_symbol
            .read()
            .get(symbol)?
            .iter()
            .find(|p| p.exchange_id == venue)
            .cloned()
    }

    /// Signed net position across venues: +size for longs, -size for
    /// shorts.
    pub fn net_position(&self, symbol: &str) -> f64 {
        self.by_symbol
            .read()
            .get(symbol)
            .map(|entries| entries.iter().map(|p| p.signed_size()).sum())
            .unwrap_or(0.0)
    }

    /// Signed net position on a single venue.
    pub fn venue_net_position(&self, symbol: &str, venue: VenueId) -> f64 {
        self.venue_position(symbol, venue)
            .map(|p| p.signed_size())
            .unwrap_or(0.0)
    }

    pub fn is_unbalanced(&self, symbol: &str) -> bool {
        self.net_position(symbol).abs() > IMBALANCE_EPSILON
    }

    /// Symbols with at least one open position.
    pub fn symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self.by_symbol.read().keys().cloned().collect();
        symbols.sort();
        symbols
    }
}

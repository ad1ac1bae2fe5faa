//! Per-(symbol, venue) market data cache.
//!
//! The store is the sole writer of order-book state. Each update publishes
//! a fresh `Arc<ExchangeMarketStats>` wholesale - readers that grabbed the
//! previous snapshot keep a consistent book until they drop it, and nothing
//! ever observes a half-merged side.

pub mod merge;

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::trace;

use crate::models::{ExchangeMarketStats, NormalizedMessage, OrderBook, VenueId};
use merge::{merge_levels, BookSide, MergePolicy};

#[derive(Default)]
pub struct MarketStore {
    entries: RwLock<HashMap<(String, VenueId), Arc<ExchangeMarketStats>>>,
}

impl MarketStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one normalized feed message. Returns the symbol it touched so
    /// the caller can drive an evaluation tick for it.
    pub fn apply(
        &self,
        venue: VenueId,
        policy: MergePolicy,
        msg: &NormalizedMessage,
        now_ms: i64,
    ) -> String {
        match msg {
            NormalizedMessage::OrderBook { symbol, bids, asks } => {
                let key = (symbol.clone(), venue);
                let mut entries = self.entries.write();
                let previous = entries.get(&key);

                let (old_bids, old_asks) = match previous {
                    Some(entry) => (
                        entry.order_book.bids.as_slice(),
                        entry.order_book.asks.as_slice(),
                    ),
                    None => (&[][..], &[][..]),
                };

                let book = OrderBook {
                    bids: merge_levels(old_bids, bids, BookSide::Bid, policy),
                    asks: merge_levels(old_asks, asks, BookSide::Ask, policy),
                };

                let stats = previous.and_then(|e| e.stats);
                entries.insert(
                    key,
                    Arc::new(ExchangeMarketStats {
                        exchange_id: venue,
                        order_book: Arc::new(book),
                        stats,
                        last_updated_ms: now_ms,
                    }),
                );
                metrics::increment_counter!("mirrorbot_book_updates_total");
                trace!(symbol = %symbol, venue = ?venue, "book updated");
                symbol.clone()
            }
            NormalizedMessage::MarketStats { symbol, stats } => {
                let key = (symbol.clone(), venue);
                let mut entries = self.entries.write();
                let (book, _) = match entries.get(&key) {
                    Some(entry) => (entry.order_book.clone(), entry.stats),
                    None => (Arc::new(OrderBook::default()), None),
                };
                entries.insert(
                    key,
                    Arc::new(ExchangeMarketStats {
                        exchange_id: venue,
                        order_book: book,
                        stats: Some(*stats),
                        last_updated_ms: now_ms,
                    }),
                );
                symbol.clone()
            }
        }
    }

    /// Latest snapshot for a (symbol, venue), if any data has arrived.
    pub fn get(&self, symbol: &str, venue: VenueId) -> Option<Arc<ExchangeMarketStats>> {
        self.entries
            .read()
            .get(&(symbol.to_string(), venue))
            .cloned()
    }

    /// Symbols with data from at least one venue.
    pub fn symbols(&self) -> Vec<String> {
        let entries = self.entries.read();
        let mut symbols: Vec<String> = entries.keys().map(|(s, _)| s.clone()).collect();
        symbols.sort();
        symbols.dedup();
        symbols
    }
}

use serde::{Deserialize, Serialize};

/// Identifies one of the two venues being mirrored.
///
/// The core is written against exactly two venues; everywhere a pair is
/// needed, `One` is the primary venue (the one whose position the operator
/// bounds) and `Two` is the counter venue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VenueId {
    One,
    Two,
}

impl VenueId {
    pub fn other(&self) -> VenueId {
        match self {
            VenueId::One => VenueId::Two,
            VenueId::Two => VenueId::One,
        }
    }
}

/// Display identity for a venue (presentation fields carried through
/// `PriceDiff` so operator-facing surfaces can label both sides).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VenueInfo {
    pub id: VenueId,
    pub name: String,
    pub color: String,
}

/// One of the two arbitrage directions between the venues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArbDirection {
    /// Buy on venue 1, sell on venue 2 (acts on `spread_1_to_2`).
    OneToTwo,
    /// Buy on venue 2, sell on venue 1 (acts on `spread_2_to_1`).
    TwoToOne,
}

impl ArbDirection {
    pub const ALL: [ArbDirection; 2] = [ArbDirection::OneToTwo, ArbDirection::TwoToOne];

    pub fn buy_venue(&self) -> VenueId {
        match self {
            ArbDirection::OneToTwo => VenueId::One,
            ArbDirection::TwoToOne => VenueId::Two,
        }
    }

    pub fn sell_venue(&self) -> VenueId {
        self.buy_venue().other()
    }

    /// Signed size change this direction causes on the primary venue
    /// (venue 1) per unit traded.
    pub fn primary_delta_sign(&self) -> f64 {
        match self {
            ArbDirection::OneToTwo => 1.0,
            ArbDirection::TwoToOne => -1.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ArbDirection::OneToTwo => "1->2",
            ArbDirection::TwoToOne => "2->1",
        }
    }
}

/// Position direction. Size is always stored non-negative; direction lives
/// here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Long,
    Short,
}

impl Side {
    pub fn sign(&self) -> f64 {
        match self {
            Side::Long => 1.0,
            Side::Short => -1.0,
        }
    }

    pub fn opposite(&self) -> Side {
        match self {
            Side::Long => Side::Short,
            Side::Short => Side::Long,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Long => "long",
            Side::Short => "short",
        }
    }
}

/// One price level of an order book. Quantity 0 signals deletion in delta
/// mode and never appears in stored state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrderBookLevel {
    pub price: f64,
    pub quantity: f64,
}

/// Bids descending, asks ascending, no duplicate prices, at most
/// `MAX_BOOK_DEPTH` levels per side after a merge.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderBook {
    pub bids: Vec<OrderBookLevel>,
    pub asks: Vec<OrderBookLevel>,
}

impl OrderBook {
    pub fn best_bid(&self) -> Option<&OrderBookLevel> {
        self.bids.first()
    }

    pub fn best_ask(&self) -> Option<&OrderBookLevel> {
        self.asks.first()
    }

    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }
}

/// Ticker-style statistics a venue pushes alongside its book. All fields
/// are defensively coerced by the parsers; a missing field is 0.0.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct MarketStatsMsg {
    pub mark_price: f64,
    pub index_price: f64,
    pub last_price: f64,
    pub funding_rate: f64,
    pub open_interest: f64,
}

/// Latest known market data for one (symbol, venue) pair.
///
/// Replaced wholesale on every update tick (the book lives behind an `Arc`
/// and readers hold the old snapshot until they drop it), so nothing
/// observes a half-merged book. Created on first message, refreshed on
/// every message, never destroyed for the session lifetime.
#[derive(Debug, Clone)]
pub struct ExchangeMarketStats {
    pub exchange_id: VenueId,
    pub order_book: std::sync::Arc<OrderBook>,
    pub stats: Option<MarketStatsMsg>,
    pub last_updated_ms: i64,
}

/// A single open position as reported by one venue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    /// Absolute size; direction is `side`.
    pub position: f64,
    pub side: Side,
    pub avg_entry_price: f64,
    pub mark_price: f64,
    pub position_value: f64,
    pub unrealized_pnl: f64,
    pub unrealized_pnl_percent: f64,
    pub funding: f64,
    pub liquidation_price: Option<f64>,
    pub exchange_id: VenueId,
    pub last_updated_ms: i64,
}

impl Position {
    /// Signed contribution to the symbol's net position.
    pub fn signed_size(&self) -> f64 {
        self.position * self.side.sign()
    }
}

/// A raw frame pushed by a feed connection before any venue-specific
/// parsing.
#[derive(Debug, Clone)]
pub enum RawFrame {
    Binary(Vec<u8>),
    Text(String),
}

/// Normalized output of a venue parser. Anything else a venue sends
/// (pings, acks, unknown shapes) parses to `None` and is dropped.
#[derive(Debug, Clone)]
pub enum NormalizedMessage {
    OrderBook {
        symbol: String,
        bids: Vec<OrderBookLevel>,
        asks: Vec<OrderBookLevel>,
    },
    MarketStats {
        symbol: String,
        stats: MarketStatsMsg,
    },
}

/// One leg of an arbitrage trade, handed to a venue executor.
/// Ephemeral: produced by the monitor loop, consumed by an executor,
/// correlated to its sibling leg by `correlation_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeIntent {
    pub correlation_id: uuid::Uuid,
    pub symbol: String,
    pub direction: Side,
    pub size: f64,
    pub platform: VenueId,
}

/// Snapshot of the executable spread between the two venues for one
/// symbol. Derived fresh per evaluation cycle, never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceDiff {
    pub platform1: VenueInfo,
    pub platform2: VenueInfo,
    /// Profit (quote units) of buying on venue 1 and selling on venue 2.
    pub spread_1_to_2: f64,
    /// Profit (quote units) of buying on venue 2 and selling on venue 1.
    pub spread_2_to_1: f64,
    pub ask1_weighted: f64,
    pub bid1_weighted: f64,
    pub ask2_weighted: f64,
    pub bid2_weighted: f64,
    pub last_updated_1_ms: i64,
    pub last_updated_2_ms: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signed_size_follows_side() {
        let mut pos = Position {
            symbol: "BTC-USD".to_string(),
            position: 2.5,
            side: Side::Long,
            avg_entry_price: 100.0,
            mark_price: 101.0,
            position_value: 252.5,
            unrealized_pnl: 2.5,
            unrealized_pnl_percent: 1.0,
            funding: 0.0,
            liquidation_price: None,
            exchange_id: VenueId::One,
            last_updated_ms: 0,
        };
        assert_eq!(pos.signed_size(), 2.5);
        pos.side = Side::Short;
        assert_eq!(pos.signed_size(), -2.5);
    }

    #[test]
    fn test_venue_other() {
        assert_eq!(VenueId::One.other(), VenueId::Two);
        assert_eq!(VenueId::Two.other(), VenueId::One);
    }
}

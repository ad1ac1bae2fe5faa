//! edgeX feed adapter (venue 1).
//!
//! edgeX ships msgpack binary frames on its public websocket. Order-book
//! messages are sparse per-price diffs (the venue slips a periodic full
//! refresh into the same stream, which the merge heuristic catches), and a
//! separate `market_stats` payload carries mark/index/funding data.
//!
//! Parsing is heuristic by field presence and never errors: a frame that
//! decodes to a sentinel, carries no recognizable payload, or is a ping
//! parses to `None` and is dropped.

use crate::books::merge::MergePolicy;
use crate::codec::{decode, Value};
use crate::models::{
    MarketStatsMsg, NormalizedMessage, OrderBookLevel, RawFrame, VenueId, VenueInfo,
};

use super::VenueAdapter;

const EDGEX_WS_URL: &str = "wss://quote.edgex.exchange/api/v1/public/ws";

pub struct EdgexAdapter;

impl EdgexAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for EdgexAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl VenueAdapter for EdgexAdapter {
    fn venue(&self) -> VenueId {
        VenueId::One
    }

    fn info(&self) -> VenueInfo {
        VenueInfo {
            id: VenueId::One,
            name: "edgeX".to_string(),
            color: "#4f8ef7".to_string(),
        }
    }

    fn merge_policy(&self) -> MergePolicy {
        MergePolicy::Delta
    }

    fn parse(&self, raw: &RawFrame) -> Option<NormalizedMessage> {
        let value = match raw {
            RawFrame::Binary(bytes) => decode(bytes),
            // edgeX occasionally sends JSON control frames (ping/ack) on
            // the same socket; none of them carry market data.
            RawFrame::Text(_) => return None,
        };
        if value.is_sentinel() {
            return None;
        }

        // Keepalive: answered by the connection layer, dropped here.
        if value.get("ping").is_some() || value.get("pong").is_some() {
            return None;
        }

        let symbol = value.get("symbol")?.as_str()?.to_string();

        if let Some(book) = value.get("order_book") {
            return Some(NormalizedMessage::OrderBook {
                symbol,
                bids: parse_levels(book.get("bids")),
                asks: parse_levels(book.get("asks")),
            });
        }

        if let Some(stats) = value.get("market_stats") {
            return Some(NormalizedMessage::MarketStats {
                symbol,
                stats: MarketStatsMsg {
                    mark_price: num_or_zero(stats.get("mark_price")),
                    index_price: num_or_zero(stats.get("index_price")),
                    last_price: num_or_zero(stats.get("last_price")),
                    funding_rate: num_or_zero(stats.get("funding_rate")),
                    open_interest: num_or_zero(stats.get("open_interest")),
                },
            });
        }

        None
    }

    fn ws_url(&self) -> String {
        EDGEX_WS_URL.to_string()
    }

    fn subscribe_frames(&self, symbols: &[String]) -> Vec<String> {
        symbols
            .iter()
            .flat_map(|symbol| {
                [
                    serde_json::json!({
                        "type": "subscribe",
                        "channel": format!("depth.{symbol}"),
                    })
                    .to_string(),
                    serde_json::json!({
                        "type": "subscribe",
                        "channel": format!("ticker.{symbol}"),
                    })
                    .to_string(),
                ]
            })
            .collect()
    }

    fn ping_frame(&self) -> Option<String> {
        Some(serde_json::json!({ "type": "ping" }).to_string())
    }
}

/// A level is a `[price, quantity]` pair; prices arrive as decimal strings
/// in some payloads and as floats in others. Anything non-numeric coerces
/// to 0 - a 0-price bid is harmlessly sorted last, a 0 quantity is a
/// deletion.
fn parse_levels(levels: Option<&Value>) -> Vec<OrderBookLevel> {
    let Some(Value::Array(items)) = levels else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| {
            let pair = item.as_array()?;
            Some(OrderBookLevel {
                price: pair.first().and_then(Value::as_f64).unwrap_or(0.0),
                quantity: pair.get(1).and_then(Value::as_f64).unwrap_or(0.0),
            })
        })
        .collect()
}

fn num_or_zero(value: Option<&Value>) -> f64 {
    value.and_then(Value::as_f64).unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal msgpack writer for test frames.
    fn pack_map(entries: &[(&str, Vec<u8>)]) -> Vec<u8> {
        let mut out = vec![0x80 | entries.len() as u8];
        for (key, value) in entries {
            out.push(0xa0 | key.len() as u8);
            out.extend_from_slice(key.as_bytes());
            out.extend_from_slice(value);
        }
        out
    }

    fn pack_str(s: &str) -> Vec<u8> {
        let mut out = vec![0xa0 | s.len() as u8];
        out.extend_from_slice(s.as_bytes());
        out
    }

    fn pack_f64(v: f64) -> Vec<u8> {
        let mut out = vec![0xcb];
        out.extend_from_slice(&v.to_bits().to_be_bytes());
        out
    }

    fn pack_pair(price: f64, quantity: f64) -> Vec<u8> {
        let mut out = vec![0x92];
        out.extend(pack_f64(price));
        out.extend(pack_f64(quantity));
        out
    }

    fn pack_array(items: Vec<Vec<u8>>) -> Vec<u8> {
        let mut out = vec![0x90 | items.len() as u8];
        for item in items {
            out.extend(item);
        }
        out
    }

    #[test]
    fn test_parses_order_book_frame() {
        let frame = pack_map(&[
            ("symbol", pack_str("BTC-USD")),
            (
                "order_book",
                pack_map(&[
                    ("bids", pack_array(vec![pack_pair(99.0, 1.0)])),
                    ("asks", pack_array(vec![pack_pair(100.0, 2.0)])),
                ]),
            ),
        ]);

        let adapter = EdgexAdapter::new();
        let msg = adapter
            .parse(&RawFrame::Binary(frame))
            .expect("book frame recognized");

        match msg {
            NormalizedMessage::OrderBook { symbol, bids, asks } => {
                assert_eq!(symbol, "BTC-USD");
                assert_eq!(bids[0].price, 99.0);
                assert_eq!(asks[0].quantity, 2.0);
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn test_parses_market_stats_with_missing_fields_as_zero() {
        let frame = pack_map(&[
            ("symbol", pack_str("BTC-USD")),
            ("market_stats", pack_map(&[("mark_price", pack_str("101.5"))])),
        ]);

        let adapter = EdgexAdapter::new();
        let msg = adapter
            .parse(&RawFrame::Binary(frame))
            .expect("stats frame recognized");

        match msg {
            NormalizedMessage::MarketStats { stats, .. } => {
                assert_eq!(stats.mark_price, 101.5);
                assert_eq!(stats.funding_rate, 0.0);
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn test_ping_and_garbage_drop_silently() {
        let adapter = EdgexAdapter::new();

        let ping = pack_map(&[("ping", pack_f64(1.0))]);
        assert!(adapter.parse(&RawFrame::Binary(ping)).is_none());

        // truncated frame decodes to a sentinel, not a crash
        assert!(adapter.parse(&RawFrame::Binary(vec![0x81, 0xa4])).is_none());

        // no symbol, no routing
        let anonymous = pack_map(&[("order_book", pack_map(&[]))]);
        assert!(adapter.parse(&RawFrame::Binary(anonymous)).is_none());

        assert!(adapter.parse(&RawFrame::Text("{}".to_string())).is_none());
    }
}

//! Backpack feed adapter (venue 2).
//!
//! Backpack streams JSON text frames. Depth messages are full-replacement
//! snapshots. Between depth pushes the venue also emits a scalar quote
//! envelope carrying best bid/ask only; the parser synthesizes a
//! single-level book from it with quantity defaulted to 1.0. That quantity
//! is a placeholder, not a real size - weighted-price computation on this
//! path degenerates to the scalar quote, a known approximation preserved
//! from the original behavior.

use serde_json::Value as Json;

use crate::books::merge::MergePolicy;
use crate::models::{
    MarketStatsMsg, NormalizedMessage, OrderBookLevel, RawFrame, VenueId, VenueInfo,
};

use super::VenueAdapter;

const BACKPACK_WS_URL: &str = "wss://ws.backpack.exchange";

/// Placeholder size attached to synthesized single-level books.
const SYNTHETIC_QUOTE_QTY: f64 = 1.0;

pub struct BackpackAdapter;

impl BackpackAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for BackpackAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl VenueAdapter for BackpackAdapter {
    fn venue(&self) -> VenueId {
        VenueId::Two
    }

    fn info(&self) -> VenueInfo {
        VenueInfo {
            id: VenueId::Two,
            name: "Backpack".to_string(),
            color: "#e0543e".to_string(),
        }
    }

    fn merge_policy(&self) -> MergePolicy {
        MergePolicy::Snapshot
    }

    fn parse(&self, raw: &RawFrame) -> Option<NormalizedMessage> {
        let text = match raw {
            RawFrame::Text(text) => text,
            RawFrame::Binary(_) => return None,
        };
        if text.eq_ignore_ascii_case("ping") || text.eq_ignore_ascii_case("pong") {
            return None;
        }

        let json: Json = serde_json::from_str(text).ok()?;

        // Payload may ride inside a stream envelope.
        let payload = json.get("data").unwrap_or(&json);
        let symbol = payload
            .get("symbol")
            .or_else(|| payload.get("s"))
            .and_then(Json::as_str)?
            .to_string();

        // Depth snapshot: bids/asks arrays of [price, quantity].
        if payload.get("bids").is_some() || payload.get("asks").is_some() {
            return Some(NormalizedMessage::OrderBook {
                symbol,
                bids: parse_levels(payload.get("bids")),
                asks: parse_levels(payload.get("asks")),
            });
        }

        // Scalar quote envelope: best bid/ask only, no depth.
        if payload.get("bid").is_some() && payload.get("ask").is_some() {
            return Some(NormalizedMessage::OrderBook {
                symbol,
                bids: vec![OrderBookLevel {
                    price: num_or_zero(payload.get("bid")),
                    quantity: SYNTHETIC_QUOTE_QTY,
                }],
                asks: vec![OrderBookLevel {
                    price: num_or_zero(payload.get("ask")),
                    quantity: SYNTHETIC_QUOTE_QTY,
                }],
            });
        }

        if payload.get("markPrice").is_some() || payload.get("fundingRate").is_some() {
            return Some(NormalizedMessage::MarketStats {
                symbol,
                stats: MarketStatsMsg {
                    mark_price: num_or_zero(payload.get("markPrice")),
                    index_price: num_or_zero(payload.get("indexPrice")),
                    last_price: num_or_zero(payload.get("lastPrice")),
                    funding_rate: num_or_zero(payload.get("fundingRate")),
                    open_interest: num_or_zero(payload.get("openInterest")),
                },
            });
        }

        None
    }

    fn ws_url(&self) -> String {
        BACKPACK_WS_URL.to_string()
    }

    fn subscribe_frames(&self, symbols: &[String]) -> Vec<String> {
        let streams: Vec<String> = symbols
            .iter()
            .flat_map(|s| [format!("depth.{s}"), format!("markPrice.{s}")])
            .collect();
        vec![serde_json::json!({
            "method": "SUBSCRIBE",
            "params": streams,
        })
        .to_string()]
    }
}

fn parse_levels(levels: Option<&Json>) -> Vec<OrderBookLevel> {
    let Some(Json::Array(items)) = levels else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| {
            let pair = item.as_array()?;
            Some(OrderBookLevel {
                price: num_or_zero(pair.first()),
                quantity: num_or_zero(pair.get(1)),
            })
        })
        .collect()
}

/// Defensive numeric coercion: JSON numbers and numeric strings pass,
/// everything else (missing, null, objects) is 0.
fn num_or_zero(value: Option<&Json>) -> f64 {
    match value {
        Some(Json::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Json::String(s)) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Option<NormalizedMessage> {
        BackpackAdapter::new().parse(&RawFrame::Text(text.to_string()))
    }

    #[test]
    fn test_parses_depth_snapshot_with_string_prices() {
        let msg = parse(
            r#"{"data":{"symbol":"BTC-USD","bids":[["99.5","2"]],"asks":[["100.5","1.5"]]}}"#,
        )
        .expect("depth recognized");

        match msg {
            NormalizedMessage::OrderBook { symbol, bids, asks } => {
                assert_eq!(symbol, "BTC-USD");
                assert_eq!(bids[0].price, 99.5);
                assert_eq!(asks[0].quantity, 1.5);
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn test_scalar_quote_synthesizes_single_level_book() {
        let msg = parse(r#"{"symbol":"BTC-USD","bid":99.0,"ask":99.2}"#).expect("quote recognized");

        match msg {
            NormalizedMessage::OrderBook { bids, asks, .. } => {
                assert_eq!(bids.len(), 1);
                assert_eq!(asks.len(), 1);
                assert_eq!(bids[0].price, 99.0);
                // placeholder quantity, not a real size
                assert_eq!(bids[0].quantity, SYNTHETIC_QUOTE_QTY);
                assert_eq!(asks[0].quantity, SYNTHETIC_QUOTE_QTY);
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn test_mark_price_frame_becomes_market_stats() {
        let msg = parse(r#"{"data":{"s":"BTC-USD","markPrice":"101.3","fundingRate":"0.0001"}}"#)
            .expect("stats recognized");

        match msg {
            NormalizedMessage::MarketStats { stats, .. } => {
                assert_eq!(stats.mark_price, 101.3);
                assert_eq!(stats.funding_rate, 0.0001);
                assert_eq!(stats.open_interest, 0.0);
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn test_control_and_unknown_frames_drop_silently() {
        assert!(parse("PONG").is_none());
        assert!(parse("not json at all").is_none());
        assert!(parse(r#"{"event":"subscribed"}"#).is_none());
        // bad numerics coerce instead of erroring
        let msg = parse(r#"{"symbol":"X","bid":"oops","ask":null}"#).expect("still a quote");
        match msg {
            NormalizedMessage::OrderBook { bids, .. } => assert_eq!(bids[0].price, 0.0),
            other => panic!("unexpected message: {other:?}"),
        }
    }
}

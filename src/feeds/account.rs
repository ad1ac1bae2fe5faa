//! Per-venue position polling.
//!
//! Positions arrive on their own cadence, independently per venue, and
//! every poll is a full authoritative snapshot for that venue. The REST
//! poller is deliberately dumb: fetch, coerce defensively, push, sleep. A
//! failed poll logs and waits for the next cycle - stale positions are
//! caught downstream by the imbalance timeout, not here.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use serde_json::Value as Json;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::models::{Position, Side, VenueId};

use super::PositionSink;

pub struct AccountPoller {
    venue: VenueId,
    url: String,
    poll_interval: Duration,
    client: reqwest::Client,
}

impl AccountPoller {
    pub fn new(venue: VenueId, url: String, poll_interval: Duration) -> Self {
        Self {
            venue,
            url,
            poll_interval,
            client: reqwest::Client::builder()
                .user_agent("MirrorBot/0.1")
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap(),
        }
    }

    pub fn spawn(self, sink: Arc<dyn PositionSink>) {
        tokio::spawn(async move {
            loop {
                match self.poll_once().await {
                    Ok(positions) => {
                        debug!(venue = ?self.venue, count = positions.len(), "positions polled");
                        sink.on_positions(self.venue, positions, true);
                    }
                    Err(e) => {
                        warn!(venue = ?self.venue, error = %e, "position poll failed");
                    }
                }
                sleep(self.poll_interval).await;
            }
        });
    }

    async fn poll_once(&self) -> Result<Vec<Position>> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .context("position request")?;
        if !response.status().is_success() {
            anyhow::bail!("position endpoint HTTP {}", response.status());
        }
        let json: Json = response.json().await.context("position body")?;
        Ok(parse_positions(self.venue, &json, Utc::now().timestamp_millis()))
    }
}

/// Coerce a venue position payload into our shape. Accepts a bare array
/// or a `{"positions": [...]}` envelope; entries without a symbol are
/// skipped, every numeric field defaults to 0, and a missing side falls
/// back to the sign of the size.
pub fn parse_positions(venue: VenueId, json: &Json, now_ms: i64) -> Vec<Position> {
    let items = json
        .get("positions")
        .and_then(Json::as_array)
        .or_else(|| json.as_array());
    let Some(items) = items else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| {
            let symbol = item.get("symbol").and_then(Json::as_str)?.to_string();

            let raw_size = field(item, &["position", "size", "quantity"]);
            let side = match item.get("side").and_then(Json::as_str) {
                Some(s) if s.eq_ignore_ascii_case("short") || s.eq_ignore_ascii_case("sell") => {
                    Side::Short
                }
                Some(_) => Side::Long,
                None if raw_size < 0.0 => Side::Short,
                None => Side::Long,
            };

            Some(Position {
                symbol,
                position: raw_size.abs(),
                side,
                avg_entry_price: field(item, &["avgEntryPrice", "entryPrice", "avg_entry_price"]),
                mark_price: field(item, &["markPrice", "mark_price"]),
                position_value: field(item, &["positionValue", "notional", "position_value"]),
                unrealized_pnl: field(item, &["unrealizedPnl", "unrealized_pnl"]),
                unrealized_pnl_percent: field(
                    item,
                    &["unrealizedPnlPercent", "unrealized_pnl_percent"],
                ),
                funding: field(item, &["funding", "fundingFee", "funding_fee"]),
                liquidation_price: liquidation(item),
                exchange_id: venue,
                last_updated_ms: now_ms,
            })
        })
        .collect()
}

fn field(item: &Json, names: &[&str]) -> f64 {
    for name in names {
        match item.get(name) {
            Some(Json::Number(n)) => return n.as_f64().unwrap_or(0.0),
            Some(Json::String(s)) => return s.trim().parse().unwrap_or(0.0),
            _ => {}
        }
    }
    0.0
}

fn liquidation(item: &Json) -> Option<f64> {
    for name in ["liquidationPrice", "liq_price", "liquidation_price"] {
        match item.get(name) {
            Some(Json::Number(n)) => return n.as_f64(),
            Some(Json::String(s)) => return s.trim().parse().ok(),
            Some(Json::Null) => return None,
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parses_envelope_with_mixed_numerics() {
        let payload = json!({
            "positions": [
                {
                    "symbol": "BTC-USD",
                    "size": "1.5",
                    "side": "Short",
                    "entryPrice": 100.0,
                    "markPrice": "99.0",
                    "unrealizedPnl": 1.5,
                    "liquidationPrice": null
                },
                { "noSymbol": true }
            ]
        });

        let positions = parse_positions(VenueId::Two, &payload, 42);
        assert_eq!(positions.len(), 1);
        let p = &positions[0];
        assert_eq!(p.position, 1.5);
        assert_eq!(p.side, Side::Short);
        assert_eq!(p.mark_price, 99.0);
        assert_eq!(p.liquidation_price, None);
        assert_eq!(p.exchange_id, VenueId::Two);
        assert_eq!(p.last_updated_ms, 42);
    }

    #[test]
    fn test_signed_size_infers_side() {
        let payload = json!([{ "symbol": "ETH-USD", "position": -2.0 }]);
        let positions = parse_positions(VenueId::One, &payload, 0);
        assert_eq!(positions[0].side, Side::Short);
        assert_eq!(positions[0].position, 2.0);
    }

    #[test]
    fn test_garbage_payload_yields_nothing() {
        assert!(parse_positions(VenueId::One, &json!({"ok": true}), 0).is_empty());
        assert!(parse_positions(VenueId::One, &json!("nope"), 0).is_empty());
    }
}

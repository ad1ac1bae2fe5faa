//! End-to-end engine test: raw venue frames in, paired trade intents out.
//!
//! Exercises the whole path — msgpack decode, venue parsing, book merge,
//! spread computation, monitor trigger, concurrent two-leg dispatch —
//! with paper executors and no sockets.

use std::sync::Arc;
use std::time::Duration;

use mirrorbot_core::arbitrage::{spread_between, ArbEngine, RefreshRequester};
use mirrorbot_core::config::{
    GlobalSettings, MonitorSettings, SharedSettings, SpreadUnit, SymbolSettings,
    ThresholdCondition,
};
use mirrorbot_core::execution::PaperExecutor;
use mirrorbot_core::feeds::{BackpackAdapter, EdgexAdapter, VenueAdapter};
use mirrorbot_core::models::{ArbDirection, RawFrame, Side, VenueId};

struct NullRefresh;

impl RefreshRequester for NullRefresh {
    fn request_refresh(&self) {}
}

// --- minimal msgpack writers for the edgeX frame -------------------------

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

fn pack_map(entries: &[(&str, Vec<u8>)]) -> Vec<u8> {
    let mut out = vec![0x80 | entries.len() as u8];
    for (key, value) in entries {
        out.extend(pack_str(key));
        out.extend_from_slice(value);
    }
    out
}

fn pack_array(items: Vec<Vec<u8>>) -> Vec<u8> {
    let mut out = vec![0x90 | items.len() as u8];
    for item in items {
        out.extend(item);
    }
    out
}

fn pack_level(price: f64, quantity: f64) -> Vec<u8> {
    pack_array(vec![pack_f64(price), pack_f64(quantity)])
}

/// edgeX depth frame: symbol + order_book with one level per side.
fn edgex_book_frame(symbol: &str, bid: f64, ask: f64) -> RawFrame {
    RawFrame::Binary(pack_map(&[
        ("symbol", pack_str(symbol)),
        (
            "order_book",
            pack_map(&[
                ("bids", pack_array(vec![pack_level(bid, 5.0)])),
                ("asks", pack_array(vec![pack_level(ask, 5.0)])),
            ]),
        ),
    ]))
}

/// Backpack depth frame: JSON snapshot.
fn backpack_book_frame(symbol: &str, bid: f64, ask: f64) -> RawFrame {
    RawFrame::Text(format!(
        r#"{{"data":{{"symbol":"{symbol}","bids":[["{bid}","5"]],"asks":[["{ask}","5"]]}}}}"#
    ))
}

fn engine_with_monitor(
    paper1: Arc<PaperExecutor>,
    paper2: Arc<PaperExecutor>,
) -> Arc<ArbEngine> {
    let settings = SharedSettings::new(GlobalSettings {
        consecutive_trigger_count: 1,
        global_trade_interval_ms: 5_000,
        ..Default::default()
    });
    settings.set_symbol(
        "BTC-USD",
        SymbolSettings {
            trade_size: 1.0,
            position_min: -10.0,
            position_max: 10.0,
            trade_interval_ms: 30_000,
            monitor_2_to_1: MonitorSettings {
                condition: ThresholdCondition::Above,
                unit: SpreadUnit::Absolute,
                threshold: "-1".to_string(),
                is_monitoring: true,
            },
            ..Default::default()
        },
    );

    ArbEngine::new(
        Arc::new(EdgexAdapter::new()),
        Arc::new(BackpackAdapter::new()),
        Arc::new(settings),
        paper1,
        paper2,
        Arc::new(NullRefresh),
    )
}

#[tokio::test]
async fn test_end_to_end_trigger_emits_paired_opposing_intents() {
    let paper1 = Arc::new(PaperExecutor::for_venue(VenueId::One));
    let paper2 = Arc::new(PaperExecutor::for_venue(VenueId::Two));
    let engine = engine_with_monitor(paper1.clone(), paper2.clone());

    // venue A alone: spread unevaluable, nothing may fire
    engine.handle_frame(VenueId::One, edgex_book_frame("BTC-USD", 99.0, 100.0));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(paper1.executed().is_empty());
    assert!(paper2.executed().is_empty());

    // venue B arrives: spread_2_to_1 = bid(A) 99 - ask(B) 99 = 0 > -1
    engine.handle_frame(VenueId::Two, backpack_book_frame("BTC-USD", 98.0, 99.0));
    tokio::time::sleep(Duration::from_millis(200)).await;

    // exactly one leg per venue: short on A, long on B, both size 1
    let legs1 = paper1.executed();
    let legs2 = paper2.executed();
    assert_eq!(legs1.len(), 1);
    assert_eq!(legs2.len(), 1);

    assert_eq!(legs1[0].platform, VenueId::One);
    assert_eq!(legs1[0].direction, Side::Short);
    assert_eq!(legs1[0].size, 1.0);

    assert_eq!(legs2[0].platform, VenueId::Two);
    assert_eq!(legs2[0].direction, Side::Long);
    assert_eq!(legs2[0].size, 1.0);

    // the two legs are one trade
    assert_eq!(legs1[0].correlation_id, legs2[0].correlation_id);

    // both legs filled: something landed in the activity log
    assert!(!engine.activity().is_empty());
}

#[tokio::test]
async fn test_spread_numbers_match_the_fed_books() {
    let paper1 = Arc::new(PaperExecutor::for_venue(VenueId::One));
    let paper2 = Arc::new(PaperExecutor::for_venue(VenueId::Two));
    let engine = engine_with_monitor(paper1, paper2);

    engine.handle_frame(VenueId::One, edgex_book_frame("BTC-USD", 99.0, 100.0));
    engine.handle_frame(VenueId::Two, backpack_book_frame("BTC-USD", 98.0, 99.0));

    let stats1 = engine.market().get("BTC-USD", VenueId::One).expect("venue 1 data");
    let stats2 = engine.market().get("BTC-USD", VenueId::Two).expect("venue 2 data");

    let v1 = EdgexAdapter::new().info();
    let v2 = BackpackAdapter::new().info();
    let diff = spread_between(&v1, &v2, &stats1, &stats2, 1.0).expect("both books usable");

    assert_eq!(diff.spread_2_to_1, 99.0 - 99.0);
    assert_eq!(diff.spread_1_to_2, 98.0 - 100.0);
}

#[tokio::test]
async fn test_same_direction_retrigger_is_rate_limited() {
    let paper1 = Arc::new(PaperExecutor::for_venue(VenueId::One));
    let paper2 = Arc::new(PaperExecutor::for_venue(VenueId::Two));
    let engine = engine_with_monitor(paper1.clone(), paper2.clone());

    engine.handle_frame(VenueId::One, edgex_book_frame("BTC-USD", 99.0, 100.0));
    engine.handle_frame(VenueId::Two, backpack_book_frame("BTC-USD", 98.0, 99.0));
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(paper1.executed().len(), 1);

    // immediate refresh of both books retriggers the condition, but the
    // per-direction interval suppresses a second trade
    engine.handle_frame(VenueId::One, edgex_book_frame("BTC-USD", 99.0, 100.0));
    engine.handle_frame(VenueId::Two, backpack_book_frame("BTC-USD", 98.0, 99.0));
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(paper1.executed().len(), 1);
    assert_eq!(paper2.executed().len(), 1);
}

#[tokio::test]
async fn test_manual_execution_bypasses_gates() {
    let paper1 = Arc::new(PaperExecutor::for_venue(VenueId::One));
    let paper2 = Arc::new(PaperExecutor::for_venue(VenueId::Two));
    let engine = engine_with_monitor(paper1.clone(), paper2.clone());

    // no market data at all; a normal trigger could never fire
    engine.execute_manual("ETH-USD", ArbDirection::OneToTwo, 0.5);
    tokio::time::sleep(Duration::from_millis(100)).await;

    let legs1 = paper1.executed();
    let legs2 = paper2.executed();
    assert_eq!(legs1.len(), 1);
    assert_eq!(legs2.len(), 1);
    // 1->2 buys on venue one, sells on venue two
    assert_eq!(legs1[0].direction, Side::Long);
    assert_eq!(legs2[0].direction, Side::Short);
    assert_eq!(legs1[0].size, 0.5);
}

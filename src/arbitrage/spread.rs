//! Depth-weighted prices and cross-venue spreads.
//!
//! All math here is pure and allocation-free; the monitor loop calls it
//! once per evaluation tick. Fees and slippage are NOT deducted - spreads
//! are gross, and the thresholds the operator configures must account for
//! that.

use std::sync::Arc;

use crate::models::{ExchangeMarketStats, OrderBookLevel, PriceDiff, VenueInfo};

/// Volume-weighted average fill price for `target_size`, walking the
/// levels from best price outward.
///
/// The levels must already be sorted best-first (the merge engine
/// guarantees this). A `target_size <= 0` returns the best level's price.
/// Partial depth still prices the filled portion; only an empty book or
/// zero total quantity returns `None` - and that `None` must propagate,
/// because defaulting to 0 would be silently wrong.
pub fn weighted_price(levels: &[OrderBookLevel], target_size: f64) -> Option<f64> {
    let first = levels.first()?;
    if target_size <= 0.0 {
        return Some(first.price);
    }

    let mut filled = 0.0;
    let mut cost = 0.0;
    for level in levels {
        if filled >= target_size {
            break;
        }
        let take = level.quantity.min(target_size - filled);
        if take <= 0.0 {
            continue;
        }
        filled += take;
        cost += take * level.price;
    }

    if filled <= 0.0 {
        return None;
    }
    Some(cost / filled)
}

/// Bidirectional executable spread between the two venues for one symbol.
///
/// `spread_1_to_2` is the profit (quote units) of buying `size` on venue 1
/// and selling on venue 2: `weighted_bid(2) - weighted_ask(1)`.
/// `spread_2_to_1` is the mirror image. Both signed; positive means
/// profitable in that direction before fees.
///
/// Returns `None` unless all four weighted prices are resolvable - a venue
/// with no data yet, or no usable depth, makes the whole tick
/// unevaluable.
pub fn spread_between(
    venue1: &VenueInfo,
    venue2: &VenueInfo,
    stats1: &Arc<ExchangeMarketStats>,
    stats2: &Arc<ExchangeMarketStats>,
    size: f64,
) -> Option<PriceDiff> {
    let ask1 = weighted_price(&stats1.order_book.asks, size)?;
    let bid1 = weighted_price(&stats1.order_book.bids, size)?;
    let ask2 = weighted_price(&stats2.order_book.asks, size)?;
    let bid2 = weighted_price(&stats2.order_book.bids, size)?;

    Some(PriceDiff {
        platform1: venue1.clone(),
        platform2: venue2.clone(),
        spread_1_to_2: bid2 - ask1,
        spread_2_to_1: bid1 - ask2,
        ask1_weighted: ask1,
        bid1_weighted: bid1,
        ask2_weighted: ask2,
        bid2_weighted: bid2,
        last_updated_1_ms: stats1.last_updated_ms,
        last_updated_2_ms: stats2.last_updated_ms,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OrderBook, VenueId};

    fn level(price: f64, quantity: f64) -> OrderBookLevel {
        OrderBookLevel { price, quantity }
    }

    fn venue(id: VenueId, name: &str) -> VenueInfo {
        VenueInfo {
            id,
            name: name.to_string(),
            color: "#888888".to_string(),
        }
    }

    fn stats(bid: f64, ask: f64, ts: i64) -> Arc<ExchangeMarketStats> {
        Arc::new(ExchangeMarketStats {
            exchange_id: VenueId::One,
            order_book: Arc::new(OrderBook {
                bids: vec![level(bid, 10.0)],
                asks: vec![level(ask, 10.0)],
            }),
            stats: None,
            last_updated_ms: ts,
        })
    }

    #[test]
    fn test_weighted_price_boundaries() {
        assert_eq!(weighted_price(&[], 5.0), None);

        let levels = vec![level(100.0, 1.0), level(101.0, 5.0)];
        // zero size takes the best level price
        assert_eq!(weighted_price(&levels, 0.0), Some(100.0));
        // 3 units: 1 @ 100, 2 @ 101
        let expected = (100.0 * 1.0 + 101.0 * 2.0) / 3.0;
        assert_eq!(weighted_price(&levels, 3.0), Some(expected));
    }

    #[test]
    fn test_weighted_price_partial_depth_prices_filled_portion() {
        let levels = vec![level(100.0, 1.0)];
        // asks only hold 1, but 5 requested: VWAP of what filled
        assert_eq!(weighted_price(&levels, 5.0), Some(100.0));
        // zero total quantity is unpriceable
        let empty_qty = vec![level(100.0, 0.0)];
        assert_eq!(weighted_price(&empty_qty, 5.0), None);
    }

    #[test]
    fn test_spread_sign_convention() {
        let v1 = venue(VenueId::One, "edgex");
        let v2 = venue(VenueId::Two, "backpack");
        // platform1 ask=100 bid=99, platform2 ask=102 bid=101
        let s1 = stats(99.0, 100.0, 10);
        let s2 = stats(101.0, 102.0, 20);

        let diff = spread_between(&v1, &v2, &s1, &s2, 1.0).expect("both books present");
        assert_eq!(diff.spread_1_to_2, 101.0 - 100.0);
        assert_eq!(diff.spread_2_to_1, 99.0 - 102.0);
        assert_eq!(diff.last_updated_1_ms, 10);
        assert_eq!(diff.last_updated_2_ms, 20);
    }

    #[test]
    fn test_null_propagation_on_empty_book() {
        let v1 = venue(VenueId::One, "edgex");
        let v2 = venue(VenueId::Two, "backpack");
        let s1 = stats(99.0, 100.0, 0);
        let empty = Arc::new(ExchangeMarketStats {
            exchange_id: VenueId::Two,
            order_book: Arc::new(OrderBook::default()),
            stats: None,
            last_updated_ms: 0,
        });

        assert!(spread_between(&v1, &v2, &s1, &empty, 1.0).is_none());
        assert!(spread_between(&v1, &v2, &empty, &s1, 1.0).is_none());
    }
}

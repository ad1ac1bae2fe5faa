//! Order-book level merging.
//!
//! The two venues disagree about what an order-book message means: one
//! streams sparse per-price diffs, the other replaces the whole book every
//! message. Both funnel through [`merge_levels`], which owns the invariants
//! the rest of the core relies on: sorted (bids descending, asks
//! ascending), duplicate-free by price, no level with quantity <= 0, and at
//! most [`MAX_BOOK_DEPTH`] levels per side.

use std::collections::HashMap;

use crate::models::OrderBookLevel;

/// Depth kept per side after a merge. Top 20 levels are plenty for
/// depth-weighted fills at the trade sizes this system runs.
pub const MAX_BOOK_DEPTH: usize = 20;

/// A "delta" batch larger than this is really a snapshot. The delta venue
/// ships a periodic full refresh inside its diff stream without marking it.
pub const DELTA_SNAPSHOT_THRESHOLD: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergePolicy {
    /// Every incoming message replaces the stored side.
    Snapshot,
    /// Incoming levels are sparse diffs keyed by price; quantity 0 deletes.
    Delta,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookSide {
    Bid,
    Ask,
}

/// Merge one side of a book. `existing` is the stored state, `incoming`
/// the just-parsed levels; returns the new stored state.
pub fn merge_levels(
    existing: &[OrderBookLevel],
    incoming: &[OrderBookLevel],
    side: BookSide,
    policy: MergePolicy,
) -> Vec<OrderBookLevel> {
    let effective = match policy {
        MergePolicy::Snapshot => MergePolicy::Snapshot,
        // Heuristic override: an oversized diff is a full refresh.
        MergePolicy::Delta if incoming.len() > DELTA_SNAPSHOT_THRESHOLD => MergePolicy::Snapshot,
        MergePolicy::Delta => MergePolicy::Delta,
    };

    // Key by price bits: exact float identity, same as the upstream feeds
    // which key diffs by the decimal price string.
    let mut by_price: HashMap<u64, OrderBookLevel> = HashMap::new();

    if effective == MergePolicy::Delta {
        for level in existing {
            by_price.insert(level.price.to_bits(), *level);
        }
    }

    for level in incoming {
        if level.quantity > 0.0 {
            by_price.insert(level.price.to_bits(), *level);
        } else {
            by_price.remove(&level.price.to_bits());
        }
    }

    let mut merged: Vec<OrderBookLevel> = by_price.into_values().collect();
    match side {
        BookSide::Bid => merged.sort_by(|a, b| {
            b.price
                .partial_cmp(&a.price)
                .unwrap_or(std::cmp::Ordering::Equal)
        }),
        BookSide::Ask => merged.sort_by(|a, b| {
            a.price
                .partial_cmp(&b.price)
                .unwrap_or(std::cmp::Ordering::Equal)
        }),
    }
    merged.truncate(MAX_BOOK_DEPTH);
    merged
}

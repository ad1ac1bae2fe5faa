//! MirrorBot Core
//!
//! Mirrors positions and order books between two perp venues, computes
//! depth-weighted cross-venue spreads, and drives the automated arbitrage
//! loop. The binary wires the real feeds and executors; everything
//! observable lives behind trait seams so the core tests without a single
//! socket.

pub mod activity;
pub mod arbitrage;
pub mod books;
pub mod codec;
pub mod config;
pub mod execution;
pub mod feeds;
pub mod models;
pub mod positions;

pub use arbitrage::{ArbEngine, RefreshRequester};
pub use books::MarketStore;
pub use positions::PositionBook;

//! Venue feed adapters and connection plumbing.
//!
//! Each venue is a [`VenueAdapter`]: a closed strategy object selected at
//! configuration time that knows how to parse that venue's raw frames and
//! which merge policy its order-book messages carry. The trading core only
//! ever sees normalized messages; raw sockets live in
//! [`connection::ConnectionRegistry`], which the core reaches through the
//! `RefreshRequester` seam alone.

pub mod account;
pub mod backpack;
pub mod connection;
pub mod edgex;

use crate::books::merge::MergePolicy;
use crate::models::{NormalizedMessage, Position, RawFrame, VenueId, VenueInfo};

pub use backpack::BackpackAdapter;
pub use connection::ConnectionRegistry;
pub use edgex::EdgexAdapter;

/// Venue strategy: parsing + merge policy + websocket wiring hints.
pub trait VenueAdapter: Send + Sync {
    fn venue(&self) -> VenueId;

    /// Display identity carried through `PriceDiff`.
    fn info(&self) -> VenueInfo;

    /// How this venue's order-book messages relate to stored state.
    fn merge_policy(&self) -> MergePolicy;

    /// Translate one raw frame into a normalized message. `None` means
    /// control frame or unrecognized shape; both are dropped silently.
    fn parse(&self, raw: &RawFrame) -> Option<NormalizedMessage>;

    /// WebSocket endpoint for the market-data channel.
    fn ws_url(&self) -> String;

    /// Text frames to send after connecting to subscribe `symbols`.
    fn subscribe_frames(&self, symbols: &[String]) -> Vec<String>;

    /// Application-level keepalive frame, if the venue wants one.
    fn ping_frame(&self) -> Option<String> {
        None
    }
}

/// Where parsed feed traffic goes. The trading engine implements this.
pub trait FeedSink: Send + Sync {
    fn on_frame(&self, venue: VenueId, frame: RawFrame);
}

/// Where position pushes go. The trading engine implements this.
pub trait PositionSink: Send + Sync {
    fn on_positions(&self, venue: VenueId, positions: Vec<Position>, is_full_update: bool);
}

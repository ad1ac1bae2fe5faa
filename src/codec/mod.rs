//! Wire codecs for venue feeds.

pub mod msgpack;

pub use msgpack::{decode, Value};

//! Flowlines Data -- map descriptions, settings files and the game feed.
//!
//! - [`loader`] reads settings and maps from RON, TOML or JSON files.
//! - [`schema`] defines the map description shared by files and the feed.
//! - [`generator`] produces grid maps.
//! - [`feed`] encodes and applies the JSON messages exchanged with the server.

pub mod feed;
pub mod generator;
pub mod loader;
pub mod schema;

pub use feed::{ClientCommand, FeedClient, FeedError, ServerMessage};
pub use loader::{load_map, load_settings, DataLoadError};
pub use schema::MapDescription;

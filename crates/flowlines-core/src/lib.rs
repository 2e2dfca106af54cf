//! Flowlines Core -- routing ratios and animated flows for a node map.
//!
//! A map is a set of production nodes joined by directed connections. Each
//! node splits its output between its outgoing connections according to a
//! set of ratios the player edits, and each connection carries waves of
//! coloured sub-flows whose schedule comes from an authoritative server.
//! This crate keeps that state consistent and turns it into drawable
//! geometry; it never draws anything itself.
//!
//! # Key Types
//!
//! - [`disposition::RatioSet`] -- Per-node ratios held at a constant sum
//!   while single entries are edited.
//! - [`timeline::FlowTimeline`] -- Wave history for one connection, with
//!   the retirement of superseded waves.
//! - [`scheduler::AnimationScheduler`] -- Frame callbacks removed once they
//!   report completion.
//! - [`network::FlowMap`] -- Owns all of the above and routes updates into
//!   a [`sink::PresentationSink`].
//! - [`units::NodeUnits`] -- Per-player unit counts laid out as a pie.
//! - [`geometry::Vec2`] -- 2D vector math.
//!
//! # Driving a map
//!
//! ```rust,ignore
//! let mut map = builder.build(my_sink)?;
//! map.apply_ratio_edit(node, connection, 12.0)?;   // player drag
//! map.inject_movements(connection, t0, &subflows)?; // server schedule
//! loop {
//!     map.tick(clock.now());                      // once per frame
//! }
//! ```

pub mod disposition;
pub mod error;
pub mod geometry;
pub mod id;
pub mod network;
pub mod scheduler;
pub mod settings;
pub mod sink;
pub mod timeline;
pub mod units;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

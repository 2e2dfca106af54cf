//! Serde structs for the map description the server sends.
//!
//! The same shape is used on the wire (inside a `map` feed message) and in
//! map files:
//!
//! ```json
//! { "node1": { "x": 10, "y": 20, "production": 10,
//!              "connections": { "node2": { "throughput": 1, "travel_time": 10000 } } } }
//! ```
//!
//! Keys are kept in sorted maps, so a node's outgoing connections (and with
//! them its dispositions) are always ordered by target id.

use std::collections::BTreeMap;

use flowlines_core::geometry::Vec2;
use flowlines_core::network::{FlowMap, FlowMapBuilder, MapError};
use flowlines_core::settings::Settings;
use flowlines_core::sink::PresentationSink;
use serde::{Deserialize, Serialize};

// ===========================================================================
// Description structs
// ===========================================================================

/// A whole map keyed by node id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MapDescription {
    pub nodes: BTreeMap<String, NodeDescription>,
}

/// A node and its outgoing connections keyed by target node id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDescription {
    pub x: f64,
    pub y: f64,
    pub production: f64,
    #[serde(default)]
    pub connections: BTreeMap<String, ConnectionDescription>,
}

/// One outgoing connection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConnectionDescription {
    pub throughput: f64,
    pub travel_time: f64,
}

// ===========================================================================
// Resolution
// ===========================================================================

impl MapDescription {
    /// Number of connections across all nodes.
    pub fn connection_count(&self) -> usize {
        self.nodes.values().map(|n| n.connections.len()).sum()
    }

    /// Resolve node names into a builder. Every node is added before any
    /// connection, so targets may appear in any order.
    pub fn to_builder(&self, settings: Settings) -> Result<FlowMapBuilder, MapError> {
        let mut builder = FlowMapBuilder::new(settings)?;
        for (name, node) in &self.nodes {
            builder.add_node(name.as_str(), Vec2::new(node.x, node.y), node.production)?;
        }
        for (name, node) in &self.nodes {
            let from = builder
                .node_id(name)
                .ok_or_else(|| MapError::UnknownNodeName(name.clone()))?;
            for (target, link) in &node.connections {
                let to = builder
                    .node_id(target)
                    .ok_or_else(|| MapError::UnknownNodeName(target.clone()))?;
                builder.add_connection(from, to, link.throughput, link.travel_time)?;
            }
        }
        Ok(builder)
    }

    /// Build a live map drawing into `sink`.
    pub fn build<S: PresentationSink + 'static>(
        &self,
        settings: Settings,
        sink: S,
    ) -> Result<FlowMap<S>, MapError> {
        self.to_builder(settings)?.build(sink)
    }
}

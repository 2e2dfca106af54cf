//! Shared test helpers for unit tests, integration tests, and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]`.

use std::collections::HashMap;

use crate::geometry::Vec2;
use crate::id::{ConnectionId, NodeId, SegmentId};
use crate::network::{FlowMap, FlowMapBuilder};
use crate::settings::Settings;
use crate::sink::PresentationSink;
use crate::timeline::{Segment, SubFlow};
use crate::units::NodeUnits;

// ===========================================================================
// Recording sink
// ===========================================================================

/// One call received by a [`RecordingSink`].
#[derive(Debug, Clone, PartialEq)]
pub enum SinkEvent {
    SegmentCreated {
        connection: ConnectionId,
        id: SegmentId,
        segment: Segment,
    },
    SegmentMoved {
        connection: ConnectionId,
        id: SegmentId,
        segment: Segment,
    },
    SegmentDestroyed {
        connection: ConnectionId,
        id: SegmentId,
    },
    DispositionMoved {
        node: NodeId,
        connection: ConnectionId,
        value: f64,
        head: Vec2,
    },
    UnitsChanged {
        node: NodeId,
        units: NodeUnits,
    },
}

/// Keeps every call in order plus the state a renderer would hold.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub events: Vec<SinkEvent>,
    /// Segments created and not yet destroyed, with their latest geometry.
    pub live: HashMap<(ConnectionId, SegmentId), Segment>,
    /// Latest `(value, head)` per disposition handle.
    pub heads: HashMap<(NodeId, ConnectionId), (f64, Vec2)>,
    /// Latest unit pie per node.
    pub units: HashMap<NodeId, NodeUnits>,
}

impl RecordingSink {
    pub fn last_disposition(&self, node: NodeId, connection: ConnectionId) -> Option<(f64, Vec2)> {
        self.heads.get(&(node, connection)).copied()
    }

    pub fn live_segment(&self, connection: ConnectionId, id: SegmentId) -> Option<&Segment> {
        self.live.get(&(connection, id))
    }

    pub fn created_count(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, SinkEvent::SegmentCreated { .. }))
            .count()
    }

    pub fn destroyed_count(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, SinkEvent::SegmentDestroyed { .. }))
            .count()
    }
}

impl PresentationSink for RecordingSink {
    fn segment_created(&mut self, connection: ConnectionId, id: SegmentId, segment: &Segment) {
        self.live.insert((connection, id), segment.clone());
        self.events.push(SinkEvent::SegmentCreated {
            connection,
            id,
            segment: segment.clone(),
        });
    }

    fn segment_moved(&mut self, connection: ConnectionId, id: SegmentId, segment: &Segment) {
        self.live.insert((connection, id), segment.clone());
        self.events.push(SinkEvent::SegmentMoved {
            connection,
            id,
            segment: segment.clone(),
        });
    }

    fn segment_destroyed(&mut self, connection: ConnectionId, id: SegmentId) {
        self.live.remove(&(connection, id));
        self.events
            .push(SinkEvent::SegmentDestroyed { connection, id });
    }

    fn disposition_moved(&mut self, node: NodeId, connection: ConnectionId, value: f64, head: Vec2) {
        self.heads.insert((node, connection), (value, head));
        self.events.push(SinkEvent::DispositionMoved {
            node,
            connection,
            value,
            head,
        });
    }

    fn units_changed(&mut self, node: NodeId, units: &NodeUnits) {
        self.units.insert(node, units.clone());
        self.events.push(SinkEvent::UnitsChanged {
            node,
            units: units.clone(),
        });
    }
}

// ===========================================================================
// Sub-flows
// ===========================================================================

pub fn subflow(width: f64, identity: &str) -> SubFlow {
    SubFlow::new(width, identity).unwrap()
}

pub fn pink(width: f64) -> SubFlow {
    subflow(width, "pink")
}

pub fn blue(width: f64) -> SubFlow {
    subflow(width, "blue")
}

// ===========================================================================
// Maps
// ===========================================================================

/// Two nodes ten units apart on the x axis with one connection `a` → `b`.
pub fn two_node_map(travel_time: f64) -> (FlowMap<RecordingSink>, ConnectionId) {
    let mut builder = FlowMapBuilder::new(Settings::default()).unwrap();
    let a = builder.add_node("a", Vec2::new(0.0, 0.0), 1.0).unwrap();
    let b = builder.add_node("b", Vec2::new(10.0, 0.0), 1.0).unwrap();
    let link = builder.add_connection(a, b, 0.3, travel_time).unwrap();
    (builder.build(RecordingSink::default()).unwrap(), link)
}

/// Three nodes: `node0` feeds the hub `node1`, which sends back to `node0`
/// and on to the sink-only `node2`. Every connection takes 10 000 time units.
pub fn triangle_map() -> FlowMap<RecordingSink> {
    let mut builder = FlowMapBuilder::new(Settings::default()).unwrap();
    let node0 = builder.add_node("node0", Vec2::new(0.0, 0.0), 1.0).unwrap();
    let node1 = builder.add_node("node1", Vec2::new(10.0, 20.0), 10.0).unwrap();
    let node2 = builder.add_node("node2", Vec2::new(5.0, 0.0), 2.0).unwrap();
    builder.add_connection(node0, node1, 0.3, 10_000.0).unwrap();
    builder.add_connection(node1, node0, 0.3, 10_000.0).unwrap();
    builder.add_connection(node1, node2, 1.0, 10_000.0).unwrap();
    builder.build(RecordingSink::default()).unwrap()
}

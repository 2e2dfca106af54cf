//! The flow map: nodes, connections, their routing ratios and in-flight waves.
//!
//! A [`FlowMap`] is assembled once from a map description through
//! [`FlowMapBuilder`] and then driven by two kinds of input:
//!
//! - **Ratio edits** ([`FlowMap::apply_ratio_edit`]) coming from the player
//!   dragging a disposition head.
//! - **Movement schedules** ([`FlowMap::inject_movements`]) coming from the
//!   authoritative server.
//!
//! Unit counts reported per node ([`FlowMap::update_units`]) are laid out
//! as pies and pushed to the sink as well.
//!
//! Both are validated before any state changes. Visual consequences are
//! pushed synchronously into the map's [`PresentationSink`]; wave motion is
//! advanced by [`FlowMap::tick`], which the host calls once per frame.
//!
//! ```
//! use flowlines_core::geometry::Vec2;
//! use flowlines_core::network::FlowMapBuilder;
//! use flowlines_core::settings::Settings;
//! use flowlines_core::timeline::SubFlow;
//!
//! let mut builder = FlowMapBuilder::new(Settings::default()).unwrap();
//! let a = builder.add_node("a", Vec2::new(0.0, 0.0), 1.0).unwrap();
//! let b = builder.add_node("b", Vec2::new(10.0, 0.0), 1.0).unwrap();
//! let link = builder.add_connection(a, b, 0.3, 1_000.0).unwrap();
//! let mut map = builder.build(()).unwrap();
//!
//! map.inject_movements(link, 0.0, &[SubFlow::new(0.1, "pink").unwrap()]).unwrap();
//! map.tick(500.0);
//! assert_eq!(map.active_animations(), 1);
//! map.tick(1_000.0);
//! assert_eq!(map.active_animations(), 0);
//! ```

use std::collections::HashMap;

use slotmap::{SecondaryMap, SlotMap};
use tracing::{debug, instrument};

use crate::disposition::{DispositionError, RatioSet};
use crate::error::ErrorKind;
use crate::geometry::{production_radius, rad_to_deg, Vec2};
use crate::id::{ConnectionId, FlowIdentity, NodeId, SegmentId, Time, WaveId};
use crate::scheduler::{AnimationScheduler, TickReport};
use crate::settings::{Settings, SettingsError};
use crate::sink::{ConnectionSink, PresentationSink};
use crate::timeline::{FlowTimeline, Segment, SubFlow, TimelineError};
use crate::units::{NodeUnits, UnitsError};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from building or driving a [`FlowMap`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MapError {
    #[error("unknown node {0:?}")]
    UnknownNode(NodeId),
    #[error("unknown node '{0}'")]
    UnknownNodeName(String),
    #[error("unknown connection {0:?}")]
    UnknownConnection(ConnectionId),
    #[error("connection {connection:?} does not leave node {node:?}")]
    NotOutgoing {
        node: NodeId,
        connection: ConnectionId,
    },
    #[error("duplicate node '{0}'")]
    DuplicateNode(String),
    #[error("connection from {from:?} to {to:?} already exists")]
    DuplicateConnection { from: NodeId, to: NodeId },
    #[error("node '{0}' cannot connect to itself")]
    SelfLoop(String),
    #[error("production must be non-negative and finite, got {0}")]
    InvalidProduction(f64),
    #[error("node position must be finite")]
    InvalidPosition,
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Disposition(#[from] DispositionError),
    #[error(transparent)]
    Timeline(#[from] TimelineError),
    #[error(transparent)]
    Units(#[from] UnitsError),
}

impl MapError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MapError::UnknownNode(_)
            | MapError::UnknownNodeName(_)
            | MapError::UnknownConnection(_)
            | MapError::NotOutgoing { .. } => ErrorKind::NotFound,
            MapError::DuplicateNode(_)
            | MapError::DuplicateConnection { .. }
            | MapError::SelfLoop(_)
            | MapError::InvalidProduction(_)
            | MapError::InvalidPosition => ErrorKind::InvalidArgument,
            MapError::Settings(e) => e.kind(),
            MapError::Disposition(e) => e.kind(),
            MapError::Timeline(e) => e.kind(),
            MapError::Units(e) => e.kind(),
        }
    }
}

// ---------------------------------------------------------------------------
// Nodes and connections
// ---------------------------------------------------------------------------

/// A production node.
#[derive(Debug, Clone)]
pub struct Node {
    name: String,
    position: Vec2,
    production: f64,
    radius: f64,
    /// One ratio per outgoing connection; `None` for sink-only nodes.
    dispositions: Option<RatioSet<ConnectionId>>,
    units: NodeUnits,
}

impl Node {
    /// External (feed) identifier.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn production(&self) -> f64 {
        self.production
    }

    /// Display radius: the disc's area equals the production.
    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub fn dispositions(&self) -> Option<&RatioSet<ConnectionId>> {
        self.dispositions.as_ref()
    }

    /// Latest unit pie; empty until the first report.
    pub fn units(&self) -> &NodeUnits {
        &self.units
    }

    /// Outgoing connections in map order.
    pub fn outgoing(&self) -> impl Iterator<Item = ConnectionId> + '_ {
        self.dispositions.iter().flat_map(|d| d.keys())
    }
}

/// A directed link between two nodes.
#[derive(Debug, Clone)]
pub struct Connection {
    from: NodeId,
    to: NodeId,
    throughput: f64,
    timeline: FlowTimeline,
}

impl Connection {
    pub fn from(&self) -> NodeId {
        self.from
    }

    pub fn to(&self) -> NodeId {
        self.to
    }

    pub fn throughput(&self) -> f64 {
        self.throughput
    }

    pub fn travel_time(&self) -> f64 {
        self.timeline.travel_time()
    }

    pub fn timeline(&self) -> &FlowTimeline {
        &self.timeline
    }

    /// Where the disposition handle for a ratio `value` sits: `value` map
    /// units along the connection from the start of its terrain band.
    pub fn disposition_head(&self, value: f64) -> Vec2 {
        let (anchor, _) = self.timeline.terrain_line();
        anchor + self.timeline.direction() * value
    }
}

/// Drawable pose of a disposition handle: a triangle pointing along its
/// connection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DispositionHandle {
    pub position: Vec2,
    /// Rotation in degrees that turns an upright triangle to point along
    /// the connection.
    pub rotation: f64,
    /// Circumradius of the triangle.
    pub size: f64,
}

/// Draggable ring around a node for its stock target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetRing {
    pub center: Vec2,
    pub inner_radius: f64,
    pub outer_radius: f64,
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Collects nodes and connections, then freezes them into a [`FlowMap`].
#[derive(Debug)]
pub struct FlowMapBuilder {
    settings: Settings,
    nodes: SlotMap<NodeId, Node>,
    names: HashMap<String, NodeId>,
    connections: SlotMap<ConnectionId, Connection>,
    outgoing: SecondaryMap<NodeId, Vec<ConnectionId>>,
}

impl FlowMapBuilder {
    pub fn new(settings: Settings) -> Result<Self, MapError> {
        settings.validate()?;
        Ok(Self {
            settings,
            nodes: SlotMap::with_key(),
            names: HashMap::new(),
            connections: SlotMap::with_key(),
            outgoing: SecondaryMap::new(),
        })
    }

    pub fn add_node(
        &mut self,
        name: impl Into<String>,
        position: Vec2,
        production: f64,
    ) -> Result<NodeId, MapError> {
        let name = name.into();
        if self.names.contains_key(&name) {
            return Err(MapError::DuplicateNode(name));
        }
        if !position.is_finite() {
            return Err(MapError::InvalidPosition);
        }
        if !(production.is_finite() && production >= 0.0) {
            return Err(MapError::InvalidProduction(production));
        }
        let id = self.nodes.insert(Node {
            name: name.clone(),
            position,
            production,
            radius: production_radius(production, self.settings.unit_scale),
            dispositions: None,
            units: NodeUnits::default(),
        });
        self.names.insert(name, id);
        self.outgoing.insert(id, Vec::new());
        Ok(id)
    }

    pub fn add_connection(
        &mut self,
        from: NodeId,
        to: NodeId,
        throughput: f64,
        travel_time: f64,
    ) -> Result<ConnectionId, MapError> {
        let origin = self.nodes.get(from).ok_or(MapError::UnknownNode(from))?;
        let target = self.nodes.get(to).ok_or(MapError::UnknownNode(to))?;
        if from == to {
            return Err(MapError::SelfLoop(origin.name.clone()));
        }
        let exists = self.outgoing[from]
            .iter()
            .any(|c| self.connections[*c].to == to);
        if exists {
            return Err(MapError::DuplicateConnection { from, to });
        }

        let timeline = FlowTimeline::new(
            origin.position,
            target.position,
            self.settings.connection_width(throughput),
            travel_time,
            self.settings.connection_spacing,
        )?;
        let id = self.connections.insert(Connection {
            from,
            to,
            throughput,
            timeline,
        });
        self.outgoing[from].push(id);
        Ok(id)
    }

    pub fn node_id(&self, name: &str) -> Option<NodeId> {
        self.names.get(name).copied()
    }

    /// Create every node's ratio set, report the initial disposition heads
    /// to `sink`, and hand back the finished map.
    pub fn build<S: PresentationSink + 'static>(self, mut sink: S) -> Result<FlowMap<S>, MapError> {
        let FlowMapBuilder {
            settings,
            mut nodes,
            names,
            connections,
            outgoing,
        } = self;

        for (node_id, node) in nodes.iter_mut() {
            let links = &outgoing[node_id];
            if links.is_empty() {
                continue;
            }
            let ratios = RatioSet::new(links.iter().copied(), settings.dispositions_sum)?
                .with_tolerance(settings.sum_tolerance);
            for (connection, value) in ratios.iter() {
                let head = connections[connection].disposition_head(value);
                sink.disposition_moved(node_id, connection, value, head);
            }
            node.dispositions = Some(ratios);
        }

        debug!(
            nodes = nodes.len(),
            connections = connections.len(),
            "flow map built"
        );
        Ok(FlowMap {
            settings,
            nodes,
            names,
            stage: Stage { connections, sink },
            scheduler: AnimationScheduler::new(),
        })
    }
}

// ---------------------------------------------------------------------------
// FlowMap
// ---------------------------------------------------------------------------

/// State the animation callbacks work on.
#[derive(Debug)]
struct Stage<S> {
    connections: SlotMap<ConnectionId, Connection>,
    sink: S,
}

impl<S: PresentationSink> Stage<S> {
    fn advance(&mut self, connection: ConnectionId, wave: WaveId, now: Time) -> bool {
        let Some(link) = self.connections.get_mut(connection) else {
            return false;
        };
        let mut sink = ConnectionSink {
            connection,
            sink: &mut self.sink,
        };
        link.timeline.advance_wave(wave, now, &mut sink)
    }
}

/// A loaded map with live routing ratios and animated flows.
#[derive(Debug)]
pub struct FlowMap<S: PresentationSink + 'static = ()> {
    settings: Settings,
    nodes: SlotMap<NodeId, Node>,
    names: HashMap<String, NodeId>,
    stage: Stage<S>,
    scheduler: AnimationScheduler<Stage<S>>,
}

impl<S: PresentationSink + 'static> FlowMap<S> {
    /// Set the ratio `node` sends along `connection`; the node's other
    /// ratios give way proportionally. Returns the value actually stored
    /// (after clamping to the dispositions sum).
    pub fn apply_ratio_edit(
        &mut self,
        node: NodeId,
        connection: ConnectionId,
        value: f64,
    ) -> Result<f64, MapError> {
        if !self.stage.connections.contains_key(connection) {
            return Err(MapError::UnknownConnection(connection));
        }
        let ratios = self
            .nodes
            .get_mut(node)
            .ok_or(MapError::UnknownNode(node))?
            .dispositions
            .as_mut()
            .filter(|r| r.contains(connection))
            .ok_or(MapError::NotOutgoing { node, connection })?;

        let Stage { connections, sink } = &mut self.stage;
        let stored = ratios.set_one(connection, value, |link, v| {
            if let Some(c) = connections.get(link) {
                sink.disposition_moved(node, link, v, c.disposition_head(v));
            }
        })?;
        Ok(stored)
    }

    /// Start animating a new wave of sub-flows on `connection`, departing
    /// at `start`. The previous wave on that connection starts draining.
    pub fn inject_movements(
        &mut self,
        connection: ConnectionId,
        start: Time,
        subflows: &[SubFlow],
    ) -> Result<WaveId, MapError> {
        let link = self
            .stage
            .connections
            .get_mut(connection)
            .ok_or(MapError::UnknownConnection(connection))?;
        let mut sink = ConnectionSink {
            connection,
            sink: &mut self.stage.sink,
        };
        let wave = link.timeline.inject_wave(start, subflows, &mut sink)?;
        self.scheduler
            .register(move |stage: &mut Stage<S>, now| stage.advance(connection, wave, now));
        Ok(wave)
    }

    /// Replace the unit counts held on `node` and push the new pie to the
    /// sink. Counts are keyed by player and laid out in iteration order.
    pub fn update_units<I, O>(&mut self, node: NodeId, counts: I) -> Result<&NodeUnits, MapError>
    where
        I: IntoIterator<Item = (O, f64)>,
        O: Into<FlowIdentity>,
    {
        let state = self.nodes.get_mut(node).ok_or(MapError::UnknownNode(node))?;
        let units = NodeUnits::layout(state.position, counts, self.settings.unit_scale)?;
        debug!(
            node = %state.name,
            total = units.total(),
            owners = units.arcs().len(),
            "units updated"
        );
        self.stage.sink.units_changed(node, &units);
        state.units = units;
        Ok(&state.units)
    }

    /// Advance every in-flight wave to `now`.
    #[instrument(level = "trace", skip_all, name = "flow_map_tick")]
    pub fn tick(&mut self, now: Time) -> TickReport {
        self.scheduler.tick(&mut self.stage, now)
    }

    // -----------------------------------------------------------------------
    // Lookups
    // -----------------------------------------------------------------------

    pub fn node_id(&self, name: &str) -> Option<NodeId> {
        self.names.get(name).copied()
    }

    pub fn resolve_node(&self, name: &str) -> Result<NodeId, MapError> {
        self.node_id(name)
            .ok_or_else(|| MapError::UnknownNodeName(name.to_owned()))
    }

    /// The connection running `from` → `to`, if any.
    pub fn connection_between(&self, from: NodeId, to: NodeId) -> Option<ConnectionId> {
        self.nodes
            .get(from)?
            .outgoing()
            .find(|c| self.stage.connections[*c].to == to)
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter()
    }

    pub fn connection(&self, id: ConnectionId) -> Option<&Connection> {
        self.stage.connections.get(id)
    }

    pub fn connections(&self) -> impl Iterator<Item = (ConnectionId, &Connection)> {
        self.stage.connections.iter()
    }

    // -----------------------------------------------------------------------
    // Read accessors for drawing
    // -----------------------------------------------------------------------

    pub fn ratios(&self, node: NodeId) -> Option<&RatioSet<ConnectionId>> {
        self.nodes.get(node)?.dispositions.as_ref()
    }

    /// Current position of the disposition handle for `connection` on `node`.
    pub fn disposition_head(&self, node: NodeId, connection: ConnectionId) -> Option<Vec2> {
        let value = self.ratios(node)?.get(connection)?;
        Some(self.connection(connection)?.disposition_head(value))
    }

    /// Pose of the draggable triangle for `connection` on `node`.
    pub fn disposition_handle(
        &self,
        node: NodeId,
        connection: ConnectionId,
    ) -> Option<DispositionHandle> {
        let position = self.disposition_head(node, connection)?;
        let direction = self.connection(connection)?.timeline.direction();
        Some(DispositionHandle {
            position,
            rotation: rad_to_deg(direction.angle()) - 30.0,
            size: self.settings.controls_size,
        })
    }

    /// The stock-target ring hugging `node`'s production disc.
    pub fn target_ring(&self, node: NodeId) -> Option<TargetRing> {
        let node = self.nodes.get(node)?;
        Some(TargetRing {
            center: node.position,
            inner_radius: node.radius,
            outer_radius: node.radius + self.settings.controls_size,
        })
    }

    pub fn units(&self, node: NodeId) -> Option<&NodeUnits> {
        Some(&self.nodes.get(node)?.units)
    }

    /// Live segments on one connection.
    pub fn segments(&self, connection: ConnectionId) -> Vec<(SegmentId, &Segment)> {
        self.connection(connection)
            .map(|c| c.timeline.segments().collect())
            .unwrap_or_default()
    }

    /// Live segments across the whole map.
    pub fn segment_count(&self) -> usize {
        self.stage
            .connections
            .values()
            .map(|c| c.timeline.segment_count())
            .sum()
    }

    /// Number of running wave animations.
    pub fn active_animations(&self) -> usize {
        self.scheduler.len()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn sink(&self) -> &S {
        &self.stage.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.stage.sink
    }

    pub fn into_sink(self) -> S {
        self.stage.sink
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

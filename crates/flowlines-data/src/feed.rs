//! The game-state feed: JSON messages exchanged with the server.
//!
//! Every message is an envelope `{"type": ..., "data": ...}`. The server
//! sends the map, movement schedules, per-node unit counts, player records
//! and error strings; the client asks for the map and for unknown players,
//! and reports disposition changes.
//!
//! [`FeedClient`] sits between the socket and a [`FlowMap`]: it decodes
//! server messages, applies them and turns local ratio edits into commands.

use std::collections::BTreeMap;
use std::fmt;

use flowlines_core::error::ErrorKind;
use flowlines_core::id::{ConnectionId, NodeId, Time, WaveId};
use flowlines_core::network::{FlowMap, MapError};
use flowlines_core::scheduler::TickReport;
use flowlines_core::settings::Settings;
use flowlines_core::sink::PresentationSink;
use flowlines_core::timeline::SubFlow;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::schema::MapDescription;

// ===========================================================================
// Errors
// ===========================================================================

#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("malformed message: {0}")]
    Decode(String),
    #[error("could not encode message: {0}")]
    Encode(String),
    #[error("no map has been loaded yet")]
    NoMap,
    #[error("no connection from '{from}' to '{to}'")]
    UnknownConnection { from: String, to: String },
    #[error(transparent)]
    Map(#[from] MapError),
}

impl FeedError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FeedError::Decode(_) | FeedError::Encode(_) => ErrorKind::InvalidArgument,
            FeedError::NoMap | FeedError::UnknownConnection { .. } => ErrorKind::NotFound,
            FeedError::Map(e) => e.kind(),
        }
    }
}

// ===========================================================================
// Server -> client
// ===========================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServerMessage {
    Map(MapDescription),
    Movements(MovementData),
    Units(UnitsData),
    /// Player records keyed by player id.
    Player(BTreeMap<String, PlayerInfo>),
    Error(String),
}

/// A new wave on the connection `from` → `to`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovementData {
    pub from: String,
    pub to: String,
    pub start_time: Time,
    pub movements: Vec<Movement>,
}

/// One sub-flow of a wave.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movement {
    pub width: f64,
    pub color: String,
}

/// Unit counts, tagged by what they are attached to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UnitsData {
    /// Units held on node `id`, keyed by player id.
    Node {
        id: String,
        units: BTreeMap<String, f64>,
    },
}

/// What the client knows about a player. Only `color` is read; anything
/// else the server sends is kept as-is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

// ===========================================================================
// Client -> server
// ===========================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ClientCommand {
    Map(MapRequest),
    Player(PlayerRequest),
    Disposition(DispositionCommand),
}

/// Asks the server for the map. Carries no fields (`"data": {}`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MapRequest {}

/// Asks the server for the records of players the client has not seen.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerRequest {
    pub player_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispositionCommand {
    pub node_id: String,
    pub disposition: DispositionData,
}

/// `target` is the stock level the node aims to hold; `ratios` maps each
/// target node id to its share of the surplus and sums to 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispositionData {
    pub target: f64,
    pub ratios: BTreeMap<String, f64>,
}

impl ClientCommand {
    pub fn to_json(&self) -> Result<String, FeedError> {
        serde_json::to_string(self).map_err(|e| FeedError::Encode(e.to_string()))
    }
}

impl ServerMessage {
    pub fn from_json(text: &str) -> Result<Self, FeedError> {
        serde_json::from_str(text).map_err(|e| FeedError::Decode(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String, FeedError> {
        serde_json::to_string(self).map_err(|e| FeedError::Encode(e.to_string()))
    }
}

// ===========================================================================
// FeedClient
// ===========================================================================

/// What applying a server message did.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    MapLoaded { nodes: usize, connections: usize },
    WaveInjected { connection: ConnectionId, wave: WaveId },
    UnitsUpdated { node: NodeId, total: f64 },
    PlayersUpdated { players: usize },
    ServerError(String),
}

/// Builds a fresh sink whenever a map is (re)loaded.
pub type SinkFactory<S> = Box<dyn FnMut() -> S>;

/// Applies server messages to a [`FlowMap`] and produces client commands.
pub struct FeedClient<S: PresentationSink + 'static> {
    settings: Settings,
    make_sink: SinkFactory<S>,
    map: Option<FlowMap<S>>,
    players: BTreeMap<String, PlayerInfo>,
}

impl<S: PresentationSink + 'static> fmt::Debug for FeedClient<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeedClient")
            .field("settings", &self.settings)
            .field("loaded", &self.map.is_some())
            .field("players", &self.players.len())
            .finish_non_exhaustive()
    }
}

impl<S: PresentationSink + Default + 'static> FeedClient<S> {
    pub fn with_default_sink(settings: Settings) -> Self {
        Self::new(settings, S::default)
    }
}

impl<S: PresentationSink + 'static> FeedClient<S> {
    pub fn new(settings: Settings, make_sink: impl FnMut() -> S + 'static) -> Self {
        Self {
            settings,
            make_sink: Box::new(make_sink),
            map: None,
            players: BTreeMap::new(),
        }
    }

    /// The command sent right after connecting.
    pub fn request_map(&self) -> ClientCommand {
        ClientCommand::Map(MapRequest::default())
    }

    /// Decode and apply one text frame.
    pub fn handle_json(&mut self, text: &str) -> Result<FeedEvent, FeedError> {
        let message = ServerMessage::from_json(text).inspect_err(|e| {
            warn!(error = %e, "rejected feed message");
        })?;
        self.handle(message)
    }

    /// Apply a decoded server message. A rejected message changes nothing.
    pub fn handle(&mut self, message: ServerMessage) -> Result<FeedEvent, FeedError> {
        match message {
            ServerMessage::Map(description) => self.load_map(&description),
            ServerMessage::Movements(data) => self.apply_movements(&data).inspect_err(|e| {
                warn!(from = %data.from, to = %data.to, error = %e, "rejected movements");
            }),
            ServerMessage::Units(data) => self.apply_units(&data).inspect_err(|e| {
                warn!(error = %e, "rejected units");
            }),
            ServerMessage::Player(records) => {
                let players = records.len();
                self.players.extend(records);
                debug!(players, known = self.players.len(), "player records received");
                Ok(FeedEvent::PlayersUpdated { players })
            }
            ServerMessage::Error(text) => {
                warn!(message = %text, "server reported an error");
                Ok(FeedEvent::ServerError(text))
            }
        }
    }

    fn load_map(&mut self, description: &MapDescription) -> Result<FeedEvent, FeedError> {
        let sink = (self.make_sink)();
        let map = description
            .build(self.settings.clone(), sink)
            .inspect_err(|e| warn!(error = %e, "rejected map"))?;
        let event = FeedEvent::MapLoaded {
            nodes: description.nodes.len(),
            connections: description.connection_count(),
        };
        if self.map.replace(map).is_some() {
            debug!("map replaced");
        }
        Ok(event)
    }

    fn apply_movements(&mut self, data: &MovementData) -> Result<FeedEvent, FeedError> {
        let map = self.map.as_mut().ok_or(FeedError::NoMap)?;
        let connection = resolve_connection(map, &data.from, &data.to)?;
        let subflows = data
            .movements
            .iter()
            .map(|m| SubFlow::new(m.width, m.color.as_str()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(MapError::from)?;
        let wave = map.inject_movements(connection, data.start_time, &subflows)?;
        Ok(FeedEvent::WaveInjected { connection, wave })
    }

    fn apply_units(&mut self, data: &UnitsData) -> Result<FeedEvent, FeedError> {
        let map = self.map.as_mut().ok_or(FeedError::NoMap)?;
        match data {
            UnitsData::Node { id, units } => {
                let node = map.resolve_node(id)?;
                let pie = map.update_units(node, units.iter().map(|(p, c)| (p.as_str(), *c)))?;
                Ok(FeedEvent::UnitsUpdated {
                    node,
                    total: pie.total(),
                })
            }
        }
    }

    /// Color for `player`, if its record has arrived.
    pub fn player_color(&self, player: &str) -> Option<&str> {
        self.players.get(player)?.color.as_deref()
    }

    pub fn player(&self, player: &str) -> Option<&PlayerInfo> {
        self.players.get(player)
    }

    /// Ask for every player owning units on the map whose record is missing.
    /// `None` when nothing is missing.
    pub fn request_missing_players(&self) -> Option<ClientCommand> {
        let map = self.map.as_ref()?;
        let mut missing: Vec<String> = map
            .nodes()
            .flat_map(|(_, node)| node.units().arcs())
            .map(|arc| arc.owner.as_str())
            .filter(|owner| !self.players.contains_key(*owner))
            .map(str::to_owned)
            .collect();
        missing.sort();
        missing.dedup();
        if missing.is_empty() {
            return None;
        }
        Some(ClientCommand::Player(PlayerRequest {
            player_ids: missing,
        }))
    }

    /// Edit a ratio locally and build the command reporting it.
    pub fn edit_ratio(
        &mut self,
        node: &str,
        target: &str,
        value: f64,
        stock_target: f64,
    ) -> Result<ClientCommand, FeedError> {
        let map = self.map.as_mut().ok_or(FeedError::NoMap)?;
        let connection = resolve_connection(map, node, target)?;
        let node_id = map.resolve_node(node)?;
        map.apply_ratio_edit(node_id, connection, value)?;
        self.disposition_command(node, stock_target)
    }

    /// Describe a node's current ratios as a `disposition` command.
    pub fn disposition_command(
        &self,
        node: &str,
        stock_target: f64,
    ) -> Result<ClientCommand, FeedError> {
        let map = self.map.as_ref().ok_or(FeedError::NoMap)?;
        let node_id = map.resolve_node(node)?;
        let mut ratios = BTreeMap::new();
        if let Some(set) = map.ratios(node_id) {
            for (connection, share) in set.shares() {
                let Some(target) = map
                    .connection(connection)
                    .and_then(|c| map.node(c.to()))
                else {
                    continue;
                };
                ratios.insert(target.name().to_owned(), share);
            }
        }
        Ok(ClientCommand::Disposition(DispositionCommand {
            node_id: node.to_owned(),
            disposition: DispositionData {
                target: stock_target,
                ratios,
            },
        }))
    }

    /// Advance the loaded map's animations, if any.
    pub fn tick(&mut self, now: Time) -> Option<TickReport> {
        self.map.as_mut().map(|m| m.tick(now))
    }

    pub fn map(&self) -> Option<&FlowMap<S>> {
        self.map.as_ref()
    }

    pub fn map_mut(&mut self) -> Option<&mut FlowMap<S>> {
        self.map.as_mut()
    }
}

fn resolve_connection<S: PresentationSink + 'static>(
    map: &FlowMap<S>,
    from: &str,
    to: &str,
) -> Result<ConnectionId, FeedError> {
    let from_id = map.resolve_node(from)?;
    let to_id = map.resolve_node(to)?;
    map.connection_between(from_id, to_id)
        .ok_or_else(|| FeedError::UnknownConnection {
            from: from.to_owned(),
            to: to.to_owned(),
        })
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use flowlines_core::test_utils::RecordingSink;

    const MAP: &str = r#"{"type": "map", "data": {
        "a": {"x": 0, "y": 0, "production": 1,
              "connections": {"b": {"throughput": 0.3, "travel_time": 1000},
                              "c": {"throughput": 0.3, "travel_time": 1000}}},
        "b": {"x": 10, "y": 0, "production": 1},
        "c": {"x": 0, "y": 10, "production": 1}
    }}"#;

    fn loaded() -> FeedClient<RecordingSink> {
        let mut client = FeedClient::with_default_sink(Settings::default());
        client.handle_json(MAP).unwrap();
        client
    }

    #[test]
    fn map_request_encodes_as_empty_object() {
        let client: FeedClient<()> = FeedClient::with_default_sink(Settings::default());
        let json = client.request_map().to_json().unwrap();
        assert_eq!(json, r#"{"type":"map","data":{}}"#);
    }

    #[test]
    fn map_message_loads() {
        let mut client: FeedClient<RecordingSink> =
            FeedClient::with_default_sink(Settings::default());
        assert!(client.map().is_none());
        let event = client.handle_json(MAP).unwrap();
        assert_eq!(
            event,
            FeedEvent::MapLoaded {
                nodes: 3,
                connections: 2
            }
        );
        assert!(client.map().is_some());
    }

    #[test]
    fn movements_start_a_wave() {
        let mut client = loaded();
        let event = client
            .handle_json(
                r#"{"type": "movements", "data": {"from": "a", "to": "b", "start_time": 0,
                    "movements": [{"width": 0.1, "color": "pink"}, {"width": 0.05, "color": "red"}]}}"#,
            )
            .unwrap();
        let FeedEvent::WaveInjected { connection, .. } = event else {
            panic!("expected a wave, got {event:?}");
        };
        let map = client.map().unwrap();
        assert_eq!(map.segments(connection).len(), 2);
        assert_eq!(map.active_animations(), 1);

        client.tick(1000.0);
        assert_eq!(client.map().unwrap().active_animations(), 0);
    }

    #[test]
    fn movements_before_map_are_rejected() {
        let mut client: FeedClient<()> = FeedClient::with_default_sink(Settings::default());
        let message = ServerMessage::Movements(MovementData {
            from: "a".into(),
            to: "b".into(),
            start_time: 0.0,
            movements: vec![],
        });
        let err = client.handle(message).unwrap_err();
        assert!(matches!(err, FeedError::NoMap));
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn bad_movements_change_nothing() {
        let mut client = loaded();
        let wrong_way = ServerMessage::Movements(MovementData {
            from: "b".into(),
            to: "a".into(),
            start_time: 0.0,
            movements: vec![],
        });
        assert!(matches!(
            client.handle(wrong_way).unwrap_err(),
            FeedError::UnknownConnection { .. }
        ));

        let negative = ServerMessage::Movements(MovementData {
            from: "a".into(),
            to: "b".into(),
            start_time: 0.0,
            movements: vec![Movement {
                width: -1.0,
                color: "pink".into(),
            }],
        });
        let err = client.handle(negative).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert_eq!(client.map().unwrap().active_animations(), 0);
        assert_eq!(client.map().unwrap().segment_count(), 0);
    }

    #[test]
    fn malformed_json_is_a_decode_error() {
        let mut client = loaded();
        let err = client.handle_json(r#"{"type": "teleport", "data": 1}"#).unwrap_err();
        assert!(matches!(err, FeedError::Decode(_)));
        let err = client.handle_json("not json").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn server_errors_are_surfaced() {
        let mut client = loaded();
        let event = client
            .handle_json(r#"{"type": "error", "data": "I only do JSONs"}"#)
            .unwrap();
        assert_eq!(event, FeedEvent::ServerError("I only do JSONs".into()));
    }

    #[test]
    fn node_units_update_the_pie() {
        let mut client = loaded();
        let event = client
            .handle_json(
                r#"{"type": "units", "data": {"type": "node", "id": "b",
                    "units": {"p1": 1, "p2": 3}}}"#,
            )
            .unwrap();
        let FeedEvent::UnitsUpdated { node, total } = event else {
            panic!("expected a units update, got {event:?}");
        };
        assert_eq!(total, 4.0);
        let map = client.map().unwrap();
        assert_eq!(map.node(node).unwrap().name(), "b");
        let arcs = map.sink().units[&node].arcs();
        assert_eq!(arcs[0].owner.as_str(), "p1");
        assert!((arcs[0].sweep - 90.0).abs() < 1e-9);
        assert!((arcs[1].start - 90.0).abs() < 1e-9);
        assert!((arcs[1].sweep - 270.0).abs() < 1e-9);
    }

    #[test]
    fn bad_units_are_rejected() {
        let mut fresh: FeedClient<()> = FeedClient::with_default_sink(Settings::default());
        let units = r#"{"type": "units", "data": {"type": "node", "id": "b", "units": {"p1": 1}}}"#;
        assert!(matches!(fresh.handle_json(units).unwrap_err(), FeedError::NoMap));

        let mut client = loaded();
        let err = client
            .handle_json(r#"{"type": "units", "data": {"type": "node", "id": "zz", "units": {}}}"#)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        let err = client
            .handle_json(r#"{"type": "units", "data": {"type": "node", "id": "b", "units": {"p1": -2}}}"#)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        let err = client
            .handle_json(r#"{"type": "units", "data": {"type": "edge", "id": "b"}}"#)
            .unwrap_err();
        assert!(matches!(err, FeedError::Decode(_)));
        assert!(client.map().unwrap().sink().units.is_empty());
    }

    #[test]
    fn player_records_pass_through() {
        let mut client = loaded();
        client
            .handle_json(r#"{"type": "units", "data": {"type": "node", "id": "a", "units": {"p1": 2, "p2": 1}}}"#)
            .unwrap();
        let Some(ClientCommand::Player(request)) = client.request_missing_players() else {
            panic!("expected a player request");
        };
        assert_eq!(request.player_ids, vec!["p1".to_owned(), "p2".to_owned()]);
        assert_eq!(
            ClientCommand::Player(request).to_json().unwrap(),
            r#"{"type":"player","data":{"player_ids":["p1","p2"]}}"#
        );

        let event = client
            .handle_json(
                r#"{"type": "player", "data": {"p1": {"color": "red", "name": "Ann"},
                    "p2": {"color": "teal"}}}"#,
            )
            .unwrap();
        assert_eq!(event, FeedEvent::PlayersUpdated { players: 2 });
        assert_eq!(client.player_color("p1"), Some("red"));
        assert_eq!(client.player("p1").unwrap().extra["name"], "Ann");
        assert_eq!(client.player_color("p3"), None);
        assert!(client.request_missing_players().is_none());
    }

    #[test]
    fn ratio_edit_produces_normalized_command() {
        let mut client = loaded();
        let command = client.edit_ratio("a", "b", 12.0, 4.0).unwrap();
        let ClientCommand::Disposition(cmd) = &command else {
            panic!("expected a disposition command");
        };
        assert_eq!(cmd.node_id, "a");
        assert_eq!(cmd.disposition.target, 4.0);
        assert!((cmd.disposition.ratios["b"] - 0.8).abs() < 1e-9);
        assert!((cmd.disposition.ratios["c"] - 0.2).abs() < 1e-9);

        let json: serde_json::Value = serde_json::from_str(&command.to_json().unwrap()).unwrap();
        assert_eq!(json["type"], "disposition");
        assert_eq!(json["data"]["node_id"], "a");
    }

    #[test]
    fn reloading_replaces_the_map() {
        let mut client = loaded();
        client
            .handle_json(
                r#"{"type": "movements", "data": {"from": "a", "to": "c", "start_time": 0,
                    "movements": [{"width": 0.1, "color": "pink"}]}}"#,
            )
            .unwrap();
        client.handle_json(MAP).unwrap();
        let map = client.map().unwrap();
        assert_eq!(map.segment_count(), 0);
        assert_eq!(map.active_animations(), 0);
    }
}

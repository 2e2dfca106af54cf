use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

new_key_type! {
    /// Identifies a production node on the map.
    pub struct NodeId;

    /// Identifies a connection (directed link) between two nodes.
    pub struct ConnectionId;

    /// Identifies one drawable sub-flow band of a wave.
    pub struct SegmentId;

    /// Identifies a wave within a connection's timeline.
    pub struct WaveId;

    /// Identifies a registered animation slot in the scheduler.
    pub struct AnimationId;
}

/// Opaque visual identity of a sub-flow (usually a CSS-style color string).
///
/// The core never interprets it; it is handed back to the presentation sink
/// untouched.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlowIdentity(pub String);

impl FlowIdentity {
    pub fn new(identity: impl Into<String>) -> Self {
        Self(identity.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for FlowIdentity {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for FlowIdentity {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// Clock value supplied by the host, in the same unit as travel times
/// (milliseconds in the browser client).
pub type Time = f64;

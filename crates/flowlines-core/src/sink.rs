//! Narrow output interfaces between the core and whatever draws it.
//!
//! The core owns all routing and timing state and pushes geometry out
//! through these traits. Handles on the drawing side are the sink's own
//! business: it maps the core's ids to whatever shape objects it keeps.

use crate::geometry::Vec2;
use crate::id::{ConnectionId, NodeId, SegmentId};
use crate::timeline::Segment;
use crate::units::NodeUnits;

/// Receives segment lifecycle updates from a single [`FlowTimeline`].
///
/// [`FlowTimeline`]: crate::timeline::FlowTimeline
pub trait SegmentSink {
    fn created(&mut self, id: SegmentId, segment: &Segment);
    fn moved(&mut self, id: SegmentId, segment: &Segment);
    fn destroyed(&mut self, id: SegmentId);
}

/// Receives every drawable update produced by a [`FlowMap`].
///
/// All methods default to no-ops so a sink can subscribe to just what it
/// draws. Calls are synchronous and happen inside the operation that caused
/// them.
///
/// [`FlowMap`]: crate::network::FlowMap
pub trait PresentationSink {
    fn segment_created(&mut self, _connection: ConnectionId, _id: SegmentId, _segment: &Segment) {}

    fn segment_moved(&mut self, _connection: ConnectionId, _id: SegmentId, _segment: &Segment) {}

    fn segment_destroyed(&mut self, _connection: ConnectionId, _id: SegmentId) {}

    /// A disposition head moved: `value` is the new ratio and `head` the
    /// point the draggable handle should sit at.
    fn disposition_moved(
        &mut self,
        _node: NodeId,
        _connection: ConnectionId,
        _value: f64,
        _head: Vec2,
    ) {
    }

    /// A node's unit pie was replaced. Slices not in `units` are gone.
    fn units_changed(&mut self, _node: NodeId, _units: &NodeUnits) {}
}

/// Discards everything.
impl PresentationSink for () {}

/// Adapts a [`PresentationSink`] to one connection's [`SegmentSink`].
pub(crate) struct ConnectionSink<'a, S: ?Sized> {
    pub(crate) connection: ConnectionId,
    pub(crate) sink: &'a mut S,
}

impl<S: PresentationSink + ?Sized> SegmentSink for ConnectionSink<'_, S> {
    fn created(&mut self, id: SegmentId, segment: &Segment) {
        self.sink.segment_created(self.connection, id, segment);
    }

    fn moved(&mut self, id: SegmentId, segment: &Segment) {
        self.sink.segment_moved(self.connection, id, segment);
    }

    fn destroyed(&mut self, id: SegmentId) {
        self.sink.segment_destroyed(self.connection, id);
    }
}

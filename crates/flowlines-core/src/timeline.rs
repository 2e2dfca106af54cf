//! Time-delayed shipments ("waves") travelling along one connection.
//!
//! A wave is the set of parallel sub-flows that entered the connection at
//! one instant. While it is the newest wave its segments stretch from the
//! origin to a head that advances at `1 / travel_time` of the connection per
//! time unit. Injecting the next wave supersedes it: from that instant its
//! tail leaves the origin at the same speed, so the old flow drains out of
//! the connection while the new flow fills in behind it.
//!
//! # Timing
//!
//! Each wave gets exactly one scheduler slot, driven by
//! [`FlowTimeline::advance_wave`]. That slot moves the wave's heads and the
//! tails of the wave it superseded, both from the same time origin (the new
//! wave's start), so head and tail always travel in the same direction at
//! the same speed. When `now >= start + travel_time` the heads are snapped
//! to the destination, the superseded wave has fully arrived and is
//! released, and the slot reports completion.
//!
//! # Lanes
//!
//! Geometry is computed in the connection's own frame. `ratio` 0 is the
//! origin node, 1 the destination. Sub-flow bands are stacked sideways on the
//! left of the travel direction, starting half the connection spacing away
//! from the centre line, so the two directions between a node pair never
//! overlap.

use slotmap::SlotMap;
use tracing::debug;

use crate::error::ErrorKind;
use crate::geometry::Vec2;
use crate::id::{FlowIdentity, SegmentId, Time, WaveId};
use crate::sink::SegmentSink;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from constructing a timeline or injecting a wave.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TimelineError {
    #[error("travel time must be positive and finite, got {0}")]
    InvalidTravelTime(f64),
    #[error("connection width must be non-negative and finite, got {0}")]
    InvalidWidth(f64),
    #[error("sub-flow width must be positive and finite, got {0}")]
    InvalidSubFlowWidth(f64),
    #[error("wave start time must be finite, got {0}")]
    InvalidStartTime(f64),
    #[error("wave start time {start} is earlier than the latest wave's {latest}")]
    OutOfOrderStart { start: f64, latest: f64 },
    #[error("connection endpoints must be finite points")]
    InvalidEndpoint,
}

impl TimelineError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::InvalidArgument
    }
}

// ---------------------------------------------------------------------------
// Public data
// ---------------------------------------------------------------------------

/// One parallel band of a wave: how much flows and whose it is.
#[derive(Debug, Clone, PartialEq)]
pub struct SubFlow {
    width: f64,
    identity: FlowIdentity,
}

impl SubFlow {
    pub fn new(width: f64, identity: impl Into<FlowIdentity>) -> Result<Self, TimelineError> {
        if !(width.is_finite() && width > 0.0) {
            return Err(TimelineError::InvalidSubFlowWidth(width));
        }
        Ok(Self {
            width,
            identity: identity.into(),
        })
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn identity(&self) -> &FlowIdentity {
        &self.identity
    }
}

/// Drawable state of one sub-flow band.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    /// Back end of the band, nearest the origin.
    pub tail: Vec2,
    /// Front end of the band, nearest the destination.
    pub head: Vec2,
    pub width: f64,
    pub identity: FlowIdentity,
}

// ---------------------------------------------------------------------------
// Internal wave bookkeeping
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct Band {
    segment: SegmentId,
    /// Lateral offset of the band's centre line.
    offset: f64,
}

#[derive(Debug, Clone)]
struct Wave {
    start: Time,
    bands: Vec<Band>,
    /// The wave this one superseded, until its tail has arrived.
    superseded: Option<WaveId>,
}

// ---------------------------------------------------------------------------
// FlowTimeline
// ---------------------------------------------------------------------------

/// Wave history and geometry for one connection.
#[derive(Debug, Clone)]
pub struct FlowTimeline {
    from: Vec2,
    to: Vec2,
    /// Unit vector along the travel direction.
    direction: Vec2,
    /// Unit vector pointing to the left of the travel direction.
    lateral: Vec2,
    /// Rendered width of the connection itself.
    width: f64,
    spacing: f64,
    travel_time: f64,
    waves: SlotMap<WaveId, Wave>,
    segments: SlotMap<SegmentId, Segment>,
    current: Option<WaveId>,
    /// Start of the newest wave ever injected, even once it is gone.
    latest_start: Option<Time>,
}

impl FlowTimeline {
    /// Create an empty timeline for a connection running `from` → `to`.
    ///
    /// `width` is the connection's rendered (throughput-derived) width and
    /// `spacing` the gap kept between opposing connections.
    pub fn new(
        from: Vec2,
        to: Vec2,
        width: f64,
        travel_time: f64,
        spacing: f64,
    ) -> Result<Self, TimelineError> {
        if !(travel_time.is_finite() && travel_time > 0.0) {
            return Err(TimelineError::InvalidTravelTime(travel_time));
        }
        if !(width.is_finite() && width >= 0.0) {
            return Err(TimelineError::InvalidWidth(width));
        }
        if !(from.is_finite() && to.is_finite()) {
            return Err(TimelineError::InvalidEndpoint);
        }
        let direction = Vec2::from_angle((to - from).angle());
        Ok(Self {
            from,
            to,
            direction,
            lateral: direction.perpendicular(),
            width,
            spacing,
            travel_time,
            waves: SlotMap::with_key(),
            segments: SlotMap::with_key(),
            current: None,
            latest_start: None,
        })
    }

    /// Point at fraction `ratio` of the way from origin to destination,
    /// shifted `offset` to the left. `ratio` is clamped to `[0, 1]`.
    pub fn line_point(&self, ratio: f64, offset: f64) -> Vec2 {
        let ratio = ratio.clamp(0.0, 1.0);
        self.from.lerp(self.to, ratio) + self.lateral * offset
    }

    /// Fraction of the connection covered `elapsed` time units after departure.
    pub fn progress(&self, elapsed: Time) -> f64 {
        (elapsed / self.travel_time).clamp(0.0, 1.0)
    }

    /// Endpoints of the connection's own band (the terrain under the flows).
    pub fn terrain_line(&self) -> (Vec2, Vec2) {
        let offset = self.spacing / 2.0 + self.width / 2.0;
        (self.line_point(0.0, offset), self.line_point(1.0, offset))
    }

    /// Inject a new wave of sub-flows departing at `start`.
    ///
    /// Creates one zero-length segment per sub-flow at the origin and
    /// supersedes the current wave, if any. An empty `subflows` is a valid
    /// "stop all flow" instruction. The returned wave must be driven by
    /// calling [`advance_wave`](Self::advance_wave) once per frame until it
    /// returns `false`.
    ///
    /// Starts must not go backwards: a wave departing before the latest one
    /// would arrive first and cut its successor's retirement short.
    pub fn inject_wave(
        &mut self,
        start: Time,
        subflows: &[SubFlow],
        sink: &mut dyn SegmentSink,
    ) -> Result<WaveId, TimelineError> {
        if !start.is_finite() {
            return Err(TimelineError::InvalidStartTime(start));
        }
        if let Some(latest) = self.latest_start {
            if start < latest {
                return Err(TimelineError::OutOfOrderStart { start, latest });
            }
        }

        let mut bands = Vec::with_capacity(subflows.len());
        let mut stacked = 0.0;
        for subflow in subflows {
            let offset = self.spacing / 2.0 + stacked + subflow.width / 2.0;
            stacked += subflow.width;
            let origin = self.line_point(0.0, offset);
            let segment = Segment {
                tail: origin,
                head: origin,
                width: subflow.width,
                identity: subflow.identity.clone(),
            };
            let id = self.segments.insert(segment);
            sink.created(id, &self.segments[id]);
            bands.push(Band { segment: id, offset });
        }

        let superseded = self.current;
        let wave = self.waves.insert(Wave {
            start,
            bands,
            superseded,
        });
        self.current = Some(wave);
        self.latest_start = Some(start);

        debug!(
            start,
            subflows = subflows.len(),
            superseding = superseded.is_some(),
            "wave injected"
        );
        Ok(wave)
    }

    /// Advance one wave's animation to `now`.
    ///
    /// Returns `true` while the wave is still travelling and `false` once it
    /// has arrived (or no longer exists), at which point the caller must stop
    /// driving it.
    pub fn advance_wave(&mut self, wave: WaveId, now: Time, sink: &mut dyn SegmentSink) -> bool {
        let Some(state) = self.waves.get(wave) else {
            return false;
        };
        let arrived = now >= state.start + self.travel_time;
        let ratio = if arrived {
            1.0
        } else {
            self.progress(now - state.start)
        };
        let superseded = state.superseded;

        for band in &state.bands {
            let head = self.line_point(ratio, band.offset);
            let segment = &mut self.segments[band.segment];
            segment.head = head;
            sink.moved(band.segment, segment);
        }

        if let Some(old) = superseded {
            if arrived {
                self.release(old, sink);
            } else if let Some(old_state) = self.waves.get(old) {
                for band in &old_state.bands {
                    let tail = self.line_point(ratio, band.offset);
                    if let Some(segment) = self.segments.get_mut(band.segment) {
                        segment.tail = tail;
                        sink.moved(band.segment, segment);
                    }
                }
            }
        }

        if !arrived {
            return true;
        }

        if let Some(state) = self.waves.get_mut(wave) {
            state.superseded = None;
        }
        // An empty wave that has fully arrived carries nothing; once it has
        // flushed its predecessor there is nothing left to keep.
        if self.current == Some(wave) && self.waves[wave].bands.is_empty() {
            self.waves.remove(wave);
            self.current = None;
        }
        false
    }

    /// Drop a wave and destroy its segments, together with every older
    /// wave it still held on to.
    fn release(&mut self, wave: WaveId, sink: &mut dyn SegmentSink) {
        let mut next = Some(wave);
        while let Some(id) = next {
            let Some(state) = self.waves.remove(id) else {
                break;
            };
            for band in state.bands {
                if self.segments.remove(band.segment).is_some() {
                    sink.destroyed(band.segment);
                }
            }
            if self.current == Some(id) {
                self.current = None;
            }
            debug!(start = state.start, "wave retired");
            next = state.superseded;
        }
    }

    // -----------------------------------------------------------------------
    // Read accessors
    // -----------------------------------------------------------------------

    pub fn from(&self) -> Vec2 {
        self.from
    }

    pub fn to(&self) -> Vec2 {
        self.to
    }

    /// Unit vector along the travel direction.
    pub fn direction(&self) -> Vec2 {
        self.direction
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn travel_time(&self) -> f64 {
        self.travel_time
    }

    /// The newest wave, if it still exists.
    pub fn current_wave(&self) -> Option<WaveId> {
        self.current
    }

    pub fn wave_start(&self, wave: WaveId) -> Option<Time> {
        self.waves.get(wave).map(|w| w.start)
    }

    /// Segments belonging to `wave`, in sub-flow order.
    pub fn wave_segments(&self, wave: WaveId) -> Vec<(SegmentId, &Segment)> {
        self.waves
            .get(wave)
            .map(|w| {
                w.bands
                    .iter()
                    .filter_map(|b| self.segments.get(b.segment).map(|s| (b.segment, s)))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Number of waves still holding state (current plus retiring).
    pub fn wave_count(&self) -> usize {
        self.waves.len()
    }

    pub fn segment(&self, id: SegmentId) -> Option<&Segment> {
        self.segments.get(id)
    }

    /// All live segments on this connection.
    pub fn segments(&self) -> impl Iterator<Item = (SegmentId, &Segment)> {
        self.segments.iter()
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

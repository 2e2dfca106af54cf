//! Property-based tests for routing ratios and wave timelines.

use flowlines_core::disposition::RatioSet;
use flowlines_core::geometry::Vec2;
use flowlines_core::id::{SegmentId, Time};
use flowlines_core::sink::SegmentSink;
use flowlines_core::test_utils::*;
use flowlines_core::timeline::{FlowTimeline, Segment};
use flowlines_core::units::NodeUnits;
use proptest::prelude::*;

const SUM: f64 = 15.0;

// ===========================================================================
// Generators
// ===========================================================================

/// A ratio set over `0..n` with a sequence of edits already applied.
fn arb_ratios() -> impl Strategy<Value = RatioSet<usize>> {
    (1..8usize).prop_flat_map(|n| {
        proptest::collection::vec((0..n, 0.0..30.0f64), 0..20).prop_map(move |edits| {
            let mut ratios = RatioSet::new(0..n, SUM).unwrap();
            for (key, value) in edits {
                ratios.set_one(key, value, |_, _| {}).unwrap();
            }
            ratios
        })
    })
}

#[derive(Default)]
struct Counter {
    live: usize,
}

impl SegmentSink for Counter {
    fn created(&mut self, _: SegmentId, _: &Segment) {
        self.live += 1;
    }
    fn moved(&mut self, _: SegmentId, _: &Segment) {}
    fn destroyed(&mut self, _: SegmentId) {
        self.live -= 1;
    }
}

// ===========================================================================
// Ratio properties
// ===========================================================================

proptest! {
    #[test]
    fn edits_conserve_the_sum(mut ratios in arb_ratios(), key in 0..8usize, value in 0.0..100.0f64) {
        let key = key % ratios.len();
        ratios.set_one(key, value, |_, _| {}).unwrap();
        prop_assert!((ratios.total() - SUM).abs() <= 1e-9 * SUM);
        prop_assert!(ratios.iter().all(|(_, v)| v >= 0.0 && v <= SUM + 1e-9));
    }

    #[test]
    fn clamped_request_is_idempotent(mut ratios in arb_ratios(), key in 0..8usize) {
        let key = key % ratios.len();
        let stored = ratios.set_one(key, SUM * 2.0, |_, _| {}).unwrap();
        let snapshot: Vec<_> = ratios.iter().collect();
        let again = ratios.set_one(key, SUM * 2.0, |_, _| {}).unwrap();
        prop_assert_eq!(stored, again);
        prop_assert_eq!(snapshot, ratios.iter().collect::<Vec<_>>());
    }

    #[test]
    fn others_keep_their_proportions(mut ratios in arb_ratios(), key in 0..8usize, value in 0.0..SUM) {
        let key = key % ratios.len();
        let before: Vec<_> = ratios.iter().filter(|(k, _)| *k != key).collect();
        let others: f64 = before.iter().map(|(_, v)| v).sum();
        prop_assume!(others > 1e-6);

        let stored = ratios.set_one(key, value, |_, _| {}).unwrap();
        let remainder = SUM - stored;
        for (k, old) in before {
            let expected = old / others * remainder;
            prop_assert!((ratios.get(k).unwrap() - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn observer_sees_every_written_entry(mut ratios in arb_ratios(), key in 0..8usize, value in 0.0..SUM) {
        let key = key % ratios.len();
        let mut seen = Vec::new();
        ratios.set_one(key, value, |k, v| seen.push((k, v))).unwrap();
        prop_assert_eq!(seen[0].0, key);
        if ratios.len() > 1 {
            prop_assert_eq!(seen.len(), ratios.len());
        }
        for (k, v) in seen {
            prop_assert_eq!(ratios.get(k), Some(v));
        }
    }
}

// ===========================================================================
// Timeline properties
// ===========================================================================

proptest! {
    /// However waves are scheduled, once every animation has finished only
    /// the last non-empty wave's segments are left.
    #[test]
    fn waves_settle_to_the_latest(
        gaps in proptest::collection::vec(0.0..200.0f64, 1..6),
        sizes in proptest::collection::vec(0..4usize, 6),
    ) {
        let travel: Time = 100.0;
        let mut timeline = FlowTimeline::new(Vec2::ZERO, Vec2::new(10.0, 0.0), 0.3, travel, 0.1).unwrap();
        let mut sink = Counter::default();
        let mut running = Vec::new();
        let mut now = 0.0;

        for (i, gap) in gaps.iter().enumerate() {
            now += gap;
            let flows: Vec<_> = (0..sizes[i]).map(|_| pink(0.05)).collect();
            running.push(timeline.inject_wave(now, &flows, &mut sink).unwrap());
            // One frame between injections.
            running.retain(|w| timeline.advance_wave(*w, now, &mut sink));
        }
        let end = now + 2.0 * travel;
        while !running.is_empty() {
            now = (now + 7.0).min(end);
            running.retain(|w| timeline.advance_wave(*w, now, &mut sink));
        }

        let last = sizes[gaps.len() - 1];
        prop_assert_eq!(timeline.segment_count(), last);
        prop_assert_eq!(sink.live, last);
        prop_assert!(timeline.wave_count() <= 1);
    }
    /// Starts that jump backwards are refused; the accepted waves still
    /// settle to the latest one.
    #[test]
    fn backwards_starts_never_leak(
        schedule in proptest::collection::vec((-150.0..200.0f64, 0..4usize), 1..8),
    ) {
        let travel: Time = 100.0;
        let mut timeline = FlowTimeline::new(Vec2::ZERO, Vec2::new(10.0, 0.0), 0.3, travel, 0.1).unwrap();
        let mut sink = Counter::default();
        let mut running = Vec::new();
        let mut latest = f64::NEG_INFINITY;
        let mut last = 0;
        let mut start = 0.0;

        for (step, size) in schedule {
            start += step;
            let flows: Vec<_> = (0..size).map(|_| pink(0.05)).collect();
            match timeline.inject_wave(start, &flows, &mut sink) {
                Ok(wave) => {
                    prop_assert!(start >= latest);
                    latest = start;
                    last = size;
                    running.push(wave);
                }
                Err(_) => prop_assert!(start < latest),
            }
        }
        let mut now = latest.min(0.0);
        let end = latest + 2.0 * travel;
        while !running.is_empty() {
            now = (now + 7.0).min(end);
            running.retain(|w| timeline.advance_wave(*w, now, &mut sink));
        }

        prop_assert_eq!(timeline.segment_count(), last);
        prop_assert_eq!(sink.live, last);
    }
}

// ===========================================================================
// Unit pies
// ===========================================================================

proptest! {
    #[test]
    fn unit_slices_tile_the_circle(
        counts in proptest::collection::vec(0.0..50.0f64, 1..6),
        scale in 0.1..4.0f64,
    ) {
        let owners: Vec<_> = (0..counts.len()).map(|i| (i.to_string(), counts[i])).collect();
        let pie = NodeUnits::layout(Vec2::ZERO, owners, scale).unwrap();
        let total: f64 = counts.iter().sum();
        let mut edge = 0.0;
        for arc in pie.arcs() {
            prop_assert!((arc.start - edge).abs() < 1e-9);
            prop_assert!(arc.sweep > 0.0);
            edge += arc.sweep;
        }
        if pie.arcs().is_empty() {
            prop_assert_eq!(pie.outer_radius(), 0.0);
        } else {
            prop_assert!((edge - 360.0).abs() < 1e-6);
            prop_assert!((pie.area() - total * scale * scale).abs() < 1e-6 * total.max(1.0));
        }
    }
}

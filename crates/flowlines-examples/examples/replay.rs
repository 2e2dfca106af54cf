//! Headless replay of the reference session: a three-node map, one pink
//! wave from `node0` to `node1`, then a stop instruction ten seconds later.
//!
//! Every drawable update is printed instead of drawn.
//!
//! Run with: `RUST_LOG=debug cargo run -p flowlines-examples --example replay`

use flowlines_core::geometry::{rad_to_deg, Vec2};
use flowlines_core::id::{ConnectionId, NodeId, SegmentId};
use flowlines_core::network::FlowMapBuilder;
use flowlines_core::settings::Settings;
use flowlines_core::sink::PresentationSink;
use flowlines_core::timeline::{Segment, SubFlow};
use tracing_subscriber::EnvFilter;

/// Prints a line per update, numbering segments as they appear.
#[derive(Default)]
struct ConsoleSink {
    moves: usize,
}

impl PresentationSink for ConsoleSink {
    fn segment_created(&mut self, connection: ConnectionId, id: SegmentId, segment: &Segment) {
        println!(
            "  + {connection:?}/{id:?} {} width {:.2}",
            segment.identity.as_str(),
            segment.width
        );
    }

    fn segment_moved(&mut self, _connection: ConnectionId, _id: SegmentId, _segment: &Segment) {
        self.moves += 1;
    }

    fn segment_destroyed(&mut self, connection: ConnectionId, id: SegmentId) {
        println!("  - {connection:?}/{id:?}");
    }

    fn disposition_moved(&mut self, node: NodeId, connection: ConnectionId, value: f64, head: Vec2) {
        println!(
            "  disposition {node:?} -> {connection:?}: {value:.2} at ({:.2}, {:.2})",
            head.x, head.y
        );
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // --- Build the map ---

    println!("loading map");
    let mut builder = FlowMapBuilder::new(Settings::default())?;
    let node0 = builder.add_node("node0", Vec2::new(0.0, 0.0), 1.0)?;
    let node2 = builder.add_node("node2", Vec2::new(5.0, 0.0), 2.0)?;
    let node1 = builder.add_node("node1", Vec2::new(10.0, 20.0), 10.0)?;
    let outbound = builder.add_connection(node0, node1, 0.3, 10_000.0)?;
    builder.add_connection(node1, node0, 0.3, 10_000.0)?;
    let to_node2 = builder.add_connection(node1, node2, 1.0, 10_000.0)?;
    let mut map = builder.build(ConsoleSink::default())?;

    for (_, node) in map.nodes() {
        println!("  {} radius {:.3}", node.name(), node.radius());
    }
    let heading = map.connection(outbound).map(|c| c.timeline().direction().angle());
    if let Some(angle) = heading {
        println!("  node0 -> node1 heads {:.1} degrees", rad_to_deg(angle));
    }

    // --- Drag a disposition ---

    println!("dragging node1 -> node2 to 12");
    map.apply_ratio_edit(node1, to_node2, 12.0)?;

    // --- Play the schedule at 60 frames per second ---

    let frame = 1_000.0 / 60.0;
    let mut now = 0.0;
    println!("wave departs at t = 0");
    map.inject_movements(outbound, now, &[SubFlow::new(0.1, "pink")?])?;
    let mut stopped = false;
    while now <= 20_000.0 {
        if !stopped && now >= 10_000.0 {
            println!("stop instruction at t = {now:.0}");
            map.inject_movements(outbound, now, &[])?;
            stopped = true;
        }
        map.tick(now);
        now += frame;
    }

    let moves = map.sink().moves;
    println!(
        "done: {} segments left, {} animations running, {moves} segment updates",
        map.segment_count(),
        map.active_animations()
    );
    Ok(())
}

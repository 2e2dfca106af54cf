//! Drives a generated grid map through the JSON feed, the way a client
//! talking to the game server would.
//!
//! Run with: `cargo run -p flowlines-examples --example grid_feed`

use flowlines_core::settings::Settings;
use flowlines_data::feed::{FeedClient, FeedEvent, MovementData, ServerMessage};
use flowlines_data::generator::SquareMapGenerator;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut client: FeedClient<()> = FeedClient::with_default_sink(Settings::default());
    println!("-> {}", client.request_map().to_json()?);

    // Stand in for the server: a 5 x 5 grid, 25 units apart.
    let grid = SquareMapGenerator {
        x: 5,
        y: 5,
        distance: 25.0,
        production: 20.0,
        throughput: 1.0,
    };
    let reply = ServerMessage::Map(grid.generate()).to_json()?;
    if let FeedEvent::MapLoaded { nodes, connections } = client.handle_json(&reply)? {
        info!(nodes, connections, "grid loaded");
    }

    // A flow leaves the centre eastwards.
    client.handle(ServerMessage::Movements(MovementData {
        from: "(2, 2)".into(),
        to: "(3, 2)".into(),
        start_time: 0.0,
        movements: vec![],
    }))?;

    // The player favours the eastern neighbour.
    let command = client.edit_ratio("(2, 2)", "(3, 2)", 9.0, 5.0)?;
    println!("-> {}", command.to_json()?);

    // Two players share the centre node; the client asks who they are.
    let units = r#"{"type": "units", "data": {"type": "node", "id": "(2, 2)", "units": {"1": 12, "2": 4}}}"#;
    if let FeedEvent::UnitsUpdated { total, .. } = client.handle_json(units)? {
        info!(total, "centre units updated");
    }
    if let Some(request) = client.request_missing_players() {
        println!("-> {}", request.to_json()?);
    }
    client.handle_json(r#"{"type": "player", "data": {"1": {"color": "red"}, "2": {"color": "blue"}}}"#)?;
    info!(color = ?client.player_color("1"), "player 1");

    // Messages the server might send that the client must refuse.
    for bad in [
        r#"{"type": "movements", "data": {"from": "(0, 0)", "to": "(4, 4)", "start_time": 0, "movements": []}}"#,
        r#"{"type": "movements", "data": {"from": "(2, 2)", "to": "(3, 2)", "start_time": -1, "movements": []}}"#,
        r#"{"type": "units", "data": {"type": "node", "id": "(9, 9)", "units": {}}}"#,
    ] {
        if let Err(e) = client.handle_json(bad) {
            println!("refused: {e}");
        }
    }

    let mut now = 0.0;
    while client.map().is_some_and(|m| m.active_animations() > 0) {
        now += 5.0;
        client.tick(now);
    }
    println!("all flows settled at t = {now}");
    Ok(())
}


//! manastorm - deterministic wizard-battle core.
//!
//! Headless runner: builds a host and an in-process client over an
//! in-memory channel pair and steps both for a scripted number of fixed
//! ticks, tracing the session state as it evolves.

mod config;

use anyhow::Result;
use config::SessionConfig;
use manastorm_client::ClientSession;
use manastorm_collision::CollisionMask;
use manastorm_core::{InputState, TICK_MS};
use manastorm_net::MemoryChannel;
use manastorm_server::HostSession;
use std::{env, path::Path};
use tracing::info;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!("Starting manastorm v{}", env!("CARGO_PKG_VERSION"));

    let config = match env::args().nth(1) {
        Some(path) => SessionConfig::load_from_path(Path::new(&path)),
        None => SessionConfig::load(),
    };
    run_headless(config)
}

/// Rolling-hills terrain, deterministic in the level dimensions.
fn generate_terrain(width: u32, height: u32) -> CollisionMask {
    CollisionMask::from_fn(width, height, |x, y| {
        let x = f64::from(x);
        let surface = f64::from(height) * 0.7
            + (x * 0.013).sin() * f64::from(height) * 0.08
            + (x * 0.05).sin() * 6.0;
        f64::from(y) >= surface
    })
}

fn run_headless(config: SessionConfig) -> Result<()> {
    let terrain = generate_terrain(config.level_width, config.level_height);
    let turn_config = config.turn_config();

    let mut host = HostSession::new(terrain.clone(), turn_config, config.seed);
    host.add_local_player("host", "red", 0xd33a2c);

    let (client_end, host_end) = MemoryChannel::pair();
    host.accept(Box::new(host_end));
    let mut client = ClientSession::new(
        Box::new(client_end),
        terrain,
        turn_config,
        "guest",
        "blue",
        0,
    );

    let starting_cells = host.world().terrain().occupied_cells();
    let mut clock_ms = 0;

    for tick in 0..config.run_ticks {
        clock_ms += TICK_MS;

        // A small script so the session produces visible activity: the host
        // player opens with a fireball lobbed to the right.
        match tick {
            40 => host.select_spell(0, Some(1))?,
            45 => host.set_local_input(InputState {
                fire: true,
                aim_direction: -0.5,
                aim_power: 0.8,
                ..InputState::default()
            }),
            46 => host.set_local_input(InputState::default()),
            _ => {}
        }

        host.frame(TICK_MS)?;
        client.frame(TICK_MS, clock_ms)?;

        if tick % 200 == 0 {
            info!(
                tick,
                turn = ?host.manager().turn_state(),
                active_player = host.manager().active_player(),
                entities = host.world().entity_count(),
                "session state"
            );
        }
    }

    for (title, body) in client.take_notices() {
        info!(%title, %body, "client notice");
    }
    info!(
        ticks = config.run_ticks,
        players = host.manager().players().len(),
        entities = host.world().entity_count(),
        terrain_destroyed = starting_cells - host.world().terrain().occupied_cells(),
        "session complete"
    );
    Ok(())
}

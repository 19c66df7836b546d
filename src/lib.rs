pub mod config;
pub mod dispatch;
pub mod entities;
pub mod game;
pub mod telemetry;
pub mod world;

use std::io::BufRead;
use std::time::Duration;

pub use game::{Game, GameState};
pub use world::return_value::ReturnValue;
pub use world::state::{WorldLimits, WorldState};

pub fn run(args: &[String]) -> Result<(), String> {
    let config = config::AppConfig::from_args(args).map_err(|err| err.to_string())?;
    telemetry::logging::init(&config.root, &config.core.log_level)?;

    // The core ships no catalogue or map loader. Both start empty and are
    // filled by collaborators posting to the dispatcher.
    let mut world = WorldState::new(
        world::item_types::ItemTypeIndex::default(),
        WorldLimits::from(&config.core),
    );
    if let Some(seed) = config.core.rng_seed {
        world.seed_rng(seed);
    }

    println!("tibia: world core");
    println!("- root: {}", config.root.display());
    println!("- config: {}", config.config_path.display());
    println!("- log level: {}", config.core.log_level);
    println!("- placement radius: {}", world.limits.placement_radius);
    println!("- depot item limit: {}", world.limits.depot_item_limit);
    println!("- item types: {}", world.item_types.len());
    println!("- map tiles: {}", world.map.tile_count());
    if world.item_types.is_empty() && world.map.tile_count() == 0 {
        println!("- world is empty until item types and tiles are loaded");
    }

    let game = Game::start(world, &config.core).map_err(|err| err.to_string())?;
    telemetry::logging::log_game("world core online");
    match config.core.run_seconds {
        Some(seconds) => {
            println!("tibia: running for {} s", seconds);
            std::thread::sleep(Duration::from_secs(seconds));
        }
        None => {
            println!("tibia: type 'shutdown' or close stdin to stop");
            wait_for_shutdown_command();
        }
    }

    let world = game.shutdown().map_err(|err| err.to_string())?;
    println!(
        "tibia: shutdown complete (creatures={}, items={})",
        world.registry.len(),
        world.items.len()
    );
    Ok(())
}

fn wait_for_shutdown_command() {
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        match line {
            Ok(line) if matches!(line.trim(), "shutdown" | "quit") => return,
            Ok(_) => {}
            Err(err) => {
                telemetry::logging::log_error(&format!("console read failed: {}", err));
                return;
            }
        }
    }
}

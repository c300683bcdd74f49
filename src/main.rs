use std::env;

use brigade::infra::{DefaultObserver, GameConnection};
use brigade::planner::{EngineConfig, KitchenEngine, NeverSwitch};
use brigade::Game;
use dotenv::dotenv;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

fn get_env_var_bool(key: &str) -> Option<bool> {
    env::var(key).ok().and_then(|val| val.parse::<bool>().ok())
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("brigade=debug,info"));

    // Stdout carries the protocol, so logs go to stderr.
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_ansi(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    init_logging();

    let config = EngineConfig::from_env();
    let replays_folder = env::var("BRIGADE_REPLAYS_FOLDER").ok();
    let map_switch = get_env_var_bool("BRIGADE_MAP_SWITCH").unwrap_or(true);

    tracing::info!("Map switch enabled: {}", map_switch);
    tracing::debug!("{:?}", config);

    let engine = if map_switch {
        KitchenEngine::new(config)
    } else {
        KitchenEngine::with_switch_heuristic(config, Box::new(NeverSwitch))
    };

    let connection = GameConnection::stdio(replays_folder.as_deref());
    let mut game = Game::new(connection, engine, DefaultObserver);
    game.run().await?;

    Ok(())
}

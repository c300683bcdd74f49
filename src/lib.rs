pub mod error;
pub mod game;
pub mod infra;
pub mod planner;
pub mod state;

// Re-export commonly used types for convenience
pub use error::EngineError;
pub use game::Game;
pub use infra::{AStar, Position, Team};
pub use planner::{Action, Decision, EngineConfig, KitchenEngine, Outcome};
pub use state::{Map, WorldSnapshot};

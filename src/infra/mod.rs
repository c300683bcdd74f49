mod connection;
mod default_observer;
mod game_observer;
mod pathfinding;
mod types;

pub use connection::{BotAction, ClientMessage, ConnectionError, GameConnection, ReplayFile, ServerMessage};
pub use default_observer::DefaultObserver;
pub use game_observer::GameObserver;
pub use pathfinding::{AStar, NextStep};
pub use types::{Position, Step, Team};

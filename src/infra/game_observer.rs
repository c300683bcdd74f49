use crate::infra::Team;
use crate::planner::{Decision, Outcome};
use crate::state::{OrderStats, WorldSnapshot};

/// Trait for observing game events during execution
pub trait GameObserver {
    /// Called once the first snapshot arrives
    fn on_game_start(&mut self, team: Team, map_width: i32, map_height: i32);

    /// Called for every snapshot before planning
    fn on_turn(&mut self, snapshot: &WorldSnapshot);

    /// Called for every decision sent to the game
    fn on_decision(&mut self, decision: &Decision);

    /// Called when the game reports back on an action
    fn on_outcome(&mut self, outcome: &Outcome);

    /// Called when the game finishes
    fn on_game_finished(&mut self, final_turn: i32, stats: &OrderStats);
}

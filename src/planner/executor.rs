use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::infra::{AStar, NextStep};
use crate::planner::capability::{Action, Check};
use crate::planner::config::EngineConfig;
use crate::planner::task_graph::TaskGraph;
use crate::state::{BotId, StationRegistry, TaskId, WorldSnapshot};

/// The single action chosen for one bot this turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub bot: BotId,
    pub action: Action,
    pub task: Option<TaskId>,
    pub step: Option<usize>,
}

/// Result of one action as reported back by the game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    pub bot_id: BotId,
    pub success: bool,
}

pub struct Executor;

impl Executor {
    /// Re-check the step against the fresh snapshot, then either move one
    /// tile toward its station or act on it.
    pub fn execute(
        bot: BotId,
        graph: &TaskGraph,
        index: usize,
        snapshot: &WorldSnapshot,
        stations: &StationRegistry,
        config: &EngineConfig,
    ) -> Result<Decision, EngineError> {
        let step = &graph.steps[index];
        let capability = step.capability;
        let blocked = |reason: &str| EngineError::Blocked {
            task: graph.id,
            step: index,
            reason: reason.to_string(),
        };

        let Some(state) = snapshot.bot(bot) else {
            return Err(blocked("bot missing from snapshot"));
        };
        let target = graph.slot_position(index);
        let check = Check {
            subject: step.subject,
            holding: state.holding.as_ref(),
            station: target.and_then(|pos| stations.occupancy(&pos)),
            money: snapshot.money,
        };
        capability
            .precondition(&check)
            .map_err(|reason| EngineError::ActionFailed { bot, action: reason })?;

        let decision = |action: Action| Decision {
            bot,
            action,
            task: Some(graph.id),
            step: Some(index),
        };

        let Some(target) = target else {
            return capability
                .emit(None)
                .map(decision)
                .ok_or_else(|| blocked("no station resolved"));
        };

        let obstacles: Vec<_> = snapshot
            .bot_positions()
            .into_iter()
            .filter(|pos| *pos != state.position)
            .collect();
        match AStar::next_step(&snapshot.map, state.position, target, &obstacles, config.diagonal_moves) {
            NextStep::Adjacent => capability
                .emit(Some(target))
                .map(decision)
                .ok_or_else(|| blocked("nothing to emit")),
            NextStep::Move(step) => Ok(decision(Action::step(step))),
            NextStep::NoPath => Err(blocked("no path to station")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::{Position, Team};
    use crate::planner::capability::{Capability, Subject};
    use crate::planner::task_graph::{GraphBuilder, SlotNeed, TaskGoal};
    use crate::state::{BotState, FoodKind, Item, Map, Plate, ShopItem, StationRole};

    fn world(holding: Option<Item>) -> (WorldSnapshot, StationRegistry) {
        let map = Map::from_ascii(
            "
            #$###
            #...U
            #####
            ",
        );
        let mut snapshot = WorldSnapshot::new(3, Team::Red, 50, map);
        snapshot.bots.push(BotState {
            bot_id: 1,
            position: Position::new(3, 1),
            holding,
            map_team: Team::Red,
        });
        let mut stations = StationRegistry::new();
        stations.reconcile(&snapshot);
        (snapshot, stations)
    }

    fn single(capability: Capability, subject: Subject, role: StationRole, at: Position) -> TaskGraph {
        let mut builder = GraphBuilder::new();
        let slot = builder.slot(role, SlotNeed::Fixed(at));
        builder.step(capability, subject, Some(slot), &[]);
        builder.build(4, TaskGoal::Order(1), 1.0)
    }

    #[test]
    fn test_far_station_yields_move() {
        let (snapshot, stations) = world(None);
        let graph = single(
            Capability::Buy(ShopItem::Food(FoodKind::Sauce)),
            Subject::Food(FoodKind::Sauce),
            StationRole::Shop,
            Position::new(1, 0),
        );
        let decision = Executor::execute(1, &graph, 0, &snapshot, &stations, &EngineConfig::default()).unwrap();
        assert_eq!(decision.action, Action::Move { dx: -1, dy: 0 });
        assert_eq!(decision.task, Some(4));
    }

    #[test]
    fn test_adjacent_station_yields_interaction() {
        let (snapshot, stations) = world(Some(Item::Plate(Plate::clean())));
        let graph = single(Capability::Submit, Subject::Plate, StationRole::Submit, Position::new(4, 1));
        let decision = Executor::execute(1, &graph, 0, &snapshot, &stations, &EngineConfig::default()).unwrap();
        assert_eq!(decision.action, Action::Submit { x: 4, y: 1 });
    }

    #[test]
    fn test_failed_precondition_issues_nothing() {
        let (snapshot, stations) = world(None);
        let graph = single(Capability::Submit, Subject::Plate, StationRole::Submit, Position::new(4, 1));
        let result = Executor::execute(1, &graph, 0, &snapshot, &stations, &EngineConfig::default());
        assert!(matches!(result, Err(EngineError::ActionFailed { bot: 1, .. })));
    }
}

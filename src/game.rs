use std::time::Instant;

use tokio::io::{AsyncBufRead, AsyncWrite};
use tracing::{info, warn};

use crate::infra::{GameConnection, GameObserver, ServerMessage};
use crate::planner::KitchenEngine;
use crate::state::OrderStats;

pub struct Game<R, W> {
    connection: GameConnection<R, W>,
    engine: KitchenEngine,
    observer: Box<dyn GameObserver>,
}

impl<R, W> Game<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(connection: GameConnection<R, W>, engine: KitchenEngine, observer: impl GameObserver + 'static) -> Self {
        Self {
            connection,
            engine,
            observer: Box::new(observer),
        }
    }

    /// Play until the harness reports the game is over.
    pub async fn run(&mut self) -> Result<OrderStats, Box<dyn std::error::Error>> {
        let mut started = false;

        loop {
            match self.connection.receive().await? {
                ServerMessage::Turn { snapshot } => {
                    let turn_start = Instant::now();

                    if !started {
                        self.observer
                            .on_game_start(snapshot.team, snapshot.map.width, snapshot.map.height);
                        started = true;
                    }
                    self.observer.on_turn(&snapshot);

                    let decisions = self.engine.decide(&snapshot);
                    for decision in &decisions {
                        self.observer.on_decision(decision);
                    }
                    self.connection.send_actions(snapshot.turn, &decisions).await?;

                    let turn_duration = turn_start.elapsed();
                    if turn_duration.as_millis() > 100 {
                        warn!(
                            "Turn {} took {:.2}ms ({} decisions)",
                            snapshot.turn,
                            turn_duration.as_secs_f64() * 1000.0,
                            decisions.len()
                        );
                    }
                }
                ServerMessage::Outcomes { results } => {
                    for outcome in &results {
                        self.observer.on_outcome(outcome);
                    }
                    self.engine.record_outcomes(&results);
                }
                ServerMessage::GameOver { turn } => {
                    let stats = self.engine.stats();
                    self.observer.on_game_finished(turn, &stats);
                    info!("Game over after turn {}", turn);
                    return Ok(stats);
                }
            }
        }
    }

    pub fn engine(&self) -> &KitchenEngine {
        &self.engine
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::{DefaultObserver, Position, Team};
    use crate::planner::EngineConfig;
    use crate::state::{BotState, Map, WorldSnapshot};

    #[tokio::test]
    async fn test_runs_until_game_over() {
        let mut snapshot = WorldSnapshot::new(1, Team::Blue, 20, Map::from_ascii("#####\n#...U\n#####"));
        snapshot.bots.push(BotState {
            bot_id: 5,
            position: Position::new(1, 1),
            holding: None,
            map_team: Team::Blue,
        });
        let turn = serde_json::json!({ "type": "turn", "snapshot": snapshot });
        let input = format!(
            "{}\n{}\n{}\n",
            turn,
            r#"{"type":"outcomes","results":[]}"#,
            r#"{"type":"game_over","turn":1}"#
        );

        let connection = GameConnection::new(input.as_bytes(), Vec::new(), None);
        let mut game = Game::new(connection, KitchenEngine::new(EngineConfig::default()), DefaultObserver);
        let stats = game.run().await.unwrap();

        assert_eq!(stats, OrderStats::default());
        assert!(game.engine().graphs().next().is_none());
    }
}

use tracing::{debug, info, warn};

use crate::infra::{GameObserver, Team};
use crate::planner::{Decision, Outcome};
use crate::state::{OrderStats, WorldSnapshot};

pub struct DefaultObserver;

impl GameObserver for DefaultObserver {
    fn on_game_start(&mut self, team: Team, map_width: i32, map_height: i32) {
        info!("Game started");
        info!("- team: {:?}", team);
        info!("- map size: {}x{}", map_width, map_height);
    }

    fn on_turn(&mut self, snapshot: &WorldSnapshot) {
        info!(
            "turn: {}, money: {}, bots: {}, orders: {}",
            snapshot.turn,
            snapshot.money,
            snapshot.controllable_bots().count(),
            snapshot.orders.iter().filter(|o| o.is_active).count(),
        );
        for bot in snapshot.controllable_bots() {
            debug!(
                "bot {} at ({}, {}) holding {}",
                bot.bot_id,
                bot.position.x,
                bot.position.y,
                bot.holding.as_ref().map_or("nothing".to_string(), |item| item.label()),
            );
        }
    }

    fn on_decision(&mut self, decision: &Decision) {
        match decision.task {
            Some(task) => debug!("bot {}: {:?} (task {})", decision.bot, decision.action, task),
            None => debug!("bot {}: {:?}", decision.bot, decision.action),
        }
    }

    fn on_outcome(&mut self, outcome: &Outcome) {
        if !outcome.success {
            warn!("bot {}: action rejected", outcome.bot_id);
        }
    }

    fn on_game_finished(&mut self, final_turn: i32, stats: &OrderStats) {
        info!("Game finished on turn {}", final_turn);
        info!(
            "Orders completed: {}, expired: {}, earned: {}, penalties: {}",
            stats.completed, stats.expired, stats.rewards_earned, stats.penalties_incurred
        );
    }
}

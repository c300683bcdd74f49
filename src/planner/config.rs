use std::env;
use std::str::FromStr;

/// Tuning knobs for the planning engine.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Weight of the expiry penalty term in the order score.
    pub penalty_risk_weight: f64,
    /// Turns a runnable sub-step may wait unassigned before it is boosted.
    pub starvation_turns: u32,
    pub starvation_boost: f64,
    /// Turns an order graph may wait on a station nothing can provide before
    /// it is abandoned.
    pub max_wait_turns: u32,
    /// Consecutive failures before a sub-step is marked blocked.
    pub max_retries: u32,
    /// Blocks before the whole task graph is abandoned.
    pub max_blocks: u32,
    pub backoff_turns: i32,
    pub backoff_jitter: i32,
    pub seed: u64,
    /// Order graphs pursued at once. `None` means one per controllable bot.
    pub max_concurrent_orders: Option<usize>,
    pub turns_per_food: i32,
    pub claim_slack: i32,
    pub diagonal_moves: bool,
    pub switch_min_turn: i32,
    pub provision_priority: f64,
    pub dispose_priority: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            penalty_risk_weight: 10.0,
            starvation_turns: 8,
            starvation_boost: 5.0,
            max_wait_turns: 30,
            max_retries: 3,
            max_blocks: 2,
            backoff_turns: 2,
            backoff_jitter: 2,
            seed: 7,
            max_concurrent_orders: None,
            turns_per_food: 15,
            claim_slack: 10,
            diagonal_moves: false,
            switch_min_turn: 250,
            provision_priority: 0.5,
            dispose_priority: 100.0,
        }
    }
}

fn get_env_var<T: FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|val| val.parse::<T>().ok())
}

impl EngineConfig {
    /// Defaults overridden by `BRIGADE_*` environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            penalty_risk_weight: get_env_var("BRIGADE_PENALTY_RISK_WEIGHT")
                .unwrap_or(defaults.penalty_risk_weight),
            starvation_turns: get_env_var("BRIGADE_STARVATION_TURNS").unwrap_or(defaults.starvation_turns),
            starvation_boost: get_env_var("BRIGADE_STARVATION_BOOST").unwrap_or(defaults.starvation_boost),
            max_wait_turns: get_env_var("BRIGADE_MAX_WAIT_TURNS").unwrap_or(defaults.max_wait_turns),
            max_retries: get_env_var("BRIGADE_MAX_RETRIES").unwrap_or(defaults.max_retries),
            max_blocks: get_env_var("BRIGADE_MAX_BLOCKS").unwrap_or(defaults.max_blocks),
            backoff_turns: get_env_var("BRIGADE_BACKOFF_TURNS").unwrap_or(defaults.backoff_turns),
            backoff_jitter: get_env_var("BRIGADE_BACKOFF_JITTER").unwrap_or(defaults.backoff_jitter),
            seed: get_env_var("BRIGADE_SEED").unwrap_or(defaults.seed),
            max_concurrent_orders: get_env_var("BRIGADE_MAX_CONCURRENT_ORDERS")
                .or(defaults.max_concurrent_orders),
            turns_per_food: get_env_var("BRIGADE_TURNS_PER_FOOD").unwrap_or(defaults.turns_per_food),
            claim_slack: get_env_var("BRIGADE_CLAIM_SLACK").unwrap_or(defaults.claim_slack),
            diagonal_moves: get_env_var("BRIGADE_DIAGONAL_MOVES").unwrap_or(defaults.diagonal_moves),
            switch_min_turn: get_env_var("BRIGADE_SWITCH_MIN_TURN").unwrap_or(defaults.switch_min_turn),
            provision_priority: get_env_var("BRIGADE_PROVISION_PRIORITY")
                .unwrap_or(defaults.provision_priority),
            dispose_priority: get_env_var("BRIGADE_DISPOSE_PRIORITY").unwrap_or(defaults.dispose_priority),
        }
    }

    /// Cheapest turn budget at which an order with `foods` items is still claimed.
    pub fn min_turns_for(&self, foods: usize) -> i32 {
        foods as i32 * self.turns_per_food + self.claim_slack
    }

    pub fn order_cap(&self, bots: usize) -> usize {
        self.max_concurrent_orders.unwrap_or(bots).max(1)
    }
}

use thiserror::Error;

use crate::infra::Position;
use crate::state::{BotId, OrderId, TaskId};

/// Everything that can go wrong while planning or acting. None of these are
/// fatal: the engine logs them and replans.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("order {order} is unplannable: {reason}")]
    Unplannable { order: OrderId, reason: String },

    #[error("task {task} step {step} is blocked: {reason}")]
    Blocked {
        task: TaskId,
        step: usize,
        reason: String,
    },

    #[error("bot {bot} failed {action}")]
    ActionFailed { bot: BotId, action: String },

    #[error("stale belief at ({}, {})", position.x, position.y)]
    StaleBelief { position: Position },
}

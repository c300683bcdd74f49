mod allocator;
mod capability;
mod config;
mod engine;
mod executor;
mod recipe;
mod switch;
mod task_graph;

pub use allocator::{AgentBinding, Allocator};
pub use capability::{Action, Capability, ChopPhase, CookPhase, PlatePhase, Source, Subject, WashPhase};
pub use config::EngineConfig;
pub use engine::KitchenEngine;
pub use executor::{Decision, Executor, Outcome};
pub use recipe::{PlanContext, RecipePlanner};
pub use switch::{NeverSwitch, SwitchHeuristic, ThresholdSwitch};
pub use task_graph::{GraphBuilder, GraphStatus, Slot, SlotId, SlotNeed, StepStatus, SubStep, TaskGoal, TaskGraph};

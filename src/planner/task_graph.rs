use std::fmt;

use crate::infra::Position;
use crate::planner::capability::{Capability, CookPhase, Subject};
use crate::state::{BotId, FoodKind, Occupancy, OrderId, Station, StationRole, TaskId};

pub type SlotId = usize;

/// Which station of a role a slot may resolve to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotNeed {
    /// Chosen at plan time, e.g. a counter holding a leftover.
    Fixed(Position),
    Any,
    EmptyCounter,
    BoxOf(FoodKind),
    CleanPlates,
    CookerWithEmptyPan,
    /// Bare, or with an empty pan someone else already put there.
    CookerForPan,
    DirtySink,
}

impl SlotNeed {
    pub fn accepts(&self, station: &Station) -> bool {
        let occupancy = &station.occupancy;
        match self {
            SlotNeed::Fixed(pos) => station.position == *pos,
            SlotNeed::Any => true,
            SlotNeed::EmptyCounter => occupancy.is_empty(),
            SlotNeed::BoxOf(kind) => {
                matches!(occupancy, Occupancy::Stocked { item, count } if *count > 0 && item.is_food_of(*kind))
            }
            SlotNeed::CleanPlates => occupancy.clean_plates() > 0,
            SlotNeed::CookerWithEmptyPan => occupancy.pan().is_some_and(|pan| pan.food.is_none()),
            SlotNeed::CookerForPan => {
                occupancy.is_empty() || occupancy.pan().is_some_and(|pan| pan.food.is_none())
            }
            SlotNeed::DirtySink => occupancy.dirty_plates() > 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    pub role: StationRole,
    pub need: SlotNeed,
    pub bound: Option<Position>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    Pending,
    Done,
    /// Backing off after repeated failures.
    Blocked,
}

#[derive(Debug, Clone)]
pub struct SubStep {
    pub capability: Capability,
    pub subject: Subject,
    pub slot: Option<SlotId>,
    pub after: Vec<usize>,
    /// Successor that continues with the item this step leaves in hand.
    pub hand_to: Option<usize>,
    pub status: StepStatus,
    pub retries: u32,
    pub blocks: u32,
    pub retry_after: i32,
    pub waiting_turns: u32,
    pub assigned: Option<BotId>,
    pub pinned_to: Option<BotId>,
}

impl SubStep {
    fn new(capability: Capability, subject: Subject, slot: Option<SlotId>, after: Vec<usize>) -> Self {
        Self {
            capability,
            subject,
            slot,
            after,
            hand_to: None,
            status: StepStatus::Pending,
            retries: 0,
            blocks: 0,
            retry_after: 0,
            waiting_turns: 0,
            assigned: None,
            pinned_to: None,
        }
    }

    pub fn is_done(&self) -> bool {
        self.status == StepStatus::Done
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskGoal {
    Order(OrderId),
    Dispose,
    Provision,
    Wash,
    SwitchMaps,
}

impl TaskGoal {
    pub fn order(&self) -> Option<OrderId> {
        match self {
            TaskGoal::Order(order) => Some(*order),
            _ => None,
        }
    }
}

impl fmt::Display for TaskGoal {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TaskGoal::Order(order) => write!(formatter, "order {}", order),
            TaskGoal::Dispose => write!(formatter, "dispose"),
            TaskGoal::Provision => write!(formatter, "provision"),
            TaskGoal::Wash => write!(formatter, "wash"),
            TaskGoal::SwitchMaps => write!(formatter, "switch maps"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphStatus {
    Active,
    Completed,
    CompletedWithoutReward,
    Failed,
}

/// Sub-steps of one goal, ordered by predecessor lists.
#[derive(Debug, Clone)]
pub struct TaskGraph {
    pub id: TaskId,
    pub goal: TaskGoal,
    pub steps: Vec<SubStep>,
    pub slots: Vec<Slot>,
    pub status: GraphStatus,
    pub priority: f64,
}

impl TaskGraph {
    pub fn is_active(&self) -> bool {
        self.status == GraphStatus::Active
    }

    pub fn deps_done(&self, index: usize) -> bool {
        self.steps[index].after.iter().all(|dep| self.steps[*dep].is_done())
    }

    /// Pending with every predecessor done. Ignores locks and agents.
    pub fn is_ready(&self, index: usize, turn: i32) -> bool {
        let step = &self.steps[index];
        match step.status {
            StepStatus::Done => false,
            StepStatus::Blocked if turn < step.retry_after => false,
            _ => self.deps_done(index),
        }
    }

    /// The step itself plus every successor that keeps working with the
    /// item it leaves in hand.
    pub fn hand_chain(&self, index: usize) -> Vec<usize> {
        let mut chain = vec![index];
        let mut current = index;
        while let Some(next) = self.steps[current].hand_to {
            if chain.contains(&next) {
                break;
            }
            chain.push(next);
            current = next;
        }
        chain
    }

    pub fn slot_position(&self, index: usize) -> Option<Position> {
        self.steps[index].slot.and_then(|slot| self.slots[slot].bound)
    }

    /// Mark a step done and pin its hand-off successor to `bot`. Returns the
    /// slots no remaining step refers to.
    pub fn complete_step(&mut self, index: usize, bot: Option<BotId>) -> Vec<SlotId> {
        let step = &mut self.steps[index];
        step.status = StepStatus::Done;
        step.assigned = None;
        step.retries = 0;
        if let Some(next) = step.hand_to {
            self.steps[next].pinned_to = bot;
        }
        if self.steps.iter().all(SubStep::is_done) && self.status == GraphStatus::Active {
            self.status = GraphStatus::Completed;
        }
        self.finished_slots()
    }

    pub fn finished_slots(&self) -> Vec<SlotId> {
        (0..self.slots.len())
            .filter(|slot| {
                self.steps
                    .iter()
                    .filter(|step| step.slot == Some(*slot))
                    .all(SubStep::is_done)
            })
            .collect()
    }

    /// Pending pan installation, if the graph still has one.
    pub fn pending_install(&self) -> Option<usize> {
        self.steps
            .iter()
            .position(|step| step.capability == Capability::Cook(CookPhase::InstallPan) && !step.is_done())
    }

    /// The step that hands its item to `index`.
    pub fn feeder(&self, index: usize) -> Option<usize> {
        self.steps.iter().position(|step| step.hand_to == Some(index))
    }

    /// The bot currently expected to carry an item for this graph.
    pub fn carriers(&self) -> Vec<BotId> {
        self.steps
            .iter()
            .filter(|step| !step.is_done())
            .filter_map(|step| step.pinned_to.or(step.assigned.filter(|_| step.capability.picks_up())))
            .collect()
    }

    /// Cooker whose pan holds food this graph started and has not taken out.
    pub fn cooking_station(&self) -> Option<(Position, Subject)> {
        self.steps.iter().enumerate().find_map(|(index, step)| {
            if step.capability != Capability::Cook(CookPhase::Start) || !step.is_done() {
                return None;
            }
            let taken = self.steps.iter().any(|other| {
                other.capability == Capability::Cook(CookPhase::Take)
                    && other.slot == step.slot
                    && other.is_done()
            });
            if taken {
                None
            } else {
                self.slot_position(index).map(|pos| (pos, step.subject))
            }
        })
    }

    pub fn unassign(&mut self, bot: BotId) {
        for step in &mut self.steps {
            if step.assigned == Some(bot) {
                step.assigned = None;
            }
        }
    }

    pub fn summary(&self) -> String {
        let done = self.steps.iter().filter(|s| s.is_done()).count();
        format!("task {} ({}) {}/{} steps", self.id, self.goal, done, self.steps.len())
    }
}

/// Accumulates slots and steps for a new graph.
#[derive(Debug, Default)]
pub struct GraphBuilder {
    steps: Vec<SubStep>,
    slots: Vec<Slot>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn slot(&mut self, role: StationRole, need: SlotNeed) -> SlotId {
        let bound = match need {
            SlotNeed::Fixed(pos) => Some(pos),
            _ => None,
        };
        self.slots.push(Slot { role, need, bound });
        self.slots.len() - 1
    }

    pub fn step(&mut self, capability: Capability, subject: Subject, slot: Option<SlotId>, after: &[usize]) -> usize {
        self.steps.push(SubStep::new(capability, subject, slot, after.to_vec()));
        self.steps.len() - 1
    }

    /// `to` runs after `from` and continues with the item in hand.
    pub fn carry(&mut self, from: usize, to: usize) {
        self.steps[from].hand_to = Some(to);
        if !self.steps[to].after.contains(&from) {
            self.steps[to].after.push(from);
        }
    }

    pub fn after(&mut self, index: usize, dep: usize) {
        if !self.steps[index].after.contains(&dep) {
            self.steps[index].after.push(dep);
        }
    }

    pub fn pin(&mut self, index: usize, bot: BotId) {
        self.steps[index].pinned_to = Some(bot);
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn build(self, id: TaskId, goal: TaskGoal, priority: f64) -> TaskGraph {
        TaskGraph {
            id,
            goal,
            steps: self.steps,
            slots: self.slots,
            status: GraphStatus::Active,
            priority,
        }
    }
}

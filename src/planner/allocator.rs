use std::collections::BTreeMap;

use tracing::debug;

use crate::infra::{AStar, Position};
use crate::planner::config::EngineConfig;
use crate::planner::task_graph::{Slot, SlotId, TaskGraph};
use crate::state::{BotId, Item, StationRegistry, TaskId, WorldSnapshot};

/// A controllable bot and the sub-step it is advancing.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentBinding {
    pub bot: BotId,
    pub position: Position,
    /// Mirrored from the snapshot, never owned here.
    pub holding: Option<Item>,
    pub task: Option<TaskId>,
    pub step: Option<usize>,
    /// Graph the bot last worked on, preferred when it frees up.
    pub last_task: Option<TaskId>,
}

impl AgentBinding {
    fn new(bot: BotId, position: Position) -> Self {
        Self {
            bot,
            position,
            holding: None,
            task: None,
            step: None,
            last_task: None,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.step.is_none()
    }
}

/// Matches idle bots to runnable sub-steps.
#[derive(Debug, Default)]
pub struct Allocator {
    bindings: BTreeMap<BotId, AgentBinding>,
}

impl Allocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mirror bot positions and hands. Bots that left our map are dropped and
    /// returned so their steps can be unassigned.
    pub fn sync(&mut self, snapshot: &WorldSnapshot) -> Vec<AgentBinding> {
        let controllable: Vec<_> = snapshot.controllable_bots().collect();
        let gone: Vec<BotId> = self
            .bindings
            .keys()
            .filter(|bot| !controllable.iter().any(|b| b.bot_id == **bot))
            .copied()
            .collect();
        let removed = gone
            .into_iter()
            .filter_map(|bot| self.bindings.remove(&bot))
            .inspect(|binding| debug!("Bot {} is no longer controllable", binding.bot))
            .collect();

        for bot in controllable {
            let binding = self
                .bindings
                .entry(bot.bot_id)
                .or_insert_with(|| AgentBinding::new(bot.bot_id, bot.position));
            binding.position = bot.position;
            binding.holding = bot.holding.clone();
        }
        removed
    }

    pub fn binding(&self, bot: BotId) -> Option<&AgentBinding> {
        self.bindings.get(&bot)
    }

    pub fn bindings(&self) -> impl Iterator<Item = &AgentBinding> {
        self.bindings.values()
    }

    /// Bots with a step to work on this turn.
    pub fn bound(&self) -> Vec<(BotId, TaskId, usize)> {
        self.bindings
            .values()
            .filter_map(|b| Some((b.bot, b.task?, b.step?)))
            .collect()
    }

    pub fn idle_count(&self) -> usize {
        self.bindings
            .values()
            .filter(|b| b.is_idle() && b.holding.is_none())
            .count()
    }

    pub fn release(&mut self, bot: BotId) {
        if let Some(binding) = self.bindings.get_mut(&bot) {
            binding.task = None;
            binding.step = None;
        }
    }

    pub fn release_task(&mut self, task: TaskId) -> Vec<BotId> {
        let mut freed = Vec::new();
        for binding in self.bindings.values_mut() {
            if binding.task == Some(task) {
                binding.task = None;
                binding.step = None;
                freed.push(binding.bot);
            }
            if binding.last_task == Some(task) {
                binding.last_task = None;
            }
        }
        freed
    }

    fn bind(&mut self, bot: BotId, graph: &mut TaskGraph, index: usize) {
        graph.steps[index].assigned = Some(bot);
        graph.steps[index].waiting_turns = 0;
        if let Some(binding) = self.bindings.get_mut(&bot) {
            binding.task = Some(graph.id);
            binding.step = Some(index);
            binding.last_task = Some(graph.id);
        }
        debug!(
            "Bot {} assigned {} of task {} ({})",
            bot,
            graph.steps[index].capability.name(),
            graph.id,
            graph.goal
        );
    }

    /// Pinned steps first, then the bot's own graph, then fresh work by
    /// priority to the nearest free bot. Returns the number of new bindings.
    #[tracing::instrument(level = "debug", skip_all, fields(turn = snapshot.turn))]
    pub fn assign(
        &mut self,
        graphs: &mut BTreeMap<TaskId, TaskGraph>,
        stations: &mut StationRegistry,
        snapshot: &WorldSnapshot,
        config: &EngineConfig,
    ) -> usize {
        let turn = snapshot.turn;
        let mut assigned = 0;

        for binding in self.bindings.values_mut() {
            if let (Some(task), Some(step)) = (binding.task, binding.step) {
                let valid = graphs.get(&task).is_some_and(|g| {
                    g.is_active() && !g.steps[step].is_done() && g.steps[step].assigned == Some(binding.bot)
                });
                if !valid {
                    binding.task = None;
                    binding.step = None;
                }
            }
        }

        let idle: Vec<(BotId, Position, bool)> = self
            .bindings
            .values()
            .filter(|b| b.is_idle())
            .map(|b| (b.bot, b.position, b.holding.is_some()))
            .collect();

        // Pinned: a bot holding an item for a graph only ever continues it.
        let mut free = Vec::new();
        for (bot, position, holding) in idle {
            let pinned = graphs.values().filter(|g| g.is_active()).find_map(|g| {
                g.steps
                    .iter()
                    .position(|s| s.pinned_to == Some(bot) && !s.is_done())
                    .map(|index| (g.id, index))
            });
            if let Some((task, index)) = pinned {
                if let Some(graph) = graphs.get_mut(&task)
                    && graph.is_ready(index, turn)
                    && graph.steps[index].assigned.is_none()
                    && reserve_chain(graph, index, position, stations, snapshot, config)
                {
                    self.bind(bot, graph, index);
                    assigned += 1;
                }
                continue;
            }
            if !holding {
                free.push((bot, position));
            }
        }

        // Continuation of the bot's own graph.
        let mut pool = Vec::new();
        for (bot, position) in free {
            let last = self.bindings.get(&bot).and_then(|b| b.last_task);
            if let Some(task) = last
                && let Some(graph) = graphs.get_mut(&task)
                && graph.is_active()
                && let Some(index) = (0..graph.steps.len())
                    .find(|&i| is_open(graph, i, turn) && reserve_chain(graph, i, position, stations, snapshot, config))
            {
                self.bind(bot, graph, index);
                assigned += 1;
                continue;
            }
            pool.push((bot, position));
        }

        // Fresh assignments by priority, nearest bot first.
        let mut candidates: Vec<(f64, TaskId, usize)> = graphs
            .values()
            .filter(|g| g.is_active())
            .flat_map(|g| {
                (0..g.steps.len()).filter(|&i| is_open(g, i, turn)).map(|i| {
                    let step = &g.steps[i];
                    let boost = if step.waiting_turns > config.starvation_turns {
                        config.starvation_boost
                    } else {
                        0.0
                    };
                    (g.priority + boost, g.id, i)
                })
            })
            .collect();
        candidates.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)).then(a.2.cmp(&b.2)));

        for (_, task, index) in candidates {
            let Some(graph) = graphs.get_mut(&task) else {
                continue;
            };
            if !is_open(graph, index, turn) {
                continue;
            }
            let nearest = pool
                .iter()
                .enumerate()
                .filter_map(|(slot, (bot, position))| {
                    distance_to(graph, index, *position, stations, snapshot, config).map(|d| (d, *bot, slot))
                })
                .min_by_key(|(d, bot, _)| (*d, *bot));

            let granted = match nearest {
                Some((_, bot, slot)) => {
                    let position = pool[slot].1;
                    if reserve_chain(graph, index, position, stations, snapshot, config) {
                        self.bind(bot, graph, index);
                        pool.remove(slot);
                        assigned += 1;
                        true
                    } else {
                        false
                    }
                }
                None => false,
            };
            if !granted {
                graph.steps[index].waiting_turns += 1;
            }
        }

        assigned
    }
}

/// Runnable apart from locks: ready, unassigned, unpinned and acted on by a bot.
fn is_open(graph: &TaskGraph, index: usize, turn: i32) -> bool {
    let step = &graph.steps[index];
    graph.is_ready(index, turn)
        && step.assigned.is_none()
        && step.pinned_to.is_none()
        && !step.capability.is_polling()
}

/// Nearest station that can fill `slot` for `task`, with its travel distance.
pub fn resolve(
    slot: &Slot,
    from: Position,
    task: TaskId,
    stations: &StationRegistry,
    snapshot: &WorldSnapshot,
    config: &EngineConfig,
    exclude: &[Position],
) -> Option<(Position, i32)> {
    stations
        .stations_of(slot.role)
        .filter(|s| slot.need.accepts(s))
        .filter(|s| !slot.role.is_exclusive() || stations.is_available(&s.position, task))
        .filter(|s| !exclude.contains(&s.position))
        .filter_map(|s| {
            AStar::travel_turns(&snapshot.map, from, s.position, config.diagonal_moves).map(|d| (s.position, d))
        })
        .min_by_key(|(pos, d)| (*d, *pos))
}

/// Some unbound slot along the step's hand chain matches no station at all,
/// whoever holds the locks.
pub fn unsatisfiable(graph: &TaskGraph, index: usize, stations: &StationRegistry) -> bool {
    graph
        .hand_chain(index)
        .into_iter()
        .filter_map(|step| graph.steps[step].slot)
        .any(|slot_id| {
            let slot = &graph.slots[slot_id];
            slot.bound.is_none() && !stations.stations_of(slot.role).any(|s| slot.need.accepts(s))
        })
}

fn distance_to(
    graph: &TaskGraph,
    index: usize,
    from: Position,
    stations: &StationRegistry,
    snapshot: &WorldSnapshot,
    config: &EngineConfig,
) -> Option<i32> {
    let Some(slot_id) = graph.steps[index].slot else {
        return Some(0);
    };
    let slot = &graph.slots[slot_id];
    match slot.bound {
        Some(pos) => AStar::travel_turns(&snapshot.map, from, pos, config.diagonal_moves),
        None => resolve(slot, from, graph.id, stations, snapshot, config, &[]).map(|(_, d)| d),
    }
}

/// Resolve and lock every exclusive station the step and its hand-off
/// successors will need, all at once or not at all.
fn reserve_chain(
    graph: &mut TaskGraph,
    index: usize,
    from: Position,
    stations: &mut StationRegistry,
    snapshot: &WorldSnapshot,
    config: &EngineConfig,
) -> bool {
    let mut picks: Vec<(SlotId, Position)> = Vec::new();
    let mut cursor = from;
    for step_index in graph.hand_chain(index) {
        let Some(slot_id) = graph.steps[step_index].slot else {
            continue;
        };
        if let Some((_, pos)) = picks.iter().find(|(s, _)| *s == slot_id) {
            cursor = *pos;
            continue;
        }
        let slot = &graph.slots[slot_id];
        let pos = match slot.bound {
            Some(pos) => pos,
            None => {
                let exclude: Vec<Position> = picks.iter().map(|(_, p)| *p).collect();
                match resolve(slot, cursor, graph.id, stations, snapshot, config, &exclude) {
                    Some((pos, _)) => pos,
                    None => return false,
                }
            }
        };
        picks.push((slot_id, pos));
        cursor = pos;
    }

    let exclusive: Vec<Position> = picks
        .iter()
        .filter(|(slot, _)| graph.slots[*slot].role.is_exclusive())
        .map(|(_, pos)| *pos)
        .collect();
    if !stations.try_lock_all(&exclusive, graph.id) {
        return false;
    }
    for (slot, pos) in picks {
        graph.slots[slot].bound = Some(pos);
    }
    true
}

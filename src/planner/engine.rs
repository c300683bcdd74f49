use std::collections::{BTreeMap, HashSet};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};

use crate::error::EngineError;
use crate::infra::Position;
use crate::planner::allocator::{AgentBinding, Allocator, unsatisfiable};
use crate::planner::capability::{Capability, CookPhase, Subject, WashPhase};
use crate::planner::config::EngineConfig;
use crate::planner::executor::{Decision, Executor, Outcome};
use crate::planner::recipe::{PlanContext, RecipePlanner};
use crate::planner::switch::{SwitchHeuristic, ThresholdSwitch};
use crate::planner::task_graph::{GraphStatus, SlotNeed, StepStatus, TaskGoal, TaskGraph};
use crate::state::{
    BotId, Item, Occupancy, OrderBook, OrderEvent, OrderStats, OrderStatus, StationRegistry, StationRole, TaskId,
    WorldSnapshot,
};

/// Owns all planning state and turns one snapshot into one decision per bot.
pub struct KitchenEngine {
    config: EngineConfig,
    stations: StationRegistry,
    orders: OrderBook,
    graphs: BTreeMap<TaskId, TaskGraph>,
    allocator: Allocator,
    switch_heuristic: Box<dyn SwitchHeuristic>,
    rng: StdRng,
    next_task: TaskId,
    turn: i32,
    pending: Vec<Decision>,
    switch_scheduled: bool,
}

impl KitchenEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_switch_heuristic(config, Box::new(ThresholdSwitch::default()))
    }

    pub fn with_switch_heuristic(config: EngineConfig, switch_heuristic: Box<dyn SwitchHeuristic>) -> Self {
        Self {
            stations: StationRegistry::new(),
            orders: OrderBook::new(config.penalty_risk_weight),
            graphs: BTreeMap::new(),
            allocator: Allocator::new(),
            switch_heuristic,
            rng: StdRng::seed_from_u64(config.seed),
            next_task: 1,
            turn: 0,
            pending: Vec::new(),
            switch_scheduled: false,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn stations(&self) -> &StationRegistry {
        &self.stations
    }

    pub fn orders(&self) -> &OrderBook {
        &self.orders
    }

    pub fn stats(&self) -> OrderStats {
        self.orders.stats
    }

    pub fn graphs(&self) -> impl Iterator<Item = &TaskGraph> {
        self.graphs.values()
    }

    pub fn graph(&self, task: TaskId) -> Option<&TaskGraph> {
        self.graphs.get(&task)
    }

    pub fn bindings(&self) -> impl Iterator<Item = &AgentBinding> {
        self.allocator.bindings()
    }

    /// Decisions issued by the last `decide` still waiting for outcomes.
    pub fn pending(&self) -> &[Decision] {
        &self.pending
    }

    /// One planning pass: reconcile, plan, allocate, then pick one action per
    /// bound bot. Bots without work are left out.
    #[tracing::instrument(level = "debug", skip_all, fields(turn = snapshot.turn))]
    pub fn decide(&mut self, snapshot: &WorldSnapshot) -> Vec<Decision> {
        self.turn = snapshot.turn;

        for (task, err) in self.stations.reconcile(snapshot) {
            warn!("{}", err);
            self.cancel(task, GraphStatus::Failed);
        }

        for event in self.orders.refresh(&snapshot.orders, snapshot.turn) {
            match event {
                OrderEvent::Expired { task: Some(task), .. } | OrderEvent::Retired { task: Some(task), .. } => {
                    self.cancel_with_disposal(task, snapshot);
                }
                OrderEvent::Completed { task: Some(task), .. } => {
                    self.cancel(task, GraphStatus::Completed);
                }
                _ => {}
            }
        }

        for binding in self.allocator.sync(snapshot) {
            for graph in self.graphs.values_mut() {
                graph.unassign(binding.bot);
            }
        }

        self.poll(snapshot);
        self.dispose_orphans(snapshot);
        self.plan_orders(snapshot);
        self.plan_provision(snapshot);
        self.plan_wash(snapshot);
        self.plan_switch(snapshot);
        self.refresh_priorities();

        self.allocator
            .assign(&mut self.graphs, &mut self.stations, snapshot, &self.config);
        self.abandon_starved(snapshot);

        let mut decisions = Vec::new();
        for (bot, task, index) in self.allocator.bound() {
            let Some(graph) = self.graphs.get(&task).filter(|g| g.is_active()) else {
                continue;
            };
            match Executor::execute(bot, graph, index, snapshot, &self.stations, &self.config) {
                Ok(decision) => decisions.push(decision),
                Err(err @ EngineError::Blocked { .. }) => {
                    debug!("{}", err);
                    self.block_step(task, index, bot);
                }
                Err(err) => {
                    debug!("{}", err);
                    self.step_failed(task, index, bot);
                }
            }
        }

        self.graphs.retain(|_, graph| graph.is_active());
        self.pending = decisions.clone();
        decisions
    }

    /// Apply the game's verdict on the actions issued by the last `decide`.
    #[tracing::instrument(level = "debug", skip_all, fields(turn = self.turn))]
    pub fn record_outcomes(&mut self, outcomes: &[Outcome]) {
        let pending = std::mem::take(&mut self.pending);
        for outcome in outcomes {
            let Some(decision) = pending.iter().find(|d| d.bot == outcome.bot_id) else {
                continue;
            };
            let (Some(task), Some(index)) = (decision.task, decision.step) else {
                continue;
            };
            let Some(graph) = self.graphs.get(&task) else {
                continue;
            };
            if index >= graph.steps.len() || graph.steps[index].assigned != Some(outcome.bot_id) {
                continue;
            }
            let capability = graph.steps[index].capability;
            let order = graph.goal.order();

            if decision.action.is_move() {
                if !outcome.success {
                    warn!("Bot {} could not move", outcome.bot_id);
                    self.step_failed(task, index, outcome.bot_id);
                }
                continue;
            }

            match (capability, outcome.success) {
                (Capability::Submit, true) => {
                    if let Some(order) = order {
                        self.orders.confirm_submit(order, self.turn);
                    }
                    self.finish_step(task, index, Some(outcome.bot_id));
                }
                (Capability::Submit, false) => self.submit_mismatch(task, outcome.bot_id),
                (capability, true) if capability.is_repeated() => {
                    if let Some(graph) = self.graphs.get_mut(&task) {
                        graph.steps[index].retries = 0;
                    }
                }
                (_, true) => self.finish_step(task, index, Some(outcome.bot_id)),
                (_, false) => {
                    warn!(
                        "{}",
                        EngineError::ActionFailed {
                            bot: outcome.bot_id,
                            action: capability.name(),
                        }
                    );
                    self.step_failed(task, index, outcome.bot_id);
                }
            }
        }
    }

    fn allocate_id(&mut self) -> TaskId {
        let id = self.next_task;
        self.next_task += 1;
        id
    }

    fn insert_graph(&mut self, graph: TaskGraph) {
        debug!("New {}", graph.summary());
        self.graphs.insert(graph.id, graph);
    }

    /// Stop a graph now: locks, claim and bots all go back to the pool.
    fn cancel(&mut self, task: TaskId, status: GraphStatus) {
        let Some(graph) = self.graphs.get_mut(&task) else {
            return;
        };
        if !graph.is_active() {
            return;
        }
        graph.status = status;
        info!("Cancelled {} as {:?}", graph.summary(), status);
        if let Some(order) = graph.goal.order() {
            self.orders.release(order, task);
        }
        self.stations.release_all(task);
        self.allocator.release_task(task);
    }

    /// Cancel and send whatever the graph left cooking to the trash.
    fn cancel_with_disposal(&mut self, task: TaskId, snapshot: &WorldSnapshot) {
        let cooking = self.graphs.get(&task).and_then(TaskGraph::cooking_station);
        self.cancel(task, GraphStatus::Failed);
        if let Some((cooker, subject)) = cooking {
            let id = self.allocate_id();
            let reserved = HashSet::new();
            let ctx = PlanContext {
                snapshot,
                stations: &self.stations,
                reserved: &reserved,
                money: snapshot.money,
                pan_pending: false,
            };
            let graph = RecipePlanner::dispose_from_cooker(cooker, subject, &ctx, id, self.config.dispose_priority);
            info!("Task {} trashes food left cooking at {:?}", id, cooker);
            self.insert_graph(graph);
        }
    }

    fn finish_step(&mut self, task: TaskId, index: usize, bot: Option<BotId>) {
        let Some(graph) = self.graphs.get_mut(&task) else {
            return;
        };
        let capability = graph.steps[index].capability;
        let subject = graph.steps[index].subject;
        let target = graph.slot_position(index);

        let finished = graph.complete_step(index, bot);
        if let Some(pos) = target
            && capability.role().is_some_and(|role| role.is_exclusive())
        {
            match capability.leaves_behind(subject) {
                Some(expect) => self.stations.set_belief(pos, task, expect),
                None => self.stations.clear_belief(pos, task),
            }
        }
        for slot in finished {
            if let Some(pos) = graph.slots[slot].bound {
                self.stations.unlock(pos, task);
            }
        }
        debug!("Done {} of {}", capability.name(), graph.summary());

        if let Some(bot) = bot {
            self.allocator.release(bot);
        }
        if graph.status == GraphStatus::Completed {
            info!("Completed {}", graph.summary());
            self.stations.release_all(task);
            self.allocator.release_task(task);
        }
    }

    /// A submit was refused: no live order matched the plate.
    fn submit_mismatch(&mut self, task: TaskId, bot: BotId) {
        warn!("Bot {} submitted for task {} but no order matched the plate", bot, task);
        self.cancel(task, GraphStatus::CompletedWithoutReward);
    }

    fn step_failed(&mut self, task: TaskId, index: usize, bot: BotId) {
        let Some(graph) = self.graphs.get_mut(&task) else {
            return;
        };
        let step = &mut graph.steps[index];
        step.retries += 1;
        if step.retries >= self.config.max_retries {
            self.block_step(task, index, bot);
        }
    }

    /// Back off, free the bot, and give up on the graph once it keeps blocking.
    fn block_step(&mut self, task: TaskId, index: usize, bot: BotId) {
        let jitter = self.rng.random_range(0..=self.config.backoff_jitter.max(0));
        let Some(graph) = self.graphs.get_mut(&task) else {
            return;
        };
        let step = &mut graph.steps[index];
        step.status = StepStatus::Blocked;
        step.blocks += 1;
        step.retries = 0;
        step.assigned = None;
        step.retry_after = self.turn + self.config.backoff_turns + jitter;
        let blocks = step.blocks;
        warn!(
            "{}",
            EngineError::Blocked {
                task,
                step: index,
                reason: format!("{} backs off until turn {}", step.capability.name(), step.retry_after),
            }
        );
        self.allocator.release(bot);

        if blocks >= self.config.max_blocks {
            self.cancel(task, GraphStatus::Failed);
            return;
        }

        // Let unstarted slots pick another station next time.
        for step_index in graph.hand_chain(index) {
            let Some(slot) = graph.steps[step_index].slot else {
                continue;
            };
            let started = graph.steps.iter().any(|s| s.slot == Some(slot) && s.is_done());
            if started || matches!(graph.slots[slot].need, SlotNeed::Fixed(_)) {
                continue;
            }
            if let Some(pos) = graph.slots[slot].bound.take() {
                self.stations.unlock(pos, task);
            }
        }
    }

    /// Advance polling steps and catch food that burnt while waiting.
    fn poll(&mut self, snapshot: &WorldSnapshot) {
        self.skip_installed_pans();

        let clean_plates: u32 = self
            .stations
            .stations_of(StationRole::SinkTable)
            .map(|s| s.occupancy.clean_plates())
            .sum();

        let mut completed = Vec::new();
        let mut burnt = Vec::new();
        for graph in self.graphs.values().filter(|g| g.is_active()) {
            for (index, step) in graph.steps.iter().enumerate() {
                if step.is_done() || !graph.deps_done(index) {
                    continue;
                }
                let occupancy = graph
                    .slot_position(index)
                    .and_then(|pos| self.stations.occupancy(&pos));
                let burnt_in_pan = matches!(
                    step.capability,
                    Capability::Cook(CookPhase::Wait) | Capability::Cook(CookPhase::Take)
                ) && occupancy
                    .and_then(|o| o.pan_food())
                    .is_some_and(|food| Some(food.kind) == step.subject.food_kind() && food.is_burnt());
                if burnt_in_pan {
                    burnt.push(graph.id);
                    break;
                }
                if (step.capability.is_polling() || step.capability.is_repeated())
                    && step.capability.observed_complete(step.subject, occupancy, clean_plates)
                {
                    completed.push((graph.id, index, step.assigned));
                }
            }
        }

        for (task, index, bot) in completed {
            self.finish_step(task, index, bot);
        }
        for task in burnt {
            warn!("Food burnt in task {}", task);
            self.cancel_with_disposal(task, snapshot);
        }
    }

    /// A pending pan installation whose cooker already shows an empty pan is
    /// done, along with the unstarted step fetching the pan for it. An unbound
    /// cooker slot falls back to any free cooker with an empty pan.
    fn skip_installed_pans(&mut self) {
        let mut skipped = Vec::new();
        for graph in self.graphs.values_mut().filter(|g| g.is_active()) {
            let Some(install) = graph.pending_install() else {
                continue;
            };
            let Some(slot) = graph.steps[install].slot else {
                continue;
            };
            let has_empty_pan = |occupancy: &Occupancy| occupancy.pan().is_some_and(|pan| pan.food.is_none());
            let bound = graph.slots[slot].bound;
            let ready = match bound {
                Some(pos) => self.stations.occupancy(&pos).is_some_and(has_empty_pan),
                None => {
                    let free_pan = self
                        .stations
                        .stations_of(StationRole::Cooker)
                        .any(|s| self.stations.is_available(&s.position, graph.id) && has_empty_pan(&s.occupancy));
                    if free_pan {
                        graph.slots[slot].need = SlotNeed::CookerWithEmptyPan;
                    }
                    free_pan
                }
            };
            if !ready {
                continue;
            }
            let feeder = graph.feeder(install).filter(|&index| !graph.steps[index].is_done());
            skipped.push((graph.id, install, feeder, feeder.and_then(|index| graph.steps[index].assigned)));
        }

        for (task, install, feeder, bot) in skipped {
            info!("Task {} finds a pan already on its cooker", task);
            if let Some(feeder) = feeder {
                self.finish_step(task, feeder, None);
            }
            if let Some(bot) = bot {
                self.allocator.release(bot);
            }
            if let Some(graph) = self.graphs.get_mut(&task) {
                graph.steps[install].pinned_to = None;
            }
            self.finish_step(task, install, None);
        }
    }

    /// Order graphs with a step that waited too long for a station no one can
    /// provide give up their order so it can be planned again.
    fn abandon_starved(&mut self, snapshot: &WorldSnapshot) {
        let starved: Vec<(TaskId, usize)> = self
            .graphs
            .values()
            .filter(|g| g.is_active() && g.goal.order().is_some())
            .filter_map(|g| {
                (0..g.steps.len())
                    .find(|&index| {
                        g.steps[index].waiting_turns >= self.config.max_wait_turns
                            && unsatisfiable(g, index, &self.stations)
                    })
                    .map(|index| (g.id, index))
            })
            .collect();

        for (task, step) in starved {
            warn!(
                "{}",
                EngineError::Blocked {
                    task,
                    step,
                    reason: "no station can serve it".to_string(),
                }
            );
            self.cancel_with_disposal(task, snapshot);
        }
    }

    /// Bots holding an item no graph expects get a disposal graph, or a
    /// delivery when the plate in hand matches a live order.
    fn dispose_orphans(&mut self, snapshot: &WorldSnapshot) {
        let carriers: HashSet<BotId> = self
            .graphs
            .values()
            .filter(|g| g.is_active())
            .flat_map(TaskGraph::carriers)
            .collect();

        let orphans: Vec<(BotId, Item)> = snapshot
            .controllable_bots()
            .filter(|b| !carriers.contains(&b.bot_id))
            .filter_map(|b| b.holding.clone().map(|item| (b.bot_id, item)))
            .collect();

        for (bot, item) in orphans {
            self.allocator.release(bot);
            for graph in self.graphs.values_mut() {
                graph.unassign(bot);
            }

            let reserved = self.reserved_positions();
            let ctx = PlanContext {
                snapshot,
                stations: &self.stations,
                reserved: &reserved,
                money: snapshot.money,
                pan_pending: false,
            };
            let id = self.next_task;

            let matching = item.as_plate().and_then(|plate| {
                self.orders
                    .active_orders(snapshot.turn)
                    .into_iter()
                    .find(|order| order.status == OrderStatus::Unclaimed && plate.matches(&order.required))
                    .cloned()
            });
            let graph = match matching {
                Some(order) => RecipePlanner::deliver(bot, &order, &ctx, id, self.orders.score(order.id, snapshot.turn))
                    .filter(|_| self.orders.claim(order.id, id)),
                None => None,
            };
            let graph =
                graph.unwrap_or_else(|| RecipePlanner::dispose(bot, &item, &ctx, id, self.config.dispose_priority));
            self.next_task += 1;
            self.insert_graph(graph);
        }
    }

    fn installing_pan(&self) -> bool {
        self.graphs
            .values()
            .any(|g| g.is_active() && g.pending_install().is_some())
    }

    fn committed_money(&self) -> i32 {
        self.graphs
            .values()
            .filter(|g| g.is_active())
            .map(RecipePlanner::planned_spend)
            .sum()
    }

    fn reserved_positions(&self) -> HashSet<Position> {
        self.graphs
            .values()
            .filter(|g| g.is_active())
            .flat_map(|g| g.slots.iter().filter_map(|slot| slot.bound))
            .collect()
    }

    /// Claim the best unclaimed orders that still fit in their deadline.
    fn plan_orders(&mut self, snapshot: &WorldSnapshot) {
        let bots = snapshot.controllable_bots().count();
        if bots == 0 {
            return;
        }
        let cap = self.config.order_cap(bots);
        let mut live = self
            .graphs
            .values()
            .filter(|g| g.is_active() && matches!(g.goal, TaskGoal::Order(_)))
            .count();
        let mut reserved = self.reserved_positions();
        let mut money = snapshot.money - self.committed_money();
        let mut pan_pending = self.installing_pan();

        let candidates: Vec<_> = self
            .orders
            .active_orders(snapshot.turn)
            .into_iter()
            .filter(|order| order.status == OrderStatus::Unclaimed)
            .cloned()
            .collect();

        for order in candidates {
            if live >= cap {
                break;
            }
            let needed = self.config.min_turns_for(order.required.len());
            if order.turns_remaining(snapshot.turn) < needed {
                debug!(
                    "Skipping order {}: {} turns left, needs {}",
                    order.id,
                    order.turns_remaining(snapshot.turn),
                    needed
                );
                continue;
            }

            let ctx = PlanContext {
                snapshot,
                stations: &self.stations,
                reserved: &reserved,
                money,
                pan_pending,
            };
            let score = self.orders.score(order.id, snapshot.turn);
            match RecipePlanner::plan(&order, &ctx, self.next_task, score) {
                Ok(graph) => {
                    let id = self.allocate_id();
                    money -= RecipePlanner::planned_spend(&graph);
                    reserved.extend(graph.slots.iter().filter_map(|slot| slot.bound));
                    pan_pending |= graph.pending_install().is_some();
                    self.orders.claim(order.id, id);
                    info!("Pursuing order {} {:?} as task {}", order.id, order.required, id);
                    self.insert_graph(graph);
                    live += 1;
                }
                Err(err) => debug!("{}", err),
            }
        }
    }

    /// Put a pan on a bare cooker when a bot has nothing better to do.
    fn plan_provision(&mut self, snapshot: &WorldSnapshot) {
        let busy = self.installing_pan()
            || self
                .graphs
                .values()
                .any(|g| g.is_active() && g.goal == TaskGoal::Provision);
        if busy || self.allocator.idle_count() == 0 {
            return;
        }
        let reserved = self.reserved_positions();
        let ctx = PlanContext {
            snapshot,
            stations: &self.stations,
            reserved: &reserved,
            money: snapshot.money - self.committed_money(),
            pan_pending: false,
        };
        if let Some(graph) = RecipePlanner::provision(&ctx, self.next_task, self.config.provision_priority) {
            self.allocate_id();
            info!("Task {} provisions a pan", graph.id);
            self.insert_graph(graph);
        }
    }

    /// Wash dirty plates while bots are idle and no clean plate is waiting.
    fn plan_wash(&mut self, snapshot: &WorldSnapshot) {
        let scrubbing = self.graphs.values().filter(|g| g.is_active()).any(|g| {
            g.steps
                .iter()
                .any(|s| s.capability == Capability::Wash(WashPhase::Scrub) && !s.is_done())
        });
        let clean_waiting = self
            .stations
            .stations_of(StationRole::SinkTable)
            .any(|s| s.occupancy.clean_plates() > 0);
        if scrubbing || clean_waiting || self.allocator.idle_count() == 0 {
            return;
        }
        let reserved = self.reserved_positions();
        let ctx = PlanContext {
            snapshot,
            stations: &self.stations,
            reserved: &reserved,
            money: snapshot.money,
            pan_pending: false,
        };
        if let Some(graph) = RecipePlanner::wash(&ctx, self.next_task, self.config.provision_priority) {
            self.allocate_id();
            info!("Task {} washes dishes", graph.id);
            self.insert_graph(graph);
        }
    }

    fn plan_switch(&mut self, snapshot: &WorldSnapshot) {
        if self.switch_scheduled || snapshot.turn < self.config.switch_min_turn || !snapshot.switch.can_switch() {
            return;
        }
        let value = self.switch_heuristic.value(snapshot, &self.orders.stats);
        if value <= 0.0 {
            return;
        }
        let id = self.allocate_id();
        info!("Scheduling map switch as task {} (value {:.2})", id, value);
        self.insert_graph(RecipePlanner::switch_maps(id, value));
        self.switch_scheduled = true;
    }

    fn refresh_priorities(&mut self) {
        for graph in self.graphs.values_mut() {
            if let TaskGoal::Order(order) = graph.goal {
                graph.priority = self.orders.score(order, self.turn);
            }
        }
    }

    /// Locked stations and the tasks holding them.
    pub fn locks(&self) -> Vec<(Position, TaskId)> {
        self.graphs
            .keys()
            .flat_map(|task| {
                self.stations
                    .locks_held_by(*task)
                    .into_iter()
                    .map(move |pos| (pos, *task))
            })
            .collect()
    }

    /// Food of `subject` sitting in a pan, if any graph is waiting on it.
    pub fn cooking(&self) -> Vec<(TaskId, Position, Subject)> {
        self.graphs
            .values()
            .filter_map(|g| g.cooking_station().map(|(pos, subject)| (g.id, pos, subject)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::Team;
    use crate::planner::capability::{Action, Source};
    use crate::planner::task_graph::GraphBuilder;
    use crate::state::{BotState, Food, FoodKind, Map, Plate, RawOrder, Tile, TileKind};

    fn snapshot(turn: i32) -> WorldSnapshot {
        let map = Map::from_ascii(
            "
            #C$##
            #...U
            #####
            ",
        );
        let mut snapshot = WorldSnapshot::new(turn, Team::Red, 100, map);
        snapshot.bots.push(BotState {
            bot_id: 1,
            position: Position::new(2, 1),
            holding: None,
            map_team: Team::Red,
        });
        snapshot.orders.push(RawOrder {
            order_id: 7,
            required: vec![crate::state::FoodKind::Sauce],
            created_turn: 0,
            expires_turn: 200,
            reward: 50,
            penalty: 5,
            claimed_by: None,
            completed_turn: None,
            is_active: true,
        });
        snapshot
    }

    #[test]
    fn test_first_turn_claims_order_and_acts() {
        let mut engine = KitchenEngine::new(EngineConfig::default());
        let decisions = engine.decide(&snapshot(1));
        assert_eq!(decisions.len(), 1);
        assert_eq!(engine.orders().get(7).unwrap().status, OrderStatus::Claimed(1));
        // No plate and no sink table: the plate is bought first.
        assert_eq!(decisions[0].action, Action::Buy {
            item: crate::state::ShopItem::Plate,
            x: 2,
            y: 0
        });
    }

    #[test]
    fn test_failures_back_off_then_abandon() {
        let config = EngineConfig {
            max_retries: 1,
            max_blocks: 1,
            ..EngineConfig::default()
        };
        let mut engine = KitchenEngine::new(config);
        let decisions = engine.decide(&snapshot(1));
        assert_eq!(decisions.len(), 1);
        engine.record_outcomes(&[Outcome {
            bot_id: 1,
            success: false,
        }]);
        assert!(engine.graphs().all(|g| !g.is_active()));
        assert_eq!(engine.orders().get(7).unwrap().status, OrderStatus::Unclaimed);
        assert!(engine.locks().is_empty());
    }

    #[test]
    fn test_switch_scheduled_once() {
        let config = EngineConfig::default();
        let mut engine = KitchenEngine::new(config);
        let mut snap = snapshot(330);
        snap.orders.clear();
        snap.switch.window_active = true;
        engine.orders.stats.completed = 2;
        let decisions = engine.decide(&snap);
        assert_eq!(decisions[0].action, Action::SwitchMaps);
        engine.record_outcomes(&[Outcome {
            bot_id: 1,
            success: true,
        }]);
        snap.turn = 331;
        assert!(engine.decide(&snap).is_empty());
    }

    #[test]
    fn test_plate_in_hand_is_delivered_to_matching_order() {
        let mut engine = KitchenEngine::new(EngineConfig::default());
        let mut snap = snapshot(1);
        snap.bots[0].holding = Some(Item::Plate(Plate {
            dirty: false,
            foods: vec![Food::raw(FoodKind::Sauce)],
        }));

        let decisions = engine.decide(&snap);
        let graph = engine.graphs().next().unwrap();
        assert_eq!(graph.goal, TaskGoal::Order(7));
        assert_eq!(graph.steps.len(), 1);
        assert_eq!(graph.steps[0].capability, Capability::Submit);
        assert_eq!(graph.steps[0].pinned_to, Some(1));
        assert_eq!(engine.orders().get(7).unwrap().status, OrderStatus::Claimed(graph.id));
        assert_eq!(decisions.len(), 1);
        assert!(decisions[0].action.is_move());
        assert_eq!(decisions[0].task, Some(graph.id));
    }

    #[test]
    fn test_contradicted_belief_cancels_and_replans() {
        let mut engine = KitchenEngine::new(EngineConfig::default());
        let mut snap = snapshot(1);
        let buy = engine.decide(&snap);
        assert!(matches!(buy[0].action, Action::Buy { .. }));
        engine.record_outcomes(&[Outcome {
            bot_id: 1,
            success: true,
        }]);

        snap.turn = 2;
        snap.bots[0].holding = Some(Item::Plate(Plate::clean()));
        let set = engine.decide(&snap);
        assert_eq!(set[0].action, Action::Place { x: 1, y: 0 });
        engine.record_outcomes(&[Outcome {
            bot_id: 1,
            success: true,
        }]);
        let first = set[0].task.unwrap();
        assert!(engine.locks().contains(&(Position::new(1, 0), first)));

        // The plate we set down is gone.
        snap.turn = 3;
        snap.bots[0].holding = None;
        engine.decide(&snap);
        assert!(engine.graph(first).is_none());
        let replanned = engine.graphs().find(|g| g.goal == TaskGoal::Order(7)).unwrap();
        assert_ne!(replanned.id, first);
        assert_eq!(engine.orders().get(7).unwrap().status, OrderStatus::Claimed(replanned.id));
        assert!(engine.locks().iter().all(|(_, task)| *task != first));
    }

    #[test]
    fn test_graph_waiting_on_missing_station_is_abandoned() {
        let mut engine = KitchenEngine::new(EngineConfig::default());
        let snap = snapshot(1);
        engine.orders.refresh(&snap.orders, 1);

        let mut builder = GraphBuilder::new();
        let source = builder.slot(StationRole::Box, SlotNeed::BoxOf(FoodKind::Meat));
        builder.step(Capability::Fetch(Source::Box), Subject::Food(FoodKind::Meat), Some(source), &[]);
        let mut graph = builder.build(1, TaskGoal::Order(7), 1.0);
        graph.steps[0].waiting_turns = engine.config.max_wait_turns;
        engine.graphs.insert(1, graph);
        engine.next_task = 2;
        assert!(engine.orders.claim(7, 1));

        assert!(engine.decide(&snap).is_empty());
        assert!(engine.graph(1).is_none());
        assert_eq!(engine.orders().get(7).unwrap().status, OrderStatus::Unclaimed);

        // Planned again from scratch on the next turn.
        engine.decide(&snapshot(2));
        assert_eq!(engine.orders().get(7).unwrap().status, OrderStatus::Claimed(2));
    }

    #[test]
    fn test_idle_bot_washes_dirty_plates() {
        let mut engine = KitchenEngine::new(EngineConfig::default());
        let mut snap = WorldSnapshot::new(
            1,
            Team::Red,
            100,
            Map::from_ascii(
                "
                #ST##
                #...U
                #####
                ",
            ),
        );
        let mut sink = Tile::new(TileKind::Sink);
        sink.dirty_plates = 2;
        snap.map.insert(Position::new(1, 0), sink.clone());
        snap.bots.push(BotState {
            bot_id: 1,
            position: Position::new(2, 1),
            holding: None,
            map_team: Team::Red,
        });

        let decisions = engine.decide(&snap);
        assert_eq!(decisions.len(), 1);
        assert_eq!(decisions[0].action, Action::WashSink { x: 1, y: 0 });
        let wash = decisions[0].task.unwrap();
        assert_eq!(engine.graph(wash).unwrap().goal, TaskGoal::Wash);
        engine.record_outcomes(&[Outcome {
            bot_id: 1,
            success: true,
        }]);

        snap.turn = 2;
        sink.dirty_plates = 1;
        snap.map.insert(Position::new(1, 0), sink);
        let mut table = Tile::new(TileKind::SinkTable);
        table.clean_plates = 1;
        snap.map.insert(Position::new(2, 0), table);

        assert!(engine.decide(&snap).is_empty());
        assert!(engine.graphs().next().is_none());
        assert!(engine.locks().is_empty());
        assert!(engine.bindings().all(|b| b.is_idle()));
    }
}

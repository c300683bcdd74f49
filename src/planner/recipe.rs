use std::collections::HashSet;

use tracing::debug;

use crate::error::EngineError;
use crate::infra::Position;
use crate::planner::capability::{Capability, ChopPhase, CookPhase, PlatePhase, Source, Subject, WashPhase};
use crate::planner::task_graph::{GraphBuilder, SlotId, SlotNeed, TaskGoal, TaskGraph};
use crate::state::{
    BotId, CookStage, Food, FoodKind, Item, Occupancy, OrderEntry, ShopItem, Station, StationRegistry, StationRole, TaskId,
    WorldSnapshot,
};

/// Everything the planner may look at. Read-only.
pub struct PlanContext<'a> {
    pub snapshot: &'a WorldSnapshot,
    pub stations: &'a StationRegistry,
    /// Stations other graphs already refer to.
    pub reserved: &'a HashSet<Position>,
    /// Money not yet earmarked by other graphs.
    pub money: i32,
    /// Another graph is already putting a pan on a cooker.
    pub pan_pending: bool,
}

impl PlanContext<'_> {
    fn has(&self, role: StationRole) -> bool {
        self.stations.stations_of(role).next().is_some()
    }

    fn any_station(&self, role: StationRole, pred: impl Fn(&Station) -> bool) -> bool {
        self.stations.stations_of(role).any(pred)
    }

    /// First unlocked, unreserved station of `role` whose contents satisfy `pred`.
    fn leftover(
        &self,
        role: StationRole,
        taken: &HashSet<Position>,
        pred: impl Fn(&Occupancy) -> bool,
    ) -> Option<(Position, Occupancy)> {
        self.stations
            .stations_of(role)
            .filter(|s| s.lock.is_none() && !taken.contains(&s.position) && !self.reserved.contains(&s.position))
            .find(|s| pred(&s.occupancy))
            .map(|s| (s.position, s.occupancy.clone()))
    }
}

/// Working state while one graph is assembled.
struct Draft {
    builder: GraphBuilder,
    taken: HashSet<Position>,
    spend: i32,
    installs_pan: bool,
    empty_counters: usize,
}

impl Draft {
    fn new() -> Self {
        Self {
            builder: GraphBuilder::new(),
            taken: HashSet::new(),
            spend: 0,
            installs_pan: false,
            empty_counters: 0,
        }
    }

    fn empty_counter(&mut self) -> SlotId {
        self.empty_counters += 1;
        self.builder.slot(StationRole::Counter, SlotNeed::EmptyCounter)
    }

    fn fixed(&mut self, role: StationRole, pos: Position) -> SlotId {
        self.taken.insert(pos);
        self.builder.slot(role, SlotNeed::Fixed(pos))
    }

    fn buy(&mut self, ctx: &PlanContext, item: ShopItem) -> Result<usize, String> {
        if !ctx.has(StationRole::Shop) {
            return Err(format!("no shop to buy {:?}", item));
        }
        self.spend += item.cost();
        let shop = self.builder.slot(StationRole::Shop, SlotNeed::Any);
        let subject = match item {
            ShopItem::Food(kind) => Subject::Food(kind),
            ShopItem::Plate => Subject::Plate,
            ShopItem::Pan => Subject::Pan,
        };
        Ok(self.builder.step(Capability::Buy(item), subject, Some(shop), &[]))
    }
}

/// Turns goals into task graphs.
pub struct RecipePlanner;

impl RecipePlanner {
    /// Decompose an order into parallel food lanes joined on one plate.
    #[tracing::instrument(level = "debug", skip(order, ctx, priority), fields(order = order.id))]
    pub fn plan(order: &OrderEntry, ctx: &PlanContext, id: TaskId, priority: f64) -> Result<TaskGraph, EngineError> {
        let unplannable = |reason: String| EngineError::Unplannable {
            order: order.id,
            reason,
        };
        if order.required.is_empty() {
            return Err(unplannable("order requires nothing".to_string()));
        }
        if !ctx.has(StationRole::Submit) {
            return Err(unplannable("no submit station".to_string()));
        }
        if !ctx.has(StationRole::Counter) {
            return Err(unplannable("no counter to assemble on".to_string()));
        }

        let mut draft = Draft::new();

        let clean_plate_on_counter = ctx.leftover(StationRole::Counter, &draft.taken, |o| {
            o.plate().is_some_and(|plate| plate.is_clean_and_empty())
        });
        let (assembly, plate_ready) = match clean_plate_on_counter {
            Some((pos, _)) => {
                debug!("Reusing clean plate on counter {:?}", pos);
                (draft.fixed(StationRole::Counter, pos), None)
            }
            None => {
                let assembly = draft.empty_counter();
                let acquire = Self::acquire_plate(&mut draft, ctx).map_err(unplannable)?;
                let set = draft
                    .builder
                    .step(Capability::Plate(PlatePhase::Set), Subject::Plate, Some(assembly), &[]);
                draft.builder.carry(acquire, set);
                (assembly, Some(set))
            }
        };

        let mut adds = Vec::new();
        for kind in &order.required {
            let ready = Self::food_lane(&mut draft, ctx, *kind).map_err(unplannable)?;
            if let Some(set) = plate_ready {
                draft.builder.after(ready, set);
            }
            let add = draft.builder.step(
                Capability::Plate(PlatePhase::AddFood),
                Subject::Food(*kind),
                Some(assembly),
                &[],
            );
            draft.builder.carry(ready, add);
            adds.push(add);
        }

        // Every chop lane and the assembly plate take a counter of their own.
        let free_counters = ctx
            .stations
            .stations_of(StationRole::Counter)
            .filter(|s| s.lock.is_none() && s.occupancy.is_empty())
            .filter(|s| !draft.taken.contains(&s.position) && !ctx.reserved.contains(&s.position))
            .count();
        if draft.empty_counters > free_counters {
            return Err(unplannable(format!(
                "needs {} free counters, {} available",
                draft.empty_counters, free_counters
            )));
        }

        let pick_up = draft
            .builder
            .step(Capability::Fetch(Source::Counter), Subject::Plate, Some(assembly), &adds);
        let submit_slot = draft.builder.slot(StationRole::Submit, SlotNeed::Any);
        let submit = draft
            .builder
            .step(Capability::Submit, Subject::Plate, Some(submit_slot), &[]);
        draft.builder.carry(pick_up, submit);

        if draft.spend > ctx.money {
            return Err(unplannable(format!(
                "needs {} money, {} available",
                draft.spend, ctx.money
            )));
        }

        debug!(
            "Planned order {} as {} steps (spend {})",
            order.id,
            draft.builder.len(),
            draft.spend
        );
        Ok(draft.builder.build(id, TaskGoal::Order(order.id), priority))
    }

    /// Step that ends with a clean plate in hand.
    fn acquire_plate(draft: &mut Draft, ctx: &PlanContext) -> Result<usize, String> {
        let table_has_plates = ctx.any_station(StationRole::SinkTable, |s| s.occupancy.clean_plates() > 0);
        if table_has_plates {
            let table = draft.builder.slot(StationRole::SinkTable, SlotNeed::CleanPlates);
            return Ok(draft
                .builder
                .step(Capability::Fetch(Source::SinkTable), Subject::Plate, Some(table), &[]));
        }

        let can_wash = ctx.has(StationRole::Sink) && ctx.has(StationRole::SinkTable);
        if can_wash && ctx.any_station(StationRole::Sink, |s| s.occupancy.dirty_plates() > 0) {
            let sink = draft.builder.slot(StationRole::Sink, SlotNeed::DirtySink);
            let scrub = draft
                .builder
                .step(Capability::Wash(WashPhase::Scrub), Subject::Nothing, Some(sink), &[]);
            let table = draft.builder.slot(StationRole::SinkTable, SlotNeed::CleanPlates);
            return Ok(draft
                .builder
                .step(Capability::Fetch(Source::SinkTable), Subject::Plate, Some(table), &[scrub]));
        }

        if can_wash
            && let Some((pos, _)) = ctx.leftover(StationRole::Counter, &draft.taken, |o| {
                o.plate().is_some_and(|plate| plate.dirty)
            })
        {
            let counter = draft.fixed(StationRole::Counter, pos);
            let fetch = draft
                .builder
                .step(Capability::Fetch(Source::Counter), Subject::Plate, Some(counter), &[]);
            let sink = draft.builder.slot(StationRole::Sink, SlotNeed::Any);
            let deposit = draft
                .builder
                .step(Capability::Wash(WashPhase::Deposit), Subject::Plate, Some(sink), &[]);
            draft.builder.carry(fetch, deposit);
            let scrub = draft
                .builder
                .step(Capability::Wash(WashPhase::Scrub), Subject::Nothing, Some(sink), &[deposit]);
            let table = draft.builder.slot(StationRole::SinkTable, SlotNeed::CleanPlates);
            return Ok(draft
                .builder
                .step(Capability::Fetch(Source::SinkTable), Subject::Plate, Some(table), &[scrub]));
        }

        draft.buy(ctx, ShopItem::Plate)
    }

    /// Steps that end with `kind` finished and in hand.
    fn food_lane(draft: &mut Draft, ctx: &PlanContext, kind: FoodKind) -> Result<usize, String> {
        let subject = Subject::Food(kind);

        if kind.can_cook()
            && let Some((pos, _)) = ctx.leftover(StationRole::Cooker, &draft.taken, |o| {
                o.pan_food()
                    .is_some_and(|food| food.kind == kind && !food.is_burnt() && !food.needs_chop())
            })
        {
            debug!("Reusing {:?} already in the pan at {:?}", kind, pos);
            let cooker = draft.fixed(StationRole::Cooker, pos);
            let wait = draft
                .builder
                .step(Capability::Cook(CookPhase::Wait), subject, Some(cooker), &[]);
            return Ok(draft
                .builder
                .step(Capability::Cook(CookPhase::Take), subject, Some(cooker), &[wait]));
        }

        let usable = |food: &Food| food.kind == kind && !food.is_burnt() && (food.is_finished() || food.stage == CookStage::Raw);
        let mut current = match ctx.leftover(StationRole::Counter, &draft.taken, |o| o.food().is_some_and(usable)) {
            Some((pos, occupancy)) => {
                debug!("Reusing {:?} left on counter {:?}", kind, pos);
                let counter = draft.fixed(StationRole::Counter, pos);
                let needs_chop = occupancy.food().is_some_and(Food::needs_chop);
                let cut = needs_chop.then(|| {
                    draft
                        .builder
                        .step(Capability::Chop(ChopPhase::Cut), subject, Some(counter), &[])
                });
                let after: Vec<usize> = cut.into_iter().collect();
                let fetch = draft
                    .builder
                    .step(Capability::Fetch(Source::Counter), subject, Some(counter), &after);
                if occupancy.food().is_some_and(Food::needs_cook) {
                    return Self::cook_segment(draft, ctx, kind, fetch);
                }
                return Ok(fetch);
            }
            None => {
                let stocked = ctx.any_station(StationRole::Box, |s| {
                    matches!(&s.occupancy, Occupancy::Stocked { item, .. } if item.is_food_of(kind))
                });
                if stocked {
                    let source = draft.builder.slot(StationRole::Box, SlotNeed::BoxOf(kind));
                    draft
                        .builder
                        .step(Capability::Fetch(Source::Box), subject, Some(source), &[])
                } else {
                    draft.buy(ctx, ShopItem::Food(kind))?
                }
            }
        };

        if kind.can_chop() {
            let counter = draft.empty_counter();
            let lay = draft
                .builder
                .step(Capability::Chop(ChopPhase::Lay), subject, Some(counter), &[]);
            draft.builder.carry(current, lay);
            let cut = draft
                .builder
                .step(Capability::Chop(ChopPhase::Cut), subject, Some(counter), &[lay]);
            current = draft
                .builder
                .step(Capability::Fetch(Source::Counter), subject, Some(counter), &[cut]);
        }

        if kind.can_cook() {
            return Self::cook_segment(draft, ctx, kind, current);
        }
        Ok(current)
    }

    /// Start, wait and take, installing a pan first when no cooker has one
    /// and no other graph is about to install one.
    fn cook_segment(draft: &mut Draft, ctx: &PlanContext, kind: FoodKind, carried: usize) -> Result<usize, String> {
        if !ctx.has(StationRole::Cooker) {
            return Err(format!("no cooker for {:?}", kind));
        }
        let subject = Subject::Food(kind);
        let any_pan = ctx.any_station(StationRole::Cooker, |s| s.occupancy.pan().is_some());
        let bare_cooker = ctx.any_station(StationRole::Cooker, |s| s.occupancy.is_empty());

        let (cooker, install) = if !any_pan && bare_cooker && !draft.installs_pan && !ctx.pan_pending {
            draft.installs_pan = true;
            let cooker = draft.builder.slot(StationRole::Cooker, SlotNeed::CookerForPan);
            let pan = Self::acquire_pan(draft, ctx)?;
            let install = draft
                .builder
                .step(Capability::Cook(CookPhase::InstallPan), Subject::Pan, Some(cooker), &[]);
            draft.builder.carry(pan, install);
            (cooker, Some(install))
        } else {
            (draft.builder.slot(StationRole::Cooker, SlotNeed::CookerWithEmptyPan), None)
        };

        let start = draft.builder.step(
            Capability::Cook(CookPhase::Start),
            subject,
            Some(cooker),
            &install.into_iter().collect::<Vec<_>>(),
        );
        draft.builder.carry(carried, start);
        let wait = draft
            .builder
            .step(Capability::Cook(CookPhase::Wait), subject, Some(cooker), &[start]);
        Ok(draft
            .builder
            .step(Capability::Cook(CookPhase::Take), subject, Some(cooker), &[wait]))
    }

    fn acquire_pan(draft: &mut Draft, ctx: &PlanContext) -> Result<usize, String> {
        match ctx.leftover(StationRole::Counter, &draft.taken, |o| {
            o.item()
                .and_then(Item::as_pan)
                .is_some_and(|pan| pan.food.is_none())
        }) {
            Some((pos, _)) => {
                let counter = draft.fixed(StationRole::Counter, pos);
                Ok(draft
                    .builder
                    .step(Capability::Fetch(Source::Counter), Subject::Pan, Some(counter), &[]))
            }
            None => draft.buy(ctx, ShopItem::Pan),
        }
    }

    /// Get rid of whatever `bot` is stuck holding.
    pub fn dispose(bot: BotId, held: &Item, ctx: &PlanContext, id: TaskId, priority: f64) -> TaskGraph {
        let mut builder = GraphBuilder::new();
        let has_trash = ctx.has(StationRole::Trash);
        let store = |builder: &mut GraphBuilder| {
            let counter = builder.slot(StationRole::Counter, SlotNeed::EmptyCounter);
            builder.step(Capability::Store, Subject::Held, Some(counter), &[])
        };

        let first = match held {
            Item::Plate(plate) if plate.dirty && plate.foods.is_empty() && ctx.has(StationRole::Sink) => {
                let sink = builder.slot(StationRole::Sink, SlotNeed::Any);
                builder.step(Capability::Wash(WashPhase::Deposit), Subject::Plate, Some(sink), &[])
            }
            item if item.has_disposable_contents() && has_trash => {
                let trash = builder.slot(StationRole::Trash, SlotNeed::Any);
                let dump = builder.step(Capability::Trash, Subject::Held, Some(trash), &[]);
                if !matches!(item, Item::Food(_)) {
                    let keep = store(&mut builder);
                    builder.carry(dump, keep);
                }
                dump
            }
            _ => store(&mut builder),
        };
        builder.pin(first, bot);
        debug!("Bot {} disposes of {}", bot, held.label());
        builder.build(id, TaskGoal::Dispose, priority)
    }

    /// Take food out of a pan and throw it away.
    pub fn dispose_from_cooker(
        cooker: Position,
        subject: Subject,
        ctx: &PlanContext,
        id: TaskId,
        priority: f64,
    ) -> TaskGraph {
        let mut builder = GraphBuilder::new();
        let slot = builder.slot(StationRole::Cooker, SlotNeed::Fixed(cooker));
        let take = builder.step(Capability::Cook(CookPhase::Take), subject, Some(slot), &[]);
        let next = if ctx.has(StationRole::Trash) {
            let trash = builder.slot(StationRole::Trash, SlotNeed::Any);
            builder.step(Capability::Trash, Subject::Held, Some(trash), &[])
        } else {
            let counter = builder.slot(StationRole::Counter, SlotNeed::EmptyCounter);
            builder.step(Capability::Store, Subject::Held, Some(counter), &[])
        };
        builder.carry(take, next);
        builder.build(id, TaskGoal::Dispose, priority)
    }

    /// Deliver a plate already in hand that matches a live order.
    pub fn deliver(bot: BotId, order: &OrderEntry, ctx: &PlanContext, id: TaskId, priority: f64) -> Option<TaskGraph> {
        if !ctx.has(StationRole::Submit) {
            return None;
        }
        let mut builder = GraphBuilder::new();
        let slot = builder.slot(StationRole::Submit, SlotNeed::Any);
        let submit = builder.step(Capability::Submit, Subject::Plate, Some(slot), &[]);
        builder.pin(submit, bot);
        Some(builder.build(id, TaskGoal::Order(order.id), priority))
    }

    /// Put a pan on a cooker that has none.
    pub fn provision(ctx: &PlanContext, id: TaskId, priority: f64) -> Option<TaskGraph> {
        let (cooker_pos, _) = ctx.leftover(StationRole::Cooker, &HashSet::new(), Occupancy::is_empty)?;
        let mut draft = Draft::new();
        let cooker = draft.fixed(StationRole::Cooker, cooker_pos);
        let pan = Self::acquire_pan(&mut draft, ctx).ok()?;
        if draft.spend > ctx.money {
            return None;
        }
        let install = draft
            .builder
            .step(Capability::Cook(CookPhase::InstallPan), Subject::Pan, Some(cooker), &[]);
        draft.builder.carry(pan, install);
        Some(draft.builder.build(id, TaskGoal::Provision, priority))
    }

    /// Scrub the dirty plates waiting in a sink while nobody needs a bot.
    pub fn wash(ctx: &PlanContext, id: TaskId, priority: f64) -> Option<TaskGraph> {
        if !ctx.has(StationRole::SinkTable) {
            return None;
        }
        let (sink_pos, _) = ctx.leftover(StationRole::Sink, &HashSet::new(), |o| o.dirty_plates() > 0)?;
        let mut builder = GraphBuilder::new();
        let sink = builder.slot(StationRole::Sink, SlotNeed::Fixed(sink_pos));
        builder.step(Capability::Wash(WashPhase::Scrub), Subject::Nothing, Some(sink), &[]);
        Some(builder.build(id, TaskGoal::Wash, priority))
    }

    pub fn switch_maps(id: TaskId, priority: f64) -> TaskGraph {
        let mut builder = GraphBuilder::new();
        builder.step(Capability::SwitchMaps, Subject::Nothing, None, &[]);
        builder.build(id, TaskGoal::SwitchMaps, priority)
    }

    /// Money the graph still intends to spend.
    pub fn planned_spend(graph: &TaskGraph) -> i32 {
        graph
            .steps
            .iter()
            .filter(|step| !step.is_done())
            .filter_map(|step| match step.capability {
                Capability::Buy(item) => Some(item.cost()),
                _ => None,
            })
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::Team;
    use crate::state::{Map, OrderStatus, Pan, Tile, TileKind};

    fn order(required: Vec<FoodKind>) -> OrderEntry {
        OrderEntry {
            id: 1,
            required,
            created_turn: 0,
            expires_turn: 200,
            reward: 100,
            penalty: 10,
            status: OrderStatus::Unclaimed,
            provisional: false,
        }
    }

    fn kitchen(layout: &str) -> (WorldSnapshot, StationRegistry) {
        let snapshot = WorldSnapshot::new(1, Team::Red, 200, Map::from_ascii(layout));
        let mut stations = StationRegistry::new();
        stations.reconcile(&snapshot);
        (snapshot, stations)
    }

    fn capabilities(graph: &TaskGraph) -> Vec<Capability> {
        graph.steps.iter().map(|s| s.capability).collect()
    }

    #[test]
    fn test_sauce_with_plate_on_counter_is_three_steps() {
        let (mut snapshot, _) = kitchen(
            "
            #C$#
            #..U
            ",
        );
        snapshot.map.insert(
            Position::new(1, 0),
            Tile::with_item(TileKind::Counter, Item::Plate(crate::state::Plate::clean())),
        );
        let mut stations = StationRegistry::new();
        stations.reconcile(&snapshot);
        let reserved = HashSet::new();
        let ctx = PlanContext {
            snapshot: &snapshot,
            stations: &stations,
            reserved: &reserved,
            money: 100,
            pan_pending: false,
        };
        let graph = RecipePlanner::plan(&order(vec![FoodKind::Sauce]), &ctx, 1, 1.0).unwrap();
        assert_eq!(
            capabilities(&graph),
            vec![
                Capability::Buy(ShopItem::Food(FoodKind::Sauce)),
                Capability::Plate(PlatePhase::AddFood),
                Capability::Fetch(Source::Counter),
                Capability::Submit,
            ]
        );
    }

    #[test]
    fn test_meat_without_pan_buys_pan_before_cooking() {
        let (snapshot, stations) = kitchen(
            "
            #CCK$#
            #....U
            ",
        );
        let reserved = HashSet::new();
        let ctx = PlanContext {
            snapshot: &snapshot,
            stations: &stations,
            reserved: &reserved,
            money: 200,
            pan_pending: false,
        };
        let graph = RecipePlanner::plan(&order(vec![FoodKind::Meat]), &ctx, 1, 1.0).unwrap();
        let caps = capabilities(&graph);
        let buy_pan = caps.iter().position(|c| *c == Capability::Buy(ShopItem::Pan)).unwrap();
        let install = caps
            .iter()
            .position(|c| *c == Capability::Cook(CookPhase::InstallPan))
            .unwrap();
        let start = caps.iter().position(|c| *c == Capability::Cook(CookPhase::Start)).unwrap();
        assert!(graph.steps[install].after.contains(&buy_pan));
        assert!(graph.steps[start].after.contains(&install));
        assert_eq!(RecipePlanner::planned_spend(&graph), 80 + 4 + 2);
    }

    #[test]
    fn test_cooked_food_in_hand_waits_for_plate() {
        let (mut snapshot, _) = kitchen(
            "
            #CCK$#
            #....U
            ",
        );
        snapshot.map.insert(
            Position::new(3, 0),
            Tile::with_item(TileKind::Cooker, Item::Pan(Pan::default())),
        );
        let mut stations = StationRegistry::new();
        stations.reconcile(&snapshot);
        let reserved = HashSet::new();
        let ctx = PlanContext {
            snapshot: &snapshot,
            stations: &stations,
            reserved: &reserved,
            money: 200,
            pan_pending: false,
        };
        let graph = RecipePlanner::plan(&order(vec![FoodKind::Egg]), &ctx, 1, 1.0).unwrap();
        let caps = capabilities(&graph);
        assert!(!caps.contains(&Capability::Buy(ShopItem::Pan)));
        let set = caps.iter().position(|c| *c == Capability::Plate(PlatePhase::Set)).unwrap();
        let take = caps.iter().position(|c| *c == Capability::Cook(CookPhase::Take)).unwrap();
        assert!(graph.steps[take].after.contains(&set));
    }

    #[test]
    fn test_insufficient_money_is_unplannable() {
        let (snapshot, stations) = kitchen(
            "
            #CCK$#
            #....U
            ",
        );
        let reserved = HashSet::new();
        let ctx = PlanContext {
            snapshot: &snapshot,
            stations: &stations,
            reserved: &reserved,
            money: 20,
            pan_pending: false,
        };
        let result = RecipePlanner::plan(&order(vec![FoodKind::Meat]), &ctx, 1, 1.0);
        assert!(matches!(result, Err(EngineError::Unplannable { order: 1, .. })));
    }

    #[test]
    fn test_dispose_plate_keeps_container() {
        let (snapshot, stations) = kitchen(
            "
            #CX#
            #..U
            ",
        );
        let reserved = HashSet::new();
        let ctx = PlanContext {
            snapshot: &snapshot,
            stations: &stations,
            reserved: &reserved,
            money: 0,
            pan_pending: false,
        };
        let plate = Item::Plate(crate::state::Plate {
            dirty: false,
            foods: vec![Food::raw(FoodKind::Sauce)],
        });
        let graph = RecipePlanner::dispose(3, &plate, &ctx, 9, 100.0);
        assert_eq!(capabilities(&graph), vec![Capability::Trash, Capability::Store]);
        assert_eq!(graph.steps[0].pinned_to, Some(3));
        assert_eq!(graph.steps[0].hand_to, Some(1));
    }

    fn ctx<'a>(snapshot: &'a WorldSnapshot, stations: &'a StationRegistry, reserved: &'a HashSet<Position>) -> PlanContext<'a> {
        PlanContext {
            snapshot,
            stations,
            reserved,
            money: 200,
            pan_pending: false,
        }
    }

    fn washing_kitchen() -> (WorldSnapshot, StationRegistry) {
        let (mut snapshot, _) = kitchen(
            "
            #CST$#
            #....U
            ",
        );
        let mut sink = Tile::new(TileKind::Sink);
        sink.dirty_plates = 2;
        snapshot.map.insert(Position::new(2, 0), sink);
        let mut stations = StationRegistry::new();
        stations.reconcile(&snapshot);
        (snapshot, stations)
    }

    #[test]
    fn test_dirty_sink_is_scrubbed_before_buying_a_plate() {
        let (snapshot, stations) = washing_kitchen();
        let reserved = HashSet::new();
        let graph = RecipePlanner::plan(&order(vec![FoodKind::Sauce]), &ctx(&snapshot, &stations, &reserved), 1, 1.0).unwrap();
        let caps = capabilities(&graph);

        assert!(!caps.contains(&Capability::Buy(ShopItem::Plate)));
        let scrub = caps.iter().position(|c| *c == Capability::Wash(WashPhase::Scrub)).unwrap();
        let fetch = caps
            .iter()
            .position(|c| *c == Capability::Fetch(Source::SinkTable))
            .unwrap();
        let set = caps.iter().position(|c| *c == Capability::Plate(PlatePhase::Set)).unwrap();
        assert!(graph.steps[fetch].after.contains(&scrub));
        assert_eq!(graph.steps[fetch].hand_to, Some(set));
        let sink = graph.steps[scrub].slot.unwrap();
        assert_eq!(graph.slots[sink].need, SlotNeed::DirtySink);
    }

    #[test]
    fn test_idle_wash_scrubs_dirty_sink() {
        let (snapshot, stations) = washing_kitchen();
        let reserved = HashSet::new();
        let graph = RecipePlanner::wash(&ctx(&snapshot, &stations, &reserved), 4, 0.5).unwrap();
        assert_eq!(graph.goal, TaskGoal::Wash);
        assert_eq!(capabilities(&graph), vec![Capability::Wash(WashPhase::Scrub)]);
        assert_eq!(graph.slots[0].bound, Some(Position::new(2, 0)));

        let (clean, stations) = kitchen(
            "
            #CST$#
            #....U
            ",
        );
        assert!(RecipePlanner::wash(&ctx(&clean, &stations, &reserved), 4, 0.5).is_none());
    }

    #[test]
    fn test_chopping_needs_a_second_counter() {
        let (snapshot, stations) = kitchen(
            "
            #CB$#
            #...U
            ",
        );
        let reserved = HashSet::new();
        let result = RecipePlanner::plan(&order(vec![FoodKind::Onions]), &ctx(&snapshot, &stations, &reserved), 1, 1.0);
        assert!(matches!(result, Err(EngineError::Unplannable { order: 1, .. })));

        let (snapshot, stations) = kitchen(
            "
            #CC$#
            #...U
            ",
        );
        let graph = RecipePlanner::plan(&order(vec![FoodKind::Onions]), &ctx(&snapshot, &stations, &reserved), 1, 1.0).unwrap();
        assert!(capabilities(&graph).contains(&Capability::Chop(ChopPhase::Cut)));
    }

    #[test]
    fn test_pending_install_elsewhere_waits_for_pan() {
        let (snapshot, stations) = kitchen(
            "
            #CCK$#
            #....U
            ",
        );
        let reserved = HashSet::new();
        let mut context = ctx(&snapshot, &stations, &reserved);
        let first = RecipePlanner::plan(&order(vec![FoodKind::Egg]), &context, 1, 1.0).unwrap();
        assert!(capabilities(&first).contains(&Capability::Cook(CookPhase::InstallPan)));

        context.pan_pending = true;
        let second = RecipePlanner::plan(&order(vec![FoodKind::Egg]), &context, 2, 1.0).unwrap();
        assert!(!capabilities(&second).contains(&Capability::Cook(CookPhase::InstallPan)));
        assert!(!capabilities(&second).contains(&Capability::Buy(ShopItem::Pan)));
        assert!(second.slots.iter().any(|slot| slot.need == SlotNeed::CookerWithEmptyPan));
    }
}

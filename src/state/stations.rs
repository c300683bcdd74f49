use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::error::EngineError;
use crate::infra::Position;
use crate::state::items::{Food, FoodKind, Item, Pan, Plate};
use crate::state::map::{Tile, TileKind};
use crate::state::snapshot::WorldSnapshot;

pub type TaskId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StationRole {
    Cooker,
    Sink,
    SinkTable,
    Shop,
    Trash,
    Submit,
    Box,
    Counter,
}

impl StationRole {
    pub fn from_tile(kind: TileKind) -> Option<Self> {
        match kind {
            TileKind::Cooker => Some(StationRole::Cooker),
            TileKind::Sink => Some(StationRole::Sink),
            TileKind::SinkTable => Some(StationRole::SinkTable),
            TileKind::Shop => Some(StationRole::Shop),
            TileKind::Trash => Some(StationRole::Trash),
            TileKind::Submit => Some(StationRole::Submit),
            TileKind::Box => Some(StationRole::Box),
            TileKind::Counter => Some(StationRole::Counter),
            TileKind::Floor | TileKind::Wall => None,
        }
    }

    /// Stations a task must reserve before working on them.
    pub fn is_exclusive(&self) -> bool {
        matches!(self, StationRole::Cooker | StationRole::Counter | StationRole::Sink)
    }
}

/// What the engine last saw on a station.
#[derive(Debug, Clone, PartialEq)]
pub enum Occupancy {
    Empty,
    Holds(Item),
    Stocked { item: Item, count: u32 },
    Dishes { dirty: u32, clean: u32 },
}

impl Occupancy {
    pub fn from_tile(tile: &Tile) -> Self {
        match tile.kind {
            TileKind::Box => match &tile.item {
                Some(item) if tile.count > 0 => Occupancy::Stocked {
                    item: item.clone(),
                    count: tile.count,
                },
                _ => Occupancy::Empty,
            },
            TileKind::Sink => Occupancy::Dishes {
                dirty: tile.dirty_plates,
                clean: 0,
            },
            TileKind::SinkTable => Occupancy::Dishes {
                dirty: 0,
                clean: tile.clean_plates,
            },
            TileKind::Cooker => match &tile.item {
                Some(Item::Pan(pan)) => {
                    let mut pan = pan.clone();
                    if let Some(food) = pan.food.as_mut() {
                        food.advance_cook(tile.cook_progress);
                    }
                    Occupancy::Holds(Item::Pan(pan))
                }
                Some(item) => Occupancy::Holds(item.clone()),
                None => Occupancy::Empty,
            },
            _ => match &tile.item {
                Some(item) => Occupancy::Holds(item.clone()),
                None => Occupancy::Empty,
            },
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Occupancy::Empty)
    }

    pub fn item(&self) -> Option<&Item> {
        match self {
            Occupancy::Holds(item) => Some(item),
            Occupancy::Stocked { item, .. } => Some(item),
            _ => None,
        }
    }

    pub fn pan(&self) -> Option<&Pan> {
        self.item().and_then(Item::as_pan)
    }

    pub fn pan_food(&self) -> Option<&Food> {
        self.pan().and_then(|pan| pan.food.as_ref())
    }

    pub fn plate(&self) -> Option<&Plate> {
        match self {
            Occupancy::Holds(Item::Plate(plate)) => Some(plate),
            _ => None,
        }
    }

    pub fn food(&self) -> Option<&Food> {
        match self {
            Occupancy::Holds(Item::Food(food)) => Some(food),
            _ => None,
        }
    }

    /// Food of `kind` lying on the station or cooking in its pan.
    pub fn food_of(&self, kind: FoodKind) -> Option<&Food> {
        self.food()
            .or_else(|| self.pan_food())
            .filter(|food| food.kind == kind)
    }

    pub fn clean_plates(&self) -> u32 {
        match self {
            Occupancy::Dishes { clean, .. } => *clean,
            _ => 0,
        }
    }

    pub fn dirty_plates(&self) -> u32 {
        match self {
            Occupancy::Dishes { dirty, .. } => *dirty,
            _ => 0,
        }
    }
}

/// Contents the lock holder expects after its last successful action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expect {
    Pan,
    FoodIn(FoodKind),
    Plate,
    DirtyPlates,
}

impl Expect {
    pub fn holds(&self, occupancy: &Occupancy) -> bool {
        match self {
            Expect::Pan => occupancy.pan().is_some(),
            Expect::FoodIn(kind) => occupancy.food_of(*kind).is_some(),
            Expect::Plate => occupancy.plate().is_some(),
            Expect::DirtyPlates => occupancy.dirty_plates() > 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Station {
    pub position: Position,
    pub role: StationRole,
    pub occupancy: Occupancy,
    pub lock: Option<TaskId>,
    pub belief: Option<Expect>,
}

/// Index of interactable tiles by role with advisory per-task locks.
#[derive(Debug, Clone, Default)]
pub struct StationRegistry {
    stations: BTreeMap<Position, Station>,
    dimensions: Option<(i32, i32)>,
}

impl StationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refresh occupancy from the snapshot and drop beliefs it contradicts.
    /// Returns the tasks whose locks were cleared so they can be replanned.
    #[tracing::instrument(level = "debug", skip_all, fields(turn = snapshot.turn))]
    pub fn reconcile(&mut self, snapshot: &WorldSnapshot) -> Vec<(TaskId, EngineError)> {
        let dims = (snapshot.map.width, snapshot.map.height);
        if self.dimensions != Some(dims) {
            debug!("Indexing stations for {}x{} map", dims.0, dims.1);
            self.stations.clear();
            self.dimensions = Some(dims);
        }

        let mut stale = Vec::new();
        for (pos, tile) in snapshot.map.iter() {
            let Some(role) = StationRole::from_tile(tile.kind) else {
                continue;
            };
            let observed = Occupancy::from_tile(tile);
            let station = self.stations.entry(*pos).or_insert_with(|| Station {
                position: *pos,
                role,
                occupancy: Occupancy::Empty,
                lock: None,
                belief: None,
            });
            station.role = role;

            if let Some(expect) = station.belief
                && !expect.holds(&observed)
            {
                warn!(
                    "Stale belief at {:?}: expected {:?}, observed {:?}",
                    pos, expect, observed
                );
                station.belief = None;
                if let Some(task) = station.lock.take() {
                    stale.push((task, EngineError::StaleBelief { position: *pos }));
                }
            }
            station.occupancy = observed;
        }
        stale
    }

    pub fn locate(&self, role: StationRole) -> Vec<Position> {
        self.stations_of(role).map(|s| s.position).collect()
    }

    pub fn stations_of(&self, role: StationRole) -> impl Iterator<Item = &Station> {
        self.stations.values().filter(move |s| s.role == role)
    }

    pub fn occupancy(&self, pos: &Position) -> Option<&Occupancy> {
        self.stations.get(pos).map(|s| &s.occupancy)
    }

    pub fn lock_holder(&self, pos: &Position) -> Option<TaskId> {
        self.stations.get(pos).and_then(|s| s.lock)
    }

    /// Free for `task`: unlocked or already held by it.
    pub fn is_available(&self, pos: &Position, task: TaskId) -> bool {
        self.stations
            .get(pos)
            .is_some_and(|s| s.lock.is_none_or(|holder| holder == task))
    }

    pub fn try_lock(&mut self, pos: Position, task: TaskId) -> bool {
        let Some(station) = self.stations.get_mut(&pos) else {
            return false;
        };
        match station.lock {
            None => {
                debug!("Task {} locked {:?} {:?}", task, station.role, pos);
                station.lock = Some(task);
                true
            }
            Some(holder) => holder == task,
        }
    }

    /// Lock every position or none of them.
    pub fn try_lock_all(&mut self, positions: &[Position], task: TaskId) -> bool {
        if !positions.iter().all(|pos| self.is_available(pos, task)) {
            return false;
        }
        positions.iter().all(|pos| self.try_lock(*pos, task))
    }

    pub fn unlock(&mut self, pos: Position, task: TaskId) {
        if let Some(station) = self.stations.get_mut(&pos)
            && station.lock == Some(task)
        {
            debug!("Task {} released {:?} {:?}", task, station.role, pos);
            station.lock = None;
            station.belief = None;
        }
    }

    pub fn release_all(&mut self, task: TaskId) -> Vec<Position> {
        let held: Vec<Position> = self
            .stations
            .values()
            .filter(|s| s.lock == Some(task))
            .map(|s| s.position)
            .collect();
        for pos in &held {
            self.unlock(*pos, task);
        }
        held
    }

    pub fn locks_held_by(&self, task: TaskId) -> Vec<Position> {
        self.stations
            .values()
            .filter(|s| s.lock == Some(task))
            .map(|s| s.position)
            .collect()
    }

    pub fn clear_belief(&mut self, pos: Position, task: TaskId) {
        if let Some(station) = self.stations.get_mut(&pos)
            && station.lock == Some(task)
        {
            station.belief = None;
        }
    }

    /// Record what the lock holder's last successful action left on a station.
    pub fn set_belief(&mut self, pos: Position, task: TaskId, expect: Expect) {
        if let Some(station) = self.stations.get_mut(&pos)
            && station.lock == Some(task)
        {
            station.belief = Some(expect);
        }
    }
}

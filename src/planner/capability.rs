use serde::{Deserialize, Serialize};

use crate::infra::{Position, Step};
use crate::state::{Expect, FoodKind, Item, Occupancy, ShopItem, StationRole};

/// One primitive call issued for one bot on one turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Action {
    Move { dx: i32, dy: i32 },
    Pickup { x: i32, y: i32 },
    Place { x: i32, y: i32 },
    Trash { x: i32, y: i32 },
    Buy { item: ShopItem, x: i32, y: i32 },
    Chop { x: i32, y: i32 },
    StartCook { x: i32, y: i32 },
    TakeFromPan { x: i32, y: i32 },
    TakeCleanPlate { x: i32, y: i32 },
    PutDirtyPlateInSink { x: i32, y: i32 },
    WashSink { x: i32, y: i32 },
    AddFoodToPlate { x: i32, y: i32 },
    Submit { x: i32, y: i32 },
    SwitchMaps,
}

impl Action {
    pub fn step(step: Step) -> Self {
        Action::Move {
            dx: step.dx,
            dy: step.dy,
        }
    }

    pub fn is_move(&self) -> bool {
        matches!(self, Action::Move { .. })
    }
}

/// What a sub-step handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Subject {
    Nothing,
    Food(FoodKind),
    Plate,
    Pan,
    /// Whatever the bot currently holds.
    Held,
}

impl Subject {
    pub fn matches(&self, item: &Item) -> bool {
        match (self, item) {
            (Subject::Food(kind), Item::Food(food)) => food.kind == *kind,
            (Subject::Plate, Item::Plate(_)) => true,
            (Subject::Pan, Item::Pan(_)) => true,
            (Subject::Held, _) => true,
            _ => false,
        }
    }

    pub fn food_kind(&self) -> Option<FoodKind> {
        match self {
            Subject::Food(kind) => Some(*kind),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
    Box,
    Counter,
    SinkTable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChopPhase {
    Lay,
    Cut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CookPhase {
    InstallPan,
    Start,
    Wait,
    Take,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlatePhase {
    Set,
    AddFood,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WashPhase {
    Deposit,
    Scrub,
}

/// The fixed set of things a sub-step can ask a bot to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Buy(ShopItem),
    Fetch(Source),
    Chop(ChopPhase),
    Cook(CookPhase),
    Plate(PlatePhase),
    Wash(WashPhase),
    Submit,
    Trash,
    Store,
    SwitchMaps,
}

/// Inputs for a precondition check, all taken from the current snapshot.
#[derive(Debug, Clone, Copy)]
pub struct Check<'a> {
    pub subject: Subject,
    pub holding: Option<&'a Item>,
    pub station: Option<&'a Occupancy>,
    pub money: i32,
}

impl Capability {
    pub fn name(&self) -> String {
        match self {
            Capability::Buy(item) => format!("Buy({:?})", item),
            Capability::Fetch(source) => format!("Fetch({:?})", source),
            Capability::Chop(phase) => format!("Chop({:?})", phase),
            Capability::Cook(phase) => format!("Cook({:?})", phase),
            Capability::Plate(phase) => format!("Plate({:?})", phase),
            Capability::Wash(phase) => format!("Wash({:?})", phase),
            Capability::Submit => "Submit".to_string(),
            Capability::Trash => "Trash".to_string(),
            Capability::Store => "Store".to_string(),
            Capability::SwitchMaps => "SwitchMaps".to_string(),
        }
    }

    pub fn role(&self) -> Option<StationRole> {
        match self {
            Capability::Buy(_) => Some(StationRole::Shop),
            Capability::Fetch(Source::Box) => Some(StationRole::Box),
            Capability::Fetch(Source::Counter) => Some(StationRole::Counter),
            Capability::Fetch(Source::SinkTable) => Some(StationRole::SinkTable),
            Capability::Chop(_) | Capability::Plate(_) | Capability::Store => Some(StationRole::Counter),
            Capability::Cook(_) => Some(StationRole::Cooker),
            Capability::Wash(_) => Some(StationRole::Sink),
            Capability::Submit => Some(StationRole::Submit),
            Capability::Trash => Some(StationRole::Trash),
            Capability::SwitchMaps => None,
        }
    }

    /// Advanced by watching the world rather than by a bot.
    pub fn is_polling(&self) -> bool {
        matches!(self, Capability::Cook(CookPhase::Wait))
    }

    /// Keeps issuing its action until the world shows the result.
    pub fn is_repeated(&self) -> bool {
        matches!(self, Capability::Wash(WashPhase::Scrub))
    }

    /// Leaves a new item in the bot's hand.
    pub fn picks_up(&self) -> bool {
        matches!(
            self,
            Capability::Buy(_) | Capability::Fetch(_) | Capability::Cook(CookPhase::Take)
        )
    }

    /// Re-validate against the fresh snapshot right before acting.
    pub fn precondition(&self, check: &Check) -> Result<(), String> {
        let holding = check.holding;
        let station = check.station;
        let subject = check.subject;
        let held_matches = holding.is_some_and(|item| subject.matches(item));
        let empty_station = station.is_none_or(Occupancy::is_empty);

        let ok = match self {
            Capability::Buy(item) => {
                if check.money < item.cost() {
                    return Err(format!("needs {} money, team has {}", item.cost(), check.money));
                }
                holding.is_none()
            }
            Capability::Fetch(Source::Box) => {
                holding.is_none()
                    && matches!(station, Some(Occupancy::Stocked { item, count }) if *count > 0 && subject.matches(item))
            }
            Capability::Fetch(Source::Counter) => {
                holding.is_none() && station.and_then(Occupancy::item).is_some_and(|item| subject.matches(item))
            }
            Capability::Fetch(Source::SinkTable) => {
                holding.is_none() && station.is_some_and(|s| s.clean_plates() > 0)
            }
            Capability::Chop(ChopPhase::Lay) => held_matches && empty_station,
            Capability::Chop(ChopPhase::Cut) => {
                holding.is_none()
                    && station
                        .and_then(Occupancy::food)
                        .is_some_and(|food| Some(food.kind) == subject.food_kind() && food.needs_chop())
            }
            Capability::Cook(CookPhase::InstallPan) => {
                holding.and_then(Item::as_pan).is_some_and(|pan| pan.food.is_none()) && empty_station
            }
            Capability::Cook(CookPhase::Start) => {
                holding
                    .and_then(Item::as_food)
                    .is_some_and(|food| food.kind.can_cook() && Some(food.kind) == subject.food_kind())
                    && station.and_then(Occupancy::pan).is_some_and(|pan| pan.food.is_none())
            }
            Capability::Cook(CookPhase::Wait) => return Err("polled, never acted on".to_string()),
            Capability::Cook(CookPhase::Take) => {
                holding.is_none()
                    && station
                        .and_then(Occupancy::pan_food)
                        .is_some_and(|food| Some(food.kind) == subject.food_kind())
            }
            Capability::Plate(PlatePhase::Set) => {
                holding.and_then(Item::as_plate).is_some_and(|plate| !plate.dirty) && empty_station
            }
            Capability::Plate(PlatePhase::AddFood) => {
                held_matches && station.and_then(Occupancy::plate).is_some_and(|plate| !plate.dirty)
            }
            Capability::Wash(WashPhase::Deposit) => holding.and_then(Item::as_plate).is_some_and(|plate| plate.dirty),
            Capability::Wash(WashPhase::Scrub) => station.is_some_and(|s| s.dirty_plates() > 0),
            Capability::Submit => holding.and_then(Item::as_plate).is_some_and(|plate| !plate.dirty),
            Capability::Trash => holding.is_some(),
            Capability::Store => holding.is_some() && empty_station,
            Capability::SwitchMaps => true,
        };

        if ok {
            Ok(())
        } else {
            Err(format!(
                "{} on {:?} not possible: holding {:?}, station {:?}",
                self.name(),
                subject,
                holding.map(Item::label),
                station
            ))
        }
    }

    /// The call that performs this capability against `target`.
    pub fn emit(&self, target: Option<Position>) -> Option<Action> {
        if let Capability::SwitchMaps = self {
            return Some(Action::SwitchMaps);
        }
        let Position { x, y } = target?;
        let action = match self {
            Capability::Buy(item) => Action::Buy { item: *item, x, y },
            Capability::Fetch(Source::SinkTable) => Action::TakeCleanPlate { x, y },
            Capability::Fetch(_) => Action::Pickup { x, y },
            Capability::Chop(ChopPhase::Lay) => Action::Place { x, y },
            Capability::Chop(ChopPhase::Cut) => Action::Chop { x, y },
            Capability::Cook(CookPhase::InstallPan) => Action::Place { x, y },
            Capability::Cook(CookPhase::Start) => Action::StartCook { x, y },
            Capability::Cook(CookPhase::Wait) => return None,
            Capability::Cook(CookPhase::Take) => Action::TakeFromPan { x, y },
            Capability::Plate(PlatePhase::Set) => Action::Place { x, y },
            Capability::Plate(PlatePhase::AddFood) => Action::AddFoodToPlate { x, y },
            Capability::Wash(WashPhase::Deposit) => Action::PutDirtyPlateInSink { x, y },
            Capability::Wash(WashPhase::Scrub) => Action::WashSink { x, y },
            Capability::Submit => Action::Submit { x, y },
            Capability::Trash => Action::Trash { x, y },
            Capability::Store => Action::Place { x, y },
            Capability::SwitchMaps => Action::SwitchMaps,
        };
        Some(action)
    }

    /// What a successful action leaves on an exclusive station. `None`
    /// means the station no longer holds anything of ours.
    pub fn leaves_behind(&self, subject: Subject) -> Option<Expect> {
        match self {
            Capability::Chop(_) | Capability::Cook(CookPhase::Start) => subject.food_kind().map(Expect::FoodIn),
            Capability::Cook(CookPhase::InstallPan) | Capability::Cook(CookPhase::Take) => Some(Expect::Pan),
            Capability::Plate(_) => Some(Expect::Plate),
            Capability::Wash(WashPhase::Deposit) => Some(Expect::DirtyPlates),
            _ => None,
        }
    }

    /// Polling predicate: the world shows this step as done.
    pub fn observed_complete(&self, subject: Subject, station: Option<&Occupancy>, clean_plates: u32) -> bool {
        match self {
            Capability::Cook(CookPhase::Wait) => station
                .and_then(Occupancy::pan_food)
                .is_some_and(|food| Some(food.kind) == subject.food_kind() && !food.needs_cook()),
            Capability::Wash(WashPhase::Scrub) => clean_plates > 0,
            _ => false,
        }
    }
}

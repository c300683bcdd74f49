mod items;
mod map;
mod order_book;
mod snapshot;
mod stations;

pub use items::{BURN_PROGRESS, COOK_PROGRESS, CookStage, Food, FoodKind, Item, Pan, Plate, ShopItem};
pub use map::{Map, Tile, TileKind};
pub use order_book::{OrderBook, OrderEntry, OrderEvent, OrderStats, OrderStatus};
pub use snapshot::{BotId, BotState, OrderId, RawOrder, SwitchInfo, WorldSnapshot};
pub use stations::{Expect, Occupancy, Station, StationRegistry, StationRole, TaskId};

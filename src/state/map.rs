use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::infra::Position;
use crate::state::items::Item;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TileKind {
    Floor,
    Wall,
    Counter,
    Box,
    Sink,
    #[serde(rename = "SINKTABLE")]
    SinkTable,
    Cooker,
    Trash,
    Submit,
    Shop,
}

impl TileKind {
    pub fn is_walkable(&self) -> bool {
        matches!(self, TileKind::Floor | TileKind::Submit)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tile {
    pub kind: TileKind,
    #[serde(default)]
    pub item: Option<Item>,
    /// Stack size of a box.
    #[serde(default)]
    pub count: u32,
    #[serde(default)]
    pub dirty_plates: u32,
    #[serde(default)]
    pub clean_plates: u32,
    #[serde(default)]
    pub cook_progress: u32,
}

impl Tile {
    pub fn new(kind: TileKind) -> Self {
        Self {
            kind,
            item: None,
            count: 0,
            dirty_plates: 0,
            clean_plates: 0,
            cook_progress: 0,
        }
    }

    pub fn with_item(kind: TileKind, item: Item) -> Self {
        Self {
            item: Some(item),
            count: 1,
            ..Self::new(kind)
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(from = "MapWire", into = "MapWire")]
pub struct Map {
    pub width: i32,
    pub height: i32,
    tiles: HashMap<Position, Tile>,
}

impl Map {
    pub fn new(width: i32, height: i32) -> Self {
        Self {
            width,
            height,
            tiles: HashMap::new(),
        }
    }

    /// Parse a layout where each character is one tile. Unknown characters
    /// become walls.
    ///
    /// `.` floor, `#` wall, `C` counter, `B` box, `S` sink, `T` sink table,
    /// `K` cooker, `X` trash, `U` submit, `$` shop.
    pub fn from_ascii(layout: &str) -> Self {
        let rows: Vec<&str> = layout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect();
        let height = rows.len() as i32;
        let width = rows.iter().map(|r| r.chars().count()).max().unwrap_or(0) as i32;
        let mut map = Map::new(width, height);
        for (y, row) in rows.iter().enumerate() {
            for (x, ch) in row.chars().enumerate() {
                let kind = match ch {
                    '.' => TileKind::Floor,
                    'C' => TileKind::Counter,
                    'B' => TileKind::Box,
                    'S' => TileKind::Sink,
                    'T' => TileKind::SinkTable,
                    'K' => TileKind::Cooker,
                    'X' => TileKind::Trash,
                    'U' => TileKind::Submit,
                    '$' => TileKind::Shop,
                    _ => TileKind::Wall,
                };
                map.insert(Position::new(x as i32, y as i32), Tile::new(kind));
            }
        }
        map
    }

    pub fn get(&self, pos: &Position) -> Option<&Tile> {
        self.tiles.get(pos)
    }

    pub fn insert(&mut self, pos: Position, tile: Tile) -> Option<Tile> {
        self.tiles.insert(pos, tile)
    }

    pub fn in_bounds(&self, pos: &Position) -> bool {
        pos.x >= 0 && pos.x < self.width && pos.y >= 0 && pos.y < self.height
    }

    pub fn is_walkable(&self, pos: &Position) -> bool {
        self.get(pos).is_some_and(|tile| tile.kind.is_walkable())
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Position, &Tile)> {
        self.tiles.iter()
    }
}

#[derive(Serialize, Deserialize)]
struct MapWire {
    width: i32,
    height: i32,
    tiles: Vec<PlacedTile>,
}

#[derive(Serialize, Deserialize)]
struct PlacedTile {
    x: i32,
    y: i32,
    #[serde(flatten)]
    tile: Tile,
}

impl From<MapWire> for Map {
    fn from(wire: MapWire) -> Self {
        let mut map = Map::new(wire.width, wire.height);
        for placed in wire.tiles {
            map.insert(Position::new(placed.x, placed.y), placed.tile);
        }
        map
    }
}

impl From<Map> for MapWire {
    fn from(map: Map) -> Self {
        let mut tiles: Vec<PlacedTile> = map
            .tiles
            .into_iter()
            .map(|(pos, tile)| PlacedTile {
                x: pos.x,
                y: pos.y,
                tile,
            })
            .collect();
        tiles.sort_by_key(|t| (t.y, t.x));
        MapWire {
            width: map.width,
            height: map.height,
            tiles,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_layout_parsing() {
        let map = Map::from_ascii(
            "
            #$#
            C.K
            #U#
            ",
        );
        assert_eq!(map.width, 3);
        assert_eq!(map.height, 3);
        assert_eq!(map.get(&Position::new(1, 0)).unwrap().kind, TileKind::Shop);
        assert_eq!(map.get(&Position::new(2, 1)).unwrap().kind, TileKind::Cooker);
        assert!(map.is_walkable(&Position::new(1, 1)));
        assert!(map.is_walkable(&Position::new(1, 2)));
        assert!(!map.is_walkable(&Position::new(0, 1)));
    }

    #[test]
    fn test_map_wire_format_uses_tile_list() {
        let json = r#"{"width":2,"height":1,"tiles":[
            {"x":0,"y":0,"kind":"FLOOR"},
            {"x":1,"y":0,"kind":"SINKTABLE","clean_plates":3}
        ]}"#;
        let map: Map = serde_json::from_str(json).unwrap();
        let table = map.get(&Position::new(1, 0)).unwrap();
        assert_eq!(table.kind, TileKind::SinkTable);
        assert_eq!(table.clean_plates, 3);
    }
}

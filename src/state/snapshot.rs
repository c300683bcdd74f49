use serde::{Deserialize, Serialize};

use crate::infra::{Position, Team};
use crate::state::items::{FoodKind, Item};
use crate::state::map::{Map, Tile};

pub type BotId = i32;
pub type OrderId = i32;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotState {
    pub bot_id: BotId,
    #[serde(flatten)]
    pub position: Position,
    #[serde(default)]
    pub holding: Option<Item>,
    pub map_team: Team,
}

/// An order as reported by the game each turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawOrder {
    pub order_id: OrderId,
    pub required: Vec<FoodKind>,
    pub created_turn: i32,
    pub expires_turn: i32,
    pub reward: i32,
    pub penalty: i32,
    #[serde(default)]
    pub claimed_by: Option<i32>,
    #[serde(default)]
    pub completed_turn: Option<i32>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwitchInfo {
    pub switch_turn: i32,
    pub switch_duration: i32,
    pub window_active: bool,
    pub my_team_switched: bool,
    #[serde(default)]
    pub enemy_team_switched: bool,
}

impl SwitchInfo {
    pub fn can_switch(&self) -> bool {
        self.window_active && !self.my_team_switched
    }
}

impl Default for SwitchInfo {
    fn default() -> Self {
        Self {
            switch_turn: 250,
            switch_duration: 100,
            window_active: false,
            my_team_switched: false,
            enemy_team_switched: false,
        }
    }
}

/// Read-only view of the kitchen for one turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldSnapshot {
    pub turn: i32,
    pub team: Team,
    #[serde(rename = "team_money")]
    pub money: i32,
    pub map: Map,
    pub bots: Vec<BotState>,
    #[serde(default)]
    pub enemy_bots: Vec<BotState>,
    #[serde(default)]
    pub orders: Vec<RawOrder>,
    #[serde(default)]
    pub switch: SwitchInfo,
}

impl WorldSnapshot {
    pub fn new(turn: i32, team: Team, money: i32, map: Map) -> Self {
        Self {
            turn,
            team,
            money,
            map,
            bots: Vec::new(),
            enemy_bots: Vec::new(),
            orders: Vec::new(),
            switch: SwitchInfo::default(),
        }
    }

    pub fn opponent(&self) -> Team {
        self.team.opponent()
    }

    pub fn bot(&self, id: BotId) -> Option<&BotState> {
        self.bots.iter().find(|b| b.bot_id == id)
    }

    pub fn tile(&self, pos: &Position) -> Option<&Tile> {
        self.map.get(pos)
    }

    /// Bots on our own map that this engine may drive.
    pub fn controllable_bots(&self) -> impl Iterator<Item = &BotState> {
        self.bots.iter().filter(move |b| b.map_team == self.team)
    }

    /// Positions occupied by any bot on our map.
    pub fn bot_positions(&self) -> Vec<Position> {
        self.bots
            .iter()
            .chain(self.enemy_bots.iter())
            .filter(|b| b.map_team == self.team)
            .map(|b| b.position)
            .collect()
    }

    pub fn is_walkable(&self, pos: &Position) -> bool {
        self.map.is_walkable(pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_wire_format() {
        let json = r#"{
            "turn": 7,
            "team": "RED",
            "team_money": 150,
            "map": {"width":1,"height":1,"tiles":[{"x":0,"y":0,"kind":"FLOOR"}]},
            "bots": [{"bot_id": 1, "x": 0, "y": 0, "holding": null, "map_team": "RED"}],
            "orders": [{"order_id": 3, "required": ["SAUCE"], "created_turn": 0,
                        "expires_turn": 90, "reward": 50, "penalty": 5, "is_active": true}]
        }"#;
        let snapshot: WorldSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snapshot.turn, 7);
        assert_eq!(snapshot.opponent(), Team::Blue);
        assert_eq!(snapshot.bot(1).unwrap().position, Position::new(0, 0));
        assert_eq!(snapshot.orders[0].required, vec![FoodKind::Sauce]);
        assert!(!snapshot.switch.can_switch());
    }
}

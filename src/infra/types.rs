use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// King-move distance. Interactions reach any tile at Chebyshev distance 1.
    pub fn chebyshev(&self, other: &Position) -> i32 {
        (self.x - other.x).abs().max((self.y - other.y).abs())
    }

    pub fn neighbors(&self) -> [Position; 4] {
        [
            Position::new(self.x, self.y - 1), // North
            Position::new(self.x + 1, self.y), // East
            Position::new(self.x, self.y + 1), // South
            Position::new(self.x - 1, self.y), // West
        ]
    }

    pub fn diagonal_neighbors(&self) -> [Position; 4] {
        [
            Position::new(self.x + 1, self.y - 1),
            Position::new(self.x + 1, self.y + 1),
            Position::new(self.x - 1, self.y + 1),
            Position::new(self.x - 1, self.y - 1),
        ]
    }

    /// True when an interaction from `self` can target `other`.
    pub fn is_adjacent(&self, other: &Position) -> bool {
        self.chebyshev(other) <= 1
    }

    pub fn offset(&self, step: Step) -> Position {
        Position::new(self.x + step.dx, self.y + step.dy)
    }
}

/// Single-tile displacement issued with a move action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Step {
    pub dx: i32,
    pub dy: i32,
}

impl Step {
    pub fn between(from: Position, to: Position) -> Self {
        Self {
            dx: (to.x - from.x).signum(),
            dy: (to.y - from.y).signum(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Team {
    Red,
    Blue,
}

impl Team {
    pub fn opponent(&self) -> Team {
        match self {
            Team::Red => Team::Blue,
            Team::Blue => Team::Red,
        }
    }
}

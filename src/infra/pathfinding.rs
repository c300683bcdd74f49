use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};

use crate::infra::{Position, Step};
use crate::state::Map;

#[derive(Clone, Eq, PartialEq)]
struct Node {
    pos: Position,
    f_score: i32,
    g_score: i32,
}

impl Ord for Node {
    fn cmp(&self, other: &Self) -> Ordering {
        // Min-heap on f, then prefer deeper nodes; position keeps the order total.
        other
            .f_score
            .cmp(&self.f_score)
            .then(self.g_score.cmp(&other.g_score))
            .then(other.pos.cmp(&self.pos))
    }
}

impl PartialOrd for Node {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Result of asking for the next move toward a station.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextStep {
    /// Already within interaction range.
    Adjacent,
    Move(Step),
    NoPath,
}

pub struct AStar;

impl AStar {
    /// Shortest path from `start` to any walkable tile within interaction
    /// range of `target`. The returned path starts with `start`.
    pub fn find_path_to_station<F>(
        map: &Map,
        start: Position,
        target: Position,
        diagonal: bool,
        is_walkable: F,
    ) -> Option<Vec<Position>>
    where
        F: Fn(&Position) -> bool,
    {
        if start.is_adjacent(&target) {
            return Some(vec![start]);
        }

        let mut open_set = BinaryHeap::new();
        let mut came_from: HashMap<Position, Position> = HashMap::new();
        let mut g_score: HashMap<Position, i32> = HashMap::new();
        let mut closed_set: HashSet<Position> = HashSet::new();

        g_score.insert(start, 0);
        open_set.push(Node {
            pos: start,
            f_score: heuristic(start, target),
            g_score: 0,
        });

        const MAX_EXPANSIONS: usize = 5000;
        let mut expansions = 0;

        while let Some(Node { pos: current, .. }) = open_set.pop() {
            if current.is_adjacent(&target) {
                return Some(reconstruct_path(&came_from, current));
            }

            if !closed_set.insert(current) {
                continue;
            }

            expansions += 1;
            if expansions > MAX_EXPANSIONS {
                return None;
            }

            let current_g_score = *g_score.get(&current).unwrap_or(&0);

            let diagonals = if diagonal {
                current.diagonal_neighbors().to_vec()
            } else {
                Vec::new()
            };
            for neighbor in current.neighbors().into_iter().chain(diagonals) {
                if closed_set.contains(&neighbor) || !map.in_bounds(&neighbor) {
                    continue;
                }
                if !is_walkable(&neighbor) {
                    continue;
                }

                let tentative_g = current_g_score + 1;
                if tentative_g < *g_score.get(&neighbor).unwrap_or(&i32::MAX) {
                    came_from.insert(neighbor, current);
                    g_score.insert(neighbor, tentative_g);
                    open_set.push(Node {
                        pos: neighbor,
                        f_score: tentative_g + heuristic(neighbor, target),
                        g_score: tentative_g,
                    });
                }
            }
        }

        None
    }

    /// The single move that starts a shortest path toward `target`, treating
    /// `obstacles` (other bots) as blocked for this turn.
    pub fn next_step(
        map: &Map,
        from: Position,
        target: Position,
        obstacles: &[Position],
        diagonal: bool,
    ) -> NextStep {
        if from.is_adjacent(&target) {
            return NextStep::Adjacent;
        }
        let blocked: HashSet<Position> = obstacles.iter().copied().filter(|p| *p != from).collect();
        let path = Self::find_path_to_station(map, from, target, diagonal, |pos| {
            map.is_walkable(pos) && !blocked.contains(pos)
        });
        match path {
            Some(path) if path.len() >= 2 => NextStep::Move(Step::between(from, path[1])),
            Some(_) => NextStep::Adjacent,
            None => NextStep::NoPath,
        }
    }

    /// Travel turns to reach `target`, ignoring bots.
    pub fn travel_turns(map: &Map, from: Position, target: Position, diagonal: bool) -> Option<i32> {
        Self::find_path_to_station(map, from, target, diagonal, |pos| map.is_walkable(pos))
            .map(|path| path.len() as i32 - 1)
    }
}

/// Admissible for both 4- and 8-connected movement: every move shrinks the
/// Chebyshev distance by at most one and we stop one tile short.
fn heuristic(a: Position, target: Position) -> i32 {
    (a.chebyshev(&target) - 1).max(0)
}

fn reconstruct_path(came_from: &HashMap<Position, Position>, mut current: Position) -> Vec<Position> {
    let mut path = vec![current];
    while let Some(&prev) = came_from.get(&current) {
        path.push(prev);
        current = prev;
    }
    path.reverse();
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corridor() -> Map {
        Map::from_ascii(
            "
            #######
            #.....K
            #.###.#
            #.....#
            #######
            ",
        )
    }

    #[test]
    fn test_next_step_heads_toward_station() {
        let map = corridor();
        let step = AStar::next_step(&map, Position::new(1, 1), Position::new(6, 1), &[], false);
        assert_eq!(step, NextStep::Move(Step { dx: 1, dy: 0 }));
    }

    #[test]
    fn test_adjacent_returns_no_move() {
        let map = corridor();
        let step = AStar::next_step(&map, Position::new(5, 1), Position::new(6, 1), &[], false);
        assert_eq!(step, NextStep::Adjacent);
        let diagonal = AStar::next_step(&map, Position::new(5, 2), Position::new(6, 1), &[], false);
        assert_eq!(diagonal, NextStep::Adjacent);
    }

    #[test]
    fn test_bots_force_detour() {
        let map = corridor();
        let blocker = Position::new(2, 1);
        let step = AStar::next_step(&map, Position::new(1, 1), Position::new(6, 1), &[blocker], false);
        assert_eq!(step, NextStep::Move(Step { dx: 0, dy: 1 }));
    }

    #[test]
    fn test_boxed_in_has_no_path() {
        let map = corridor();
        let obstacles = [Position::new(2, 1), Position::new(1, 2)];
        let step = AStar::next_step(&map, Position::new(1, 1), Position::new(6, 1), &obstacles, false);
        assert_eq!(step, NextStep::NoPath);
    }

    #[test]
    fn test_travel_turns_counts_moves() {
        let map = corridor();
        assert_eq!(AStar::travel_turns(&map, Position::new(1, 1), Position::new(6, 1), false), Some(4));
        assert_eq!(AStar::travel_turns(&map, Position::new(1, 3), Position::new(6, 1), true), Some(4));
    }
}

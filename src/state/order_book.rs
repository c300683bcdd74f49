use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use crate::state::items::FoodKind;
use crate::state::snapshot::{OrderId, RawOrder};
use crate::state::stations::TaskId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    Unclaimed,
    Claimed(TaskId),
    Completed { turn: i32 },
    Expired,
}

#[derive(Debug, Clone)]
pub struct OrderEntry {
    pub id: OrderId,
    pub required: Vec<FoodKind>,
    pub created_turn: i32,
    pub expires_turn: i32,
    pub reward: i32,
    pub penalty: i32,
    pub status: OrderStatus,
    /// Completed on our own submit outcome, not yet seen in the game's list.
    pub provisional: bool,
}

impl OrderEntry {
    fn from_raw(raw: &RawOrder) -> Self {
        Self {
            id: raw.order_id,
            required: raw.required.clone(),
            created_turn: raw.created_turn,
            expires_turn: raw.expires_turn,
            reward: raw.reward,
            penalty: raw.penalty,
            status: OrderStatus::Unclaimed,
            provisional: false,
        }
    }

    pub fn turns_remaining(&self, turn: i32) -> i32 {
        self.expires_turn - turn
    }

    /// `reward / r - weight / r` with `r = max(1, turns remaining)`.
    pub fn score(&self, turn: i32, penalty_risk_weight: f64) -> f64 {
        let remaining = self.turns_remaining(turn).max(1) as f64;
        self.reward as f64 / remaining - penalty_risk_weight * (1.0 / remaining)
    }

    pub fn is_live(&self) -> bool {
        matches!(self.status, OrderStatus::Unclaimed | OrderStatus::Claimed(_))
    }

    fn same_foods(&self, other: &OrderEntry) -> bool {
        let mut mine = self.required.clone();
        let mut theirs = other.required.clone();
        mine.sort();
        theirs.sort();
        mine == theirs
    }

    pub fn claimed_task(&self) -> Option<TaskId> {
        match self.status {
            OrderStatus::Claimed(task) => Some(task),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderEvent {
    Expired {
        order: OrderId,
        task: Option<TaskId>,
    },
    /// Vanished from the game's list before its deadline.
    Retired {
        order: OrderId,
        task: Option<TaskId>,
    },
    Completed {
        order: OrderId,
        task: Option<TaskId>,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OrderStats {
    pub completed: u32,
    pub expired: u32,
    pub rewards_earned: i64,
    pub penalties_incurred: i64,
}

/// Live view of the order queue with claim tracking.
#[derive(Debug, Clone)]
pub struct OrderBook {
    entries: BTreeMap<OrderId, OrderEntry>,
    penalty_risk_weight: f64,
    pub stats: OrderStats,
}

impl OrderBook {
    pub fn new(penalty_risk_weight: f64) -> Self {
        Self {
            entries: BTreeMap::new(),
            penalty_risk_weight,
            stats: OrderStats::default(),
        }
    }

    /// Ingest the game's order list. Expiry wins over in-progress work: any
    /// live order at or past its deadline that the game no longer lists as
    /// active expires here, whoever holds the claim.
    #[tracing::instrument(level = "debug", skip(self, raw_orders), fields(count = raw_orders.len()))]
    pub fn refresh(&mut self, raw_orders: &[RawOrder], turn: i32) -> Vec<OrderEvent> {
        let mut events = Vec::new();
        let mut credited = Vec::new();

        for raw in raw_orders {
            match self.entries.get_mut(&raw.order_id) {
                None => {
                    if raw.completed_turn.is_some() || !raw.is_active || turn > raw.expires_turn {
                        continue;
                    }
                    debug!("New order {} requires {:?}", raw.order_id, raw.required);
                    self.entries.insert(raw.order_id, OrderEntry::from_raw(raw));
                }
                Some(entry) if entry.is_live() => {
                    entry.expires_turn = raw.expires_turn;
                    entry.reward = raw.reward;
                    entry.penalty = raw.penalty;
                    if let Some(completed) = raw.completed_turn
                        && completed <= entry.expires_turn
                    {
                        credited.push((entry.id, completed));
                    }
                }
                Some(entry) => {
                    if entry.provisional && raw.completed_turn.is_some() {
                        entry.provisional = false;
                    }
                }
            }
        }

        for (order, completed) in credited {
            self.credit(order, completed, &mut events);
        }

        let listed = |id: OrderId| {
            raw_orders
                .iter()
                .any(|raw| raw.order_id == id && (raw.is_active || raw.completed_turn.is_some()))
        };

        for entry in self.entries.values_mut() {
            let overdue = turn > entry.expires_turn || (turn >= entry.expires_turn && !listed(entry.id));
            if entry.is_live() && overdue {
                let task = entry.claimed_task();
                entry.status = OrderStatus::Expired;
                self.stats.expired += 1;
                self.stats.penalties_incurred += entry.penalty as i64;
                warn!("Order {} expired (penalty {})", entry.id, entry.penalty);
                events.push(OrderEvent::Expired {
                    order: entry.id,
                    task,
                });
            }
        }

        let retired: Vec<OrderId> = self
            .entries
            .values()
            .filter(|entry| entry.is_live() && !listed(entry.id))
            .map(|entry| entry.id)
            .collect();
        for id in retired {
            if let Some(entry) = self.entries.remove(&id) {
                debug!("Order {} left the queue before its deadline", id);
                events.push(OrderEvent::Retired {
                    order: id,
                    task: entry.claimed_task(),
                });
            }
        }

        events
    }

    /// The game reports `order` completed. A provisional completion of
    /// another order with the same foods was this same submit, so it is
    /// moved over and that order goes back to the pool.
    fn credit(&mut self, order: OrderId, completed: i32, events: &mut Vec<OrderEvent>) {
        let Some(entry) = self.entries.get(&order) else {
            return;
        };
        let stand_in = self
            .entries
            .values()
            .filter(|other| other.id != order && other.provisional && other.same_foods(entry))
            .min_by_key(|other| match other.status {
                OrderStatus::Completed { turn } => (turn - completed).abs(),
                _ => i32::MAX,
            })
            .map(|other| other.id);

        if let Some(other) = stand_in
            && let Some(reverted) = self.entries.get_mut(&other)
        {
            reverted.status = OrderStatus::Unclaimed;
            reverted.provisional = false;
            self.stats.completed -= 1;
            self.stats.rewards_earned -= reverted.reward as i64;
            info!("Submit credited to order {} rather than {}", order, other);
        }

        if let Some(entry) = self.entries.get_mut(&order) {
            let task = entry.claimed_task();
            entry.status = OrderStatus::Completed { turn: completed };
            self.stats.completed += 1;
            self.stats.rewards_earned += entry.reward as i64;
            info!("Order {} reported completed on turn {}", entry.id, completed);
            events.push(OrderEvent::Completed {
                order: entry.id,
                task,
            });
        }
    }

    /// Live orders, best score first, earlier expiry breaking ties.
    pub fn active_orders(&self, turn: i32) -> Vec<&OrderEntry> {
        let mut orders: Vec<&OrderEntry> = self.entries.values().filter(|e| e.is_live()).collect();
        orders.sort_by(|a, b| {
            b.score(turn, self.penalty_risk_weight)
                .total_cmp(&a.score(turn, self.penalty_risk_weight))
                .then(a.expires_turn.cmp(&b.expires_turn))
                .then(a.id.cmp(&b.id))
        });
        orders
    }

    pub fn score(&self, order: OrderId, turn: i32) -> f64 {
        self.entries
            .get(&order)
            .map_or(0.0, |e| e.score(turn, self.penalty_risk_weight))
    }

    pub fn get(&self, order: OrderId) -> Option<&OrderEntry> {
        self.entries.get(&order)
    }

    pub fn claim(&mut self, order: OrderId, task: TaskId) -> bool {
        match self.entries.get_mut(&order) {
            Some(entry) if entry.status == OrderStatus::Unclaimed => {
                entry.status = OrderStatus::Claimed(task);
                info!("Order {} claimed by task {}", order, task);
                true
            }
            _ => false,
        }
    }

    /// Return a claimed order to the pool, e.g. after its task graph failed.
    pub fn release(&mut self, order: OrderId, task: TaskId) {
        if let Some(entry) = self.entries.get_mut(&order)
            && entry.status == OrderStatus::Claimed(task)
        {
            debug!("Order {} released by task {}", order, task);
            entry.status = OrderStatus::Unclaimed;
        }
    }

    /// A submit made for `order` succeeded on `turn`. The game may credit a
    /// different order with the same foods, so this stays provisional until
    /// the next `refresh` sees it.
    pub fn confirm_submit(&mut self, order: OrderId, turn: i32) -> bool {
        match self.entries.get_mut(&order) {
            Some(entry) if entry.is_live() && turn <= entry.expires_turn => {
                entry.status = OrderStatus::Completed { turn };
                entry.provisional = true;
                self.stats.completed += 1;
                self.stats.rewards_earned += entry.reward as i64;
                info!("Order {} completed on turn {} (+{})", order, turn, entry.reward);
                true
            }
            _ => {
                warn!("Submit confirmation for order {} on turn {} ignored", order, turn);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(id: OrderId, reward: i32, expires: i32) -> RawOrder {
        RawOrder {
            order_id: id,
            required: vec![FoodKind::Sauce],
            created_turn: 0,
            expires_turn: expires,
            reward,
            penalty: 10,
            claimed_by: None,
            completed_turn: None,
            is_active: true,
        }
    }

    #[test]
    fn test_active_orders_sorted_by_score_then_expiry() {
        let mut book = OrderBook::new(1.0);
        book.refresh(&[raw(1, 100, 100), raw(2, 100, 50), raw(3, 50, 50)], 0);
        let ids: Vec<OrderId> = book.active_orders(0).iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![2, 1, 3]);

        let mut tied = OrderBook::new(0.0);
        tied.refresh(&[raw(5, 60, 60), raw(4, 30, 30)], 0);
        let ids: Vec<OrderId> = tied.active_orders(0).iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![4, 5]);
    }

    #[test]
    fn test_expiry_penalised_exactly_once() {
        let mut book = OrderBook::new(1.0);
        book.refresh(&[raw(1, 100, 10)], 0);
        assert!(book.claim(1, 42));

        let events = book.refresh(&[raw(1, 100, 10)], 11);
        assert_eq!(
            events,
            vec![OrderEvent::Expired {
                order: 1,
                task: Some(42)
            }]
        );
        assert!(book.refresh(&[raw(1, 100, 10)], 12).is_empty());
        assert_eq!(book.stats.penalties_incurred, 10);
        assert_eq!(book.stats.expired, 1);
        assert!(!book.confirm_submit(1, 12));
        assert_eq!(book.get(1).unwrap().status, OrderStatus::Expired);
    }

    #[test]
    fn test_completion_never_after_expiry() {
        let mut book = OrderBook::new(1.0);
        book.refresh(&[raw(1, 100, 10)], 0);
        assert!(!book.confirm_submit(1, 11));
        assert!(book.confirm_submit(1, 10));
        assert!(!book.confirm_submit(1, 10));
        assert_eq!(book.stats.completed, 1);
        assert_eq!(book.get(1).unwrap().status, OrderStatus::Completed { turn: 10 });
        assert!(book.refresh(&[raw(1, 100, 10)], 20).is_empty());
    }

    #[test]
    fn test_claimed_orders_stay_active_and_cannot_be_reclaimed() {
        let mut book = OrderBook::new(1.0);
        book.refresh(&[raw(1, 10, 400)], 0);
        assert!(book.claim(1, 1));
        assert!(!book.claim(1, 2));
        assert_eq!(book.active_orders(0).len(), 1);
        book.release(1, 2);
        assert_eq!(book.get(1).unwrap().status, OrderStatus::Claimed(1));
        book.release(1, 1);
        assert_eq!(book.get(1).unwrap().status, OrderStatus::Unclaimed);
    }

    #[test]
    fn test_vanished_order_is_retired() {
        let mut book = OrderBook::new(1.0);
        book.refresh(&[raw(1, 10, 400)], 0);
        book.claim(1, 9);
        let events = book.refresh(&[], 5);
        assert_eq!(
            events,
            vec![OrderEvent::Retired {
                order: 1,
                task: Some(9)
            }]
        );
        assert!(book.get(1).is_none());
    }

    #[test]
    fn test_order_dropped_on_its_deadline_is_expired() {
        let mut book = OrderBook::new(1.0);
        book.refresh(&[raw(1, 100, 10)], 0);
        let mut inactive = raw(1, 100, 10);
        inactive.is_active = false;

        let events = book.refresh(&[inactive.clone()], 10);
        assert_eq!(events, vec![OrderEvent::Expired { order: 1, task: None }]);
        assert!(book.refresh(&[inactive.clone()], 11).is_empty());
        assert!(book.refresh(&[inactive], 12).is_empty());
        assert_eq!(book.stats.expired, 1);
        assert_eq!(book.stats.penalties_incurred, 10);
        assert_eq!(book.get(1).unwrap().status, OrderStatus::Expired);
    }

    #[test]
    fn test_vanished_order_on_its_deadline_is_expired() {
        let mut book = OrderBook::new(1.0);
        book.refresh(&[raw(1, 100, 10)], 0);
        book.claim(1, 3);
        let events = book.refresh(&[], 10);
        assert_eq!(events, vec![OrderEvent::Expired { order: 1, task: Some(3) }]);
        assert_eq!(book.stats.expired, 1);
    }

    #[test]
    fn test_submit_credited_to_other_order_moves_completion() {
        let mut book = OrderBook::new(1.0);
        book.refresh(&[raw(1, 60, 100), raw(2, 60, 100)], 0);
        assert!(book.claim(2, 8));
        assert!(book.confirm_submit(2, 5));
        assert!(book.get(2).unwrap().provisional);

        let mut credited = raw(1, 60, 100);
        credited.completed_turn = Some(5);
        let events = book.refresh(&[credited, raw(2, 60, 100)], 6);

        assert_eq!(events, vec![OrderEvent::Completed { order: 1, task: None }]);
        assert_eq!(book.stats.completed, 1);
        assert_eq!(book.stats.rewards_earned, 60);
        assert_eq!(book.get(1).unwrap().status, OrderStatus::Completed { turn: 5 });
        assert_eq!(book.get(2).unwrap().status, OrderStatus::Unclaimed);
        assert_eq!(book.active_orders(6).len(), 1);
    }

    #[test]
    fn test_submit_seen_by_game_is_confirmed() {
        let mut book = OrderBook::new(1.0);
        book.refresh(&[raw(1, 60, 100), raw(2, 60, 100)], 0);
        assert!(book.confirm_submit(2, 5));

        let mut done = raw(2, 60, 100);
        done.completed_turn = Some(5);
        assert!(book.refresh(&[raw(1, 60, 100), done.clone()], 6).is_empty());
        assert!(!book.get(2).unwrap().provisional);

        // A later completion of order 1 is a second submit, not a move.
        let mut other = raw(1, 60, 100);
        other.completed_turn = Some(9);
        book.refresh(&[other, done], 10);
        assert_eq!(book.stats.completed, 2);
        assert_eq!(book.stats.rewards_earned, 120);
    }
}

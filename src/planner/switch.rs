use crate::state::{OrderStats, WorldSnapshot};

/// Values the one-time map switch. Anything above zero makes the engine
/// schedule it.
pub trait SwitchHeuristic: Send {
    fn value(&self, snapshot: &WorldSnapshot, stats: &OrderStats) -> f64;
}

/// Switch late in the window once the kitchen has proven it can deliver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdSwitch {
    pub window_fraction: f64,
    pub min_completed: u32,
    pub value: f64,
}

impl Default for ThresholdSwitch {
    fn default() -> Self {
        Self {
            window_fraction: 0.7,
            min_completed: 2,
            value: 1.0,
        }
    }
}

impl SwitchHeuristic for ThresholdSwitch {
    fn value(&self, snapshot: &WorldSnapshot, stats: &OrderStats) -> f64 {
        let info = &snapshot.switch;
        let threshold = info.switch_turn + (self.window_fraction * info.switch_duration as f64) as i32;
        if snapshot.turn >= threshold && stats.completed >= self.min_completed {
            self.value
        } else {
            0.0
        }
    }
}

/// Never switches.
pub struct NeverSwitch;

impl SwitchHeuristic for NeverSwitch {
    fn value(&self, _snapshot: &WorldSnapshot, _stats: &OrderStats) -> f64 {
        0.0
    }
}

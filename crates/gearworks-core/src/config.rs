use crate::fixed::Fixed64;
use serde::{Deserialize, Serialize};

/// Tunables for the mechanical module. Every field has a default, so a
/// partially specified config still deserializes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MechanicalConfig {
    /// Simulation ticks per second; the integration step is `1 / ticks_per_second`.
    pub ticks_per_second: u32,
    /// Absolute cap on angular speed (radians per second).
    pub max_speed: Fixed64,
    /// Speeds whose magnitude is at or below this count as stopped.
    pub stop_threshold: Fixed64,
    /// Lower bound on the inertia used as an acceleration divisor.
    pub min_inertia: Fixed64,
    /// Capacity of the topology event ring buffer.
    pub event_capacity: usize,
}

impl Default for MechanicalConfig {
    fn default() -> Self {
        Self {
            ticks_per_second: 20,
            max_speed: Fixed64::from_num(64),
            stop_threshold: Fixed64::from_num(0.01),
            min_inertia: Fixed64::ONE,
            event_capacity: 1024,
        }
    }
}

impl MechanicalConfig {
    /// Length of one tick in seconds. A zero tick rate is treated as one.
    pub fn dt(&self) -> Fixed64 {
        Fixed64::ONE / Fixed64::from_num(self.ticks_per_second.max(1))
    }
}

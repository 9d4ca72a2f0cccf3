//! Connected components of mechanical nodes sharing one rotational state.

use gearworks_core::descriptor::NodeDescriptor;
use gearworks_core::fixed::{Fixed64, Ticks};
use gearworks_core::grid::GridPos;
use gearworks_core::id::NetworkId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// ---------------------------------------------------------------------------
// Network
// ---------------------------------------------------------------------------

/// A maximal connected component of active nodes.
///
/// The network owns the truth about membership. Aggregates are derived from
/// the members' descriptors and must be recomputed whenever membership or a
/// member's variant changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Network {
    pub id: NetworkId,
    members: BTreeSet<GridPos>,
    /// Radians, always in `[0, TAU)`.
    pub angle: Fixed64,
    /// Radians per second.
    pub angular_speed: Fixed64,
    total_torque: Fixed64,
    total_resistance: Fixed64,
    total_inertia: Fixed64,
    /// Whether the network was turning after its last advance. Used to
    /// detect start/stop transitions.
    pub(crate) was_running: bool,
    pub(crate) last_advanced: Option<Ticks>,
}

impl Network {
    pub fn new(id: NetworkId) -> Self {
        Self {
            id,
            members: BTreeSet::new(),
            angle: Fixed64::ZERO,
            angular_speed: Fixed64::ZERO,
            total_torque: Fixed64::ZERO,
            total_resistance: Fixed64::ZERO,
            total_inertia: Fixed64::ZERO,
            was_running: false,
            last_advanced: None,
        }
    }

    /// A fresh network that continues another network's rotational state.
    pub(crate) fn inheriting(id: NetworkId, from: &Network) -> Self {
        Self {
            angle: from.angle,
            angular_speed: from.angular_speed,
            was_running: from.was_running,
            last_advanced: from.last_advanced,
            ..Self::new(id)
        }
    }

    pub fn members(&self) -> &BTreeSet<GridPos> {
        &self.members
    }

    pub fn contains(&self, pos: GridPos) -> bool {
        self.members.contains(&pos)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn total_torque(&self) -> Fixed64 {
        self.total_torque
    }

    pub fn total_resistance(&self) -> Fixed64 {
        self.total_resistance
    }

    pub fn total_inertia(&self) -> Fixed64 {
        self.total_inertia
    }

    pub(crate) fn insert(&mut self, pos: GridPos) -> bool {
        self.members.insert(pos)
    }

    pub(crate) fn remove(&mut self, pos: GridPos) -> bool {
        self.members.remove(&pos)
    }

    pub(crate) fn take_members(&mut self) -> BTreeSet<GridPos> {
        std::mem::take(&mut self.members)
    }

    /// Recompute torque, resistance and inertia from scratch. `descriptor`
    /// resolves a member position to its current descriptor. Sums saturate
    /// at the `Fixed64` range.
    pub fn recompute<'a, F>(&mut self, descriptor: F)
    where
        F: Fn(GridPos) -> Option<&'a NodeDescriptor>,
    {
        let mut torque = Fixed64::ZERO;
        let mut resistance = Fixed64::ZERO;
        let mut inertia = Fixed64::ZERO;
        for desc in self.members.iter().filter_map(|p| descriptor(*p)) {
            torque = torque.saturating_add(desc.role.torque());
            resistance = resistance.saturating_add(desc.resistance);
            inertia = inertia.saturating_add(desc.inertia);
        }
        self.total_torque = torque;
        self.total_resistance = resistance;
        self.total_inertia = inertia;
    }
}

/// Read-only replication record for the render layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSnapshot {
    pub id: NetworkId,
    pub angle: Fixed64,
    pub angular_speed: Fixed64,
}

impl From<&Network> for NetworkSnapshot {
    fn from(n: &Network) -> Self {
        Self {
            id: n.id,
            angle: n.angle,
            angular_speed: n.angular_speed,
        }
    }
}

// ---------------------------------------------------------------------------
// Network table
// ---------------------------------------------------------------------------

/// All live networks, keyed by id. Ids are monotonic and never reused.
#[derive(Debug, Clone, Default)]
pub struct NetworkTable {
    networks: BTreeMap<NetworkId, Network>,
    next_id: u32,
}

impl NetworkTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate an empty network and return its id.
    pub fn create(&mut self) -> NetworkId {
        let id = self.alloc_id();
        self.networks.insert(id, Network::new(id));
        id
    }

    /// Allocate a network that carries over `from`'s rotational state.
    pub fn create_inheriting(&mut self, from: &Network) -> NetworkId {
        let id = self.alloc_id();
        self.networks.insert(id, Network::inheriting(id, from));
        id
    }

    /// Hand out the next id. The counter stops at `u32::MAX`.
    fn alloc_id(&mut self) -> NetworkId {
        let id = NetworkId(self.next_id);
        self.next_id = self.next_id.saturating_add(1);
        id
    }

    pub fn get(&self, id: NetworkId) -> Option<&Network> {
        self.networks.get(&id)
    }

    pub fn get_mut(&mut self, id: NetworkId) -> Option<&mut Network> {
        self.networks.get_mut(&id)
    }

    pub fn remove(&mut self, id: NetworkId) -> Option<Network> {
        self.networks.remove(&id)
    }

    pub fn contains(&self, id: NetworkId) -> bool {
        self.networks.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.networks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.networks.is_empty()
    }

    pub fn ids(&self) -> Vec<NetworkId> {
        self.networks.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Network> {
        self.networks.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Network> {
        self.networks.values_mut()
    }

    /// The id the next created network will receive.
    pub fn next_id(&self) -> NetworkId {
        NetworkId(self.next_id)
    }
}

//! Mechanical power networks for the Gearworks engine.
//!
//! Grid-aligned components (axles, gears, clutches, motors, multi-cell
//! machines) link to their face neighbors and form networks that share a
//! single rotational state. The [`MechanicalModule`] keeps those networks
//! consistent as the host places, breaks, and toggles components.
//!
//! # Design
//!
//! - Nodes are keyed by their principal [`GridPos`]. Composite structures
//!   own satellite cells that only point back at the principal.
//! - A node's orientation is its block type. Topology changes that need a
//!   different connector set exchange the block for a sibling variant.
//! - Nodes hold a [`NetworkId`] handle, never a reference; merges and
//!   splits just rewrite handles and the network table.
//! - Edges are inserted with a union step (lower id survives) and deleted
//!   with a local breadth-first search bounded by the affected network. No
//!   fully dynamic connectivity structure is maintained; edits happen at
//!   interaction rates and never per tick.
//! - Rotational state advances once per tick per network, after edits.
//!
//! ```rust,ignore
//! let mut module = MechanicalModule::new(registry, MechanicalConfig::default());
//! module.place(&mut world, GridPos::new(0, 0, 0), motor)?;
//! module.place(&mut world, GridPos::new(1, 0, 0), axle)?;
//! module.tick(1);
//! let speed = module.current_angular_speed(GridPos::new(1, 0, 0));
//! ```

pub mod composite;
pub mod error;
pub mod network;
pub mod node;
pub mod persist;
pub mod resolver;
pub mod tick;
pub mod validation;

pub use error::{MechanicalError, PlacementError};
pub use network::{Network, NetworkSnapshot, NetworkTable};
pub use node::{NodeBehavior, PlacementOutcome};
pub use persist::{DeserializeError, NodeRecord, SerializeError};
pub use validation::InvariantViolation;

use gearworks_core::config::MechanicalConfig;
use gearworks_core::descriptor::NodeDescriptor;
use gearworks_core::direction::Direction;
use gearworks_core::event::{EventBuffer, MechanicalEvent};
use gearworks_core::fixed::{Fixed64, Ticks};
use gearworks_core::grid::GridPos;
use gearworks_core::id::NetworkId;
use gearworks_core::registry::DescriptorRegistry;
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Mechanical module
// ---------------------------------------------------------------------------

/// Owns every placed node, satellite record, and network.
///
/// All entry points are synchronous. An edit is fully applied, including
/// cascaded breakage and splits, before the call returns.
#[derive(Debug, Clone)]
pub struct MechanicalModule {
    registry: DescriptorRegistry,
    config: MechanicalConfig,
    /// Principal cell -> node state.
    nodes: BTreeMap<GridPos, NodeBehavior>,
    /// Satellite cell -> principal cell.
    satellites: BTreeMap<GridPos, GridPos>,
    networks: NetworkTable,
    events: EventBuffer,
    /// Tick stamped on emitted events; updated by [`MechanicalModule::tick`].
    tick: Ticks,
}

impl MechanicalModule {
    pub fn new(registry: DescriptorRegistry, config: MechanicalConfig) -> Self {
        let events = EventBuffer::new(config.event_capacity);
        Self {
            registry,
            config,
            nodes: BTreeMap::new(),
            satellites: BTreeMap::new(),
            networks: NetworkTable::new(),
            events,
            tick: 0,
        }
    }

    pub fn registry(&self) -> &DescriptorRegistry {
        &self.registry
    }

    pub fn config(&self) -> &MechanicalConfig {
        &self.config
    }

    /// The last tick passed to [`MechanicalModule::tick`].
    pub fn current_tick(&self) -> Ticks {
        self.tick
    }

    // -- Node queries --

    /// The principal cell owning `pos`: `pos` itself for a node, the
    /// composite's principal for a satellite, `None` otherwise.
    pub fn principal_of(&self, pos: GridPos) -> Option<GridPos> {
        if self.nodes.contains_key(&pos) {
            Some(pos)
        } else {
            self.satellites.get(&pos).copied()
        }
    }

    /// Node state at `pos`. Satellite cells resolve to their principal.
    pub fn node(&self, pos: GridPos) -> Option<&NodeBehavior> {
        self.principal_of(pos).and_then(|p| self.nodes.get(&p))
    }

    /// Active descriptor of the node owning `pos`.
    pub fn descriptor_at(&self, pos: GridPos) -> Option<&NodeDescriptor> {
        self.node(pos)
            .and_then(|n| self.registry.descriptor(n.block_type))
    }

    /// Every node, in position order.
    pub fn nodes(&self) -> impl Iterator<Item = (GridPos, &NodeBehavior)> {
        self.nodes.iter().map(|(p, n)| (*p, n))
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn satellite_count(&self) -> usize {
        self.satellites.len()
    }

    /// True if the node owning `pos` has a realized link in `dir`.
    pub fn is_connector_active(&self, pos: GridPos, dir: Direction) -> bool {
        self.node(pos).is_some_and(|n| n.connections.contains(dir))
    }

    /// Angle of the network driving `pos`, zero if networkless or disconnected.
    pub fn current_angle(&self, pos: GridPos) -> Fixed64 {
        self.driving_network(pos)
            .map(|n| n.angle)
            .unwrap_or(Fixed64::ZERO)
    }

    /// Angular speed of the network driving `pos`, zero if networkless or
    /// disconnected.
    pub fn current_angular_speed(&self, pos: GridPos) -> Fixed64 {
        self.driving_network(pos)
            .map(|n| n.angular_speed)
            .unwrap_or(Fixed64::ZERO)
    }

    fn driving_network(&self, pos: GridPos) -> Option<&Network> {
        let node = self.node(pos)?;
        if node.disconnected {
            return None;
        }
        self.networks.get(node.network?)
    }

    // -- Network queries --

    pub fn network_of(&self, pos: GridPos) -> Option<NetworkId> {
        self.node(pos).and_then(|n| n.network)
    }

    pub fn network(&self, id: NetworkId) -> Option<&Network> {
        self.networks.get(id)
    }

    pub fn networks(&self) -> impl Iterator<Item = &Network> {
        self.networks.iter()
    }

    pub fn network_count(&self) -> usize {
        self.networks.len()
    }

    /// Read-only replication records, one per network.
    pub fn snapshot(&self) -> Vec<NetworkSnapshot> {
        self.networks.iter().map(NetworkSnapshot::from).collect()
    }

    // -- Events --

    /// Take every buffered topology event, oldest first.
    pub fn drain_events(&mut self) -> Vec<MechanicalEvent> {
        self.events.drain()
    }

    pub fn events(&self) -> &EventBuffer {
        &self.events
    }

    pub(crate) fn emit(&mut self, event: MechanicalEvent) {
        self.events.push(event);
    }

    // -- Adjacency --

    /// Principal on the far side of `pos`'s connector in `dir`.
    pub(crate) fn far_principal(
        &self,
        pos: GridPos,
        desc: &NodeDescriptor,
        dir: Direction,
    ) -> Option<GridPos> {
        self.principal_of(desc.connector_target(pos, dir))
    }

    /// Realized links of the node at `pos` as `(direction, neighbor principal)`.
    pub(crate) fn linked(&self, pos: GridPos) -> Vec<(Direction, GridPos)> {
        let Some(node) = self.nodes.get(&pos) else {
            return Vec::new();
        };
        let Some(desc) = self.registry.descriptor(node.block_type) else {
            return Vec::new();
        };
        node.connections
            .iter()
            .filter_map(|d| self.far_principal(pos, desc, d).map(|p| (d, p)))
            .collect()
    }

    pub(crate) fn is_active(&self, pos: GridPos) -> bool {
        self.nodes.get(&pos).is_some_and(NodeBehavior::is_active)
    }

    /// Recompute a network's aggregates from its members.
    pub(crate) fn refresh(&mut self, id: NetworkId) {
        let Self {
            networks,
            nodes,
            registry,
            ..
        } = self;
        if let Some(net) = networks.get_mut(id) {
            net.recompute(|p| nodes.get(&p).and_then(|n| registry.descriptor(n.block_type)));
        }
    }
}

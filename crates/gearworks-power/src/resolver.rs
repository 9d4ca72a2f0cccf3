//! Connectivity resolution: placement-time connector discovery, removal
//! cascades, neighbor re-validation, and network merge/split.

use crate::error::{MechanicalError, PlacementError};
use crate::node::{NodeBehavior, PlacementOutcome};
use crate::MechanicalModule;
use gearworks_core::descriptor::NodeDescriptor;
use gearworks_core::direction::{ConnectorSet, Direction};
use gearworks_core::event::{MechanicalEvent, RemovalReason};
use gearworks_core::grid::GridPos;
use gearworks_core::id::{BlockTypeId, NetworkId};
use gearworks_spatial::BlockAccess;
use std::collections::{BTreeSet, VecDeque};
use tracing::{debug, warn};

/// An edge the placement scan found, with the variant the neighbor must
/// become to hold it.
#[derive(Debug, Clone, Copy)]
struct Link {
    dir: Direction,
    neighbor: GridPos,
    neighbor_variant: BlockTypeId,
}

/// Work accumulated while one edit propagates: nodes that must leave the
/// grid, and networks whose membership changed.
#[derive(Debug, Default)]
pub(crate) struct Cascade {
    removals: VecDeque<(GridPos, RemovalReason)>,
    dirty: BTreeSet<NetworkId>,
}

impl Cascade {
    pub(crate) fn remove(&mut self, pos: GridPos, reason: RemovalReason) {
        self.removals.push_back((pos, reason));
    }

    pub(crate) fn touch(&mut self, network: Option<NetworkId>) {
        if let Some(id) = network {
            self.dirty.insert(id);
        }
    }
}

impl MechanicalModule {
    // -----------------------------------------------------------------------
    // Placement
    // -----------------------------------------------------------------------

    /// Place a mechanical block with its principal at `pos`.
    ///
    /// Validates the footprint and scans the variant's connectors in
    /// direction order (bounded by capacity; first found wins). Nothing is
    /// written unless the whole placement succeeds.
    pub fn place<W>(
        &mut self,
        world: &mut W,
        pos: GridPos,
        block_type: BlockTypeId,
    ) -> Result<PlacementOutcome, PlacementError>
    where
        W: BlockAccess + ?Sized,
    {
        let desc = match self.registry.descriptor(block_type) {
            Some(d) => d.clone(),
            None if self.registry.block_name(block_type).is_some() => {
                return Err(PlacementError::NotMechanical(block_type));
            }
            None => return Err(PlacementError::UnknownBlockType(block_type)),
        };
        if !self.registry.fits_at(block_type, pos) {
            return Err(PlacementError::OutOfBounds { pos, block_type });
        }

        let footprint = desc.footprint(pos);
        self.check_footprint(world, &footprint)?;

        let links = self.scan_connectors(pos, &desc, &footprint);
        let realized: ConnectorSet = links.iter().map(|l| l.dir).collect();
        let chosen = self
            .registry
            .select_variant(block_type, realized)
            .ok_or(PlacementError::MissingSupport { pos, block_type })?;

        // Commit.
        self.write_footprint(world, pos, chosen, &desc);
        self.nodes.insert(pos, NodeBehavior::new(chosen, realized));
        self.emit(MechanicalEvent::NodePlaced {
            pos,
            block_type: chosen,
            tick: self.tick,
        });

        for link in &links {
            let back = link.dir.opposite();
            if let Some(nb) = self.nodes.get_mut(&link.neighbor) {
                nb.connections.insert(back);
            }
            self.exchange(world, link.neighbor, link.neighbor_variant);
            self.emit(MechanicalEvent::ConnectorLinked {
                pos,
                dir: link.dir,
                tick: self.tick,
            });
            self.emit(MechanicalEvent::ConnectorLinked {
                pos: link.neighbor,
                dir: back,
                tick: self.tick,
            });
        }

        let network = self.attach(pos);
        debug!(
            %pos,
            block = ?chosen,
            connections = %realized,
            network = ?network,
            "placed mechanical node"
        );

        Ok(PlacementOutcome {
            principal: pos,
            block_type: chosen,
            connections: realized,
            network,
        })
    }

    fn scan_connectors(
        &self,
        pos: GridPos,
        desc: &NodeDescriptor,
        footprint: &[GridPos],
    ) -> Vec<Link> {
        let mut links: Vec<Link> = Vec::new();
        for dir in desc.connectors.iter() {
            if links.len() >= desc.capacity as usize {
                break;
            }
            let target = desc.connector_target(pos, dir);
            if footprint.contains(&target) {
                continue;
            }
            let Some(neighbor) = self.principal_of(target) else {
                continue;
            };
            if links.iter().any(|l| l.neighbor == neighbor) {
                continue;
            }
            let Some(nb) = self.nodes.get(&neighbor) else {
                continue;
            };
            let Some(ndesc) = self.registry.descriptor(nb.block_type) else {
                continue;
            };
            let back = dir.opposite();
            let exit = pos.offset(desc.anchor(dir));
            if ndesc.connector_target(neighbor, back) != exit {
                continue;
            }
            if let Some(variant) = self.registry.accepts(nb.block_type, nb.connections, back) {
                links.push(Link {
                    dir,
                    neighbor,
                    neighbor_variant: variant,
                });
            }
        }
        links
    }

    /// Swap the node at `pos` to `to`, keeping all other state.
    pub(crate) fn exchange<W>(&mut self, world: &mut W, pos: GridPos, to: BlockTypeId)
    where
        W: BlockAccess + ?Sized,
    {
        let Some(node) = self.nodes.get_mut(&pos) else {
            return;
        };
        let from = node.block_type;
        if from == to {
            return;
        }
        node.block_type = to;
        let network = node.network;
        world.set_block_type_at(pos, to);
        self.emit(MechanicalEvent::VariantExchanged {
            pos,
            from,
            to,
            tick: self.tick,
        });
        if let Some(id) = network {
            self.refresh(id);
        }
    }

    // -----------------------------------------------------------------------
    // Merge
    // -----------------------------------------------------------------------

    /// Put the active node at `pos` into the network of its active linked
    /// neighbors, merging them if there are several. Creates a network when
    /// no neighbor has one.
    pub(crate) fn attach(&mut self, pos: GridPos) -> Option<NetworkId> {
        if !self.is_active(pos) {
            return None;
        }
        let neighbor_nets: BTreeSet<NetworkId> = self
            .linked(pos)
            .into_iter()
            .filter_map(|(_, p)| self.nodes.get(&p))
            .filter(|n| n.is_active())
            .filter_map(|n| n.network)
            .collect();

        let survivor = match neighbor_nets.first() {
            Some(id) => *id,
            None => {
                let id = self.networks.create();
                self.emit(MechanicalEvent::NetworkCreated {
                    network: id,
                    tick: self.tick,
                });
                id
            }
        };
        if let Some(net) = self.networks.get_mut(survivor) {
            net.insert(pos);
        }
        if let Some(node) = self.nodes.get_mut(&pos) {
            node.network = Some(survivor);
        }
        for absorbed in neighbor_nets.into_iter().skip(1) {
            self.merge_into(survivor, absorbed);
        }
        self.refresh(survivor);
        Some(survivor)
    }

    /// Fold `absorbed` into `survivor`. The survivor keeps its own angle and
    /// speed; the absorbed network's rotational state is discarded.
    fn merge_into(&mut self, survivor: NetworkId, absorbed: NetworkId) {
        if survivor == absorbed {
            return;
        }
        let Some(mut loser) = self.networks.remove(absorbed) else {
            return;
        };
        let members = loser.take_members();
        for p in &members {
            if let Some(node) = self.nodes.get_mut(p) {
                node.network = Some(survivor);
            }
        }
        if let Some(net) = self.networks.get_mut(survivor) {
            for p in &members {
                net.insert(*p);
            }
        }
        debug!(?survivor, ?absorbed, moved = members.len(), "merged networks");
        self.emit(MechanicalEvent::NetworksMerged {
            survivor,
            absorbed,
            tick: self.tick,
        });
    }

    // -----------------------------------------------------------------------
    // Removal
    // -----------------------------------------------------------------------

    /// Break the block at `pos`. Satellites redirect to their principal, or
    /// detach it when the composite allows. Orphaned placeholders are cleared.
    pub fn break_block<W>(&mut self, world: &mut W, pos: GridPos) -> Result<(), MechanicalError>
    where
        W: BlockAccess + ?Sized,
    {
        let mut cascade = Cascade::default();
        if self.nodes.contains_key(&pos) {
            cascade.remove(pos, RemovalReason::Broken);
        } else if let Some(&principal) = self.satellites.get(&pos) {
            self.break_satellite(world, principal, &mut cascade);
        } else if self.is_orphan(world, pos) {
            warn!(%pos, "clearing orphaned mechanical cell");
            world.clear_block_at(pos);
            return Ok(());
        } else {
            return Err(MechanicalError::NotANode { pos });
        }
        self.finish(world, cascade);
        Ok(())
    }

    /// Apply queued removals (which may queue more) and then split or
    /// refresh every network they touched.
    pub(crate) fn finish<W>(&mut self, world: &mut W, mut cascade: Cascade)
    where
        W: BlockAccess + ?Sized,
    {
        while let Some((pos, reason)) = cascade.removals.pop_front() {
            self.remove_record(world, pos, reason, &mut cascade);
        }
        let dirty = std::mem::take(&mut cascade.dirty);
        for id in dirty {
            self.split_if_needed(id);
        }
    }

    fn remove_record<W>(
        &mut self,
        world: &mut W,
        pos: GridPos,
        reason: RemovalReason,
        cascade: &mut Cascade,
    ) where
        W: BlockAccess + ?Sized,
    {
        let Some(node) = self.nodes.remove(&pos) else {
            return;
        };
        let Some(desc) = self.registry.descriptor(node.block_type).cloned() else {
            return;
        };
        if reason != RemovalReason::Stale {
            world.clear_block_at(pos);
        }
        self.clear_satellites(world, pos, &desc);

        if let Some(id) = node.network {
            if let Some(net) = self.networks.get_mut(id) {
                net.remove(pos);
            }
            cascade.touch(Some(id));
        }
        debug!(%pos, ?reason, block = ?node.block_type, "removed mechanical node");
        self.emit(MechanicalEvent::NodeRemoved {
            pos,
            block_type: node.block_type,
            reason,
            tick: self.tick,
        });

        for dir in node.connections.iter() {
            if let Some(neighbor) = self.far_principal(pos, &desc, dir) {
                self.unlink(world, neighbor, dir.opposite(), cascade);
            }
        }
    }

    /// Drop the connector in `dir` from the node at `pos` and re-select its
    /// variant. Queues the node for removal if no variant fits.
    pub(crate) fn unlink<W>(
        &mut self,
        world: &mut W,
        pos: GridPos,
        dir: Direction,
        cascade: &mut Cascade,
    ) where
        W: BlockAccess + ?Sized,
    {
        let Some(node) = self.nodes.get_mut(&pos) else {
            return;
        };
        if !node.connections.remove(dir) {
            return;
        }
        cascade.touch(node.network);
        self.emit(MechanicalEvent::ConnectorUnlinked {
            pos,
            dir,
            tick: self.tick,
        });
        self.reselect(world, pos, cascade);
    }

    pub(crate) fn reselect<W>(&mut self, world: &mut W, pos: GridPos, cascade: &mut Cascade)
    where
        W: BlockAccess + ?Sized,
    {
        let Some(node) = self.nodes.get(&pos) else {
            return;
        };
        match self.registry.select_variant(node.block_type, node.connections) {
            Some(v) => self.exchange(world, pos, v),
            None => cascade.remove(pos, RemovalReason::Unsupported),
        }
    }

    // -----------------------------------------------------------------------
    // Split
    // -----------------------------------------------------------------------

    /// Recompute the connected components of network `id` after a deletion.
    /// A still-connected network keeps its id; otherwise every component
    /// becomes a fresh network inheriting the original angle and speed.
    fn split_if_needed(&mut self, id: NetworkId) {
        let Some(net) = self.networks.get(id) else {
            return;
        };
        if net.is_empty() {
            self.networks.remove(id);
            debug!(network = ?id, "destroyed empty network");
            self.emit(MechanicalEvent::NetworkDestroyed {
                network: id,
                tick: self.tick,
            });
            return;
        }
        let members = net.members().clone();
        let components = self.components(&members);
        if components.len() <= 1 {
            self.refresh(id);
            return;
        }
        let Some(original) = self.networks.remove(id) else {
            return;
        };

        let mut parts = Vec::with_capacity(components.len());
        for component in components {
            let part = self.networks.create_inheriting(&original);
            for p in &component {
                if let Some(node) = self.nodes.get_mut(p) {
                    node.network = Some(part);
                }
            }
            if let Some(net) = self.networks.get_mut(part) {
                for p in &component {
                    net.insert(*p);
                }
            }
            self.refresh(part);
            self.emit(MechanicalEvent::NetworkCreated {
                network: part,
                tick: self.tick,
            });
            parts.push(part);
        }
        debug!(original = ?id, parts = ?parts, "split network");
        self.emit(MechanicalEvent::NetworkSplit {
            original: id,
            parts,
            tick: self.tick,
        });
    }

    /// Connected components among `candidates`, following realized links
    /// between active nodes. Components come out in order of their smallest
    /// position.
    pub(crate) fn components(&self, candidates: &BTreeSet<GridPos>) -> Vec<BTreeSet<GridPos>> {
        let mut seen: BTreeSet<GridPos> = BTreeSet::new();
        let mut out = Vec::new();
        for &start in candidates {
            if !self.is_active(start) || !seen.insert(start) {
                continue;
            }
            let mut component = BTreeSet::new();
            let mut queue = VecDeque::from([start]);
            while let Some(p) = queue.pop_front() {
                component.insert(p);
                for (_, q) in self.linked(p) {
                    if candidates.contains(&q) && self.is_active(q) && seen.insert(q) {
                        queue.push_back(q);
                    }
                }
            }
            out.push(component);
        }
        out
    }

    // -----------------------------------------------------------------------
    // Neighbor changes
    // -----------------------------------------------------------------------

    /// Re-validate the node owning `pos` after something around it changed
    /// in the world. Never fails: stale records are purged, dangling links
    /// dropped, variants re-selected, and unsupported nodes broken. Calling
    /// it again with no intervening change does nothing.
    pub fn on_neighbor_changed<W>(&mut self, world: &mut W, pos: GridPos)
    where
        W: BlockAccess + ?Sized,
    {
        let Some(principal) = self.principal_of(pos) else {
            return;
        };
        let mut cascade = Cascade::default();

        if self.is_stale(world, principal) {
            warn!(%principal, "world no longer holds the recorded block; purging");
            cascade.remove(principal, RemovalReason::Stale);
            self.finish(world, cascade);
            return;
        }
        if let Some(cell) = self.missing_satellite(world, principal) {
            warn!(%principal, satellite = %cell, "composite lost a satellite");
            self.break_satellite(world, principal, &mut cascade);
            self.finish(world, cascade);
            return;
        }

        for (_, neighbor) in self.linked(principal) {
            if self.is_stale(world, neighbor) {
                warn!(%neighbor, "neighbor record is stale; purging");
                cascade.remove(neighbor, RemovalReason::Stale);
            }
        }
        while let Some((p, reason)) = cascade.removals.pop_front() {
            self.remove_record(world, p, reason, &mut cascade);
        }

        if let Some(node) = self.nodes.get(&principal) {
            let dangling: Vec<Direction> = node
                .connections
                .iter()
                .filter(|d| !self.edge_is_valid(principal, *d))
                .collect();
            for dir in dangling {
                warn!(%principal, %dir, "dropping dangling connector");
                self.unlink(world, principal, dir, &mut cascade);
            }
            self.reselect(world, principal, &mut cascade);
        }
        self.finish(world, cascade);
    }

    /// The edge in `dir` from `pos` is mirrored by a live neighbor whose
    /// connector exits right at this node's anchor cell.
    pub(crate) fn edge_is_valid(&self, pos: GridPos, dir: Direction) -> bool {
        let Some(desc) = self.descriptor_at(pos) else {
            return false;
        };
        let Some(neighbor) = self.far_principal(pos, desc, dir) else {
            return false;
        };
        let back = dir.opposite();
        let Some(nb) = self.nodes.get(&neighbor) else {
            return false;
        };
        if !nb.connections.contains(back) {
            return false;
        }
        self.registry
            .descriptor(nb.block_type)
            .is_some_and(|nd| nd.connector_target(neighbor, back) == pos.offset(desc.anchor(dir)))
    }

    fn is_stale<W>(&self, world: &W, principal: GridPos) -> bool
    where
        W: BlockAccess + ?Sized,
    {
        self.nodes
            .get(&principal)
            .is_some_and(|n| world.block_type_at(principal) != Some(n.block_type))
    }

    // -----------------------------------------------------------------------
    // Disconnect toggle
    // -----------------------------------------------------------------------

    /// Flip the disconnected bit of a clutch-like node. Returns the new
    /// value. Disconnecting removes the node from its network (which may
    /// split); reconnecting merges it back with its active neighbors.
    pub fn toggle_disconnected(&mut self, pos: GridPos) -> Result<bool, MechanicalError> {
        let principal = self
            .principal_of(pos)
            .ok_or(MechanicalError::NotANode { pos })?;
        let toggleable = self
            .descriptor_at(principal)
            .is_some_and(|d| d.toggleable);
        if !toggleable {
            return Err(MechanicalError::NotToggleable { pos });
        }
        let Some(node) = self.nodes.get_mut(&principal) else {
            return Err(MechanicalError::NotANode { pos });
        };

        let disconnected = !node.disconnected;
        node.disconnected = disconnected;
        self.emit(MechanicalEvent::DisconnectToggled {
            pos: principal,
            disconnected,
            tick: self.tick,
        });

        if disconnected {
            let mut cascade = Cascade::default();
            if let Some(node) = self.nodes.get_mut(&principal) {
                if let Some(id) = node.network.take() {
                    if let Some(net) = self.networks.get_mut(id) {
                        net.remove(principal);
                    }
                    cascade.touch(Some(id));
                }
            }
            for id in cascade.dirty {
                self.split_if_needed(id);
            }
        } else {
            self.attach(principal);
        }
        debug!(%principal, disconnected, "toggled disconnect");
        Ok(disconnected)
    }
}

#[cfg(test)]
mod tests {
    use crate::MechanicalModule;
    use gearworks_core::config::MechanicalConfig;
    use gearworks_core::direction::{ConnectorSet, Direction};
    use gearworks_core::event::{MechanicalEvent, RemovalReason};
    use gearworks_core::grid::GridPos;
    use gearworks_core::id::NetworkId;
    use gearworks_core::test_utils::*;
    use gearworks_spatial::{BlockAccess, GridWorld};

    use crate::error::{MechanicalError, PlacementError};

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn setup() -> (MechanicalModule, GridWorld) {
        let registry = standard_registry();
        let world = GridWorld::new().with_replaceable(block(&registry, GRASS));
        (
            MechanicalModule::new(registry, MechanicalConfig::default()),
            world,
        )
    }

    fn p(x: i32, y: i32, z: i32) -> GridPos {
        GridPos::new(x, y, z)
    }

    fn place(m: &mut MechanicalModule, w: &mut GridWorld, pos: GridPos, name: &str) {
        let bt = block(m.registry(), name);
        m.place(w, pos, bt).unwrap();
    }

    /// An east-west axle line from x = 0 to x = len - 1.
    fn line(m: &mut MechanicalModule, w: &mut GridWorld, len: i32) {
        for x in 0..len {
            place(m, w, p(x, 0, 0), "axle-ew");
        }
    }

    fn set(code: &str) -> ConnectorSet {
        ConnectorSet::from_code(code).unwrap()
    }

    // -----------------------------------------------------------------------
    // Placement
    // -----------------------------------------------------------------------

    #[test]
    fn isolated_axle_gets_own_network() {
        let (mut m, mut w) = setup();
        place(&mut m, &mut w, p(0, 0, 0), "axle-ew");

        let node = m.node(p(0, 0, 0)).unwrap();
        assert!(node.connections.is_empty());
        assert_eq!(node.network, Some(NetworkId(0)));
        assert_eq!(m.network_count(), 1);
        assert_eq!(w.block_type_at(p(0, 0, 0)), Some(block(m.registry(), "axle-ew")));
        m.validate().unwrap();
    }

    #[test]
    fn adjacent_axles_link_and_share_network() {
        let (mut m, mut w) = setup();
        line(&mut m, &mut w, 2);

        assert!(m.is_connector_active(p(0, 0, 0), Direction::East));
        assert!(m.is_connector_active(p(1, 0, 0), Direction::West));
        assert_eq!(m.network_of(p(0, 0, 0)), m.network_of(p(1, 0, 0)));
        assert_eq!(m.network_count(), 1);
        m.validate().unwrap();
    }

    #[test]
    fn perpendicular_axles_do_not_link() {
        let (mut m, mut w) = setup();
        place(&mut m, &mut w, p(0, 0, 0), "axle-ew");
        place(&mut m, &mut w, p(1, 0, 0), "axle-ns");

        assert!(!m.is_connector_active(p(0, 0, 0), Direction::East));
        assert_eq!(m.network_count(), 2);
        m.validate().unwrap();
    }

    #[test]
    fn occupied_cell_rejected_without_mutation() {
        let (mut m, mut w) = setup();
        w.set_block_type_at(p(0, 0, 0), block(m.registry(), STONE));
        let before = w.clone();
        let bt = block(m.registry(), "axle-ew");

        let err = m.place(&mut w, p(0, 0, 0), bt).unwrap_err();
        assert_eq!(err, PlacementError::Occupied { pos: p(0, 0, 0) });
        assert_eq!(w, before);
        assert_eq!(m.node_count(), 0);
        assert!(m.drain_events().is_empty());
    }

    #[test]
    fn replaceable_cell_is_overwritten() {
        let (mut m, mut w) = setup();
        w.set_block_type_at(p(0, 0, 0), block(m.registry(), GRASS));
        place(&mut m, &mut w, p(0, 0, 0), "axle-ew");
        assert_eq!(m.node_count(), 1);
    }

    #[test]
    fn existing_node_cell_rejected() {
        let (mut m, mut w) = setup();
        place(&mut m, &mut w, p(0, 0, 0), "axle-ew");
        let bt = block(m.registry(), "axle-ns");
        assert_eq!(
            m.place(&mut w, p(0, 0, 0), bt),
            Err(PlacementError::Occupied { pos: p(0, 0, 0) })
        );
    }

    #[test]
    fn non_mechanical_and_unknown_types_rejected() {
        let (mut m, mut w) = setup();
        let stone = block(m.registry(), STONE);
        assert_eq!(
            m.place(&mut w, p(0, 0, 0), stone),
            Err(PlacementError::NotMechanical(stone))
        );
        let bogus = gearworks_core::id::BlockTypeId(60_000);
        assert_eq!(
            m.place(&mut w, p(0, 0, 0), bogus),
            Err(PlacementError::UnknownBlockType(bogus))
        );
        assert_eq!(w.block_count(), 0);
    }

    #[test]
    fn angled_gear_needs_support() {
        let (mut m, mut w) = setup();
        let gear = block(m.registry(), "angled_gear-ne");
        let err = m.place(&mut w, p(0, 0, 0), gear).unwrap_err();
        assert!(matches!(err, PlacementError::MissingSupport { .. }));
        assert_eq!(w.block_count(), 0);
    }

    #[test]
    fn angled_gear_settles_on_discovered_connectors() {
        let (mut m, mut w) = setup();
        place(&mut m, &mut w, p(0, 0, -1), "axle-ns");
        let gear = block(m.registry(), "angled_gear-ne");

        let outcome = m.place(&mut w, p(0, 0, 0), gear).unwrap();
        assert_eq!(outcome.connections, set("n"));
        assert_eq!(outcome.block_type, block(m.registry(), "angled_gear-n"));
        assert_eq!(w.block_type_at(p(0, 0, 0)), Some(outcome.block_type));
        m.validate().unwrap();
    }

    #[test]
    fn dead_end_gear_becomes_bent_variant_on_second_neighbor() {
        let (mut m, mut w) = setup();
        place(&mut m, &mut w, p(0, 0, -1), "axle-ns");
        place(&mut m, &mut w, p(0, 0, 0), "angled_gear-n");
        place(&mut m, &mut w, p(1, 0, 0), "axle-ew");

        let gear = m.node(p(0, 0, 0)).unwrap();
        assert_eq!(gear.connections, set("ne"));
        assert_eq!(gear.block_type, block(m.registry(), "angled_gear-ne"));
        assert_eq!(w.block_type_at(p(0, 0, 0)), Some(gear.block_type));
        assert_eq!(m.network_count(), 1);

        let events = m.drain_events();
        assert!(events.iter().any(|e| matches!(
            e,
            MechanicalEvent::VariantExchanged { pos, .. } if *pos == p(0, 0, 0)
        )));
        m.validate().unwrap();
    }

    #[test]
    fn capacity_tie_break_follows_direction_order() {
        let (mut m, mut w) = setup();
        place(&mut m, &mut w, p(0, 0, -1), "axle-ns");
        place(&mut m, &mut w, p(1, 0, 0), "axle-ew");
        place(&mut m, &mut w, p(0, 0, 1), "axle-ns");
        place(&mut m, &mut w, p(-1, 0, 0), "axle-ew");

        let outcome = m
            .place(&mut w, p(0, 0, 0), block(m.registry(), "transmission-nesw"))
            .unwrap();
        assert_eq!(outcome.connections, set("ne"));
        assert!(!m.is_connector_active(p(0, 0, 1), Direction::North));
        assert!(!m.is_connector_active(p(-1, 0, 0), Direction::East));
        assert_eq!(m.network_count(), 3);
        m.validate().unwrap();
    }

    // -----------------------------------------------------------------------
    // Merge
    // -----------------------------------------------------------------------

    #[test]
    fn bridging_two_networks_lower_id_survives() {
        let (mut m, mut w) = setup();
        place(&mut m, &mut w, p(0, 0, 0), "axle-ew");
        place(&mut m, &mut w, p(2, 0, 0), "axle-ew");
        let a = m.network_of(p(0, 0, 0)).unwrap();
        let b = m.network_of(p(2, 0, 0)).unwrap();
        assert!(a < b);

        m.networks.get_mut(a).unwrap().angular_speed = fixed(3.0);
        m.networks.get_mut(b).unwrap().angular_speed = fixed(-5.0);

        place(&mut m, &mut w, p(1, 0, 0), "axle-ew");
        assert_eq!(m.network_count(), 1);
        let net = m.network(a).unwrap();
        assert_eq!(net.len(), 3);
        assert_eq!(net.angular_speed, fixed(3.0));
        assert!(m.network(b).is_none());
        m.validate().unwrap();
    }

    // -----------------------------------------------------------------------
    // Removal and split
    // -----------------------------------------------------------------------

    #[test]
    fn removing_middle_splits_line() {
        let (mut m, mut w) = setup();
        line(&mut m, &mut w, 5);
        let original = m.network_of(p(0, 0, 0)).unwrap();
        m.networks.get_mut(original).unwrap().angle = fixed(1.0);

        m.break_block(&mut w, p(2, 0, 0)).unwrap();

        assert_eq!(m.network_count(), 2);
        let left = m.network_of(p(0, 0, 0)).unwrap();
        let right = m.network_of(p(4, 0, 0)).unwrap();
        assert_ne!(left, right);
        assert!(m.network(original).is_none());
        assert_eq!(m.network(left).unwrap().angle, fixed(1.0));
        assert_eq!(m.network(right).unwrap().angle, fixed(1.0));
        assert!(!m.is_connector_active(p(1, 0, 0), Direction::East));
        assert!(w.is_air(p(2, 0, 0)));
        m.validate().unwrap();
    }

    #[test]
    fn removing_end_keeps_network_id() {
        let (mut m, mut w) = setup();
        line(&mut m, &mut w, 3);
        let id = m.network_of(p(0, 0, 0)).unwrap();
        m.break_block(&mut w, p(2, 0, 0)).unwrap();
        assert_eq!(m.network_of(p(0, 0, 0)), Some(id));
        assert_eq!(m.network(id).unwrap().len(), 2);
        m.validate().unwrap();
    }

    #[test]
    fn removing_last_member_destroys_network() {
        let (mut m, mut w) = setup();
        place(&mut m, &mut w, p(0, 0, 0), "axle-ew");
        m.drain_events();
        m.break_block(&mut w, p(0, 0, 0)).unwrap();
        assert_eq!(m.network_count(), 0);
        let events = m.drain_events();
        assert!(events
            .iter()
            .any(|e| matches!(e, MechanicalEvent::NetworkDestroyed { .. })));
    }

    #[test]
    fn unsupported_gear_breaks_in_cascade() {
        let (mut m, mut w) = setup();
        place(&mut m, &mut w, p(0, 0, -1), "axle-ns");
        place(&mut m, &mut w, p(0, 0, 0), "angled_gear-n");
        m.drain_events();

        m.break_block(&mut w, p(0, 0, -1)).unwrap();
        assert_eq!(m.node_count(), 0);
        assert!(w.is_air(p(0, 0, 0)));
        let events = m.drain_events();
        assert!(events.iter().any(|e| matches!(
            e,
            MechanicalEvent::NodeRemoved { reason: RemovalReason::Unsupported, pos, .. } if *pos == p(0, 0, 0)
        )));
        assert_eq!(m.network_count(), 0);
        m.validate().unwrap();
    }

    #[test]
    fn bent_gear_reverts_to_dead_end() {
        let (mut m, mut w) = setup();
        place(&mut m, &mut w, p(0, 0, -1), "axle-ns");
        place(&mut m, &mut w, p(0, 0, 0), "angled_gear-n");
        place(&mut m, &mut w, p(1, 0, 0), "axle-ew");

        m.break_block(&mut w, p(1, 0, 0)).unwrap();
        let gear = m.node(p(0, 0, 0)).unwrap();
        assert_eq!(gear.connections, set("n"));
        assert_eq!(gear.block_type, block(m.registry(), "angled_gear-n"));
        m.validate().unwrap();
    }

    #[test]
    fn breaking_air_is_an_error() {
        let (mut m, mut w) = setup();
        assert_eq!(
            m.break_block(&mut w, p(5, 5, 5)),
            Err(MechanicalError::NotANode { pos: p(5, 5, 5) })
        );
    }

    // -----------------------------------------------------------------------
    // Neighbor changes
    // -----------------------------------------------------------------------

    #[test]
    fn stale_neighbor_is_purged() {
        let (mut m, mut w) = setup();
        line(&mut m, &mut w, 3);
        // The host overwrites the middle axle without going through the module.
        w.set_block_type_at(p(1, 0, 0), block(m.registry(), STONE));

        m.on_neighbor_changed(&mut w, p(0, 0, 0));
        assert!(m.node(p(1, 0, 0)).is_none());
        assert_eq!(w.block_type_at(p(1, 0, 0)), Some(block(m.registry(), STONE)));
        assert_ne!(m.network_of(p(0, 0, 0)), m.network_of(p(2, 0, 0)));
        m.validate().unwrap();
        m.validate_world(&w).unwrap();
    }

    #[test]
    fn neighbor_change_is_idempotent() {
        let (mut m, mut w) = setup();
        line(&mut m, &mut w, 3);
        w.clear_block_at(p(2, 0, 0));

        m.on_neighbor_changed(&mut w, p(1, 0, 0));
        let nodes: Vec<_> = m.nodes().map(|(p, n)| (p, *n)).collect();
        let world = w.clone();
        m.drain_events();

        m.on_neighbor_changed(&mut w, p(1, 0, 0));
        let again: Vec<_> = m.nodes().map(|(p, n)| (p, *n)).collect();
        assert_eq!(nodes, again);
        assert_eq!(w, world);
        assert!(m.drain_events().is_empty());
    }

    #[test]
    fn neighbor_change_on_consistent_node_is_noop() {
        let (mut m, mut w) = setup();
        line(&mut m, &mut w, 2);
        m.drain_events();
        m.on_neighbor_changed(&mut w, p(0, 0, 0));
        assert!(m.drain_events().is_empty());
        assert_eq!(m.node_count(), 2);
    }

    // -----------------------------------------------------------------------
    // Disconnect toggle
    // -----------------------------------------------------------------------

    #[test]
    fn clutch_disconnect_splits_and_reconnect_merges() {
        let (mut m, mut w) = setup();
        place(&mut m, &mut w, p(0, 0, 0), "axle-ew");
        place(&mut m, &mut w, p(1, 0, 0), "clutch-ew");
        place(&mut m, &mut w, p(2, 0, 0), "axle-ew");
        assert_eq!(m.network_count(), 1);

        assert_eq!(m.toggle_disconnected(p(1, 0, 0)), Ok(true));
        assert_eq!(m.network_count(), 2);
        assert_eq!(m.network_of(p(1, 0, 0)), None);
        assert!(m.is_connector_active(p(1, 0, 0), Direction::East));
        assert_eq!(m.current_angular_speed(p(1, 0, 0)), fixed(0.0));
        m.validate().unwrap();

        assert_eq!(m.toggle_disconnected(p(1, 0, 0)), Ok(false));
        assert_eq!(m.network_count(), 1);
        m.validate().unwrap();
    }

    #[test]
    fn only_toggleable_nodes_toggle() {
        let (mut m, mut w) = setup();
        place(&mut m, &mut w, p(0, 0, 0), "axle-ew");
        assert_eq!(
            m.toggle_disconnected(p(0, 0, 0)),
            Err(MechanicalError::NotToggleable { pos: p(0, 0, 0) })
        );
        assert_eq!(
            m.toggle_disconnected(p(9, 0, 0)),
            Err(MechanicalError::NotANode { pos: p(9, 0, 0) })
        );
    }

    #[test]
    fn placing_next_to_disconnected_clutch_links_without_joining() {
        let (mut m, mut w) = setup();
        place(&mut m, &mut w, p(0, 0, 0), "clutch-ew");
        m.toggle_disconnected(p(0, 0, 0)).unwrap();
        place(&mut m, &mut w, p(1, 0, 0), "axle-ew");

        assert!(m.is_connector_active(p(1, 0, 0), Direction::West));
        assert_eq!(m.network_of(p(0, 0, 0)), None);
        assert_eq!(m.network_count(), 1);
        m.validate().unwrap();
    }

    // -----------------------------------------------------------------------
    // Numeric range
    // -----------------------------------------------------------------------

    #[test]
    fn placement_at_grid_edge_rejected_without_mutation() {
        let (mut m, mut w) = setup();
        let edge = p(i32::MAX, 0, 0);
        let axle = block(m.registry(), "axle-ns");

        let err = m.place(&mut w, edge, axle).unwrap_err();
        assert_eq!(err, PlacementError::OutOfBounds { pos: edge, block_type: axle });
        assert_eq!(m.node_count(), 0);
        assert_eq!(w.block_type_at(edge), None);

        place(&mut m, &mut w, p(i32::MAX - 1, 0, 0), "axle-ew");
        place(&mut m, &mut w, p(i32::MAX - 2, 0, 0), "axle-ew");
        assert_eq!(m.network_count(), 1);
        m.break_block(&mut w, p(i32::MAX - 1, 0, 0)).unwrap();
        m.on_neighbor_changed(&mut w, edge);
        m.validate_world(&w).unwrap();
    }

    #[test]
    fn huge_sources_link_without_overflow() {
        let mut builder = standard_builder();
        let mut dynamo = motor_family();
        dynamo.name = "dynamo".to_string();
        dynamo.variants = gearworks_core::descriptor::FamilyDef::variants_from_codes(&["ew"]);
        dynamo.role = gearworks_core::descriptor::NodeRole::Source {
            torque: fixed(1.5e9),
        };
        builder.register_family(dynamo);
        let mut m = MechanicalModule::new(builder.build().unwrap(), MechanicalConfig::default());
        let mut w = GridWorld::new();
        for x in 0..3 {
            place(&mut m, &mut w, p(x, 0, 0), "dynamo-ew");
        }

        let id = m.network_of(p(0, 0, 0)).unwrap();
        assert_eq!(m.network(id).unwrap().len(), 3);
        assert_eq!(m.network(id).unwrap().total_torque(), gearworks_core::fixed::Fixed64::MAX);
        for t in 1..=5 {
            m.tick(t);
        }
        assert_eq!(m.current_angular_speed(p(2, 0, 0)), m.config().max_speed);
    }
}

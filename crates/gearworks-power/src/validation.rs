//! Structural invariant checks over a [`MechanicalModule`].
//!
//! Nothing here is on the hot path. The checks rebuild connectivity from
//! scratch and are meant for tests, debug assertions, and load-time audits.

use crate::network::Network;
use crate::MechanicalModule;
use gearworks_core::direction::{ConnectorSet, Direction};
use gearworks_core::grid::GridPos;
use gearworks_core::id::{BlockTypeId, NetworkId};
use gearworks_spatial::BlockAccess;
use std::collections::BTreeSet;

/// One broken structural invariant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvariantViolation {
    #[error("network {network:?} lists {pos}, which is not an active member")]
    StrayMember { network: NetworkId, pos: GridPos },
    #[error("active node at {pos} has no network")]
    Networkless { pos: GridPos },
    #[error("node at {pos} points at missing network {network:?}")]
    DanglingNetwork { pos: GridPos, network: NetworkId },
    #[error("network {network:?} has no members")]
    EmptyNetwork { network: NetworkId },
    #[error("network {network:?} is not connected")]
    Disjoint { network: NetworkId },
    #[error("network {network:?} aggregates are out of date")]
    StaleAggregates { network: NetworkId },
    #[error("connector {dir} of {pos} is not mirrored by a neighbor")]
    AsymmetricEdge { pos: GridPos, dir: Direction },
    #[error("node at {pos} holds a variant that does not fit {connections}")]
    VariantMismatch { pos: GridPos, connections: ConnectorSet },
    #[error("satellite {pos} has no composite owning it")]
    OrphanSatellite { pos: GridPos },
    #[error("composite at {principal} is missing satellite {cell}")]
    MissingSatellite { principal: GridPos, cell: GridPos },
    #[error("world holds {found:?} at {pos}, expected {expected:?}")]
    WorldMismatch {
        pos: GridPos,
        expected: BlockTypeId,
        found: Option<BlockTypeId>,
    },
    #[error("{pos} links {dir} into a different network")]
    Unmerged { pos: GridPos, dir: Direction },
}

impl MechanicalModule {
    /// Check every internal invariant. Returns all violations found.
    pub fn validate(&self) -> Result<(), Vec<InvariantViolation>> {
        into_result(self.violations())
    }

    /// Like [`MechanicalModule::validate`], plus agreement with the world:
    /// every principal holds its variant and every satellite its placeholder.
    pub fn validate_world<W>(&self, world: &W) -> Result<(), Vec<InvariantViolation>>
    where
        W: BlockAccess + ?Sized,
    {
        let mut out = self.violations();
        out.extend(self.world_violations(world));
        into_result(out)
    }

    pub fn violations(&self) -> Vec<InvariantViolation> {
        let mut out = Vec::new();
        self.check_nodes(&mut out);
        self.check_networks(&mut out);
        self.check_satellites(&mut out);
        out
    }

    fn check_nodes(&self, out: &mut Vec<InvariantViolation>) {
        for (&pos, node) in &self.nodes {
            if self.registry.select_variant(node.block_type, node.connections)
                != Some(node.block_type)
            {
                out.push(InvariantViolation::VariantMismatch {
                    pos,
                    connections: node.connections,
                });
            }
            for dir in node.connections.iter() {
                if !self.edge_is_valid(pos, dir) {
                    out.push(InvariantViolation::AsymmetricEdge { pos, dir });
                }
            }

            if !node.is_active() {
                continue;
            }
            let Some(id) = node.network else {
                out.push(InvariantViolation::Networkless { pos });
                continue;
            };
            if !self.networks.get(id).is_some_and(|n| n.contains(pos)) {
                out.push(InvariantViolation::DanglingNetwork { pos, network: id });
            }
            for (dir, neighbor) in self.linked(pos) {
                let other = self.nodes.get(&neighbor);
                if other.is_some_and(|n| n.is_active() && n.network != Some(id)) {
                    out.push(InvariantViolation::Unmerged { pos, dir });
                }
            }
        }
    }

    fn check_networks(&self, out: &mut Vec<InvariantViolation>) {
        for net in self.networks.iter() {
            if net.is_empty() {
                out.push(InvariantViolation::EmptyNetwork { network: net.id });
                continue;
            }
            for &pos in net.members() {
                let ok = self
                    .nodes
                    .get(&pos)
                    .is_some_and(|n| n.is_active() && n.network == Some(net.id));
                if !ok {
                    out.push(InvariantViolation::StrayMember {
                        network: net.id,
                        pos,
                    });
                }
            }
            if self.components(net.members()).len() > 1 {
                out.push(InvariantViolation::Disjoint { network: net.id });
            }

            let mut fresh: Network = net.clone();
            fresh.recompute(|p| {
                self.nodes
                    .get(&p)
                    .and_then(|n| self.registry.descriptor(n.block_type))
            });
            if fresh.total_torque() != net.total_torque()
                || fresh.total_resistance() != net.total_resistance()
                || fresh.total_inertia() != net.total_inertia()
            {
                out.push(InvariantViolation::StaleAggregates { network: net.id });
            }
        }
    }

    fn check_satellites(&self, out: &mut Vec<InvariantViolation>) {
        let mut expected: BTreeSet<GridPos> = BTreeSet::new();
        for (&principal, node) in &self.nodes {
            let Some(shape) = self
                .registry
                .descriptor(node.block_type)
                .and_then(|d| d.composite.as_ref())
            else {
                continue;
            };
            for cell in shape.satellite_cells(principal) {
                expected.insert(cell);
                if self.satellites.get(&cell) != Some(&principal) {
                    out.push(InvariantViolation::MissingSatellite { principal, cell });
                }
            }
        }
        for &pos in self.satellites.keys() {
            if !expected.contains(&pos) {
                out.push(InvariantViolation::OrphanSatellite { pos });
            }
        }
    }

    fn world_violations<W>(&self, world: &W) -> Vec<InvariantViolation>
    where
        W: BlockAccess + ?Sized,
    {
        let mut out = Vec::new();
        let mut expect = |pos: GridPos, expected: BlockTypeId| {
            let found = world.block_type_at(pos);
            if found != Some(expected) {
                out.push(InvariantViolation::WorldMismatch {
                    pos,
                    expected,
                    found,
                });
            }
        };
        for (&pos, node) in &self.nodes {
            expect(pos, node.block_type);
            if let Some(shape) = self
                .registry
                .descriptor(node.block_type)
                .and_then(|d| d.composite.as_ref())
            {
                for cell in shape.satellite_cells(pos) {
                    expect(cell, shape.placeholder);
                }
            }
        }
        out
    }
}

fn into_result(violations: Vec<InvariantViolation>) -> Result<(), Vec<InvariantViolation>> {
    if violations.is_empty() {
        Ok(())
    } else {
        Err(violations)
    }
}

#[cfg(test)]
mod tests {
    use super::InvariantViolation;
    use crate::MechanicalModule;
    use gearworks_core::config::MechanicalConfig;
    use gearworks_core::direction::Direction;
    use gearworks_core::grid::GridPos;
    use gearworks_core::test_utils::*;
    use gearworks_spatial::{BlockAccess, GridWorld};

    fn line(len: i32) -> (MechanicalModule, GridWorld) {
        let mut m = MechanicalModule::new(standard_registry(), MechanicalConfig::default());
        let mut w = GridWorld::new();
        let axle = block(m.registry(), "axle-ew");
        for x in 0..len {
            m.place(&mut w, GridPos::new(x, 0, 0), axle).unwrap();
        }
        (m, w)
    }

    #[test]
    fn consistent_module_passes() {
        let (m, w) = line(4);
        m.validate_world(&w).unwrap();
        assert!(m.violations().is_empty());
    }

    #[test]
    fn detects_world_drift() {
        let (m, mut w) = line(2);
        let stone = block(m.registry(), STONE);
        w.set_block_type_at(GridPos::new(1, 0, 0), stone);
        let errs = m.validate_world(&w).unwrap_err();
        assert!(errs.iter().any(|e| matches!(
            e,
            InvariantViolation::WorldMismatch { found: Some(f), .. } if *f == stone
        )));
        // The internal view is still self-consistent.
        m.validate().unwrap();
    }

    #[test]
    fn detects_one_sided_edge() {
        let (mut m, _w) = line(2);
        let right = GridPos::new(1, 0, 0);
        if let Some(n) = m.nodes.get_mut(&right) {
            n.connections.remove(Direction::West);
        }
        let errs = m.validate().unwrap_err();
        assert!(errs.contains(&InvariantViolation::AsymmetricEdge {
            pos: GridPos::ORIGIN,
            dir: Direction::East,
        }));
    }

    #[test]
    fn detects_unmerged_neighbors() {
        let (mut m, _w) = line(2);
        let right = GridPos::new(1, 0, 0);
        let id = m.network_of(right).unwrap();
        if let Some(net) = m.networks.get_mut(id) {
            net.remove(right);
        }
        let fresh = m.networks.create();
        if let Some(net) = m.networks.get_mut(fresh) {
            net.insert(right);
        }
        if let Some(n) = m.nodes.get_mut(&right) {
            n.network = Some(fresh);
        }
        let errs = m.validate().unwrap_err();
        assert!(errs.iter().any(|e| matches!(e, InvariantViolation::Unmerged { .. })));
    }

    #[test]
    fn detects_disjoint_network() {
        let (mut m, _w) = line(3);
        let mid = GridPos::new(1, 0, 0);
        // Cut both edges around the middle without splitting.
        for (pos, dir) in [
            (GridPos::ORIGIN, Direction::East),
            (mid, Direction::West),
            (mid, Direction::East),
            (GridPos::new(2, 0, 0), Direction::West),
        ] {
            if let Some(n) = m.nodes.get_mut(&pos) {
                n.connections.remove(dir);
            }
        }
        let errs = m.validate().unwrap_err();
        assert!(errs.iter().any(|e| matches!(e, InvariantViolation::Disjoint { .. })));
    }
}

//! Multi-cell composite structures.
//!
//! A composite is one logical node at its principal cell. Every satellite
//! cell holds the shape's placeholder block in the world and a record that
//! only points back at the principal. Satellites never outlive their
//! principal.

use crate::error::PlacementError;
use crate::resolver::Cascade;
use crate::MechanicalModule;
use gearworks_core::descriptor::NodeDescriptor;
use gearworks_core::direction::ConnectorSet;
use gearworks_core::event::{MechanicalEvent, RemovalReason};
use gearworks_core::grid::GridPos;
use gearworks_core::id::BlockTypeId;
use gearworks_spatial::{first_blocked, BlockAccess};
use tracing::{debug, warn};

impl MechanicalModule {
    /// Every cell must be free of live records and either air, replaceable,
    /// or an orphaned mechanical block left behind by an integrity fault.
    pub(crate) fn check_footprint<W>(&self, world: &W, cells: &[GridPos]) -> Result<(), PlacementError>
    where
        W: BlockAccess + ?Sized,
    {
        if let Some(&pos) = cells
            .iter()
            .find(|c| self.nodes.contains_key(*c) || self.satellites.contains_key(*c))
        {
            return Err(PlacementError::Occupied { pos });
        }
        match first_blocked(world, cells.iter().copied(), |c| self.is_orphan(world, c)) {
            Some(pos) => Err(PlacementError::Occupied { pos }),
            None => Ok(()),
        }
    }

    /// A mechanical or placeholder block in the world with no record behind
    /// it. Treated as a plain overwritable cell.
    pub(crate) fn is_orphan<W>(&self, world: &W, pos: GridPos) -> bool
    where
        W: BlockAccess + ?Sized,
    {
        if self.principal_of(pos).is_some() {
            return false;
        }
        world
            .block_type_at(pos)
            .is_some_and(|b| self.registry.is_placeholder(b) || self.registry.is_mechanical(b))
    }

    /// Write the principal block and one placeholder per satellite cell.
    pub(crate) fn write_footprint<W>(
        &mut self,
        world: &mut W,
        pos: GridPos,
        block_type: BlockTypeId,
        desc: &NodeDescriptor,
    ) where
        W: BlockAccess + ?Sized,
    {
        for cell in desc.footprint(pos) {
            if self.is_orphan(world, cell) {
                warn!(%cell, "reclaiming orphaned mechanical cell");
            }
        }
        world.set_block_type_at(pos, block_type);
        if let Some(shape) = &desc.composite {
            for cell in shape.satellite_cells(pos) {
                world.set_block_type_at(cell, shape.placeholder);
                self.satellites.insert(cell, pos);
            }
        }
    }

    /// Drop the satellite records of the composite at `pos` and clear the
    /// cells that still hold its placeholder.
    pub(crate) fn clear_satellites<W>(&mut self, world: &mut W, pos: GridPos, desc: &NodeDescriptor)
    where
        W: BlockAccess + ?Sized,
    {
        let Some(shape) = &desc.composite else {
            return;
        };
        for cell in shape.satellite_cells(pos) {
            if self.satellites.get(&cell) == Some(&pos) {
                self.satellites.remove(&cell);
            }
            if world.block_type_at(cell) == Some(shape.placeholder) {
                world.clear_block_at(cell);
            }
        }
    }

    /// First satellite cell of the composite at `principal` whose
    /// placeholder is gone from the world.
    pub(crate) fn missing_satellite<W>(&self, world: &W, principal: GridPos) -> Option<GridPos>
    where
        W: BlockAccess + ?Sized,
    {
        let shape = self.descriptor_at(principal)?.composite.as_ref()?;
        shape
            .satellite_cells(principal)
            .find(|c| world.block_type_at(*c) != Some(shape.placeholder))
    }

    /// A satellite of the composite at `principal` was broken. Either the
    /// whole structure goes, or it detaches to its single-cell fallback.
    pub(crate) fn break_satellite<W>(&mut self, world: &mut W, principal: GridPos, cascade: &mut Cascade)
    where
        W: BlockAccess + ?Sized,
    {
        let detach_to = self
            .descriptor_at(principal)
            .and_then(|d| d.composite.as_ref())
            .and_then(|s| s.detach_to);
        match detach_to {
            Some(target) => self.detach(world, principal, target, cascade),
            None => cascade.remove(principal, RemovalReason::Broken),
        }
    }

    /// Revert the composite at `principal` to the single-cell block
    /// `target`. Links that no longer line up with the smaller shape are
    /// severed on both sides; network membership is kept.
    fn detach<W>(&mut self, world: &mut W, principal: GridPos, target: BlockTypeId, cascade: &mut Cascade)
    where
        W: BlockAccess + ?Sized,
    {
        let Some(node) = self.nodes.get(&principal).copied() else {
            return;
        };
        let (Some(old), Some(new)) = (
            self.registry.descriptor(node.block_type).cloned(),
            self.registry.descriptor(target).cloned(),
        ) else {
            cascade.remove(principal, RemovalReason::Broken);
            return;
        };

        self.clear_satellites(world, principal, &old);

        let mut kept = ConnectorSet::EMPTY;
        let mut severed = Vec::new();
        for dir in node.connections.iter() {
            let exit = old.connector_target(principal, dir);
            if new.accepts_connector(dir) && new.connector_target(principal, dir) == exit {
                kept.insert(dir);
            } else {
                severed.push((dir, self.principal_of(exit)));
            }
        }

        if let Some(n) = self.nodes.get_mut(&principal) {
            n.block_type = target;
            n.connections = kept;
        }
        world.set_block_type_at(principal, target);
        cascade.touch(node.network);
        debug!(%principal, from = ?node.block_type, to = ?target, "detached composite");
        self.emit(MechanicalEvent::CompositeDetached {
            principal,
            from: node.block_type,
            to: target,
            tick: self.tick,
        });

        for (dir, neighbor) in severed {
            self.emit(MechanicalEvent::ConnectorUnlinked {
                pos: principal,
                dir,
                tick: self.tick,
            });
            if let Some(neighbor) = neighbor {
                self.unlink(world, neighbor, dir.opposite(), cascade);
            }
        }
        self.reselect(world, principal, cascade);
        if let Some(id) = node.network {
            self.refresh(id);
        }
    }
}

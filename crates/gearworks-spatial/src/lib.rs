//! Host world contract for the mechanical engine.
//!
//! The engine never owns the block grid. It reads and writes block types
//! through [`BlockAccess`], which the host implements over its own world
//! storage. [`GridWorld`] is a sparse in-memory implementation used by tests,
//! benchmarks, and demos.

use gearworks_core::direction::Direction;
use gearworks_core::grid::GridPos;
use gearworks_core::id::BlockTypeId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// ---------------------------------------------------------------------------
// BlockAccess
// ---------------------------------------------------------------------------

/// Read/write access to the host's block grid.
pub trait BlockAccess {
    /// Block type at `pos`, or `None` for air.
    fn block_type_at(&self, pos: GridPos) -> Option<BlockTypeId>;

    /// Overwrite the block at `pos`.
    fn set_block_type_at(&mut self, pos: GridPos, block_type: BlockTypeId);

    /// Turn `pos` into air.
    fn clear_block_at(&mut self, pos: GridPos);

    /// True if a placement may overwrite whatever is at `pos` (air, plants,
    /// loose debris).
    fn is_replaceable(&self, pos: GridPos) -> bool;

    fn is_air(&self, pos: GridPos) -> bool {
        self.block_type_at(pos).is_none()
    }
}

/// First cell in `cells` that cannot be overwritten, where `claimable` lets
/// the caller treat extra cells (such as orphaned placeholders) as free.
pub fn first_blocked<W, I, F>(world: &W, cells: I, claimable: F) -> Option<GridPos>
where
    W: BlockAccess + ?Sized,
    I: IntoIterator<Item = GridPos>,
    F: Fn(GridPos) -> bool,
{
    cells
        .into_iter()
        .find(|&pos| !world.is_air(pos) && !world.is_replaceable(pos) && !claimable(pos))
}

// ---------------------------------------------------------------------------
// GridWorld
// ---------------------------------------------------------------------------

/// Sparse 3D block grid. Cells not present are air.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridWorld {
    blocks: BTreeMap<GridPos, BlockTypeId>,
    replaceable: BTreeSet<BlockTypeId>,
}

impl GridWorld {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a block type as replaceable by placements.
    pub fn with_replaceable(mut self, block_type: BlockTypeId) -> Self {
        self.replaceable.insert(block_type);
        self
    }

    pub fn set_replaceable(&mut self, block_type: BlockTypeId, replaceable: bool) {
        if replaceable {
            self.replaceable.insert(block_type);
        } else {
            self.replaceable.remove(&block_type);
        }
    }

    pub fn is_occupied(&self, pos: GridPos) -> bool {
        self.blocks.contains_key(&pos)
    }

    /// Number of non-air cells.
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Iterate over all non-air cells in position order.
    pub fn iter(&self) -> impl Iterator<Item = (GridPos, BlockTypeId)> + '_ {
        self.blocks.iter().map(|(p, b)| (*p, *b))
    }

    /// All non-air cells inside an axis-aligned box (inclusive).
    pub fn blocks_in_box(&self, min: GridPos, max: GridPos) -> Vec<(GridPos, BlockTypeId)> {
        self.blocks
            .range(min..=max)
            .filter(|(p, _)| {
                (min.x..=max.x).contains(&p.x)
                    && (min.y..=max.y).contains(&p.y)
                    && (min.z..=max.z).contains(&p.z)
            })
            .map(|(p, b)| (*p, *b))
            .collect()
    }

    /// The non-air face neighbors of `pos`, in direction order.
    pub fn neighbors(&self, pos: GridPos) -> Vec<(Direction, BlockTypeId)> {
        Direction::ALL
            .into_iter()
            .filter_map(|d| {
                let cell = pos.checked_neighbor(d)?;
                self.blocks.get(&cell).map(|b| (d, *b))
            })
            .collect()
    }

    /// Count of cells holding `block_type`.
    pub fn count_of(&self, block_type: BlockTypeId) -> usize {
        self.blocks.values().filter(|b| **b == block_type).count()
    }
}

impl BlockAccess for GridWorld {
    fn block_type_at(&self, pos: GridPos) -> Option<BlockTypeId> {
        self.blocks.get(&pos).copied()
    }

    fn set_block_type_at(&mut self, pos: GridPos, block_type: BlockTypeId) {
        self.blocks.insert(pos, block_type);
    }

    fn clear_block_at(&mut self, pos: GridPos) {
        self.blocks.remove(&pos);
    }

    fn is_replaceable(&self, pos: GridPos) -> bool {
        match self.blocks.get(&pos) {
            None => true,
            Some(b) => self.replaceable.contains(b),
        }
    }
}

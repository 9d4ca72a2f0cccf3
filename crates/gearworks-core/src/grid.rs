use crate::direction::Direction;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A cell on the 3D block grid. The identity of a placed node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl GridPos {
    pub const ORIGIN: GridPos = GridPos { x: 0, y: 0, z: 0 };

    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// The adjacent cell in the given direction.
    ///
    /// The step must stay inside the `i32` range. Placement only admits
    /// nodes whose cells and connector targets pass
    /// [`GridPos::checked_neighbor`], so the resolver never steps off the
    /// edge.
    pub fn neighbor(self, dir: Direction) -> GridPos {
        let (dx, dy, dz) = dir.offset();
        GridPos::new(self.x + dx, self.y + dy, self.z + dz)
    }

    pub fn offset(self, offset: GridOffset) -> GridPos {
        GridPos::new(self.x + offset.dx, self.y + offset.dy, self.z + offset.dz)
    }

    /// The adjacent cell, or `None` at the edge of the coordinate range.
    pub fn checked_neighbor(self, dir: Direction) -> Option<GridPos> {
        let (dx, dy, dz) = dir.offset();
        self.checked_offset(GridOffset::new(dx, dy, dz))
    }

    pub fn checked_offset(self, offset: GridOffset) -> Option<GridPos> {
        Some(GridPos::new(
            self.x.checked_add(offset.dx)?,
            self.y.checked_add(offset.dy)?,
            self.z.checked_add(offset.dz)?,
        ))
    }

    /// The offset that takes `origin` to `self`.
    pub fn offset_from(self, origin: GridPos) -> GridOffset {
        GridOffset::new(self.x - origin.x, self.y - origin.y, self.z - origin.z)
    }

    /// Manhattan distance to another position.
    pub fn manhattan_distance(&self, other: &GridPos) -> u32 {
        self.x
            .abs_diff(other.x)
            .saturating_add(self.y.abs_diff(other.y))
            .saturating_add(self.z.abs_diff(other.z))
    }

    /// The direction leading to `other` when the two cells share a face.
    pub fn direction_to(self, other: GridPos) -> Option<Direction> {
        Direction::ALL
            .into_iter()
            .find(|d| self.checked_neighbor(*d) == Some(other))
    }
}

impl fmt::Display for GridPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// A relative offset between two cells, used for composite shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct GridOffset {
    pub dx: i32,
    pub dy: i32,
    pub dz: i32,
}

impl GridOffset {
    pub const ZERO: GridOffset = GridOffset { dx: 0, dy: 0, dz: 0 };

    pub fn new(dx: i32, dy: i32, dz: i32) -> Self {
        Self { dx, dy, dz }
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }
}

impl From<[i32; 3]> for GridOffset {
    fn from(v: [i32; 3]) -> Self {
        GridOffset::new(v[0], v[1], v[2])
    }
}

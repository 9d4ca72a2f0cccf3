use gearworks_core::grid::GridPos;
use gearworks_core::id::BlockTypeId;

/// Why a placement was rejected. A rejected placement mutates nothing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlacementError {
    #[error("unknown block type {0:?}")]
    UnknownBlockType(BlockTypeId),
    #[error("block type {0:?} is not a mechanical component")]
    NotMechanical(BlockTypeId),
    #[error("cell {pos} is occupied")]
    Occupied { pos: GridPos },
    /// A footprint cell or connector target would leave the `i32`
    /// coordinate range.
    #[error("{block_type:?} does not fit at {pos}: too close to the edge of the grid")]
    OutOfBounds { pos: GridPos, block_type: BlockTypeId },
    #[error("no neighbor can support {block_type:?} at {pos}")]
    MissingSupport { pos: GridPos, block_type: BlockTypeId },
}

/// Errors from interaction entry points.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MechanicalError {
    #[error("no mechanical node at {pos}")]
    NotANode { pos: GridPos },
    #[error("node at {pos} cannot be disconnected")]
    NotToggleable { pos: GridPos },
}

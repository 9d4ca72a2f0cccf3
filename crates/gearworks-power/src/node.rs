use gearworks_core::direction::ConnectorSet;
use gearworks_core::grid::GridPos;
use gearworks_core::id::{BlockTypeId, NetworkId};
use serde::{Deserialize, Serialize};

/// Mutable state of one placed node, keyed by its principal cell.
///
/// `block_type` is the currently active orientation variant. It always
/// matches the block the world holds at the principal cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeBehavior {
    pub block_type: BlockTypeId,
    /// Realized links. Always a subset of the active variant's connectors,
    /// within its capacity, and mirrored by the neighbor on the far side.
    pub connections: ConnectorSet,
    /// Non-owning handle into the network table.
    pub network: Option<NetworkId>,
    /// Explicitly severed from power flow (clutch disengaged). Edges stay
    /// realized; the node just belongs to no network.
    pub disconnected: bool,
}

impl NodeBehavior {
    pub fn new(block_type: BlockTypeId, connections: ConnectorSet) -> Self {
        Self {
            block_type,
            connections,
            network: None,
            disconnected: false,
        }
    }

    /// Takes part in power propagation.
    pub fn is_active(&self) -> bool {
        !self.disconnected
    }
}

/// What a successful placement committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlacementOutcome {
    pub principal: GridPos,
    /// The variant actually written, after re-selection against the
    /// discovered connectors.
    pub block_type: BlockTypeId,
    pub connections: ConnectorSet,
    pub network: Option<NetworkId>,
}

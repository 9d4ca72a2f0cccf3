//! Save and load of placed mechanical nodes.
//!
//! Only per-node state is written. Satellites are implied by each
//! composite's shape and networks are rebuilt from the saved links, so the
//! rotational state of every network restarts at rest after a load.

use crate::node::NodeBehavior;
use crate::MechanicalModule;
use gearworks_core::config::MechanicalConfig;
use gearworks_core::direction::{ConnectorSet, Direction};
use gearworks_core::fixed::Ticks;
use gearworks_core::grid::GridPos;
use gearworks_core::id::BlockTypeId;
use gearworks_core::registry::DescriptorRegistry;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Magic number identifying a Gearworks mechanical save.
pub const SAVE_MAGIC: u32 = 0x6EA2_0001;

/// Current format version. Increment when breaking the wire format.
pub const FORMAT_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum SerializeError {
    #[error("bitcode encoding failed: {0}")]
    Encode(String),
}

#[derive(Debug, thiserror::Error)]
pub enum DeserializeError {
    #[error("invalid magic number: expected 0x{:08X}, got 0x{:08X}", SAVE_MAGIC, .0)]
    InvalidMagic(u32),
    #[error("unsupported format version: expected {}, got {}", FORMAT_VERSION, .0)]
    UnsupportedVersion(u32),
    #[error("save from future version {0} (this build supports up to {FORMAT_VERSION})")]
    FutureVersion(u32),
    #[error("bitcode decoding failed: {0}")]
    Decode(String),
    #[error("record at {pos} names unknown block type {block_type:?}")]
    UnknownBlockType { pos: GridPos, block_type: BlockTypeId },
    #[error("record at {pos} is inconsistent with its block type")]
    InvalidRecord { pos: GridPos },
    #[error("record at {pos} overlaps another structure")]
    Overlap { pos: GridPos },
    #[error("saved connector {dir} of {pos} has no matching neighbor")]
    AsymmetricEdge { pos: GridPos, dir: Direction },
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// Header prepended to every save. Checked before the records are used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveHeader {
    pub magic: u32,
    pub version: u32,
    /// Tick at which the save was taken.
    pub tick: Ticks,
}

impl SaveHeader {
    pub fn new(tick: Ticks) -> Self {
        Self {
            magic: SAVE_MAGIC,
            version: FORMAT_VERSION,
            tick,
        }
    }

    pub fn validate(&self) -> Result<(), DeserializeError> {
        if self.magic != SAVE_MAGIC {
            return Err(DeserializeError::InvalidMagic(self.magic));
        }
        if self.version > FORMAT_VERSION {
            return Err(DeserializeError::FutureVersion(self.version));
        }
        if self.version < FORMAT_VERSION {
            return Err(DeserializeError::UnsupportedVersion(self.version));
        }
        Ok(())
    }
}

/// Persisted state of one principal node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub pos: GridPos,
    pub block_type: BlockTypeId,
    pub connections: ConnectorSet,
    pub disconnected: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct SaveFile {
    header: SaveHeader,
    nodes: Vec<NodeRecord>,
}

/// Decode only far enough to return the header.
pub fn read_save_header(data: &[u8]) -> Result<SaveHeader, DeserializeError> {
    let file: SaveFile =
        bitcode::deserialize(data).map_err(|e| DeserializeError::Decode(e.to_string()))?;
    Ok(file.header)
}

// ---------------------------------------------------------------------------
// Save / load
// ---------------------------------------------------------------------------

impl MechanicalModule {
    /// One record per principal node, in position order.
    pub fn records(&self) -> Vec<NodeRecord> {
        self.nodes
            .iter()
            .map(|(&pos, n)| NodeRecord {
                pos,
                block_type: n.block_type,
                connections: n.connections,
                disconnected: n.disconnected,
            })
            .collect()
    }

    pub fn save(&self, tick: Ticks) -> Result<Vec<u8>, SerializeError> {
        let file = SaveFile {
            header: SaveHeader::new(tick),
            nodes: self.records(),
        };
        bitcode::serialize(&file).map_err(|e| SerializeError::Encode(e.to_string()))
    }

    /// Rebuild a module from [`MechanicalModule::save`] output.
    ///
    /// Records are checked against `registry`: every block type must be a
    /// mechanical variant that fits its saved connections, footprints must
    /// not overlap, and every saved link must be mirrored. Networks are then
    /// recomputed from the links.
    pub fn load(
        registry: DescriptorRegistry,
        config: MechanicalConfig,
        data: &[u8],
    ) -> Result<Self, DeserializeError> {
        let file: SaveFile =
            bitcode::deserialize(data).map_err(|e| DeserializeError::Decode(e.to_string()))?;
        file.header.validate()?;

        let mut module = MechanicalModule::new(registry, config);
        module.tick = file.header.tick;

        for record in &file.nodes {
            module.restore(record)?;
        }

        for (&pos, node) in &module.nodes {
            for dir in node.connections.iter() {
                if !module.edge_is_valid(pos, dir) {
                    return Err(DeserializeError::AsymmetricEdge { pos, dir });
                }
            }
        }

        let active: BTreeSet<GridPos> = module
            .nodes
            .iter()
            .filter(|(_, n)| n.is_active())
            .map(|(p, _)| *p)
            .collect();
        for component in module.components(&active) {
            let id = module.networks.create();
            for p in &component {
                if let Some(node) = module.nodes.get_mut(p) {
                    node.network = Some(id);
                }
            }
            if let Some(net) = module.networks.get_mut(id) {
                for p in &component {
                    net.insert(*p);
                }
            }
            module.refresh(id);
        }

        debug!(
            nodes = module.nodes.len(),
            networks = module.networks.len(),
            tick = module.tick,
            "loaded mechanical save"
        );
        Ok(module)
    }

    fn restore(&mut self, record: &NodeRecord) -> Result<(), DeserializeError> {
        let pos = record.pos;
        let desc = self
            .registry
            .descriptor(record.block_type)
            .ok_or(DeserializeError::UnknownBlockType {
                pos,
                block_type: record.block_type,
            })?;
        let fits = self
            .registry
            .select_variant(record.block_type, record.connections)
            == Some(record.block_type);
        if !fits
            || (record.disconnected && !desc.toggleable)
            || !self.registry.fits_at(record.block_type, pos)
        {
            return Err(DeserializeError::InvalidRecord { pos });
        }

        let footprint = desc.footprint(pos);
        if footprint
            .iter()
            .any(|c| self.nodes.contains_key(c) || self.satellites.contains_key(c))
        {
            return Err(DeserializeError::Overlap { pos });
        }
        for cell in footprint.into_iter().filter(|c| *c != pos) {
            self.satellites.insert(cell, pos);
        }

        let mut node = NodeBehavior::new(record.block_type, record.connections);
        node.disconnected = record.disconnected;
        self.nodes.insert(pos, node);
        Ok(())
    }
}

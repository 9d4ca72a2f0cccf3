//! Static per-block-type metadata.
//!
//! A [`NodeDescriptor`] describes one orientation variant of a component
//! family. Orientation lives in the block type itself, so changing which
//! directions a node spans means exchanging the block for a sibling variant.

use crate::direction::{ConnectorSet, Direction};
use crate::fixed::Fixed64;
use crate::grid::{GridOffset, GridPos};
use crate::id::{BlockTypeId, FamilyId};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Roles
// ---------------------------------------------------------------------------

/// Whether a node injects torque or only relays it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NodeRole {
    #[default]
    Relay,
    Source {
        torque: Fixed64,
    },
}

impl NodeRole {
    pub fn is_source(&self) -> bool {
        matches!(self, NodeRole::Source { .. })
    }

    /// Torque injected into the owning network.
    pub fn torque(&self) -> Fixed64 {
        match self {
            NodeRole::Relay => Fixed64::ZERO,
            NodeRole::Source { torque } => *torque,
        }
    }
}

// ---------------------------------------------------------------------------
// Composite shapes
// ---------------------------------------------------------------------------

/// The rigid multi-cell shape of a composite structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositeShape {
    /// Satellite cells relative to the principal. Never contains the zero
    /// offset.
    pub satellites: Vec<GridOffset>,
    /// Block type written into every satellite cell.
    pub placeholder: BlockTypeId,
    /// Cell (relative to the principal) each connector exits from. Connectors
    /// not listed exit from the principal cell.
    pub anchors: Vec<(Direction, GridOffset)>,
    /// Single-cell block type the principal reverts to when a satellite is
    /// broken. `None` means breaking any satellite breaks the whole structure.
    pub detach_to: Option<BlockTypeId>,
}

impl CompositeShape {
    /// Every cell of the footprint, principal first.
    pub fn cells(&self, principal: GridPos) -> impl Iterator<Item = GridPos> + '_ {
        std::iter::once(principal).chain(self.satellites.iter().map(move |o| principal.offset(*o)))
    }

    /// Satellite cells only.
    pub fn satellite_cells(&self, principal: GridPos) -> impl Iterator<Item = GridPos> + '_ {
        self.satellites.iter().map(move |o| principal.offset(*o))
    }

    pub fn anchor(&self, dir: Direction) -> GridOffset {
        self.anchors
            .iter()
            .find(|(d, _)| *d == dir)
            .map(|(_, o)| *o)
            .unwrap_or(GridOffset::ZERO)
    }
}

// ---------------------------------------------------------------------------
// Node descriptor
// ---------------------------------------------------------------------------

/// Immutable metadata for one mechanical block type (one orientation variant).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDescriptor {
    pub block_type: BlockTypeId,
    pub family: FamilyId,
    /// `"{family}-{orientation}"`, unique across the registry.
    pub name: String,
    /// Orientation code of this variant, e.g. `"ns"`.
    pub orientation: String,
    /// Directions this variant can realize edges on.
    pub connectors: ConnectorSet,
    /// Maximum simultaneous realized connectors. Never exceeds
    /// `connectors.len()`.
    pub capacity: u8,
    pub role: NodeRole,
    pub resistance: Fixed64,
    pub inertia: Fixed64,
    /// The family has a valid zero-connector state.
    pub standalone: bool,
    /// Orientation follows the realized connectors (angled gears). Fixed
    /// families keep the variant the player placed.
    pub adaptive: bool,
    /// Accepts the clutch/brake disconnect toggle.
    pub toggleable: bool,
    pub composite: Option<CompositeShape>,
}

impl NodeDescriptor {
    pub fn accepts_connector(&self, dir: Direction) -> bool {
        self.connectors.contains(dir)
    }

    /// True if this variant can hold exactly the given realized set.
    pub fn supports(&self, realized: ConnectorSet) -> bool {
        realized.is_subset(self.connectors) && realized.len() <= self.capacity as usize
    }

    pub fn is_source(&self) -> bool {
        self.role.is_source()
    }

    pub fn is_composite(&self) -> bool {
        self.composite.is_some()
    }

    /// Cell (relative to the principal) the connector in `dir` exits from.
    pub fn anchor(&self, dir: Direction) -> GridOffset {
        self.composite
            .as_ref()
            .map(|c| c.anchor(dir))
            .unwrap_or(GridOffset::ZERO)
    }

    /// The cell on the far side of the connector in `dir` for a node whose
    /// principal sits at `principal`.
    pub fn connector_target(&self, principal: GridPos, dir: Direction) -> GridPos {
        principal.offset(self.anchor(dir)).neighbor(dir)
    }

    /// True if every footprint cell and every connector target of a node at
    /// `principal` lies inside the `i32` coordinate range.
    pub fn fits_at(&self, principal: GridPos) -> bool {
        let cells_fit = self.composite.as_ref().is_none_or(|shape| {
            shape
                .satellites
                .iter()
                .all(|o| principal.checked_offset(*o).is_some())
        });
        cells_fit
            && self.connectors.iter().all(|dir| {
                principal
                    .checked_offset(self.anchor(dir))
                    .and_then(|exit| exit.checked_neighbor(dir))
                    .is_some()
            })
    }

    /// Every cell this block occupies when its principal sits at `principal`.
    pub fn footprint(&self, principal: GridPos) -> Vec<GridPos> {
        match &self.composite {
            Some(shape) => shape.cells(principal).collect(),
            None => vec![principal],
        }
    }
}

// ---------------------------------------------------------------------------
// Family definitions (registration input)
// ---------------------------------------------------------------------------

/// One variant entry in a [`FamilyDef`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantDef {
    pub connectors: ConnectorSet,
    /// Defaults to `connectors.len()` when `None`.
    pub capacity: Option<u8>,
}

impl VariantDef {
    pub fn new(connectors: ConnectorSet) -> Self {
        Self {
            connectors,
            capacity: None,
        }
    }

    pub fn with_capacity(connectors: ConnectorSet, capacity: u8) -> Self {
        Self {
            connectors,
            capacity: Some(capacity),
        }
    }
}

/// Shape definition referenced by name before placeholder ids are known.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CompositeDef {
    pub satellites: Vec<GridOffset>,
    pub placeholder: String,
    pub anchors: Vec<(Direction, GridOffset)>,
    pub detach_to: Option<String>,
}

/// Everything needed to register a component family.
#[derive(Debug, Clone, PartialEq)]
pub struct FamilyDef {
    pub name: String,
    pub variants: Vec<VariantDef>,
    pub role: NodeRole,
    pub resistance: Fixed64,
    pub inertia: Fixed64,
    pub standalone: bool,
    pub adaptive: bool,
    pub toggleable: bool,
    pub composite: Option<CompositeDef>,
}

impl FamilyDef {
    /// A fixed-orientation relay family with unit inertia and no resistance.
    pub fn relay(name: &str, variants: Vec<VariantDef>) -> Self {
        Self {
            name: name.to_string(),
            variants,
            role: NodeRole::Relay,
            resistance: Fixed64::ZERO,
            inertia: Fixed64::ONE,
            standalone: true,
            adaptive: false,
            toggleable: false,
            composite: None,
        }
    }

    /// Build variants from orientation codes like `["ns", "ew", "ud"]`.
    /// Invalid codes are skipped.
    pub fn variants_from_codes(codes: &[&str]) -> Vec<VariantDef> {
        codes
            .iter()
            .filter_map(|c| ConnectorSet::from_code(c))
            .map(VariantDef::new)
            .collect()
    }
}

//! Serde data file structs for mechanical block catalogs.
//!
//! These structs define the on-disk format for plain blocks, component
//! families, and engine tunables. They are deserialized from RON, JSON, or
//! TOML data files and then resolved into registry types by the loader.
//! Numbers are plain `f64` on disk and converted to fixed point on load.

use serde::Deserialize;

// ===========================================================================
// Plain blocks
// ===========================================================================

/// A non-mechanical block type the host world knows about.
#[derive(Debug, Clone, Deserialize)]
pub struct BlockData {
    pub name: String,
    /// Placement may overwrite this block (grass, snow layers, fluids).
    #[serde(default)]
    pub replaceable: bool,
    /// Filler block written into composite satellite cells.
    #[serde(default)]
    pub placeholder: bool,
}

// ===========================================================================
// Families
// ===========================================================================

/// A variant entry, supporting both the short code form and a full form
/// with an explicit capacity.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum VariantData {
    /// Short form: `"ns"`. Capacity equals the connector count.
    Code(String),
    /// Full form: `{ connectors: "nesw", capacity: 2 }`.
    Full {
        connectors: String,
        #[serde(default)]
        capacity: Option<u8>,
    },
}

impl VariantData {
    pub fn code(&self) -> &str {
        match self {
            VariantData::Code(code) => code,
            VariantData::Full { connectors, .. } => connectors,
        }
    }

    pub fn capacity(&self) -> Option<u8> {
        match self {
            VariantData::Code(_) => None,
            VariantData::Full { capacity, .. } => *capacity,
        }
    }
}

/// A component family definition in a data file.
#[derive(Debug, Clone, Deserialize)]
pub struct FamilyData {
    pub name: String,
    pub variants: Vec<VariantData>,
    /// Present for torque sources (motors, water wheels).
    #[serde(default)]
    pub torque: Option<f64>,
    #[serde(default)]
    pub resistance: f64,
    #[serde(default = "default_inertia")]
    pub inertia: f64,
    #[serde(default = "default_true")]
    pub standalone: bool,
    #[serde(default)]
    pub adaptive: bool,
    #[serde(default)]
    pub toggleable: bool,
    #[serde(default)]
    pub composite: Option<CompositeData>,
}

fn default_inertia() -> f64 {
    1.0
}

fn default_true() -> bool {
    true
}

/// Multi-cell shape of a composite family.
#[derive(Debug, Clone, Deserialize)]
pub struct CompositeData {
    /// Satellite offsets `[dx, dy, dz]` from the principal.
    pub satellites: Vec<[i32; 3]>,
    /// Name of a block declared with `placeholder: true`.
    pub placeholder: String,
    #[serde(default)]
    pub anchors: Vec<AnchorData>,
    /// Variant name (`"{family}-{code}"`) the principal reverts to when a
    /// satellite is broken.
    #[serde(default)]
    pub detach_to: Option<String>,
}

/// Cell a connector exits from, relative to the principal.
#[derive(Debug, Clone, Deserialize)]
pub struct AnchorData {
    /// Single-letter direction code (`n e s w u d`).
    pub direction: String,
    pub offset: [i32; 3],
}

// ===========================================================================
// Engine tunables
// ===========================================================================

/// Tunables for the mechanical module. Omitted fields keep their defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MechanicsData {
    #[serde(default)]
    pub ticks_per_second: Option<u32>,
    #[serde(default)]
    pub max_speed: Option<f64>,
    #[serde(default)]
    pub stop_threshold: Option<f64>,
    #[serde(default)]
    pub min_inertia: Option<f64>,
    #[serde(default)]
    pub event_capacity: Option<usize>,
}

// ===========================================================================
// TOML wrappers
// ===========================================================================

/// Wrapper for a list of blocks in TOML format.
#[derive(Debug, Clone, Deserialize)]
pub struct TomlBlocks {
    pub blocks: Vec<BlockData>,
}

/// Wrapper for a list of families in TOML format.
#[derive(Debug, Clone, Deserialize)]
pub struct TomlFamilies {
    pub families: Vec<FamilyData>,
}

// ===========================================================================
// Tests
// ===========================================================================

//! Shared test helpers for integration tests and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]` so these helpers
//! are available in unit tests, integration tests, and benchmarks (via the
//! `test-utils` feature).

use crate::descriptor::{CompositeDef, FamilyDef, NodeRole, VariantDef};
use crate::direction::{ConnectorSet, Direction};
use crate::fixed::Fixed64;
use crate::grid::GridOffset;
use crate::id::BlockTypeId;
use crate::registry::{DescriptorRegistry, RegistryBuilder};

// ===========================================================================
// Fixed-point helper
// ===========================================================================

pub fn fixed(v: f64) -> Fixed64 {
    Fixed64::from_num(v)
}

// ===========================================================================
// Standard catalog
// ===========================================================================

/// Non-mechanical solid block.
pub const STONE: &str = "stone";
/// Non-mechanical block the world treats as replaceable.
pub const GRASS: &str = "grass";
pub const GEAR_FILLER: &str = "gear_filler";
pub const MACHINE_FILLER: &str = "machine_filler";

pub const MOTOR_TORQUE: f64 = 8.0;

/// Fixed, standalone straight shafts.
pub fn axle_family() -> FamilyDef {
    let mut def = FamilyDef::relay("axle", FamilyDef::variants_from_codes(&["ns", "ew", "ud"]));
    def.resistance = fixed(0.125);
    def
}

/// Adaptive gear that needs at least one mesh. Every single direction and
/// every pair of directions (straight and bent) is a variant.
pub fn angled_gear_family() -> FamilyDef {
    let mut variants: Vec<VariantDef> = Direction::ALL
        .into_iter()
        .map(|d| VariantDef::new(ConnectorSet::single(d)))
        .collect();
    for (i, a) in Direction::ALL.into_iter().enumerate() {
        for b in Direction::ALL.into_iter().skip(i + 1) {
            variants.push(VariantDef::new(ConnectorSet::single(a).with(b)));
        }
    }
    let mut def = FamilyDef::relay("angled_gear", variants);
    def.standalone = false;
    def.adaptive = true;
    def.resistance = fixed(0.25);
    def.inertia = fixed(0.5);
    def
}

pub fn clutch_family() -> FamilyDef {
    let mut def = FamilyDef::relay("clutch", FamilyDef::variants_from_codes(&["ns", "ew", "ud"]));
    def.toggleable = true;
    def
}

/// Single-output torque source.
pub fn motor_family() -> FamilyDef {
    let mut def = FamilyDef::relay(
        "motor",
        FamilyDef::variants_from_codes(&["n", "e", "s", "w", "u", "d"]),
    );
    def.role = NodeRole::Source {
        torque: fixed(MOTOR_TORQUE),
    };
    def.inertia = fixed(2.0);
    def
}

/// Four horizontal connectors, at most two realized at once.
pub fn transmission_family() -> FamilyDef {
    let connectors = ConnectorSet::from_code("nesw").unwrap_or_default();
    let mut def = FamilyDef::relay("transmission", vec![VariantDef::with_capacity(connectors, 2)]);
    def.resistance = fixed(0.5);
    def
}

/// 3x3 horizontal gear hub. Horizontal connectors exit from the rim cells,
/// vertical ones from the hub. Breaking a rim cell reverts the hub to a
/// vertical axle.
pub fn large_gear_family() -> FamilyDef {
    let mut satellites = Vec::new();
    for dx in -1..=1 {
        for dz in -1..=1 {
            if dx != 0 || dz != 0 {
                satellites.push(GridOffset::new(dx, 0, dz));
            }
        }
    }
    let mut def = FamilyDef::relay("large_gear", vec![VariantDef::new(ConnectorSet::FULL)]);
    def.inertia = fixed(8.0);
    def.resistance = fixed(1.0);
    def.composite = Some(CompositeDef {
        satellites,
        placeholder: GEAR_FILLER.to_string(),
        anchors: vec![
            (Direction::North, GridOffset::new(0, 0, -1)),
            (Direction::East, GridOffset::new(1, 0, 0)),
            (Direction::South, GridOffset::new(0, 0, 1)),
            (Direction::West, GridOffset::new(-1, 0, 0)),
        ],
        detach_to: Some("axle-ud".to_string()),
    });
    def
}

/// Three-cell vertical machine driven from the top.
pub fn pulverizer_family() -> FamilyDef {
    let mut def = FamilyDef::relay("pulverizer", FamilyDef::variants_from_codes(&["u"]));
    def.resistance = fixed(2.0);
    def.inertia = fixed(4.0);
    def.composite = Some(CompositeDef {
        satellites: vec![GridOffset::new(0, 1, 0), GridOffset::new(0, 2, 0)],
        placeholder: MACHINE_FILLER.to_string(),
        anchors: vec![(Direction::Up, GridOffset::new(0, 2, 0))],
        detach_to: None,
    });
    def
}

/// Builder preloaded with the standard catalog.
pub fn standard_builder() -> RegistryBuilder {
    let mut builder = RegistryBuilder::new();
    builder
        .register_block(STONE)
        .register_block(GRASS)
        .register_placeholder(GEAR_FILLER)
        .register_placeholder(MACHINE_FILLER);
    builder.register_family(axle_family());
    builder.register_family(angled_gear_family());
    builder.register_family(clutch_family());
    builder.register_family(motor_family());
    builder.register_family(transmission_family());
    builder.register_family(large_gear_family());
    builder.register_family(pulverizer_family());
    builder
}

pub fn standard_registry() -> DescriptorRegistry {
    standard_builder()
        .build()
        .expect("standard catalog must build")
}

/// Look up a block type by name, panicking if it does not exist.
pub fn block(registry: &DescriptorRegistry, name: &str) -> BlockTypeId {
    registry
        .block_id(name)
        .unwrap_or_else(|| panic!("unknown block type '{name}'"))
}

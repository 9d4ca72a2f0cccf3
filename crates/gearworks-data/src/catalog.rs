//! Catalog loading: reads the data directory, resolves names, and builds the
//! descriptor registry and engine config.
//!
//! Expected files (each in exactly one of RON, TOML, or JSON):
//!
//! | Base name   | Required | Contents                              |
//! |-------------|----------|---------------------------------------|
//! | `families`  | yes      | list of [`FamilyData`]                |
//! | `blocks`    | no       | list of plain [`BlockData`]           |
//! | `mechanics` | no       | [`MechanicsData`] overriding defaults |

use crate::loader::{DataFile, DataLoadError, ensure_unique, lookup};
use crate::schema::*;
use gearworks_core::config::MechanicalConfig;
use gearworks_core::descriptor::{CompositeDef, FamilyDef, NodeRole, VariantDef};
use gearworks_core::direction::{ConnectorSet, Direction};
use gearworks_core::fixed::{checked_f64_to_fixed64, Fixed64};
use gearworks_core::grid::GridOffset;
use gearworks_core::id::BlockTypeId;
use gearworks_core::registry::{DescriptorRegistry, RegistryBuilder};
use std::collections::HashMap;
use std::path::Path;

/// Everything a host needs to stand up a mechanical module from data.
#[derive(Debug, Clone)]
pub struct Catalog {
    pub registry: DescriptorRegistry,
    pub config: MechanicalConfig,
    /// Plain blocks that placement may overwrite.
    pub replaceable: Vec<BlockTypeId>,
}

/// Load every catalog file under `dir`.
pub fn load_catalog(dir: &Path) -> Result<Catalog, DataLoadError> {
    let mut builder = RegistryBuilder::new();

    // Plain blocks first: family shapes reference placeholders by name.
    let mut blocks: HashMap<String, BlockData> = HashMap::new();
    let mut replaceable_names = Vec::new();
    if let Some(file) = DataFile::find(dir, "blocks")? {
        for block in file.read_list::<BlockData>("blocks")? {
            ensure_unique(&blocks, &block.name, &file)?;
            if block.placeholder {
                builder.register_placeholder(&block.name);
            } else {
                builder.register_block(&block.name);
            }
            if block.replaceable {
                replaceable_names.push(block.name.clone());
            }
            blocks.insert(block.name.clone(), block);
        }
    }

    let families_file = DataFile::require(dir, "families")?;
    let families: Vec<FamilyData> = families_file.read_list("families")?;

    // Every variant name, so detach targets can be checked before building.
    let mut variant_names: HashMap<String, ()> = HashMap::new();
    for family in &families {
        for variant in &family.variants {
            let name = format!("{}-{}", family.name, canonical_code(variant, &families_file)?);
            variant_names.insert(name, ());
        }
    }

    let mut seen: HashMap<String, ()> = HashMap::new();
    for family in &families {
        ensure_unique(&seen, &family.name, &families_file)?;
        seen.insert(family.name.clone(), ());
        let def = resolve_family(family, &blocks, &variant_names, &families_file)?;
        builder.register_family(def);
    }

    let config = match DataFile::find(dir, "mechanics")? {
        Some(file) => resolve_mechanics(file.read()?, &file)?,
        None => MechanicalConfig::default(),
    };

    let registry = builder.build()?;
    let replaceable = replaceable_names
        .iter()
        .filter_map(|name| registry.block_id(name))
        .collect();

    Ok(Catalog {
        registry,
        config,
        replaceable,
    })
}

// ===========================================================================
// Resolution
// ===========================================================================

fn canonical_code(variant: &VariantData, file: &DataFile) -> Result<String, DataLoadError> {
    parse_connectors(variant.code(), file).map(ConnectorSet::code)
}

fn parse_connectors(code: &str, file: &DataFile) -> Result<ConnectorSet, DataLoadError> {
    ConnectorSet::from_code(code)
        .ok_or_else(|| file.invalid(format!("'{code}' is not a connector code")))
}

fn parse_direction(code: &str, file: &DataFile) -> Result<Direction, DataLoadError> {
    let mut chars = code.chars();
    match (chars.next().and_then(Direction::from_code), chars.next()) {
        (Some(dir), None) => Ok(dir),
        _ => Err(file.invalid(format!("'{code}' is not a direction code"))),
    }
}

fn resolve_family(
    data: &FamilyData,
    blocks: &HashMap<String, BlockData>,
    variant_names: &HashMap<String, ()>,
    file: &DataFile,
) -> Result<FamilyDef, DataLoadError> {
    let variants = data
        .variants
        .iter()
        .map(|v| {
            let connectors = parse_connectors(v.code(), file)?;
            Ok(VariantDef {
                connectors,
                capacity: v.capacity(),
            })
        })
        .collect::<Result<Vec<_>, DataLoadError>>()?;

    let role = match data.torque {
        Some(torque) => NodeRole::Source {
            torque: fixed_field(torque, &data.name, "torque", file)?,
        },
        None => NodeRole::Relay,
    };

    let composite = match &data.composite {
        Some(shape) => {
            let placeholder = lookup(blocks, &shape.placeholder, file, "placeholder")?;
            if !placeholder.placeholder {
                return Err(file.invalid(format!(
                    "block '{}' is not declared as a placeholder",
                    placeholder.name
                )));
            }
            if let Some(target) = &shape.detach_to {
                lookup(variant_names, target, file, "variant")?;
            }
            let anchors = shape
                .anchors
                .iter()
                .map(|a| Ok((parse_direction(&a.direction, file)?, GridOffset::from(a.offset))))
                .collect::<Result<Vec<_>, DataLoadError>>()?;
            Some(CompositeDef {
                satellites: shape.satellites.iter().map(|o| GridOffset::from(*o)).collect(),
                placeholder: shape.placeholder.clone(),
                anchors,
                detach_to: shape.detach_to.clone(),
            })
        }
        None => None,
    };

    Ok(FamilyDef {
        name: data.name.clone(),
        variants,
        role,
        resistance: fixed_field(data.resistance, &data.name, "resistance", file)?,
        inertia: fixed_field(data.inertia, &data.name, "inertia", file)?,
        standalone: data.standalone,
        adaptive: data.adaptive,
        toggleable: data.toggleable,
        composite,
    })
}

/// Convert a numeric field to fixed point, rejecting values the engine
/// cannot represent.
fn fixed_field(
    value: f64,
    owner: &str,
    field: &str,
    file: &DataFile,
) -> Result<Fixed64, DataLoadError> {
    checked_f64_to_fixed64(value)
        .ok_or_else(|| file.invalid(format!("{owner}.{field} = {value} is out of range")))
}

fn resolve_mechanics(
    data: MechanicsData,
    file: &DataFile,
) -> Result<MechanicalConfig, DataLoadError> {
    let defaults = MechanicalConfig::default();
    let tunable = |value: Option<f64>, field: &str, default: Fixed64| match value {
        Some(v) => fixed_field(v, "mechanics", field, file),
        None => Ok(default),
    };
    Ok(MechanicalConfig {
        ticks_per_second: data.ticks_per_second.unwrap_or(defaults.ticks_per_second),
        max_speed: tunable(data.max_speed, "max_speed", defaults.max_speed)?,
        stop_threshold: tunable(data.stop_threshold, "stop_threshold", defaults.stop_threshold)?,
        min_inertia: tunable(data.min_inertia, "min_inertia", defaults.min_inertia)?,
        event_capacity: data.event_capacity.unwrap_or(defaults.event_capacity),
    })
}

// ===========================================================================
// Tests
// ===========================================================================

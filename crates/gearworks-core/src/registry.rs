use crate::descriptor::{CompositeShape, FamilyDef, NodeDescriptor};
use crate::direction::{ConnectorSet, Direction};
use crate::grid::{GridOffset, GridPos};
use crate::id::{BlockTypeId, FamilyId};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Errors raised while finalizing a registry.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("duplicate block or family name '{0}'")]
    DuplicateName(String),
    #[error("family '{0}' has no variants")]
    EmptyFamily(String),
    #[error("family '{family}' declares orientation '{code}' twice")]
    DuplicateVariant { family: String, code: String },
    #[error("family '{family}' references unknown placeholder '{placeholder}'")]
    UnresolvedPlaceholder { family: String, placeholder: String },
    #[error("family '{family}' has an invalid composite shape: {reason}")]
    InvalidShape { family: String, reason: String },
    #[error("family '{family}' detaches to '{target}', which is not a single-cell mechanical block")]
    InvalidDetach { family: String, target: String },
    #[error("not found: {0}")]
    NotFound(String),
}

#[derive(Debug, Clone)]
struct FamilyEntry {
    name: String,
    variants: Vec<BlockTypeId>,
}

/// Builder for constructing an immutable [`DescriptorRegistry`].
///
/// Two-phase lifecycle: registration, then [`build`](RegistryBuilder::build)
/// which assigns block type ids, resolves placeholder and detach references,
/// and validates every family.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    plain: Vec<(String, bool)>,
    families: Vec<FamilyDef>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a non-mechanical block type (stone, soil, ...).
    pub fn register_block(&mut self, name: &str) -> &mut Self {
        self.plain.push((name.to_string(), false));
        self
    }

    /// Register a satellite placeholder block type.
    pub fn register_placeholder(&mut self, name: &str) -> &mut Self {
        self.plain.push((name.to_string(), true));
        self
    }

    /// Register a component family. Returns its id.
    pub fn register_family(&mut self, def: FamilyDef) -> FamilyId {
        let id = FamilyId(self.families.len() as u32);
        self.families.push(def);
        id
    }

    /// Mutate an already-registered family by name.
    pub fn mutate_family<F>(&mut self, name: &str, f: F) -> Result<(), RegistryError>
    where
        F: FnOnce(&mut FamilyDef),
    {
        let def = self
            .families
            .iter_mut()
            .find(|d| d.name == name)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))?;
        f(def);
        Ok(())
    }

    /// Finalize and build the immutable registry.
    pub fn build(self) -> Result<DescriptorRegistry, RegistryError> {
        let mut names: Vec<String> = Vec::new();
        let mut name_to_block: HashMap<String, BlockTypeId> = HashMap::new();
        let mut placeholders = HashSet::new();
        let mut family_names = HashSet::new();

        for (name, is_placeholder) in &self.plain {
            let id = claim_name(name.clone(), &mut names, &mut name_to_block)?;
            if *is_placeholder {
                placeholders.insert(id);
            }
        }

        // Assign variant ids first so detach targets can point at any family.
        let mut assigned: Vec<Vec<(BlockTypeId, String)>> = Vec::new();
        for def in &self.families {
            if !family_names.insert(def.name.clone()) {
                return Err(RegistryError::DuplicateName(def.name.clone()));
            }
            if def.variants.is_empty() {
                return Err(RegistryError::EmptyFamily(def.name.clone()));
            }
            let mut seen = HashSet::new();
            let mut ids = Vec::new();
            for variant in &def.variants {
                let code = variant.connectors.code();
                if !seen.insert(variant.connectors) {
                    return Err(RegistryError::DuplicateVariant {
                        family: def.name.clone(),
                        code,
                    });
                }
                let name = format!("{}-{}", def.name, code);
                let id = claim_name(name, &mut names, &mut name_to_block)?;
                ids.push((id, code));
            }
            assigned.push(ids);
        }

        let mut descriptors: Vec<Option<NodeDescriptor>> = vec![None; names.len()];
        let mut families = Vec::with_capacity(self.families.len());

        for (family_idx, (def, ids)) in self.families.iter().zip(&assigned).enumerate() {
            let family = FamilyId(family_idx as u32);
            let composite = match &def.composite {
                Some(c) => Some(resolve_shape(def, c, &name_to_block, &placeholders)?),
                None => None,
            };

            for (variant, (id, code)) in def.variants.iter().zip(ids) {
                let max = variant.connectors.len() as u8;
                let capacity = variant.capacity.unwrap_or(max).min(max);
                descriptors[id.0 as usize] = Some(NodeDescriptor {
                    block_type: *id,
                    family,
                    name: names[id.0 as usize].clone(),
                    orientation: code.clone(),
                    connectors: variant.connectors,
                    capacity,
                    role: def.role,
                    resistance: def.resistance,
                    inertia: def.inertia,
                    standalone: def.standalone,
                    adaptive: def.adaptive,
                    toggleable: def.toggleable,
                    composite: composite.clone(),
                });
            }

            if let Some(shape) = &composite {
                let spanned = ids.iter().fold(ConnectorSet::EMPTY, |acc, (id, _)| {
                    acc.union(
                        descriptors[id.0 as usize]
                            .as_ref()
                            .map(|d| d.connectors)
                            .unwrap_or_default(),
                    )
                });
                for (dir, _) in &shape.anchors {
                    if !spanned.contains(*dir) {
                        return Err(RegistryError::InvalidShape {
                            family: def.name.clone(),
                            reason: format!("anchor for unused connector '{dir}'"),
                        });
                    }
                }
            }

            families.push(FamilyEntry {
                name: def.name.clone(),
                variants: ids.iter().map(|(id, _)| *id).collect(),
            });
        }

        // Detach targets must be single-cell mechanical blocks.
        for (def, ids) in self.families.iter().zip(&assigned) {
            let Some(target) = def.composite.as_ref().and_then(|c| c.detach_to.as_ref()) else {
                continue;
            };
            let valid = name_to_block
                .get(target)
                .and_then(|id| descriptors[id.0 as usize].as_ref())
                .is_some_and(|d| d.composite.is_none());
            if !valid {
                return Err(RegistryError::InvalidDetach {
                    family: def.name.clone(),
                    target: target.clone(),
                });
            }
            let target_id = name_to_block[target];
            for (id, _) in ids {
                if let Some(shape) = descriptors[id.0 as usize]
                    .as_mut()
                    .and_then(|d| d.composite.as_mut())
                {
                    shape.detach_to = Some(target_id);
                }
            }
        }

        let family_by_name = families
            .iter()
            .enumerate()
            .map(|(i, f)| (f.name.clone(), FamilyId(i as u32)))
            .collect();

        debug!(
            blocks = names.len(),
            families = families.len(),
            "descriptor registry built"
        );

        Ok(DescriptorRegistry {
            names,
            descriptors,
            placeholders,
            families,
            name_to_block,
            family_by_name,
        })
    }
}

fn claim_name(
    name: String,
    names: &mut Vec<String>,
    map: &mut HashMap<String, BlockTypeId>,
) -> Result<BlockTypeId, RegistryError> {
    if map.contains_key(&name) {
        return Err(RegistryError::DuplicateName(name));
    }
    let id = BlockTypeId(names.len() as u32);
    names.push(name.clone());
    map.insert(name, id);
    Ok(id)
}

fn resolve_shape(
    def: &FamilyDef,
    c: &crate::descriptor::CompositeDef,
    name_to_block: &HashMap<String, BlockTypeId>,
    placeholders: &HashSet<BlockTypeId>,
) -> Result<CompositeShape, RegistryError> {
    let placeholder = name_to_block
        .get(&c.placeholder)
        .copied()
        .filter(|id| placeholders.contains(id))
        .ok_or_else(|| RegistryError::UnresolvedPlaceholder {
            family: def.name.clone(),
            placeholder: c.placeholder.clone(),
        })?;

    let invalid = |reason: &str| RegistryError::InvalidShape {
        family: def.name.clone(),
        reason: reason.to_string(),
    };

    if c.satellites.is_empty() {
        return Err(invalid("no satellite cells"));
    }
    let mut seen = HashSet::new();
    for offset in &c.satellites {
        if offset.is_zero() {
            return Err(invalid("satellite at the principal cell"));
        }
        if !seen.insert(*offset) {
            return Err(invalid("duplicate satellite cell"));
        }
    }
    let mut anchored = HashSet::new();
    for (dir, offset) in &c.anchors {
        if !anchored.insert(*dir) {
            return Err(invalid("connector anchored twice"));
        }
        if !offset.is_zero() && !seen.contains(offset) {
            return Err(invalid("anchor outside the footprint"));
        }
    }

    Ok(CompositeShape {
        satellites: c.satellites.clone(),
        placeholder,
        anchors: c.anchors.clone(),
        detach_to: None,
    })
}

/// Immutable registry of block types and component families. Frozen after
/// [`RegistryBuilder::build`].
#[derive(Debug, Clone)]
pub struct DescriptorRegistry {
    names: Vec<String>,
    descriptors: Vec<Option<NodeDescriptor>>,
    placeholders: HashSet<BlockTypeId>,
    families: Vec<FamilyEntry>,
    name_to_block: HashMap<String, BlockTypeId>,
    family_by_name: HashMap<String, FamilyId>,
}

impl DescriptorRegistry {
    /// Descriptor for a mechanical block type.
    pub fn descriptor(&self, id: BlockTypeId) -> Option<&NodeDescriptor> {
        self.descriptors.get(id.0 as usize).and_then(Option::as_ref)
    }

    pub fn is_mechanical(&self, id: BlockTypeId) -> bool {
        self.descriptor(id).is_some()
    }

    pub fn is_placeholder(&self, id: BlockTypeId) -> bool {
        self.placeholders.contains(&id)
    }

    /// Descriptor of a mechanical block type by its full variant name.
    pub fn by_name(&self, name: &str) -> Option<&NodeDescriptor> {
        self.block_id(name).and_then(|id| self.descriptor(id))
    }

    pub fn block_id(&self, name: &str) -> Option<BlockTypeId> {
        self.name_to_block.get(name).copied()
    }

    pub fn block_name(&self, id: BlockTypeId) -> Option<&str> {
        self.names.get(id.0 as usize).map(String::as_str)
    }

    pub fn family_id(&self, name: &str) -> Option<FamilyId> {
        self.family_by_name.get(name).copied()
    }

    pub fn family_name(&self, id: FamilyId) -> Option<&str> {
        self.families.get(id.0 as usize).map(|f| f.name.as_str())
    }

    /// The variant of `family` with exactly this orientation code.
    pub fn variant(&self, family: &str, code: &str) -> Option<BlockTypeId> {
        let wanted = ConnectorSet::from_code(code)?;
        let fid = self.family_id(family)?;
        self.family_variants(fid)
            .find(|d| d.connectors == wanted)
            .map(|d| d.block_type)
    }

    /// Variants of a family in declaration order.
    pub fn family_variants(&self, family: FamilyId) -> impl Iterator<Item = &NodeDescriptor> {
        self.families
            .get(family.0 as usize)
            .into_iter()
            .flat_map(|f| f.variants.iter())
            .filter_map(|id| self.descriptor(*id))
    }

    pub fn block_count(&self) -> usize {
        self.names.len()
    }

    pub fn family_count(&self) -> usize {
        self.families.len()
    }

    /// Pick the variant that should govern a node of type `current` whose
    /// realized connectors are `realized`. Pure.
    ///
    /// - An empty set keeps `current` for standalone families and yields
    ///   `None` otherwise (the node must break).
    /// - Fixed families keep `current` if it can hold the set.
    /// - Adaptive families prefer an exact connector match, then `current`,
    ///   then the smallest variant that holds the set (declaration order
    ///   breaks ties).
    pub fn select_variant(&self, current: BlockTypeId, realized: ConnectorSet) -> Option<BlockTypeId> {
        let desc = self.descriptor(current)?;
        if realized.is_empty() {
            return desc.standalone.then_some(current);
        }
        if !desc.adaptive {
            return desc.supports(realized).then_some(current);
        }
        if let Some(exact) = self
            .family_variants(desc.family)
            .find(|v| v.connectors == realized && v.supports(realized))
        {
            return Some(exact.block_type);
        }
        if desc.supports(realized) {
            return Some(current);
        }
        self.family_variants(desc.family)
            .filter(|v| v.supports(realized))
            .min_by_key(|v| v.connectors.len())
            .map(|v| v.block_type)
    }

    /// The variant a node would become after also realizing `dir`, or `None`
    /// if it cannot take another connector there.
    pub fn accepts(
        &self,
        current: BlockTypeId,
        connections: ConnectorSet,
        dir: Direction,
    ) -> Option<BlockTypeId> {
        if connections.contains(dir) {
            return None;
        }
        self.select_variant(current, connections.with(dir))
    }

    /// True if a node of type `id` can sit at `principal` in every variant
    /// it may later be exchanged to, including its detach target, without
    /// any cell or connector target leaving the coordinate range.
    pub fn fits_at(&self, id: BlockTypeId, principal: GridPos) -> bool {
        let Some(desc) = self.descriptor(id) else {
            return false;
        };
        let family_fits =
            |family: FamilyId| self.family_variants(family).all(|v| v.fits_at(principal));
        family_fits(desc.family)
            && desc
                .composite
                .as_ref()
                .and_then(|c| c.detach_to)
                .and_then(|target| self.descriptor(target))
                .is_none_or(|d| family_fits(d.family))
    }

    /// Anchor offset of a connector for a block type (zero for single cells).
    pub fn anchor(&self, id: BlockTypeId, dir: Direction) -> GridOffset {
        self.descriptor(id)
            .map(|d| d.anchor(dir))
            .unwrap_or(GridOffset::ZERO)
    }
}

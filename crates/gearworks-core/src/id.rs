use serde::{Deserialize, Serialize};

/// Identifies a host block type. Every variant of a mechanical family, and
/// every satellite placeholder, has its own id. Cheap to copy and compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BlockTypeId(pub u32);

/// Identifies a component family (all orientation variants of one kind).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FamilyId(pub u32);

/// Identifies a mechanical network. Assigned monotonically and never reused
/// within one module instance, so a lower id always means an older network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NetworkId(pub u32);

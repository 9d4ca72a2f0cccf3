//! Gearworks Core -- shared value types for the mechanical power engine.
//!
//! This crate holds everything the resolver and the host agree on before any
//! block is placed: grid and direction primitives, per-block-type node
//! descriptors, the immutable descriptor registry, events, configuration,
//! and deterministic fixed-point arithmetic.
//!
//! # Orientation as type identity
//!
//! A component family (axle, angled gear, clutch, ...) registers one block
//! type per orientation variant. Which directions a node spans is decided by
//! which variant occupies the cell, so the resolver changes a node's topology
//! by exchanging the block for a sibling variant chosen with
//! [`registry::DescriptorRegistry::select_variant`].
//!
//! ```rust,ignore
//! let mut builder = RegistryBuilder::new();
//! builder.register_family(FamilyDef::relay("axle", FamilyDef::variants_from_codes(&["ns", "ew"])));
//! let registry = builder.build()?;
//! let ns = registry.variant("axle", "ns").unwrap();
//! ```
//!
//! # Key Types
//!
//! - [`direction::Direction`] / [`direction::ConnectorSet`] -- the six facings
//!   and compact sets of them (orientation codes).
//! - [`grid::GridPos`] -- identity of a placed node.
//! - [`descriptor::NodeDescriptor`] -- static metadata of one variant.
//! - [`registry::DescriptorRegistry`] -- frozen catalog built by
//!   [`registry::RegistryBuilder`].
//! - [`event::MechanicalEvent`] / [`event::EventBuffer`] -- topology and
//!   rotation events in a pre-allocated ring.
//! - [`fixed::Fixed64`] -- Q32.32 fixed-point type for deterministic math.

pub mod config;
pub mod descriptor;
pub mod direction;
pub mod event;
pub mod fixed;
pub mod grid;
pub mod id;
pub mod registry;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

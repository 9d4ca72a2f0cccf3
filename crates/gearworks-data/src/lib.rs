//! Data-driven catalogs for the Gearworks engine.
//!
//! Block families and engine tunables live in RON, TOML, or JSON files.
//! [`load_catalog`] reads a directory of them and produces a validated
//! [`gearworks_core::registry::DescriptorRegistry`] plus a
//! [`gearworks_core::config::MechanicalConfig`].

pub mod catalog;
pub mod loader;
pub mod schema;

pub use catalog::{load_catalog, Catalog};
pub use loader::DataLoadError;

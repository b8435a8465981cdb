//! SE2 Calculator
//!
//! Catalog of Space Engineers 2 ores, components and blocks with strict
//! reference validation on write and tolerant bill-of-materials resolution
//! on read.

pub mod cache;
pub mod calculator;
pub mod catalog;
pub mod db;
pub mod engine;
pub mod error;
pub mod fixtures;
pub mod models;
pub mod quantity;
pub mod store;
pub mod validate;

#[cfg(test)]
pub(crate) mod test_support;

pub use calculator::{ChainStats, ResourceChain};
pub use catalog::Catalog;
pub use engine::{Engine, EngineConfig};
pub use error::{Error, Result};
pub use models::{Block, BlockId, Component, ComponentId, EntityKind, Ore, OreId};
pub use store::{EntityStore, MemoryStore};
pub use validate::{ValidationError, ValidationFailed, ValidationReport};

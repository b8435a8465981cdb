//! The resolution and validation engine
//!
//! An [`Engine`] owns a read-only view of an [`EntityStore`] and its own
//! [`ResolutionCache`]. Independent engines never share cached chains.

use std::time::Duration;

use tracing::debug;

use crate::cache::{DEFAULT_TTL, ResolutionCache};
use crate::calculator::{self, ResourceChain};
use crate::error::{Error, Result};
use crate::models::{Block, BlockDraft, BlockId, ComponentDraft, EntityKind, OreDraft};
use crate::store::EntityStore;
use crate::validate::{self, ValidationError, ValidationReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// How long a resolved chain may be served from cache
    pub cache_ttl: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_ttl: DEFAULT_TTL,
        }
    }
}

/// One stored entity that no longer passes validation
#[derive(Debug, Clone, PartialEq)]
pub struct AuditFinding {
    pub kind: EntityKind,
    pub id: String,
    pub name: String,
    pub errors: Vec<ValidationError>,
}

#[derive(Debug)]
pub struct Engine<S> {
    store: S,
    cache: ResolutionCache,
}

impl<S: EntityStore> Engine<S> {
    pub fn new(store: S) -> Self {
        Self::with_config(store, EngineConfig::default())
    }

    pub fn with_config(store: S, config: EngineConfig) -> Self {
        Self {
            store,
            cache: ResolutionCache::new(config.cache_ttl),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn cache(&self) -> &ResolutionCache {
        &self.cache
    }

    pub fn into_store(self) -> S {
        self.store
    }

    pub fn validate_ore(&self, draft: &OreDraft) -> ValidationReport {
        validate::validate_ore(draft)
    }

    pub fn validate_component(&self, draft: &ComponentDraft) -> Result<ValidationReport> {
        validate::check_component(draft, &self.store)
    }

    pub fn validate_block(&self, draft: &BlockDraft) -> Result<ValidationReport> {
        validate::check_block(draft, &self.store)
    }

    /// Resolved chain of a stored block, served from cache when fresh
    pub fn resolve_block_bom(&self, block_id: &BlockId) -> Result<ResourceChain> {
        let block = self.store.get_block(block_id)?.ok_or_else(|| Error::NotFound {
            kind: EntityKind::Block,
            id: block_id.to_string(),
        })?;
        self.resolve(&block)
    }

    /// Resolved chain of an already loaded block
    pub fn resolve(&self, block: &Block) -> Result<ResourceChain> {
        if block.components.is_empty() {
            return Ok(ResourceChain::default());
        }
        self.cache.get_or_compute(block.id, || {
            debug!(block = %block.name, "resolving resource chain");
            calculator::resolve_resource_chain(&self.store, block)
        })
    }

    /// Re-validate everything in the store against its current contents.
    ///
    /// This is the pass that surfaces references left dangling by deletes.
    pub fn audit(&self) -> Result<Vec<AuditFinding>> {
        let mut findings = Vec::new();

        for ore in self.store.list_ores()? {
            let report = validate::validate_ore(&OreDraft::from(&ore));
            push_finding(&mut findings, EntityKind::Ore, ore.id.to_string(), ore.name, report);
        }
        for component in self.store.list_components()? {
            let report = self.validate_component(&ComponentDraft::from(&component))?;
            push_finding(
                &mut findings,
                EntityKind::Component,
                component.id.to_string(),
                component.name,
                report,
            );
        }
        for block in self.store.list_blocks()? {
            let report = self.validate_block(&BlockDraft::from(&block))?;
            push_finding(&mut findings, EntityKind::Block, block.id.to_string(), block.name, report);
        }

        Ok(findings)
    }
}

fn push_finding(
    findings: &mut Vec<AuditFinding>,
    kind: EntityKind,
    id: String,
    name: String,
    report: ValidationReport,
) {
    if !report.is_ok() {
        findings.push(AuditFinding {
            kind,
            id,
            name,
            errors: report.into_errors(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::test_support::{block, component, ore};
    use serde_json::json;

    #[test]
    fn resolve_block_bom_of_unknown_block_is_not_found() {
        let engine = Engine::new(MemoryStore::new());
        let err = engine.resolve_block_bom(&BlockId::new()).unwrap_err();
        assert!(matches!(err, Error::NotFound { kind: EntityKind::Block, .. }));
    }

    #[test]
    fn resolution_is_cached_per_block() {
        let mut store = MemoryStore::new();
        let iron = ore("Iron Ore", 1.0);
        let plate = component("Steel Plate", 20.0, &[(&iron, 21.0)]);
        let armor = block("Armor", &[(&plate, 25)]);
        store.insert_ore(iron);
        store.insert_component(plate);
        store.insert_block(armor.clone());

        let engine = Engine::new(store);
        let first = engine.resolve_block_bom(&armor.id).unwrap();
        assert_eq!(engine.cache().len(), 1);
        let second = engine.resolve_block_bom(&armor.id).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn empty_block_bypasses_cache() {
        let mut store = MemoryStore::new();
        let empty = block("Empty", &[]);
        store.insert_block(empty.clone());

        let engine = Engine::new(store);
        assert!(engine.resolve_block_bom(&empty.id).unwrap().is_empty());
        assert!(engine.cache().is_empty());
    }

    #[test]
    fn engines_do_not_share_caches() {
        let mut store = MemoryStore::new();
        let iron = ore("Iron Ore", 1.0);
        let plate = component("Steel Plate", 20.0, &[(&iron, 21.0)]);
        let armor = block("Armor", &[(&plate, 1)]);
        store.insert_ore(iron);
        store.insert_component(plate);
        store.insert_block(armor.clone());

        let a = Engine::new(store.clone());
        let b = Engine::new(store);
        a.resolve_block_bom(&armor.id).unwrap();
        assert_eq!(a.cache().len(), 1);
        assert!(b.cache().is_empty());
    }

    #[test]
    fn validate_component_checks_ore_references() {
        let mut store = MemoryStore::new();
        let iron = ore("Iron Ore", 1.0);
        store.insert_ore(iron.clone());
        let engine = Engine::new(store);

        let draft = ComponentDraft {
            name: "Motor".into(),
            materials: serde_json::from_value(json!({
                iron.id.to_string(): 20,
                "0190a1b2-0000-7000-8000-00000000beef": 5,
            }))
            .unwrap(),
            mass: 24.0,
            ..Default::default()
        };
        let report = engine.validate_component(&draft).unwrap();
        assert_eq!(
            report.messages(),
            ["Ore with ID 0190a1b2-0000-7000-8000-00000000beef does not exist"]
        );
    }

    #[test]
    fn audit_reports_orphans_left_by_deletes() {
        let mut store = MemoryStore::new();
        let iron = ore("Iron Ore", 1.0);
        let plate = component("Steel Plate", 20.0, &[(&iron, 21.0)]);
        let armor = block("Armor", &[(&plate, 25)]);
        store.insert_ore(iron.clone());
        store.insert_component(plate.clone());
        store.insert_block(armor);
        store.remove_ore(&iron.id);

        let engine = Engine::new(store);
        let findings = engine.audit().unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].kind, EntityKind::Component);
        assert_eq!(findings[0].name, "Steel Plate");
        assert_eq!(
            findings[0].errors[0].to_string(),
            format!("Ore with ID {} does not exist", iron.id)
        );
    }
}

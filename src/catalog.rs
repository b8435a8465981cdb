//! Validate-then-persist writes over the SQLite store
//!
//! Every create and update runs the full validation pass first and writes
//! nothing if it fails. Deletes never cascade: entities that referenced the
//! deleted one keep the dangling id until the next audit reports it.

use std::path::Path;

use tracing::info;
use uuid::Uuid;

use crate::db::{self, SqliteStore};
use crate::engine::{Engine, EngineConfig};
use crate::error::{Error, Result};
use crate::models::{
    Block, BlockDraft, BlockId, Component, ComponentDraft, ComponentId, EntityKind, Ore, OreDraft,
    OreId,
};
use crate::store::EntityStore;
use crate::validate;

pub struct Catalog {
    engine: Engine<SqliteStore>,
}

impl Catalog {
    pub fn new(store: SqliteStore, config: EngineConfig) -> Self {
        Self {
            engine: Engine::with_config(store, config),
        }
    }

    pub fn open(path: impl AsRef<Path>, config: EngineConfig) -> Result<Self> {
        Ok(Self::new(SqliteStore::open(path)?, config))
    }

    pub fn open_in_memory(config: EngineConfig) -> Result<Self> {
        Ok(Self::new(SqliteStore::open_in_memory()?, config))
    }

    pub fn engine(&self) -> &Engine<SqliteStore> {
        &self.engine
    }

    pub fn store(&self) -> &SqliteStore {
        self.engine.store()
    }

    // -- ores ---------------------------------------------------------------

    pub fn create_ore(&self, draft: OreDraft) -> Result<Ore> {
        self.save_ore(OreId::new(), draft)
    }

    pub fn update_ore(&self, id: OreId, draft: OreDraft) -> Result<Ore> {
        self.require(EntityKind::Ore, &id.to_string(), self.store().get_ore(&id)?.is_some())?;
        self.save_ore(id, draft)
    }

    /// Create or overwrite the ore stored under `id`
    pub fn save_ore(&self, id: OreId, draft: OreDraft) -> Result<Ore> {
        validate::clean_ore(&draft)?;
        let ore = Ore {
            id,
            name: draft.name,
            description: draft.description,
            mass: draft.mass,
        };
        db::upsert_ore(self.store().connection(), &ore)?;
        info!(ore = %ore.name, id = %ore.id, "saved ore");
        Ok(ore)
    }

    // -- components ---------------------------------------------------------

    pub fn create_component(&self, draft: ComponentDraft) -> Result<Component> {
        self.save_component(ComponentId::new(), draft)
    }

    pub fn update_component(&self, id: ComponentId, draft: ComponentDraft) -> Result<Component> {
        let exists = self.store().get_component(&id)?.is_some();
        self.require(EntityKind::Component, &id.to_string(), exists)?;
        self.save_component(id, draft)
    }

    /// Create or overwrite the component stored under `id`
    pub fn save_component(&self, id: ComponentId, draft: ComponentDraft) -> Result<Component> {
        validate::clean_component(&draft, self.store())?;
        let component = Component {
            id,
            materials: validate::normalize_materials(&draft.materials)?,
            name: draft.name,
            description: draft.description,
            mass: draft.mass,
            crafting_time: draft.crafting_time,
            fabricator_type: draft.fabricator_type,
        };
        db::upsert_component(self.store().connection(), &component)?;
        info!(component = %component.name, id = %component.id, "saved component");
        Ok(component)
    }

    // -- blocks -------------------------------------------------------------

    pub fn create_block(&self, draft: BlockDraft) -> Result<Block> {
        self.save_block(BlockId::new(), draft)
    }

    pub fn update_block(&self, id: BlockId, draft: BlockDraft) -> Result<Block> {
        self.require(EntityKind::Block, &id.to_string(), self.store().get_block(&id)?.is_some())?;
        self.save_block(id, draft)
    }

    /// Create or overwrite the block stored under `id`; drops its cached chain
    pub fn save_block(&self, id: BlockId, draft: BlockDraft) -> Result<Block> {
        validate::clean_block(&draft, self.store())?;
        let block = Block {
            id,
            components: validate::normalize_components(&draft.components)?,
            name: draft.name,
            description: draft.description,
            mass: draft.mass,
            health: draft.health,
            pcu: draft.pcu,
            snap_size: draft.snap_size,
            input_mass: draft.input_mass,
            output_mass: draft.output_mass,
            consumer_type: draft.consumer_type,
            consumer_rate: draft.consumer_rate,
            producer_type: draft.producer_type,
            producer_rate: draft.producer_rate,
            storage_capacity: draft.storage_capacity,
        };
        db::upsert_block(self.store().connection(), &block)?;
        self.engine.cache().invalidate(&block.id);
        info!(block = %block.name, id = %block.id, "saved block");
        Ok(block)
    }

    // -- reads and deletes --------------------------------------------------

    /// Find a block by id, falling back to an exact name match
    pub fn find_block(&self, key: &str) -> Result<Option<Block>> {
        if let Some(id) = BlockId::parse(key) {
            if let Some(block) = self.store().get_block(&id)? {
                return Ok(Some(block));
            }
        }
        db::find_block_by_name(self.store().connection(), key.trim())
    }

    /// Delete one entity. Dependents are left as they are.
    ///
    /// Any UUID spelling is accepted (upper case, braced, URN); anything
    /// that is not a UUID matches nothing.
    pub fn delete(&self, kind: EntityKind, id: &str) -> Result<bool> {
        let Ok(uuid) = Uuid::parse_str(id.trim()) else {
            return Ok(false);
        };
        let deleted = db::delete_entity(self.store().connection(), kind, &uuid.to_string())?;
        if deleted {
            if kind == EntityKind::Block {
                self.engine.cache().invalidate(&BlockId::from(uuid));
            }
            info!(kind = %kind, id = %uuid, "deleted");
        }
        Ok(deleted)
    }

    pub fn clear(&self) -> Result<()> {
        db::clear_all(self.store().connection())?;
        self.engine.cache().clear();
        Ok(())
    }

    fn require(&self, kind: EntityKind, id: &str, exists: bool) -> Result<()> {
        if exists {
            Ok(())
        } else {
            Err(Error::NotFound {
                kind,
                id: id.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    fn catalog() -> Catalog {
        Catalog::open_in_memory(EngineConfig::default()).unwrap()
    }

    fn iron(catalog: &Catalog) -> Ore {
        catalog
            .create_ore(OreDraft {
                name: "Iron Ore".into(),
                mass: 1.0,
                ..Default::default()
            })
            .unwrap()
    }

    fn plate(catalog: &Catalog, iron: &Ore, per_plate: f64) -> Component {
        catalog
            .create_component(ComponentDraft {
                name: "Steel Plate".into(),
                materials: serde_json::from_value(json!({ iron.id.to_string(): per_plate })).unwrap(),
                mass: 20.0,
                ..Default::default()
            })
            .unwrap()
    }

    fn armor_draft(plate: &Component, count: u32) -> BlockDraft {
        BlockDraft {
            name: "Light Armor Block".into(),
            mass: 500.0,
            components: serde_json::from_value(json!({ plate.id.to_string(): count })).unwrap(),
            health: 1000.0,
            pcu: 1,
            snap_size: 2.5,
            ..Default::default()
        }
    }

    #[test]
    fn invalid_block_is_never_written() {
        let catalog = catalog();
        let draft = BlockDraft {
            name: "Ghost Block".into(),
            components: serde_json::from_value(json!({ "0190a1b2-0000-7000-8000-00000000beef": 2 }))
                .unwrap(),
            ..Default::default()
        };

        let err = catalog.create_block(draft).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(catalog.store().list_blocks().unwrap().is_empty());
    }

    #[test]
    fn legacy_list_is_stored_as_a_map() {
        let catalog = catalog();
        let iron = iron(&catalog);
        let plate = plate(&catalog, &iron, 21.0);
        let draft = BlockDraft {
            name: "Legacy Block".into(),
            components: serde_json::from_value(json!([
                {"component_id": plate.id.to_string(), "component_name": "Steel Plate", "quantity": 4}
            ]))
            .unwrap(),
            ..armor_draft(&plate, 1)
        };

        let block = catalog.create_block(draft).unwrap();
        assert_eq!(block.components.get(&plate.id), Some(&4));
        assert_eq!(catalog.find_block("Legacy Block").unwrap(), Some(block));
    }

    #[test]
    fn update_of_missing_entity_is_not_found() {
        let catalog = catalog();
        let err = catalog
            .update_ore(
                OreId::new(),
                OreDraft {
                    name: "Gold Ore".into(),
                    mass: 1.0,
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { kind: EntityKind::Ore, .. }));
    }

    #[test]
    fn component_changes_stay_stale_within_ttl() {
        let catalog = catalog();
        let iron = iron(&catalog);
        let plate = plate(&catalog, &iron, 21.0);
        let armor = catalog.create_block(armor_draft(&plate, 10)).unwrap();

        let before = catalog.engine().resolve_block_bom(&armor.id).unwrap();
        assert_eq!(before.ores[&iron.id].quantity, 210.0);

        catalog
            .update_component(
                plate.id,
                ComponentDraft {
                    name: "Steel Plate".into(),
                    materials: serde_json::from_value(json!({ iron.id.to_string(): 30 })).unwrap(),
                    mass: 20.0,
                    ..Default::default()
                },
            )
            .unwrap();
        let cached = catalog.engine().resolve_block_bom(&armor.id).unwrap();
        assert_eq!(cached, before);

        // saving the block itself drops its entry
        catalog.update_block(armor.id, armor_draft(&plate, 10)).unwrap();
        let fresh = catalog.engine().resolve_block_bom(&armor.id).unwrap();
        assert_eq!(fresh.ores[&iron.id].quantity, 300.0);
    }

    #[test]
    fn zero_ttl_always_recomputes() {
        let catalog = Catalog::open_in_memory(EngineConfig {
            cache_ttl: Duration::ZERO,
        })
        .unwrap();
        let iron = iron(&catalog);
        let plate = plate(&catalog, &iron, 21.0);
        let armor = catalog.create_block(armor_draft(&plate, 1)).unwrap();

        catalog.engine().resolve_block_bom(&armor.id).unwrap();
        catalog.delete(EntityKind::Component, &plate.id.to_string()).unwrap();
        let chain = catalog.engine().resolve_block_bom(&armor.id).unwrap();
        assert!(chain.components.is_empty());
    }

    #[test]
    fn invalid_fields_are_never_written() {
        let catalog = catalog();
        let iron = iron(&catalog);
        let plate = plate(&catalog, &iron, 21.0);

        let component = catalog.create_component(ComponentDraft {
            name: "Motor".into(),
            mass: -3.0,
            crafting_time: -5.0,
            ..Default::default()
        });
        let Err(Error::Validation(failed)) = component else {
            panic!("expected a validation failure");
        };
        assert_eq!(failed.errors.len(), 2);

        let block = catalog.create_block(BlockDraft {
            mass: -1.0,
            health: 0.0,
            pcu: 0,
            snap_size: -2.5,
            ..armor_draft(&plate, 1)
        });
        let Err(Error::Validation(failed)) = block else {
            panic!("expected a validation failure");
        };
        assert_eq!(failed.errors.len(), 4);

        assert_eq!(catalog.store().list_components().unwrap().len(), 1);
        assert!(catalog.store().list_blocks().unwrap().is_empty());
    }

    #[test]
    fn delete_accepts_any_uuid_spelling() {
        let catalog = catalog();
        let iron = iron(&catalog);
        let plate = plate(&catalog, &iron, 21.0);
        let armor = catalog.create_block(armor_draft(&plate, 1)).unwrap();
        catalog.engine().resolve_block_bom(&armor.id).unwrap();

        let shouted = armor.id.to_string().to_uppercase();
        assert!(catalog.delete(EntityKind::Block, &shouted).unwrap());
        assert!(catalog.store().get_block(&armor.id).unwrap().is_none());
        assert!(catalog.engine().cache().is_empty());

        let braced = format!("{{{}}}", plate.id);
        assert!(catalog.delete(EntityKind::Component, &braced).unwrap());
        assert!(!catalog.delete(EntityKind::Ore, "not-a-uuid").unwrap());
        assert!(catalog.store().get_ore(&iron.id).unwrap().is_some());
    }

    #[test]
    fn deleting_an_ore_orphans_but_keeps_the_component() {
        let catalog = catalog();
        let iron = iron(&catalog);
        let plate = plate(&catalog, &iron, 21.0);

        assert!(catalog.delete(EntityKind::Ore, &iron.id.to_string()).unwrap());
        assert!(catalog.store().get_component(&plate.id).unwrap().is_some());

        let findings = catalog.engine().audit().unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].id, plate.id.to_string());

        let resave = catalog.update_component(plate.id, ComponentDraft::from(&plate));
        assert!(matches!(resave, Err(Error::Validation(_))));
    }
}

//! Read boundary between the engine and whatever persists entities

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use crate::error::Result;
use crate::models::{Block, BlockId, Component, ComponentId, EntityKind, Ore, OreId};

/// Lookups the engine needs from persistence.
///
/// The engine never writes through this trait; writes go through
/// [`crate::catalog::Catalog`], which validates first.
pub trait EntityStore {
    fn get_ore(&self, id: &OreId) -> Result<Option<Ore>>;
    fn get_component(&self, id: &ComponentId) -> Result<Option<Component>>;
    fn get_block(&self, id: &BlockId) -> Result<Option<Block>>;

    /// Batch lookup; ids that do not exist are simply absent from the result
    fn get_ores_by_ids(&self, ids: &[OreId]) -> Result<HashMap<OreId, Ore>>;
    fn get_components_by_ids(&self, ids: &[ComponentId]) -> Result<HashMap<ComponentId, Component>>;

    fn list_ores(&self) -> Result<Vec<Ore>>;
    fn list_components(&self) -> Result<Vec<Component>>;
    fn list_blocks(&self) -> Result<Vec<Block>>;

    /// Which of `ids` exist for the given kind
    fn existing_ids(&self, kind: EntityKind, ids: &[Uuid]) -> Result<HashSet<Uuid>> {
        let found = match kind {
            EntityKind::Ore => {
                let ids: Vec<OreId> = ids.iter().copied().map(OreId::from).collect();
                self.get_ores_by_ids(&ids)?
                    .into_keys()
                    .map(|id| *id.as_uuid())
                    .collect()
            }
            EntityKind::Component => {
                let ids: Vec<ComponentId> = ids.iter().copied().map(ComponentId::from).collect();
                self.get_components_by_ids(&ids)?
                    .into_keys()
                    .map(|id| *id.as_uuid())
                    .collect()
            }
            EntityKind::Block => {
                let mut found = HashSet::new();
                for uuid in ids {
                    if self.get_block(&BlockId::from(*uuid))?.is_some() {
                        found.insert(*uuid);
                    }
                }
                found
            }
        };
        Ok(found)
    }
}

/// HashMap-backed store, for embedding and tests
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    ores: HashMap<OreId, Ore>,
    components: HashMap<ComponentId, Component>,
    blocks: HashMap<BlockId, Block>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_ore(&mut self, ore: Ore) {
        self.ores.insert(ore.id, ore);
    }

    pub fn insert_component(&mut self, component: Component) {
        self.components.insert(component.id, component);
    }

    pub fn insert_block(&mut self, block: Block) {
        self.blocks.insert(block.id, block);
    }

    pub fn remove_ore(&mut self, id: &OreId) -> Option<Ore> {
        self.ores.remove(id)
    }

    pub fn remove_component(&mut self, id: &ComponentId) -> Option<Component> {
        self.components.remove(id)
    }

    pub fn remove_block(&mut self, id: &BlockId) -> Option<Block> {
        self.blocks.remove(id)
    }
}

fn sorted_by_name<T>(items: impl Iterator<Item = T>, name: impl Fn(&T) -> &str) -> Vec<T> {
    let mut items: Vec<T> = items.collect();
    items.sort_by(|a, b| name(a).cmp(name(b)));
    items
}

impl EntityStore for MemoryStore {
    fn get_ore(&self, id: &OreId) -> Result<Option<Ore>> {
        Ok(self.ores.get(id).cloned())
    }

    fn get_component(&self, id: &ComponentId) -> Result<Option<Component>> {
        Ok(self.components.get(id).cloned())
    }

    fn get_block(&self, id: &BlockId) -> Result<Option<Block>> {
        Ok(self.blocks.get(id).cloned())
    }

    fn get_ores_by_ids(&self, ids: &[OreId]) -> Result<HashMap<OreId, Ore>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.ores.get(id).map(|ore| (*id, ore.clone())))
            .collect())
    }

    fn get_components_by_ids(&self, ids: &[ComponentId]) -> Result<HashMap<ComponentId, Component>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.components.get(id).map(|c| (*id, c.clone())))
            .collect())
    }

    fn list_ores(&self) -> Result<Vec<Ore>> {
        Ok(sorted_by_name(self.ores.values().cloned(), |o| o.name.as_str()))
    }

    fn list_components(&self) -> Result<Vec<Component>> {
        Ok(sorted_by_name(self.components.values().cloned(), |c| c.name.as_str()))
    }

    fn list_blocks(&self) -> Result<Vec<Block>> {
        Ok(sorted_by_name(self.blocks.values().cloned(), |b| b.name.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ore;

    #[test]
    fn existing_ids_filters_unknown() {
        let mut store = MemoryStore::new();
        let iron = ore("Iron Ore", 1.0);
        store.insert_ore(iron.clone());

        let ghost = Uuid::now_v7();
        let found = store
            .existing_ids(EntityKind::Ore, &[*iron.id.as_uuid(), ghost])
            .unwrap();
        assert!(found.contains(iron.id.as_uuid()));
        assert!(!found.contains(&ghost));
    }

    #[test]
    fn listings_are_sorted_by_name() {
        let mut store = MemoryStore::new();
        store.insert_ore(ore("Silicon", 1.0));
        store.insert_ore(ore("Cobalt", 1.0));
        let names: Vec<_> = store.list_ores().unwrap().into_iter().map(|o| o.name).collect();
        assert_eq!(names, ["Cobalt", "Silicon"]);
    }
}

//! Bill-of-materials resolution: Block -> Components -> Ores
//!
//! Resolution is read-side and tolerant. A component or ore that was deleted
//! after the block was saved is skipped with a warning and the rest of the
//! chain is still returned. The write path (see [`crate::validate`]) is the
//! strict one.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::Result;
use crate::models::{Block, ComponentId, OreId};
use crate::store::EntityStore;

/// One ore line inside a component's breakdown
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MaterialRequirement {
    pub ore_id: OreId,
    pub name: String,
    pub quantity_per_component: f64,
    /// `quantity_per_component` times the component count of the block
    pub total_quantity: f64,
    pub mass_per_unit: f64,
}

/// One component line of a block, with its ores
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComponentRequirement {
    pub component_id: ComponentId,
    pub name: String,
    pub quantity: u32,
    pub mass_per_unit: f64,
    pub total_mass: f64,
    pub materials: Vec<MaterialRequirement>,
}

/// Aggregate of one ore across every component of the block
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OreTotal {
    pub name: String,
    pub quantity: f64,
    /// Mass per unit, taken from the ore record
    pub mass: f64,
}

/// Fully resolved raw-material chain of one block
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResourceChain {
    pub components: Vec<ComponentRequirement>,
    pub ores: BTreeMap<OreId, OreTotal>,
    pub total_ore_mass: f64,
}

impl ResourceChain {
    pub fn is_empty(&self) -> bool {
        self.components.is_empty() && self.ores.is_empty()
    }
}

/// Resolve the raw materials needed to build one unit of `block`.
///
/// Component and ore records are fetched with one batched lookup each.
/// Only store failures are errors; dangling references are skipped.
pub fn resolve_resource_chain<S: EntityStore + ?Sized>(
    store: &S,
    block: &Block,
) -> Result<ResourceChain> {
    if block.components.is_empty() {
        return Ok(ResourceChain::default());
    }

    let component_ids: Vec<ComponentId> = block.components.keys().copied().collect();
    let components = store.get_components_by_ids(&component_ids)?;

    let ore_ids: Vec<OreId> = components
        .values()
        .flat_map(|c| c.materials.keys().copied())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let ores = if ore_ids.is_empty() {
        HashMap::new()
    } else {
        store.get_ores_by_ids(&ore_ids)?
    };

    let mut chain = ResourceChain::default();

    for (component_id, &quantity) in &block.components {
        let Some(component) = components.get(component_id) else {
            warn!(block = %block.name, component = %component_id, "component not found, skipping");
            continue;
        };

        let count = f64::from(quantity);
        let mut requirement = ComponentRequirement {
            component_id: component.id,
            name: component.name.clone(),
            quantity,
            mass_per_unit: component.mass,
            total_mass: component.mass * count,
            materials: Vec::with_capacity(component.materials.len()),
        };

        for (ore_id, &per_component) in &component.materials {
            let Some(ore) = ores.get(ore_id) else {
                warn!(component = %component.name, ore = %ore_id, "ore not found, skipping");
                continue;
            };

            let total_quantity = per_component * count;
            requirement.materials.push(MaterialRequirement {
                ore_id: ore.id,
                name: ore.name.clone(),
                quantity_per_component: per_component,
                total_quantity,
                mass_per_unit: ore.mass,
            });

            chain
                .ores
                .entry(ore.id)
                .or_insert_with(|| OreTotal {
                    name: ore.name.clone(),
                    quantity: 0.0,
                    mass: ore.mass,
                })
                .quantity += total_quantity;
        }

        chain.components.push(requirement);
    }

    chain.total_ore_mass = total_ore_mass(&chain.ores);
    debug!(
        block = %block.name,
        components = chain.components.len(),
        ores = chain.ores.len(),
        "resolved resource chain"
    );
    Ok(chain)
}

/// Sum of quantity times mass-per-unit over aggregated ores
pub fn total_ore_mass(ores: &BTreeMap<OreId, OreTotal>) -> f64 {
    ores.values().map(|ore| ore.quantity * ore.mass).sum()
}

/// Figures shown next to a resolved block
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChainStats {
    /// Distinct component entries on the block, including stale ones
    pub component_count: usize,
    pub total_component_quantity: u64,
    pub ore_type_count: usize,
    pub total_ore_mass: f64,
}

pub fn chain_stats(block: &Block, chain: &ResourceChain) -> ChainStats {
    ChainStats {
        component_count: block.components.len(),
        total_component_quantity: block.components.values().map(|&q| u64::from(q)).sum(),
        ore_type_count: chain.ores.len(),
        total_ore_mass: chain.total_ore_mass,
    }
}

/// Format a resource chain as an indented tree
pub fn format_resource_chain(chain: &ResourceChain) -> String {
    let mut output = String::new();

    if chain.components.is_empty() {
        output.push_str("(no components)\n");
        return output;
    }

    for component in &chain.components {
        output.push_str(&format!(
            "{}x {} ({:.2} kg each, {:.2} kg total)\n",
            component.quantity, component.name, component.mass_per_unit, component.total_mass
        ));
        for material in &component.materials {
            output.push_str(&format!(
                "  needs {} x {} = {}\n",
                material.name,
                trim_float(material.quantity_per_component),
                trim_float(material.total_quantity)
            ));
        }
    }

    output
}

fn trim_float(value: f64) -> String {
    let text = format!("{value:.3}");
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}

/// Summary of a block's raw-material needs
#[derive(Debug)]
pub struct ChainSummary {
    pub block_name: String,
    pub stats: ChainStats,
    pub ores: Vec<(String, f64, f64)>,
}

pub fn summarize_chain(block: &Block, chain: &ResourceChain) -> ChainSummary {
    let mut ores: Vec<_> = chain
        .ores
        .values()
        .map(|ore| (ore.name.clone(), ore.quantity, ore.quantity * ore.mass))
        .collect();
    ores.sort_by(|a, b| a.0.cmp(&b.0));

    ChainSummary {
        block_name: block.name.clone(),
        stats: chain_stats(block, chain),
        ores,
    }
}

impl fmt::Display for ChainSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Bill of Materials ===")?;
        writeln!(f, "Block: {}", self.block_name)?;
        writeln!(
            f,
            "Components: {} kinds, {} pieces",
            self.stats.component_count, self.stats.total_component_quantity
        )?;
        writeln!(f)?;

        writeln!(f, "Ores required:")?;
        if self.ores.is_empty() {
            writeln!(f, "  (none)")?;
        }
        for (name, quantity, mass) in &self.ores {
            writeln!(f, "  {:<20} {:>12} ({:.2} kg)", name, trim_float(*quantity), mass)?;
        }
        writeln!(f)?;

        writeln!(f, "Total ore mass: {:.2} kg", self.stats.total_ore_mass)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::test_support::{block, component, ore};

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn shared_ore_is_aggregated_across_components() {
        let mut store = MemoryStore::new();
        let iron = ore("Iron Ore", 1.0);
        let a = component("A", 10.0, &[(&iron, 5.0)]);
        let b = component("B", 4.0, &[(&iron, 3.0)]);
        let target = block("Wall", &[(&a, 2), (&b, 1)]);
        store.insert_ore(iron.clone());
        store.insert_component(a);
        store.insert_component(b);

        let chain = resolve_resource_chain(&store, &target).unwrap();
        assert_eq!(chain.ores.len(), 1);
        assert!(approx(chain.ores[&iron.id].quantity, 13.0));
        assert_eq!(chain.components.len(), 2);
    }

    #[test]
    fn total_mass_weighs_each_ore() {
        let mut store = MemoryStore::new();
        let x = ore("X", 1.0);
        let y = ore("Y", 0.8);
        let a = component("A", 1.0, &[(&x, 13.0), (&y, 4.0)]);
        let target = block("Panel", &[(&a, 1)]);
        store.insert_ore(x);
        store.insert_ore(y);
        store.insert_component(a);

        let chain = resolve_resource_chain(&store, &target).unwrap();
        assert!(approx(chain.total_ore_mass, 16.2));
    }

    #[test]
    fn stale_component_is_skipped_not_fatal() {
        let mut store = MemoryStore::new();
        let iron = ore("Iron Ore", 1.0);
        let plate = component("Steel Plate", 20.0, &[(&iron, 21.0)]);
        let deleted = component("Motor", 5.0, &[(&iron, 20.0)]);
        let target = block("Armor", &[(&plate, 2), (&deleted, 1)]);
        store.insert_ore(iron.clone());
        store.insert_component(plate.clone());

        let chain = resolve_resource_chain(&store, &target).unwrap();
        assert_eq!(chain.components.len(), 1);
        assert_eq!(chain.components[0].component_id, plate.id);
        assert!(approx(chain.components[0].total_mass, 40.0));
        assert!(approx(chain.ores[&iron.id].quantity, 42.0));
    }

    #[test]
    fn stale_ore_drops_only_that_material_line() {
        let mut store = MemoryStore::new();
        let iron = ore("Iron Ore", 1.0);
        let gone = ore("Nickel Ore", 1.0);
        let motor = component("Motor", 5.0, &[(&iron, 20.0), (&gone, 5.0)]);
        let target = block("Rotor", &[(&motor, 3)]);
        store.insert_ore(iron.clone());
        store.insert_component(motor);

        let chain = resolve_resource_chain(&store, &target).unwrap();
        assert_eq!(chain.components[0].materials.len(), 1);
        assert!(!chain.ores.contains_key(&gone.id));
        assert!(approx(chain.total_ore_mass, 60.0));
    }

    #[test]
    fn empty_block_yields_zero_chain() {
        let store = MemoryStore::new();
        let chain = resolve_resource_chain(&store, &block("Empty", &[])).unwrap();
        assert!(chain.is_empty());
        assert_eq!(chain.total_ore_mass, 0.0);
    }

    #[test]
    fn resolution_is_idempotent() {
        let mut store = MemoryStore::new();
        let iron = ore("Iron Ore", 1.0);
        let silicon = ore("Silicon", 0.5);
        let computer = component("Computer", 0.2, &[(&iron, 0.5), (&silicon, 0.2)]);
        let target = block("Console", &[(&computer, 6)]);
        store.insert_ore(iron);
        store.insert_ore(silicon);
        store.insert_component(computer);

        let first = resolve_resource_chain(&store, &target).unwrap();
        let second = resolve_resource_chain(&store, &target).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn stats_count_the_block_map() {
        let mut store = MemoryStore::new();
        let iron = ore("Iron Ore", 1.0);
        let plate = component("Steel Plate", 20.0, &[(&iron, 21.0)]);
        let ghost = component("Ghost", 1.0, &[]);
        let target = block("Armor", &[(&plate, 25), (&ghost, 5)]);
        store.insert_ore(iron);
        store.insert_component(plate);

        let chain = resolve_resource_chain(&store, &target).unwrap();
        let stats = chain_stats(&target, &chain);
        assert_eq!(stats.component_count, 2);
        assert_eq!(stats.total_component_quantity, 30);
        assert_eq!(stats.ore_type_count, 1);

        let summary = summarize_chain(&target, &chain).to_string();
        assert!(summary.contains("Iron Ore"));
        assert!(summary.contains("Total ore mass: 525.00 kg"));
        assert!(format_resource_chain(&chain).contains("25x Steel Plate"));
    }
}

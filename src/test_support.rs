//! Shared constructors for unit tests.

use crate::models::{Block, BlockId, Component, ComponentId, Ore, OreId};

pub fn ore(name: &str, mass: f64) -> Ore {
    Ore {
        id: OreId::new(),
        name: name.to_string(),
        description: String::new(),
        mass,
    }
}

pub fn component(name: &str, mass: f64, materials: &[(&Ore, f64)]) -> Component {
    Component {
        id: ComponentId::new(),
        name: name.to_string(),
        description: String::new(),
        materials: materials.iter().map(|(ore, qty)| (ore.id, *qty)).collect(),
        mass,
        crafting_time: 1.0,
        fabricator_type: "Assembler".to_string(),
    }
}

pub fn block(name: &str, components: &[(&Component, u32)]) -> Block {
    Block {
        id: BlockId::new(),
        name: name.to_string(),
        description: String::new(),
        mass: 100.0,
        components: components.iter().map(|(c, qty)| (c.id, *qty)).collect(),
        health: 1000.0,
        pcu: 1,
        snap_size: 2.5,
        input_mass: None,
        output_mass: None,
        consumer_type: String::new(),
        consumer_rate: 0.0,
        producer_type: String::new(),
        producer_rate: 0.0,
        storage_capacity: 0.0,
    }
}

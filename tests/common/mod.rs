//! Shared test helpers for integration tests

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use assert_cmd::cargo;
use serde_json::{Value, json};
use tempfile::TempDir;

use se2_calculator::{BlockId, ComponentId, OreId};

/// Helper to get an se2-calculator command against a database in `tmp`
pub fn se2(tmp: &TempDir) -> Command {
    let mut cmd = Command::new(cargo::cargo_bin!("se2-calculator"));
    cmd.current_dir(tmp.path())
        .arg("--database")
        .arg(tmp.path().join("test.db"));
    cmd
}

/// Ids used by [`sample_fixtures`]
pub struct SampleIds {
    pub iron: OreId,
    pub nickel: OreId,
    pub plate: ComponentId,
    pub motor: ComponentId,
    pub armor: BlockId,
    pub rotor: BlockId,
}

impl SampleIds {
    pub fn new() -> Self {
        Self {
            iron: OreId::new(),
            nickel: OreId::new(),
            plate: ComponentId::new(),
            motor: ComponentId::new(),
            armor: BlockId::new(),
            rotor: BlockId::new(),
        }
    }
}

/// Three fixture files; the rotor block uses the legacy list shape
pub fn sample_fixtures(ids: &SampleIds) -> (Value, Value, Value) {
    let ores = json!([
        {"model": "ores.ore", "pk": ids.iron.to_string(),
         "fields": {"name": "Iron Ore", "description": "", "mass": 1.0}},
        {"model": "ores.ore", "pk": ids.nickel.to_string(),
         "fields": {"name": "Nickel Ore", "mass": 0.5}},
    ]);
    let components = json!([
        {"model": "components.component", "pk": ids.plate.to_string(),
         "fields": {"name": "Steel Plate", "materials": {ids.iron.to_string(): 21}, "mass": 20.0,
                    "crafting_time": 1.0, "fabricator_type": "Assembler"}},
        {"model": "components.component", "pk": ids.motor.to_string(),
         "fields": {"name": "Motor", "materials": {ids.iron.to_string(): 20, ids.nickel.to_string(): 5},
                    "mass": 24.0, "crafting_time": 1.5, "fabricator_type": "Assembler"}},
    ]);
    let blocks = json!([
        {"model": "blocks.block", "pk": ids.armor.to_string(),
         "fields": {"name": "Light Armor Block", "mass": 500.0, "components": {ids.plate.to_string(): 25},
                    "health": 1000.0, "pcu": 1, "snap_size": 2.5}},
        {"model": "blocks.block", "pk": ids.rotor.to_string(),
         "fields": {"name": "Rotor", "mass": 700.0,
                    "components": [
                        {"component_id": ids.plate.to_string(), "component_name": "Steel Plate", "quantity": 15},
                        {"component_id": ids.motor.to_string(), "component_name": "Motor", "quantity": 4}
                    ],
                    "health": 800.0, "pcu": 2, "snap_size": 2.5,
                    "consumer_type": "Power", "consumer_rate": 0.1}},
    ]);
    (ores, components, blocks)
}

pub fn write_json(dir: &Path, name: &str, value: &Value) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, serde_json::to_string_pretty(value).unwrap()).unwrap();
    path
}

/// Write the sample fixtures into `tmp/fixtures/` and return that directory
pub fn write_sample_fixtures(tmp: &TempDir, ids: &SampleIds) -> PathBuf {
    let dir = tmp.path().join("fixtures");
    fs::create_dir_all(dir.join("nested")).unwrap();
    let (ores, components, blocks) = sample_fixtures(ids);
    write_json(&dir, "sample_ores.json", &ores);
    write_json(&dir, "sample_components.json", &components);
    write_json(&dir.join("nested"), "sample_blocks.json", &blocks);
    dir
}

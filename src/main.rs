//! SE2 Calculator
//!
//! Ore / component / block catalog and bill-of-materials calculator for
//! Space Engineers 2.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;

use se2_calculator::calculator;
use se2_calculator::fixtures;
use se2_calculator::models::{BlockComponents, BlockDraft, ComponentDraft, OreDraft};
use se2_calculator::{Catalog, Component, EngineConfig, EntityKind, EntityStore, Ore};

#[derive(Parser)]
#[command(name = "se2-calculator")]
#[command(about = "Bill-of-materials calculator for Space Engineers 2 blocks")]
struct Cli {
    /// Path to the SQLite database
    #[arg(short, long, default_value = "se2_data.db", env = "SE2_DATABASE")]
    database: PathBuf,

    /// Seconds a resolved chain may be served from cache
    #[arg(long, default_value_t = 300, env = "SE2_CACHE_TTL")]
    cache_ttl: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize empty database with schema
    Init,

    /// Load fixture files (or directories of them) through validation
    LoadFixtures {
        /// Fixture files or directories
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Clear existing data before loading
        #[arg(long)]
        clear: bool,
    },

    /// Check fixture files without loading them
    VerifyFixtures {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Load sample data for testing
    LoadSample,

    /// List all ores in the database
    ListOres,

    /// List all components in the database
    ListComponents,

    /// List all blocks in the database
    ListBlocks,

    /// Show details for a specific block
    Block {
        /// Block ID or exact name
        block: String,
    },

    /// Resolve the raw ores a block needs
    Resolve {
        /// Block ID or exact name
        block: String,

        /// Show the per-component breakdown
        #[arg(short, long)]
        verbose: bool,

        /// Print the resolved chain as JSON
        #[arg(long, conflicts_with = "verbose")]
        json: bool,
    },

    /// Re-validate every stored entity and report dangling references
    Validate,

    /// Delete one entity (references to it are left in place)
    Delete {
        /// ore, component or block
        kind: EntityKind,
        id: String,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("se2_calculator=warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = EngineConfig {
        cache_ttl: Duration::from_secs(cli.cache_ttl),
    };
    let catalog = Catalog::open(&cli.database, config)
        .with_context(|| format!("Failed to open {}", cli.database.display()))?;

    match cli.command {
        Commands::Init => {
            println!("Database initialized at: {}", cli.database.display());
        }

        Commands::LoadFixtures { paths, clear } => {
            if clear {
                println!("Clearing existing data...");
                catalog.clear()?;
            }

            let records = fixtures::read_fixtures(&paths)?;
            let stats = fixtures::load_fixtures(&catalog, &records)?;
            println!("{}", stats);
        }

        Commands::VerifyFixtures { paths } => {
            let records = fixtures::read_fixtures(&paths)?;
            let report = fixtures::verify_fixtures(&records)?;
            print!("{}", report);
            if !report.is_ok() {
                bail!("fixture verification failed");
            }
        }

        Commands::LoadSample => {
            catalog.clear()?;
            load_sample_data(&catalog)?;
            println!("Sample data loaded successfully!");
        }

        Commands::ListOres => {
            let ores = catalog.store().list_ores()?;
            if ores.is_empty() {
                println!("No ores in database. Run 'load-fixtures' or 'load-sample' first.");
            } else {
                println!("{:<36}  {:<24} {:>10}", "ID", "Ore", "Mass (kg)");
                println!("{}", "-".repeat(72));
                for o in ores {
                    println!("{:<36}  {:<24} {:>10.2}", o.id, o.name, o.mass);
                }
            }
        }

        Commands::ListComponents => {
            let components = catalog.store().list_components()?;
            if components.is_empty() {
                println!("No components in database. Run 'load-fixtures' or 'load-sample' first.");
            } else {
                println!("{:<36}  {:<24} {:>10} {:>8}", "ID", "Component", "Mass (kg)", "Ores");
                println!("{}", "-".repeat(81));
                for c in components {
                    println!(
                        "{:<36}  {:<24} {:>10.2} {:>8}",
                        c.id,
                        c.name,
                        c.mass,
                        c.materials.len()
                    );
                }
            }
        }

        Commands::ListBlocks => {
            let blocks = catalog.store().list_blocks()?;
            if blocks.is_empty() {
                println!("No blocks in database. Run 'load-fixtures' or 'load-sample' first.");
            } else {
                println!("{:<36}  {:<24} {:>10} {:>6}", "ID", "Block", "Mass (kg)", "PCU");
                println!("{}", "-".repeat(79));
                for b in blocks {
                    println!("{:<36}  {:<24} {:>10.0} {:>6}", b.id, b.name, b.mass, b.pcu);
                }
            }
        }

        Commands::Block { block } => {
            let Some(b) = catalog.find_block(&block)? else {
                bail!("Block '{}' not found", block);
            };

            println!("Block: {}", b.name);
            println!("  ID: {}", b.id);
            if !b.description.is_empty() {
                println!("  Description: {}", b.description);
            }
            println!("  Mass: {} kg", b.mass);
            println!("  Health: {}", b.health);
            println!("  PCU: {}", b.pcu);
            println!("  Snap size: {}", b.snap_size);
            if let Some(input) = b.input_mass {
                println!("  Input capacity: {} kg", input);
            }
            if let Some(output) = b.output_mass {
                println!("  Output capacity: {} kg", output);
            }
            if !b.consumer_type.is_empty() {
                println!("  Consumes: {} @ {}/s", b.consumer_type, b.consumer_rate);
            }
            if !b.producer_type.is_empty() {
                println!("  Produces: {} @ {}/s", b.producer_type, b.producer_rate);
            }
            if b.storage_capacity > 0.0 {
                println!("  Storage: {}", b.storage_capacity);
            }

            let chain = catalog.engine().resolve(&b)?;
            let stats = calculator::chain_stats(&b, &chain);
            println!(
                "  Components: {} kinds, {} pieces",
                stats.component_count, stats.total_component_quantity
            );
            println!("  Ore types: {}", stats.ore_type_count);
            println!("  Total ore mass: {:.2} kg", stats.total_ore_mass);
        }

        Commands::Resolve {
            block,
            verbose,
            json,
        } => {
            let Some(b) = catalog.find_block(&block)? else {
                bail!("Block '{}' not found", block);
            };
            let chain = catalog.engine().resolve(&b)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&chain)?);
                return Ok(());
            }

            if verbose {
                println!("Resource chain:\n");
                println!("{}", calculator::format_resource_chain(&chain));
            }

            let summary = calculator::summarize_chain(&b, &chain);
            println!("{}", summary);
        }

        Commands::Validate => {
            let findings = catalog.engine().audit()?;
            if findings.is_empty() {
                println!("All entities are valid.");
            } else {
                for finding in &findings {
                    println!("{} '{}' ({}):", finding.kind, finding.name, finding.id);
                    for error in &finding.errors {
                        println!("  - {}", error);
                    }
                }
                bail!("{} invalid entities", findings.len());
            }
        }

        Commands::Delete { kind, id } => {
            if catalog.delete(kind, &id)? {
                println!("Deleted {} {}", kind.noun(), id);
            } else {
                bail!("{} with ID {} not found", kind, id);
            }
        }
    }

    Ok(())
}

fn materials(entries: &[(&Ore, f64)]) -> BTreeMap<String, Value> {
    entries
        .iter()
        .map(|(ore, quantity)| (ore.id.to_string(), json!(quantity)))
        .collect()
}

fn parts(entries: &[(&Component, u32)]) -> BlockComponents {
    BlockComponents::Map(
        entries
            .iter()
            .map(|(component, quantity)| (component.id.to_string(), json!(quantity)))
            .collect(),
    )
}

/// Load a small SE2 catalog for testing without fixture files
fn load_sample_data(catalog: &Catalog) -> Result<()> {
    let ore = |name: &str| {
        catalog.create_ore(OreDraft {
            name: name.to_string(),
            description: String::new(),
            mass: 1.0,
        })
    };
    let iron = ore("Iron Ore")?;
    let nickel = ore("Nickel Ore")?;
    let silicon = ore("Silicon Ore")?;
    let cobalt = ore("Cobalt Ore")?;

    let component = |name: &str, mass: f64, time: f64, entries: &[(&Ore, f64)]| {
        catalog.create_component(ComponentDraft {
            name: name.to_string(),
            description: String::new(),
            materials: materials(entries),
            mass,
            crafting_time: time,
            fabricator_type: "Assembler".to_string(),
        })
    };
    let steel_plate = component("Steel Plate", 20.0, 1.0, &[(&iron, 21.0)])?;
    let interior_plate = component("Interior Plate", 3.0, 0.5, &[(&iron, 3.0)])?;
    let construction = component("Construction Component", 8.0, 0.5, &[(&iron, 8.0)])?;
    let metal_grid = component(
        "Metal Grid",
        6.0,
        1.5,
        &[(&iron, 12.0), (&nickel, 5.0), (&cobalt, 3.0)],
    )?;
    let motor = component("Motor", 24.0, 1.5, &[(&iron, 20.0), (&nickel, 5.0)])?;
    let computer = component("Computer", 0.2, 0.5, &[(&iron, 0.5), (&silicon, 0.2)])?;
    let large_tube = component("Large Steel Tube", 25.0, 2.0, &[(&iron, 30.0)])?;
    let power_cell = component(
        "Power Cell",
        25.0,
        2.0,
        &[(&iron, 10.0), (&nickel, 2.0), (&silicon, 1.0)],
    )?;

    let structural = |name: &str, mass: f64, components: BlockComponents| BlockDraft {
        name: name.to_string(),
        mass,
        components,
        health: mass * 2.0,
        pcu: 1,
        snap_size: 2.5,
        ..Default::default()
    };

    catalog.create_block(structural(
        "Light Armor Block",
        500.0,
        parts(&[(&steel_plate, 25)]),
    ))?;
    catalog.create_block(structural(
        "Heavy Armor Block",
        3300.0,
        parts(&[(&steel_plate, 150), (&metal_grid, 50)]),
    ))?;
    // stored in the legacy list shape on purpose
    catalog.create_block(structural(
        "Interior Wall",
        250.0,
        BlockComponents::List(vec![
            json!({"component_id": interior_plate.id.to_string(), "component_name": interior_plate.name.clone(), "quantity": 25}),
            json!({"component_id": construction.id.to_string(), "component_name": construction.name.clone(), "quantity": 10}),
        ]),
    ))?;
    catalog.create_block(BlockDraft {
        pcu: 15,
        consumer_type: "Power".to_string(),
        consumer_rate: 12.0,
        producer_type: "Power".to_string(),
        producer_rate: 12.0,
        storage_capacity: 3.0,
        ..structural(
            "Large Battery",
            3845.0,
            parts(&[
                (&steel_plate, 80),
                (&construction, 30),
                (&power_cell, 80),
                (&computer, 25),
            ]),
        )
    })?;
    catalog.create_block(BlockDraft {
        pcu: 25,
        producer_type: "Power".to_string(),
        producer_rate: 15.0,
        ..structural(
            "Small Reactor",
            6500.0,
            parts(&[
                (&steel_plate, 80),
                (&construction, 40),
                (&metal_grid, 4),
                (&large_tube, 8),
                (&motor, 6),
                (&computer, 25),
            ]),
        )
    })?;
    catalog.create_block(BlockDraft {
        pcu: 40,
        input_mass: Some(4000),
        output_mass: Some(4000),
        consumer_type: "Power".to_string(),
        consumer_rate: 0.56,
        ..structural(
            "Assembler",
            3930.0,
            parts(&[
                (&steel_plate, 140),
                (&construction, 10),
                (&motor, 10),
                (&metal_grid, 10),
                (&computer, 160),
            ]),
        )
    })?;

    println!("Loaded 4 ores, 8 components and 6 blocks");
    Ok(())
}

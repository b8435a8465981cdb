//! Database schema and operations

use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params_from_iter};
use serde::de::DeserializeOwned;

use crate::error::{Error, Result};
use crate::models::{Block, BlockId, Component, ComponentId, EntityKind, Ore, OreId};
use crate::store::EntityStore;

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS ores (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE COLLATE NOCASE,
            description TEXT NOT NULL DEFAULT '',
            mass REAL NOT NULL,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        );

        -- materials: JSON object of ore id -> quantity per component
        CREATE TABLE IF NOT EXISTS components (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE COLLATE NOCASE,
            description TEXT NOT NULL DEFAULT '',
            materials TEXT NOT NULL DEFAULT '{}',
            mass REAL NOT NULL DEFAULT 0,
            crafting_time REAL NOT NULL DEFAULT 0,
            fabricator_type TEXT NOT NULL DEFAULT '',
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        );

        -- components: JSON object of component id -> count
        CREATE TABLE IF NOT EXISTS blocks (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE COLLATE NOCASE,
            description TEXT NOT NULL DEFAULT '',
            mass REAL NOT NULL,
            components TEXT NOT NULL DEFAULT '{}',
            health REAL NOT NULL,
            pcu INTEGER NOT NULL,
            snap_size REAL NOT NULL,
            input_mass INTEGER,
            output_mass INTEGER,
            consumer_type TEXT NOT NULL DEFAULT '',
            consumer_rate REAL NOT NULL DEFAULT 0,
            producer_type TEXT NOT NULL DEFAULT '',
            producer_rate REAL NOT NULL DEFAULT 0,
            storage_capacity REAL NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        );
        "#,
    )?;
    Ok(())
}

/// Clear every entity table
pub fn clear_all(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        DELETE FROM blocks;
        DELETE FROM components;
        DELETE FROM ores;
        "#,
    )?;
    Ok(())
}

fn unique_violation(err: rusqlite::Error, kind: EntityKind, name: &str) -> Error {
    match &err {
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            Error::DuplicateName {
                kind,
                name: name.to_string(),
            }
        }
        _ => err.into(),
    }
}

/// Insert or update an ore
pub fn upsert_ore(conn: &Connection, ore: &Ore) -> Result<()> {
    conn.execute(
        "INSERT INTO ores (id, name, description, mass)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(id) DO UPDATE SET
            name = excluded.name,
            description = excluded.description,
            mass = excluded.mass,
            updated_at = CURRENT_TIMESTAMP",
        (ore.id.to_string(), &ore.name, &ore.description, ore.mass),
    )
    .map_err(|e| unique_violation(e, EntityKind::Ore, &ore.name))?;
    Ok(())
}

/// Insert or update a component
pub fn upsert_component(conn: &Connection, component: &Component) -> Result<()> {
    let materials = serde_json::to_string(&component.materials)?;
    conn.execute(
        "INSERT INTO components (id, name, description, materials, mass, crafting_time, fabricator_type)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(id) DO UPDATE SET
            name = excluded.name,
            description = excluded.description,
            materials = excluded.materials,
            mass = excluded.mass,
            crafting_time = excluded.crafting_time,
            fabricator_type = excluded.fabricator_type,
            updated_at = CURRENT_TIMESTAMP",
        (
            component.id.to_string(),
            &component.name,
            &component.description,
            materials,
            component.mass,
            component.crafting_time,
            &component.fabricator_type,
        ),
    )
    .map_err(|e| unique_violation(e, EntityKind::Component, &component.name))?;
    Ok(())
}

/// Insert or update a block
pub fn upsert_block(conn: &Connection, block: &Block) -> Result<()> {
    let components = serde_json::to_string(&block.components)?;
    conn.execute(
        "INSERT INTO blocks (id, name, description, mass, components, health, pcu, snap_size,
                             input_mass, output_mass, consumer_type, consumer_rate,
                             producer_type, producer_rate, storage_capacity)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
         ON CONFLICT(id) DO UPDATE SET
            name = excluded.name,
            description = excluded.description,
            mass = excluded.mass,
            components = excluded.components,
            health = excluded.health,
            pcu = excluded.pcu,
            snap_size = excluded.snap_size,
            input_mass = excluded.input_mass,
            output_mass = excluded.output_mass,
            consumer_type = excluded.consumer_type,
            consumer_rate = excluded.consumer_rate,
            producer_type = excluded.producer_type,
            producer_rate = excluded.producer_rate,
            storage_capacity = excluded.storage_capacity,
            updated_at = CURRENT_TIMESTAMP",
        rusqlite::params![
            block.id.to_string(),
            &block.name,
            &block.description,
            block.mass,
            components,
            block.health,
            block.pcu,
            block.snap_size,
            block.input_mass,
            block.output_mass,
            &block.consumer_type,
            block.consumer_rate,
            &block.producer_type,
            block.producer_rate,
            block.storage_capacity,
        ],
    )
    .map_err(|e| unique_violation(e, EntityKind::Block, &block.name))?;
    Ok(())
}

/// Delete one row; referencing rows are left untouched
pub fn delete_entity(conn: &Connection, kind: EntityKind, id: &str) -> Result<bool> {
    let table = table_name(kind);
    let deleted = conn.execute(&format!("DELETE FROM {table} WHERE id = ?1"), [id])?;
    Ok(deleted > 0)
}

fn table_name(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Ore => "ores",
        EntityKind::Component => "components",
        EntityKind::Block => "blocks",
    }
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

const ORE_COLUMNS: &str = "id, name, description, mass";
const COMPONENT_COLUMNS: &str =
    "id, name, description, materials, mass, crafting_time, fabricator_type";
const BLOCK_COLUMNS: &str = "id, name, description, mass, components, health, pcu, snap_size, \
     input_mass, output_mass, consumer_type, consumer_rate, producer_type, producer_rate, storage_capacity";

fn conversion_failure<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn id_column<T>(row: &Row, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = uuid::Error>,
{
    let text: String = row.get(idx)?;
    text.parse().map_err(|e| conversion_failure(idx, e))
}

fn json_column<T: DeserializeOwned>(row: &Row, idx: usize) -> rusqlite::Result<T> {
    let text: String = row.get(idx)?;
    serde_json::from_str(&text).map_err(|e| conversion_failure(idx, e))
}

fn ore_from_row(row: &Row) -> rusqlite::Result<Ore> {
    Ok(Ore {
        id: id_column(row, 0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        mass: row.get(3)?,
    })
}

fn component_from_row(row: &Row) -> rusqlite::Result<Component> {
    Ok(Component {
        id: id_column(row, 0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        materials: json_column(row, 3)?,
        mass: row.get(4)?,
        crafting_time: row.get(5)?,
        fabricator_type: row.get(6)?,
    })
}

fn block_from_row(row: &Row) -> rusqlite::Result<Block> {
    Ok(Block {
        id: id_column(row, 0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        mass: row.get(3)?,
        components: json_column(row, 4)?,
        health: row.get(5)?,
        pcu: row.get(6)?,
        snap_size: row.get(7)?,
        input_mass: row.get(8)?,
        output_mass: row.get(9)?,
        consumer_type: row.get(10)?,
        consumer_rate: row.get(11)?,
        producer_type: row.get(12)?,
        producer_rate: row.get(13)?,
        storage_capacity: row.get(14)?,
    })
}

fn get_one<T>(
    conn: &Connection,
    columns: &str,
    kind: EntityKind,
    id: &str,
    map: fn(&Row) -> rusqlite::Result<T>,
) -> Result<Option<T>> {
    let sql = format!("SELECT {columns} FROM {} WHERE id = ?1", table_name(kind));
    Ok(conn.query_row(&sql, [id], map).optional()?)
}

fn get_many<T>(
    conn: &Connection,
    columns: &str,
    kind: EntityKind,
    ids: &[String],
    map: fn(&Row) -> rusqlite::Result<T>,
) -> Result<Vec<T>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let placeholders = vec!["?"; ids.len()].join(", ");
    let sql = format!(
        "SELECT {columns} FROM {} WHERE id IN ({placeholders})",
        table_name(kind)
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(ids.iter()), map)?;

    let mut results = Vec::new();
    for row in rows {
        results.push(row?);
    }
    Ok(results)
}

fn list_all<T>(
    conn: &Connection,
    columns: &str,
    kind: EntityKind,
    map: fn(&Row) -> rusqlite::Result<T>,
) -> Result<Vec<T>> {
    let sql = format!("SELECT {columns} FROM {} ORDER BY name", table_name(kind));
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], map)?;

    let mut results = Vec::new();
    for row in rows {
        results.push(row?);
    }
    Ok(results)
}

/// Look a block up by exact name
pub fn find_block_by_name(conn: &Connection, name: &str) -> Result<Option<Block>> {
    let sql = format!("SELECT {BLOCK_COLUMNS} FROM blocks WHERE name = ?1");
    Ok(conn.query_row(&sql, [name], block_from_row).optional()?)
}

/// [`EntityStore`] over a SQLite connection
#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) a database file and make sure the schema exists
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    pub fn from_connection(conn: Connection) -> Result<Self> {
        init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

fn id_strings<T: ToString>(ids: &[T]) -> Vec<String> {
    ids.iter().map(ToString::to_string).collect()
}

impl EntityStore for SqliteStore {
    fn get_ore(&self, id: &OreId) -> Result<Option<Ore>> {
        get_one(&self.conn, ORE_COLUMNS, EntityKind::Ore, &id.to_string(), ore_from_row)
    }

    fn get_component(&self, id: &ComponentId) -> Result<Option<Component>> {
        get_one(
            &self.conn,
            COMPONENT_COLUMNS,
            EntityKind::Component,
            &id.to_string(),
            component_from_row,
        )
    }

    fn get_block(&self, id: &BlockId) -> Result<Option<Block>> {
        get_one(&self.conn, BLOCK_COLUMNS, EntityKind::Block, &id.to_string(), block_from_row)
    }

    fn get_ores_by_ids(&self, ids: &[OreId]) -> Result<HashMap<OreId, Ore>> {
        let ores = get_many(&self.conn, ORE_COLUMNS, EntityKind::Ore, &id_strings(ids), ore_from_row)?;
        Ok(ores.into_iter().map(|ore| (ore.id, ore)).collect())
    }

    fn get_components_by_ids(&self, ids: &[ComponentId]) -> Result<HashMap<ComponentId, Component>> {
        let components = get_many(
            &self.conn,
            COMPONENT_COLUMNS,
            EntityKind::Component,
            &id_strings(ids),
            component_from_row,
        )?;
        Ok(components.into_iter().map(|c| (c.id, c)).collect())
    }

    fn list_ores(&self) -> Result<Vec<Ore>> {
        list_all(&self.conn, ORE_COLUMNS, EntityKind::Ore, ore_from_row)
    }

    fn list_components(&self) -> Result<Vec<Component>> {
        list_all(&self.conn, COMPONENT_COLUMNS, EntityKind::Component, component_from_row)
    }

    fn list_blocks(&self) -> Result<Vec<Block>> {
        list_all(&self.conn, BLOCK_COLUMNS, EntityKind::Block, block_from_row)
    }
}

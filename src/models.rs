//! Data models for SE2 ores, components and blocks

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// The three tiers of the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Ore,
    Component,
    Block,
}

impl EntityKind {
    /// Lowercase noun used inside sentences ("Invalid quantity for ore ...")
    pub fn noun(self) -> &'static str {
        match self {
            EntityKind::Ore => "ore",
            EntityKind::Component => "component",
            EntityKind::Block => "block",
        }
    }

    /// The `model` label used by fixture files
    pub fn fixture_model(self) -> &'static str {
        match self {
            EntityKind::Ore => "ores.ore",
            EntityKind::Component => "components.component",
            EntityKind::Block => "blocks.block",
        }
    }

    pub fn from_fixture_model(model: &str) -> Option<Self> {
        match model {
            "ores.ore" => Some(EntityKind::Ore),
            "components.component" => Some(EntityKind::Component),
            "blocks.block" => Some(EntityKind::Block),
            _ => None,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EntityKind::Ore => "Ore",
            EntityKind::Component => "Component",
            EntityKind::Block => "Block",
        };
        f.write_str(label)
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ore" | "ores" => Ok(EntityKind::Ore),
            "component" | "components" => Ok(EntityKind::Component),
            "block" | "blocks" => Ok(EntityKind::Block),
            other => Err(format!("unknown entity kind '{other}'")),
        }
    }
}

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Fresh time-ordered (UUIDv7) identifier
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Lenient parse: anything that is not a UUID yields `None`
            pub fn parse(s: &str) -> Option<Self> {
                Uuid::parse_str(s.trim()).ok().map(Self)
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s.trim()).map(Self)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }
    };
}

entity_id!(
    /// Identifier of an [`Ore`]
    OreId
);
entity_id!(
    /// Identifier of a [`Component`]
    ComponentId
);
entity_id!(
    /// Identifier of a [`Block`]
    BlockId
);

/// Raw material, leaf of the dependency graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ore {
    pub id: OreId,
    pub name: String,
    pub description: String,
    /// Mass of one unit in kg
    pub mass: f64,
}

/// Crafted item made from ores
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    pub id: ComponentId,
    pub name: String,
    pub description: String,
    /// Ore id -> quantity per component (may be fractional)
    pub materials: BTreeMap<OreId, f64>,
    pub mass: f64,
    pub crafting_time: f64,
    pub fabricator_type: String,
}

/// Buildable block made from components
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub id: BlockId,
    pub name: String,
    pub description: String,
    pub mass: f64,
    /// Component id -> whole number of components
    pub components: BTreeMap<ComponentId, u32>,
    pub health: f64,
    pub pcu: u32,
    pub snap_size: f64,
    pub input_mass: Option<u32>,
    pub output_mass: Option<u32>,
    pub consumer_type: String,
    pub consumer_rate: f64,
    pub producer_type: String,
    pub producer_rate: f64,
    pub storage_capacity: f64,
}

// ---------------------------------------------------------------------------
// Write-side drafts
//
// Drafts carry quantities exactly as they arrived (JSON values of any type).
// Validation coerces them; only a validated draft becomes a typed record.
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OreDraft {
    pub name: String,
    pub description: String,
    pub mass: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComponentDraft {
    pub name: String,
    pub description: String,
    pub materials: BTreeMap<String, Value>,
    pub mass: f64,
    pub crafting_time: f64,
    pub fabricator_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockDraft {
    pub name: String,
    pub description: String,
    pub mass: f64,
    pub components: BlockComponents,
    pub health: f64,
    pub pcu: u32,
    pub snap_size: f64,
    pub input_mass: Option<u32>,
    pub output_mass: Option<u32>,
    pub consumer_type: String,
    pub consumer_rate: f64,
    pub producer_type: String,
    pub producer_rate: f64,
    pub storage_capacity: f64,
}

/// Keys a legacy component entry must carry
pub const LEGACY_COMPONENT_KEYS: [&str; 3] = ["component_id", "component_name", "quantity"];

/// The two persisted shapes of a block's component list.
///
/// Older data stores a list of `{component_id, component_name, quantity}`
/// objects, newer data a map of component id to quantity. Both are accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BlockComponents {
    Map(BTreeMap<String, Value>),
    List(Vec<Value>),
}

impl Default for BlockComponents {
    fn default() -> Self {
        BlockComponents::Map(BTreeMap::new())
    }
}

/// One normalised entry of [`BlockComponents`]
#[derive(Debug, Clone, PartialEq)]
pub enum ComponentLine<'a> {
    Reference { id: String, quantity: &'a Value },
    MissingKeys(Vec<&'static str>),
}

impl BlockComponents {
    pub fn len(&self) -> usize {
        match self {
            BlockComponents::Map(map) => map.len(),
            BlockComponents::List(list) => list.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Normalise either shape into a flat sequence of entries
    pub fn lines(&self) -> Vec<ComponentLine<'_>> {
        match self {
            BlockComponents::Map(map) => map
                .iter()
                .map(|(id, value)| match value {
                    Value::Object(_) => legacy_line(value),
                    quantity => ComponentLine::Reference {
                        id: id.clone(),
                        quantity,
                    },
                })
                .collect(),
            BlockComponents::List(list) => list.iter().map(legacy_line).collect(),
        }
    }
}

fn legacy_line(entry: &Value) -> ComponentLine<'_> {
    let Some(object) = entry.as_object() else {
        return ComponentLine::MissingKeys(LEGACY_COMPONENT_KEYS.to_vec());
    };

    let missing: Vec<&'static str> = LEGACY_COMPONENT_KEYS
        .iter()
        .copied()
        .filter(|key| !object.contains_key(*key))
        .collect();
    if !missing.is_empty() {
        return ComponentLine::MissingKeys(missing);
    }

    let id = match &object["component_id"] {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    ComponentLine::Reference {
        id,
        quantity: &object["quantity"],
    }
}

impl From<&Ore> for OreDraft {
    fn from(ore: &Ore) -> Self {
        OreDraft {
            name: ore.name.clone(),
            description: ore.description.clone(),
            mass: ore.mass,
        }
    }
}

impl From<&Component> for ComponentDraft {
    fn from(component: &Component) -> Self {
        ComponentDraft {
            name: component.name.clone(),
            description: component.description.clone(),
            materials: component
                .materials
                .iter()
                .map(|(id, quantity)| (id.to_string(), Value::from(*quantity)))
                .collect(),
            mass: component.mass,
            crafting_time: component.crafting_time,
            fabricator_type: component.fabricator_type.clone(),
        }
    }
}

impl From<&Block> for BlockDraft {
    fn from(block: &Block) -> Self {
        BlockDraft {
            name: block.name.clone(),
            description: block.description.clone(),
            mass: block.mass,
            components: BlockComponents::Map(
                block
                    .components
                    .iter()
                    .map(|(id, quantity)| (id.to_string(), Value::from(*quantity)))
                    .collect(),
            ),
            health: block.health,
            pcu: block.pcu,
            snap_size: block.snap_size,
            input_mass: block.input_mass,
            output_mass: block.output_mass,
            consumer_type: block.consumer_type.clone(),
            consumer_rate: block.consumer_rate,
            producer_type: block.producer_type.clone(),
            producer_rate: block.producer_rate,
            storage_capacity: block.storage_capacity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ids_are_time_ordered() {
        let first = OreId::new();
        let second = OreId::new();
        assert!(first < second);
        assert_eq!(first.as_uuid().get_version_num(), 7);
    }

    #[test]
    fn id_parse_is_lenient() {
        assert!(ComponentId::parse("not-a-uuid").is_none());
        let id = ComponentId::new();
        assert_eq!(ComponentId::parse(&id.to_string()), Some(id));
    }

    #[test]
    fn block_components_accept_both_shapes() {
        let map: BlockComponents = serde_json::from_value(json!({"abc": 3})).unwrap();
        assert!(matches!(map, BlockComponents::Map(_)));

        let list: BlockComponents = serde_json::from_value(json!([
            {"component_id": "abc", "component_name": "Steel Plate", "quantity": 3}
        ]))
        .unwrap();
        assert!(matches!(list, BlockComponents::List(_)));

        assert_eq!(map.lines(), list.lines());
    }

    #[test]
    fn legacy_entry_reports_missing_keys() {
        let list: BlockComponents =
            serde_json::from_value(json!([{"component_id": "abc"}, 7])).unwrap();
        let lines = list.lines();
        assert_eq!(
            lines[0],
            ComponentLine::MissingKeys(vec!["component_name", "quantity"])
        );
        assert_eq!(lines[1], ComponentLine::MissingKeys(LEGACY_COMPONENT_KEYS.to_vec()));
    }

    #[test]
    fn entity_kind_parses_cli_words() {
        assert_eq!("Ores".parse::<EntityKind>(), Ok(EntityKind::Ore));
        assert!("widget".parse::<EntityKind>().is_err());
    }
}

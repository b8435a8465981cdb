//! Fixture files: discovery, verification and loading
//!
//! Fixtures are JSON arrays of `{model, pk, fields}` records covering the
//! three entity tables. Loading goes through the catalog, so a fixture that
//! would fail validation is rejected exactly like any other write.

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use walkdir::WalkDir;

use crate::catalog::Catalog;
use crate::models::{
    BlockComponents, BlockDraft, BlockId, ComponentDraft, ComponentId, ComponentLine, EntityKind,
    OreDraft, OreId,
};

/// One serialized entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixtureRecord {
    pub model: String,
    pub pk: String,
    #[serde(default)]
    pub fields: Value,
}

impl FixtureRecord {
    pub fn kind(&self) -> Option<EntityKind> {
        EntityKind::from_fixture_model(&self.model)
    }

    pub fn name(&self) -> &str {
        self.fields.get("name").and_then(Value::as_str).unwrap_or("?")
    }
}

/// Collect every `*.json` file under the given files or directories
pub fn find_fixture_files(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for path in paths {
        if path.is_file() {
            files.push(path.clone());
            continue;
        }
        if !path.exists() {
            bail!("Fixture path {} does not exist", path.display());
        }
        for entry in WalkDir::new(path)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let entry_path = entry.path();
            if entry.file_type().is_file() && entry_path.extension().is_some_and(|ext| ext == "json") {
                files.push(entry_path.to_path_buf());
            }
        }
    }

    files.sort();
    files.dedup();
    Ok(files)
}

pub fn read_fixture_file(path: &Path) -> Result<Vec<FixtureRecord>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid fixture JSON in {}", path.display()))
}

/// Read and concatenate every fixture under `paths`
pub fn read_fixtures(paths: &[PathBuf]) -> Result<Vec<FixtureRecord>> {
    let mut records = Vec::new();
    for file in find_fixture_files(paths)? {
        let mut batch = read_fixture_file(&file)?;
        debug!(file = %file.display(), records = batch.len(), "read fixture file");
        records.append(&mut batch);
    }
    Ok(records)
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Statistics from loading fixtures
#[derive(Debug, Default)]
pub struct LoadStats {
    pub ores: usize,
    pub components: usize,
    pub blocks: usize,
    pub skipped: usize,
}

impl fmt::Display for LoadStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Fixture Loading Statistics:")?;
        writeln!(f, "  Ores loaded:       {}", self.ores)?;
        writeln!(f, "  Components loaded: {}", self.components)?;
        writeln!(f, "  Blocks loaded:     {}", self.blocks)?;
        writeln!(f, "  Unknown models:    {}", self.skipped)?;
        Ok(())
    }
}

fn parse_pk<T>(record: &FixtureRecord, parse: fn(&str) -> Option<T>) -> Result<T> {
    parse(&record.pk).ok_or_else(|| anyhow!("{} record has invalid pk '{}'", record.model, record.pk))
}

fn draft_of<T: serde::de::DeserializeOwned>(record: &FixtureRecord) -> Result<T> {
    serde_json::from_value(record.fields.clone())
        .with_context(|| format!("Malformed fields in {} '{}' ({})", record.model, record.name(), record.pk))
}

/// Load records into the catalog: ores first, then components, then blocks.
///
/// Each record keeps its fixture pk as identifier. The first record that
/// fails validation aborts the load.
pub fn load_fixtures(catalog: &Catalog, records: &[FixtureRecord]) -> Result<LoadStats> {
    let mut stats = LoadStats::default();
    let of_kind = |kind: EntityKind| records.iter().filter(move |r| r.kind() == Some(kind));

    for record in of_kind(EntityKind::Ore) {
        let id = parse_pk(record, OreId::parse)?;
        let draft: OreDraft = draft_of(record)?;
        catalog
            .save_ore(id, draft)
            .with_context(|| format!("Failed to load ore '{}' ({})", record.name(), record.pk))?;
        stats.ores += 1;
    }

    for record in of_kind(EntityKind::Component) {
        let id = parse_pk(record, ComponentId::parse)?;
        let draft: ComponentDraft = draft_of(record)?;
        catalog
            .save_component(id, draft)
            .with_context(|| format!("Failed to load component '{}' ({})", record.name(), record.pk))?;
        stats.components += 1;
    }

    for record in of_kind(EntityKind::Block) {
        let id = parse_pk(record, BlockId::parse)?;
        let draft: BlockDraft = draft_of(record)?;
        catalog
            .save_block(id, draft)
            .with_context(|| format!("Failed to load block '{}' ({})", record.name(), record.pk))?;
        stats.blocks += 1;
    }

    stats.skipped = records.iter().filter(|r| r.kind().is_none()).count();
    Ok(stats)
}

// ---------------------------------------------------------------------------
// Verification
// ---------------------------------------------------------------------------

/// Result of checking fixtures without touching a database
#[derive(Debug, Default)]
pub struct FixtureReport {
    pub ores: usize,
    pub components: usize,
    pub blocks: usize,
    pub problems: Vec<String>,
}

impl FixtureReport {
    pub fn is_ok(&self) -> bool {
        self.problems.is_empty()
    }
}

impl fmt::Display for FixtureReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Counts: {} ores, {} components, {} blocks",
            self.ores, self.components, self.blocks
        )?;
        if self.problems.is_empty() {
            writeln!(f, "All fixture checks passed")?;
        } else {
            writeln!(f, "{} problem(s):", self.problems.len())?;
            for problem in &self.problems {
                writeln!(f, "  - {}", problem)?;
            }
        }
        Ok(())
    }
}

/// Check pk format and uniqueness, cross-references, legacy entry keys and
/// leftover placeholders
pub fn verify_fixtures(records: &[FixtureRecord]) -> Result<FixtureReport> {
    let uuid_v7_re =
        Regex::new(r"(?i)^[0-9a-f]{8}-[0-9a-f]{4}-7[0-9a-f]{3}-[89ab][0-9a-f]{3}-[0-9a-f]{12}$")?;
    let placeholder_re = Regex::new(r"(?i)REPLACE_WITH_.*_UUID")?;

    let mut report = FixtureReport::default();
    let mut seen = HashSet::new();
    let mut ore_pks = HashSet::new();
    let mut component_pks = HashSet::new();

    for record in records {
        match record.kind() {
            Some(EntityKind::Ore) => {
                report.ores += 1;
                ore_pks.insert(record.pk.to_ascii_lowercase());
            }
            Some(EntityKind::Component) => {
                report.components += 1;
                component_pks.insert(record.pk.to_ascii_lowercase());
            }
            Some(EntityKind::Block) => report.blocks += 1,
            None => {
                report
                    .problems
                    .push(format!("Unknown model '{}' for pk {}", record.model, record.pk));
                continue;
            }
        }

        if placeholder_re.is_match(&record.pk) {
            report
                .problems
                .push(format!("Placeholder pk left in {} '{}'", record.model, record.name()));
        } else if !uuid_v7_re.is_match(&record.pk) {
            report
                .problems
                .push(format!("Invalid UUIDv7 pk '{}' ({} '{}')", record.pk, record.model, record.name()));
        }
        if !seen.insert(record.pk.to_ascii_lowercase()) {
            report.problems.push(format!("Duplicate pk {}", record.pk));
        }
    }

    for record in records {
        match record.kind() {
            Some(EntityKind::Component) => {
                let Some(materials) = record.fields.get("materials").and_then(Value::as_object) else {
                    continue;
                };
                for ore_id in materials.keys() {
                    if !ore_pks.contains(&ore_id.to_ascii_lowercase()) {
                        report
                            .problems
                            .push(format!("Component '{}' references unknown ore {}", record.name(), ore_id));
                    }
                }
            }
            Some(EntityKind::Block) => {
                let Some(raw) = record.fields.get("components") else {
                    continue;
                };
                let components: BlockComponents = match serde_json::from_value(raw.clone()) {
                    Ok(components) => components,
                    Err(_) => {
                        report
                            .problems
                            .push(format!("Block '{}' has malformed components", record.name()));
                        continue;
                    }
                };
                for line in components.lines() {
                    match line {
                        ComponentLine::MissingKeys(missing) => report.problems.push(format!(
                            "Block '{}' component entry missing keys [{}]",
                            record.name(),
                            missing.join(", ")
                        )),
                        ComponentLine::Reference { id, .. } => {
                            if placeholder_re.is_match(&id) {
                                report.problems.push(format!(
                                    "Placeholder component reference left in block '{}'",
                                    record.name()
                                ));
                            } else if !component_pks.contains(&id.to_ascii_lowercase()) {
                                report.problems.push(format!(
                                    "Block '{}' references unknown component {}",
                                    record.name(),
                                    id
                                ));
                            }
                        }
                    }
                }
            }
            _ => {}
        }
    }

    Ok(report)
}

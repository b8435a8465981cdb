//! Reference and business-rule validation for the write path
//!
//! Every check accumulates: one pass reports every problem it finds, and the
//! caller turns the report into a single [`ValidationFailed`] if anything was
//! wrong. Nothing here writes to the store.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    BlockComponents, BlockDraft, ComponentDraft, ComponentId, ComponentLine, EntityKind, OreDraft,
    OreId,
};
use crate::quantity::{self, QuantityError};
use crate::store::EntityStore;

/// Coarse grouping of validation errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Reference,
    Quantity,
    Structural,
    BusinessRule,
}

/// Which side of a block's resource flow a rate belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowRole {
    Consumer,
    Producer,
}

impl FlowRole {
    pub fn rate_field(self) -> &'static str {
        match self {
            FlowRole::Consumer => "consumer_rate",
            FlowRole::Producer => "producer_rate",
        }
    }
}

impl fmt::Display for FlowRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlowRole::Consumer => f.write_str("Consumer"),
            FlowRole::Producer => f.write_str("Producer"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{kind} with ID {id} does not exist")]
    MissingReference { kind: EntityKind, id: String },

    #[error("Invalid quantity for {} {id}: must be positive number, got {got}", .kind.noun())]
    InvalidQuantity {
        kind: EntityKind,
        id: String,
        got: String,
        reason: QuantityError,
    },

    #[error("Component missing keys: [{}]", .missing.join(", "))]
    MissingKeys { missing: Vec<&'static str> },

    #[error("{role} type '{flow_type}' requires {} > 0, got {rate}", .role.rate_field())]
    RateRequired {
        role: FlowRole,
        flow_type: String,
        rate: f64,
    },

    #[error("{role} rate cannot be negative, got {rate}")]
    NegativeRate { role: FlowRole, rate: f64 },

    #[error("{kind} name must not be empty")]
    EmptyName { kind: EntityKind },

    #[error("{kind} mass must be positive, got {mass}")]
    NonPositiveMass { kind: EntityKind, mass: f64 },

    #[error("{kind} {field} must be {rule}, got {value}")]
    FieldOutOfRange {
        kind: EntityKind,
        field: &'static str,
        rule: &'static str,
        value: f64,
    },
}

impl ValidationError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ValidationError::MissingReference { .. } => ErrorCategory::Reference,
            ValidationError::InvalidQuantity { .. } => ErrorCategory::Quantity,
            ValidationError::MissingKeys { .. } | ValidationError::EmptyName { .. } => {
                ErrorCategory::Structural
            }
            ValidationError::RateRequired { .. }
            | ValidationError::NegativeRate { .. }
            | ValidationError::NonPositiveMass { .. }
            | ValidationError::FieldOutOfRange { .. } => ErrorCategory::BusinessRule,
        }
    }

    /// The identifier the error is about, when it concerns a reference
    pub fn subject(&self) -> Option<&str> {
        match self {
            ValidationError::MissingReference { id, .. }
            | ValidationError::InvalidQuantity { id, .. } => Some(id),
            _ => None,
        }
    }
}

fn join_messages(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// A rejected write, carrying every problem found in one pass
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Validation failed: {}", join_messages(.errors))]
pub struct ValidationFailed {
    pub errors: Vec<ValidationError>,
}

/// Accumulated outcome of one or more checks
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationReport {
    errors: Vec<ValidationError>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    pub fn into_errors(self) -> Vec<ValidationError> {
        self.errors
    }

    pub fn push(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn merge(&mut self, other: ValidationReport) {
        self.errors.extend(other.errors);
    }

    pub fn messages(&self) -> Vec<String> {
        self.errors.iter().map(ToString::to_string).collect()
    }

    pub fn in_category(&self, category: ErrorCategory) -> impl Iterator<Item = &ValidationError> {
        self.errors.iter().filter(move |e| e.category() == category)
    }

    pub fn into_result(self) -> std::result::Result<(), ValidationFailed> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationFailed {
                errors: self.errors,
            })
        }
    }
}

impl From<ValidationError> for ValidationReport {
    fn from(error: ValidationError) -> Self {
        ValidationReport {
            errors: vec![error],
        }
    }
}

// ---------------------------------------------------------------------------
// Reference validator
// ---------------------------------------------------------------------------

enum Check {
    Rejected(ValidationError),
    Lookup { id: String, uuid: Option<Uuid> },
}

fn check_quantity(kind: EntityKind, value: &Value) -> std::result::Result<(), QuantityError> {
    match kind {
        EntityKind::Component => quantity::count(value).map(|_| ()),
        _ => quantity::amount(value).map(|_| ()),
    }
}

/// Check a map of `id -> quantity` against the store.
///
/// Component references need whole counts, ore references positive amounts.
/// An entry with a bad quantity is not looked up. Existence is resolved with
/// one batched store call.
pub fn validate_references<'a, S, I>(kind: EntityKind, entries: I, store: &S) -> Result<ValidationReport>
where
    S: EntityStore + ?Sized,
    I: IntoIterator<Item = (&'a str, &'a Value)>,
{
    let checks: Vec<Check> = entries
        .into_iter()
        .map(|(id, value)| match check_quantity(kind, value) {
            Err(reason) => Check::Rejected(ValidationError::InvalidQuantity {
                kind,
                id: id.to_string(),
                got: quantity::describe(value),
                reason,
            }),
            Ok(()) => Check::Lookup {
                id: id.to_string(),
                uuid: Uuid::parse_str(id.trim()).ok(),
            },
        })
        .collect();

    let wanted: Vec<Uuid> = checks
        .iter()
        .filter_map(|check| match check {
            Check::Lookup { uuid, .. } => *uuid,
            Check::Rejected(_) => None,
        })
        .collect();
    let existing = if wanted.is_empty() {
        Default::default()
    } else {
        store.existing_ids(kind, &wanted)?
    };

    let mut report = ValidationReport::new();
    for check in checks {
        match check {
            Check::Rejected(error) => report.push(error),
            Check::Lookup { id, uuid } => {
                if !uuid.is_some_and(|uuid| existing.contains(&uuid)) {
                    report.push(ValidationError::MissingReference { kind, id });
                }
            }
        }
    }
    Ok(report)
}

// ---------------------------------------------------------------------------
// Entity validators
// ---------------------------------------------------------------------------

fn is_positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

fn check_name_and_mass(report: &mut ValidationReport, kind: EntityKind, name: &str, mass: f64) {
    if name.trim().is_empty() {
        report.push(ValidationError::EmptyName { kind });
    }
    if !is_positive(mass) {
        report.push(ValidationError::NonPositiveMass { kind, mass });
    }
}

pub fn validate_ore(draft: &OreDraft) -> ValidationReport {
    let mut report = ValidationReport::new();
    check_name_and_mass(&mut report, EntityKind::Ore, &draft.name, draft.mass);
    report
}

/// Name, positive mass and a crafting time that is not negative
pub fn validate_component_fields(draft: &ComponentDraft) -> ValidationReport {
    let mut report = ValidationReport::new();
    check_name_and_mass(&mut report, EntityKind::Component, &draft.name, draft.mass);
    if !(draft.crafting_time.is_finite() && draft.crafting_time >= 0.0) {
        report.push(ValidationError::FieldOutOfRange {
            kind: EntityKind::Component,
            field: "crafting_time",
            rule: "non-negative",
            value: draft.crafting_time,
        });
    }
    report
}

/// Name plus positive mass, health and snap size; at least one PCU
pub fn validate_block_fields(draft: &BlockDraft) -> ValidationReport {
    let mut report = ValidationReport::new();
    check_name_and_mass(&mut report, EntityKind::Block, &draft.name, draft.mass);
    for (field, value) in [("health", draft.health), ("snap_size", draft.snap_size)] {
        if !is_positive(value) {
            report.push(ValidationError::FieldOutOfRange {
                kind: EntityKind::Block,
                field,
                rule: "positive",
                value,
            });
        }
    }
    if draft.pcu < 1 {
        report.push(ValidationError::FieldOutOfRange {
            kind: EntityKind::Block,
            field: "pcu",
            rule: "at least 1",
            value: f64::from(draft.pcu),
        });
    }
    report
}

/// Every material must name an existing ore with a positive amount
pub fn validate_materials<S: EntityStore + ?Sized>(
    draft: &ComponentDraft,
    store: &S,
) -> Result<ValidationReport> {
    validate_references(
        EntityKind::Ore,
        draft.materials.iter().map(|(id, q)| (id.as_str(), q)),
        store,
    )
}

/// Every component entry must be well formed, name an existing component and
/// carry a positive whole count
pub fn validate_components<S: EntityStore + ?Sized>(
    components: &BlockComponents,
    store: &S,
) -> Result<ValidationReport> {
    let lines = components.lines();
    let mut report = ValidationReport::new();
    let mut references = Vec::new();

    for line in &lines {
        match line {
            ComponentLine::MissingKeys(missing) => report.push(ValidationError::MissingKeys {
                missing: missing.clone(),
            }),
            ComponentLine::Reference { id, quantity } => references.push((id.as_str(), *quantity)),
        }
    }

    report.merge(validate_references(EntityKind::Component, references, store)?);
    Ok(report)
}

/// A named flow needs a positive rate; a rate is never negative
pub fn validate_flow(role: FlowRole, flow_type: &str, rate: f64) -> ValidationReport {
    let mut report = ValidationReport::new();
    if !flow_type.trim().is_empty() && !(rate > 0.0) {
        report.push(ValidationError::RateRequired {
            role,
            flow_type: flow_type.to_string(),
            rate,
        });
    }
    if rate < 0.0 || rate.is_nan() {
        report.push(ValidationError::NegativeRate { role, rate });
    }
    report
}

pub fn validate_consumer(draft: &BlockDraft) -> ValidationReport {
    validate_flow(FlowRole::Consumer, &draft.consumer_type, draft.consumer_rate)
}

pub fn validate_producer(draft: &BlockDraft) -> ValidationReport {
    validate_flow(FlowRole::Producer, &draft.producer_type, draft.producer_rate)
}

/// All component rule sets, without raising
pub fn check_component<S: EntityStore + ?Sized>(
    draft: &ComponentDraft,
    store: &S,
) -> Result<ValidationReport> {
    let mut report = validate_materials(draft, store)?;
    report.merge(validate_component_fields(draft));
    Ok(report)
}

/// All block rule sets, without raising
pub fn check_block<S: EntityStore + ?Sized>(draft: &BlockDraft, store: &S) -> Result<ValidationReport> {
    let mut report = validate_components(&draft.components, store)?;
    report.merge(validate_consumer(draft));
    report.merge(validate_producer(draft));
    report.merge(validate_block_fields(draft));
    Ok(report)
}

pub fn clean_ore(draft: &OreDraft) -> Result<()> {
    validate_ore(draft).into_result()?;
    Ok(())
}

/// Run before every component write; any error aborts the write
pub fn clean_component<S: EntityStore + ?Sized>(draft: &ComponentDraft, store: &S) -> Result<()> {
    check_component(draft, store)?.into_result()?;
    Ok(())
}

/// Run before every block write; any error aborts the write
pub fn clean_block<S: EntityStore + ?Sized>(draft: &BlockDraft, store: &S) -> Result<()> {
    check_block(draft, store)?.into_result()?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Normalisation into typed maps
// ---------------------------------------------------------------------------

/// Typed materials map of a draft. Entries are coerced again, so this also
/// rejects drafts that were never validated.
pub fn normalize_materials(
    materials: &BTreeMap<String, Value>,
) -> std::result::Result<BTreeMap<OreId, f64>, ValidationFailed> {
    let mut report = ValidationReport::new();
    let mut typed = BTreeMap::new();

    for (id, value) in materials {
        let amount = match quantity::amount(value) {
            Ok(amount) => amount,
            Err(reason) => {
                report.push(ValidationError::InvalidQuantity {
                    kind: EntityKind::Ore,
                    id: id.clone(),
                    got: quantity::describe(value),
                    reason,
                });
                continue;
            }
        };
        match OreId::parse(id) {
            Some(ore_id) => {
                typed.insert(ore_id, amount);
            }
            None => report.push(ValidationError::MissingReference {
                kind: EntityKind::Ore,
                id: id.clone(),
            }),
        }
    }

    report.into_result().map(|()| typed)
}

/// Typed component map of either shape; repeated legacy entries are summed
pub fn normalize_components(
    components: &BlockComponents,
) -> std::result::Result<BTreeMap<ComponentId, u32>, ValidationFailed> {
    let mut report = ValidationReport::new();
    let mut typed: BTreeMap<ComponentId, u32> = BTreeMap::new();

    for line in components.lines() {
        let (id, value) = match line {
            ComponentLine::MissingKeys(missing) => {
                report.push(ValidationError::MissingKeys { missing });
                continue;
            }
            ComponentLine::Reference { id, quantity } => (id, quantity),
        };
        let invalid = |reason| ValidationError::InvalidQuantity {
            kind: EntityKind::Component,
            id: id.clone(),
            got: quantity::describe(value),
            reason,
        };
        let count = match quantity::count(value) {
            Ok(count) => count,
            Err(reason) => {
                report.push(invalid(reason));
                continue;
            }
        };
        let Some(component_id) = ComponentId::parse(&id) else {
            report.push(ValidationError::MissingReference {
                kind: EntityKind::Component,
                id: id.clone(),
            });
            continue;
        };
        let slot = typed.entry(component_id).or_insert(0);
        match slot.checked_add(count) {
            Some(total) => *slot = total,
            None => report.push(invalid(QuantityError::OutOfRange)),
        }
    }

    report.into_result().map(|()| typed)
}

//! Error types for the catalog and resolution engine

use thiserror::Error;

use crate::models::EntityKind;
use crate::validate::ValidationFailed;

/// Errors raised by the engine, the stores and the write path.
///
/// Missing references are deliberately absent here: the resolver skips them
/// and the validators report them as [`crate::validate::ValidationError`]s.
#[derive(Debug, Error)]
pub enum Error {
    /// The entity addressed directly by the caller does not exist.
    #[error("{kind} with ID {id} not found")]
    NotFound { kind: EntityKind, id: String },

    /// Another entity of the same kind already uses this name.
    #[error("{kind} named '{name}' already exists")]
    DuplicateName { kind: EntityKind, name: String },

    /// Validation rejected a write; nothing was persisted.
    #[error(transparent)]
    Validation(#[from] ValidationFailed),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

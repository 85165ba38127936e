//! Error types for the Strata persistence layer.

use crate::types::{ContextId, ObjectId};
use thiserror::Error;

/// Storage-related errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Corrupt store entry: {0}")]
    Corrupt(String),

    #[error("Storage I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Errors raised while loading or checking an object model
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Failed to read model file {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse model: {0}")]
    Parse(String),

    #[error("Invalid model: {0}")]
    Invalid(String),
}

/// Errors surfaced by contexts and the context manager
#[derive(Debug, Error)]
pub enum ContextError {
    #[error("Validation failed for {object} ({attribute}): {reason}")]
    ValidationFailure {
        object: ObjectId,
        attribute: String,
        reason: String,
    },

    #[error("Store error: {0}")]
    StoreIo(#[from] StorageError),

    #[error("Model does not match store: expected {expected}, found {found}")]
    SchemaMismatch { expected: String, found: String },

    #[error("Bulk delete interrupted at entity '{failed_entity}' after clearing {cleared:?}: {source}")]
    PartialDeleteFailure {
        cleared: Vec<String>,
        failed_entity: String,
        #[source]
        source: StorageError,
    },

    #[error("Unknown entity: {0}")]
    UnknownEntity(String),

    #[error("Unknown context: {0}")]
    UnknownContext(ContextId),

    #[error("Object not visible from context: {0}")]
    ObjectNotFound(ObjectId),

    #[error("Save conflicts with the store at {object}: {reason}")]
    MergeConflict { object: ObjectId, reason: String },

    #[error("Context {0} cannot be destroyed: {1}")]
    ContextInUse(ContextId, String),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Runtime error: {0}")]
    Runtime(String),
}

impl ContextError {
    /// Short, stable category name used by the CLI and in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            ContextError::ValidationFailure { .. } => "validation",
            ContextError::StoreIo(_) => "store_io",
            ContextError::SchemaMismatch { .. } => "schema_mismatch",
            ContextError::PartialDeleteFailure { .. } => "partial_delete",
            ContextError::UnknownEntity(_) => "unknown_entity",
            ContextError::UnknownContext(_) => "unknown_context",
            ContextError::ObjectNotFound(_) => "object_not_found",
            ContextError::MergeConflict { .. } => "merge_conflict",
            ContextError::ContextInUse(..) => "context_in_use",
            ContextError::Model(_) => "model",
            ContextError::ConfigError(_) => "config",
            ContextError::Runtime(_) => "runtime",
        }
    }
}

impl From<config::ConfigError> for ContextError {
    fn from(err: config::ConfigError) -> Self {
        ContextError::ConfigError(err.to_string())
    }
}

//! Object Store
//!
//! Durable (or in-memory) backing medium for committed objects. Stores know
//! nothing about contexts or validation; they apply already-validated change
//! sets atomically and answer point and per-entity reads.

pub mod memory;
pub mod persistence;

pub use memory::MemoryStore;
pub use persistence::SledStore;

use crate::context::ChangeSet;
use crate::error::StorageError;
use crate::object::ObjectRecord;
use crate::types::ObjectId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which engine backs a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreKind {
    Sled,
    Memory,
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreKind::Sled => write!(f, "sled"),
            StoreKind::Memory => write!(f, "memory"),
        }
    }
}

/// Identity of the model a store was created with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreMetadata {
    pub model_name: String,
    pub model_version: u32,
    pub model_hash: String,
    pub created_at: DateTime<Utc>,
}

impl StoreMetadata {
    /// Compact label used in schema mismatch errors.
    pub fn model_label(&self) -> String {
        model_label(&self.model_name, self.model_version, &self.model_hash)
    }
}

pub(crate) fn model_label(name: &str, version: u32, hash: &str) -> String {
    let short = hash.get(..12).unwrap_or(hash);
    format!("{} v{} ({})", name, version, short)
}

/// Object store interface
pub trait PersistentStore: Send + Sync {
    fn kind(&self) -> StoreKind;

    fn read_metadata(&self) -> Result<Option<StoreMetadata>, StorageError>;
    fn write_metadata(&self, metadata: &StoreMetadata) -> Result<(), StorageError>;

    /// Allocate a fresh object key, unique for the lifetime of the store.
    fn next_key(&self) -> Result<u64, StorageError>;

    fn get(&self, id: &ObjectId) -> Result<Option<ObjectRecord>, StorageError>;

    /// Every committed object of one entity, ordered by key.
    fn scan_entity(&self, entity: &str) -> Result<Vec<ObjectRecord>, StorageError>;

    /// Apply a change set atomically: all of it or none of it.
    fn commit(&self, changes: &ChangeSet) -> Result<(), StorageError>;

    /// Remove every object of one entity. Returns the number removed.
    fn clear_entity(&self, entity: &str) -> Result<usize, StorageError>;

    /// Remove every object of the given entities in one atomic step.
    fn clear_entities(&self, entities: &[&str]) -> Result<usize, StorageError>;

    fn flush(&self) -> Result<(), StorageError>;
}

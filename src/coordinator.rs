//! Store Coordinator
//!
//! Binds one store to one model. Attaching checks that the store was created
//! with the same model, allocates object ids, applies committed change sets
//! and performs bulk deletes.

use crate::context::ChangeSet;
use crate::error::{ContextError, StorageError};
use crate::model::Model;
use crate::object::ObjectRecord;
use crate::store::{model_label, PersistentStore, StoreKind, StoreMetadata};
use crate::types::ObjectId;
use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

/// How a bulk delete treats the set of entities.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurgeMode {
    /// One store batch: every entity is cleared or none is.
    #[default]
    Atomic,
    /// Entity by entity; an interruption leaves earlier entities cleared.
    BestEffort,
}

impl fmt::Display for PurgeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PurgeMode::Atomic => write!(f, "atomic"),
            PurgeMode::BestEffort => write!(f, "best_effort"),
        }
    }
}

/// Outcome of a successful bulk delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PurgeReport {
    pub mode: PurgeMode,
    /// Objects removed from the store.
    pub removed: usize,
    /// Entities cleared, in model order.
    pub entities: Vec<String>,
    /// Pending changes discarded from live contexts.
    pub discarded_pending: usize,
}

pub struct StoreCoordinator {
    model: Arc<Model>,
    store: Arc<dyn PersistentStore>,
    metadata: StoreMetadata,
    flush_on_commit: bool,
    /// Serializes store writes so the existence check and the batch agree.
    write_lock: Mutex<()>,
}

impl StoreCoordinator {
    /// Attach a store to a model.
    ///
    /// A store without metadata is stamped with the model's identity. A store
    /// stamped by a different model is refused with `SchemaMismatch`.
    pub fn attach(
        model: Arc<Model>,
        store: Arc<dyn PersistentStore>,
        flush_on_commit: bool,
    ) -> Result<Self, ContextError> {
        let hash = model.content_hash()?;
        let metadata = match store.read_metadata()? {
            Some(existing) => {
                if existing.model_hash != hash {
                    return Err(ContextError::SchemaMismatch {
                        expected: model_label(&model.name, model.version, &hash),
                        found: existing.model_label(),
                    });
                }
                existing
            }
            None => {
                let metadata = StoreMetadata {
                    model_name: model.name.clone(),
                    model_version: model.version,
                    model_hash: hash,
                    created_at: Utc::now(),
                };
                store.write_metadata(&metadata)?;
                store.flush()?;
                info!(
                    store = %store.kind(),
                    model = %metadata.model_label(),
                    "Initialized new store"
                );
                metadata
            }
        };

        Ok(Self {
            model,
            store,
            metadata,
            flush_on_commit,
            write_lock: Mutex::new(()),
        })
    }

    pub fn model(&self) -> &Arc<Model> {
        &self.model
    }

    pub fn metadata(&self) -> &StoreMetadata {
        &self.metadata
    }

    pub fn store_kind(&self) -> StoreKind {
        self.store.kind()
    }

    pub fn new_object_id(&self, entity: &str) -> Result<ObjectId, ContextError> {
        Ok(ObjectId::new(entity, self.store.next_key()?))
    }

    pub fn get(&self, id: &ObjectId) -> Result<Option<ObjectRecord>, ContextError> {
        Ok(self.store.get(id)?)
    }

    pub fn scan_entity(&self, entity: &str) -> Result<Vec<ObjectRecord>, ContextError> {
        Ok(self.store.scan_entity(entity)?)
    }

    /// Write an already validated change set in one atomic batch.
    ///
    /// Updates must target objects the store still holds. An update whose
    /// object was deleted by an earlier save is a `MergeConflict` and nothing
    /// is written.
    pub fn commit(&self, changes: &ChangeSet) -> Result<(), ContextError> {
        let _write = self.write_lock.lock();
        for record in changes.updated() {
            if self.store.get(&record.id)?.is_none() {
                warn!(object = %record.id, "Update targets an object deleted from the store");
                return Err(ContextError::MergeConflict {
                    object: record.id.clone(),
                    reason: "object was deleted by an earlier save".to_string(),
                });
            }
        }
        self.store.commit(changes)?;
        if self.flush_on_commit {
            self.store.flush()?;
        }
        Ok(())
    }

    pub fn flush(&self) -> Result<(), ContextError> {
        Ok(self.store.flush()?)
    }

    /// Remove every object of every model entity.
    ///
    /// `discarded_pending` in the report is left at zero; the manager fills it.
    pub fn purge(&self, mode: PurgeMode) -> Result<PurgeReport, ContextError> {
        let _write = self.write_lock.lock();
        let entities: Vec<&str> = self.model.entity_names().collect();

        let removed = match mode {
            PurgeMode::Atomic => self.store.clear_entities(&entities)?,
            PurgeMode::BestEffort => {
                let mut removed = 0usize;
                let mut cleared: Vec<String> = Vec::new();
                for entity in &entities {
                    match self.store.clear_entity(entity) {
                        Ok(count) => {
                            removed += count;
                            cleared.push(entity.to_string());
                        }
                        Err(source) => {
                            warn!(
                                entity = %entity,
                                cleared = ?cleared,
                                error = %source,
                                "Bulk delete interrupted; store is partially cleared"
                            );
                            return Err(partial_delete(cleared, entity, source));
                        }
                    }
                }
                removed
            }
        };
        self.store.flush()?;

        Ok(PurgeReport {
            mode,
            removed,
            entities: entities.iter().map(|e| e.to_string()).collect(),
            discarded_pending: 0,
        })
    }
}

fn partial_delete(cleared: Vec<String>, entity: &str, source: StorageError) -> ContextError {
    ContextError::PartialDeleteFailure {
        cleared,
        failed_entity: entity.to_string(),
        source,
    }
}

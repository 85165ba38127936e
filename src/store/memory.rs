//! In-memory object store for transient contexts and tests.

use crate::context::ChangeSet;
use crate::error::StorageError;
use crate::object::ObjectRecord;
use crate::store::{PersistentStore, StoreKind, StoreMetadata};
use crate::types::ObjectId;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Non-persistent [`PersistentStore`]; contents vanish with the value.
#[derive(Default)]
pub struct MemoryStore {
    objects: RwLock<BTreeMap<ObjectId, ObjectRecord>>,
    metadata: RwLock<Option<StoreMetadata>>,
    next_key: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }
}

impl PersistentStore for MemoryStore {
    fn kind(&self) -> StoreKind {
        StoreKind::Memory
    }

    fn read_metadata(&self) -> Result<Option<StoreMetadata>, StorageError> {
        Ok(self.metadata.read().clone())
    }

    fn write_metadata(&self, metadata: &StoreMetadata) -> Result<(), StorageError> {
        *self.metadata.write() = Some(metadata.clone());
        Ok(())
    }

    fn next_key(&self) -> Result<u64, StorageError> {
        Ok(self.next_key.fetch_add(1, Ordering::Relaxed))
    }

    fn get(&self, id: &ObjectId) -> Result<Option<ObjectRecord>, StorageError> {
        Ok(self.objects.read().get(id).cloned())
    }

    fn scan_entity(&self, entity: &str) -> Result<Vec<ObjectRecord>, StorageError> {
        let start = ObjectId::new(entity, 0);
        Ok(self
            .objects
            .read()
            .range(start..)
            .take_while(|(id, _)| id.entity() == entity)
            .map(|(_, record)| record.clone())
            .collect())
    }

    fn commit(&self, changes: &ChangeSet) -> Result<(), StorageError> {
        let mut objects = self.objects.write();
        for record in changes.written_records() {
            objects.insert(record.id.clone(), record.clone());
        }
        for id in changes.deleted() {
            objects.remove(id);
        }
        Ok(())
    }

    fn clear_entity(&self, entity: &str) -> Result<usize, StorageError> {
        self.clear_entities(&[entity])
    }

    fn clear_entities(&self, entities: &[&str]) -> Result<usize, StorageError> {
        let mut objects = self.objects.write();
        let before = objects.len();
        objects.retain(|id, _| !entities.iter().any(|e| *e == id.entity()));
        Ok(before - objects.len())
    }

    fn flush(&self) -> Result<(), StorageError> {
        Ok(())
    }
}

//! Sled-backed object store

use crate::context::ChangeSet;
use crate::error::StorageError;
use crate::object::ObjectRecord;
use crate::store::{PersistentStore, StoreKind, StoreMetadata};
use crate::types::{entity_prefix, ObjectId};
use sled::{Db, Tree};
use std::io;
use std::path::Path;

const TREE_OBJECTS: &str = "objects";
const TREE_META: &str = "meta";
const META_KEY: &[u8] = b"store_metadata";

/// Sled-based implementation of [`PersistentStore`]
///
/// All objects live in one tree keyed by [`ObjectId::storage_key`], so a
/// change set spanning several entities is still a single atomic batch.
pub struct SledStore {
    db: Db,
    objects: Tree,
    meta: Tree,
}

impl SledStore {
    /// Open (or create) a store at the given directory.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let db = sled::open(path.as_ref()).map_err(|e| {
            StorageError::IoError(io::Error::new(
                io::ErrorKind::Other,
                format!(
                    "Failed to open sled database at {}: {}",
                    path.as_ref().display(),
                    e
                ),
            ))
        })?;
        Self::from_db(db)
    }

    /// Wrap an already opened database.
    pub fn from_db(db: Db) -> Result<Self, StorageError> {
        let objects = db.open_tree(TREE_OBJECTS).map_err(to_storage_io)?;
        let meta = db.open_tree(TREE_META).map_err(to_storage_io)?;
        Ok(Self { db, objects, meta })
    }

    /// Get the underlying sled database (for advanced operations)
    pub fn db(&self) -> &Db {
        &self.db
    }

    /// Total number of committed objects across all entities.
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }
}

impl PersistentStore for SledStore {
    fn kind(&self) -> StoreKind {
        StoreKind::Sled
    }

    fn read_metadata(&self) -> Result<Option<StoreMetadata>, StorageError> {
        let Some(raw) = self.meta.get(META_KEY).map_err(to_storage_io)? else {
            return Ok(None);
        };
        let parsed = serde_json::from_slice(&raw).map_err(|e| {
            StorageError::Corrupt(format!("Failed to parse store metadata: {}", e))
        })?;
        Ok(Some(parsed))
    }

    fn write_metadata(&self, metadata: &StoreMetadata) -> Result<(), StorageError> {
        let value = serde_json::to_vec(metadata).map_err(to_storage_data)?;
        self.meta.insert(META_KEY, value).map_err(to_storage_io)?;
        Ok(())
    }

    fn next_key(&self) -> Result<u64, StorageError> {
        self.db.generate_id().map_err(to_storage_io)
    }

    fn get(&self, id: &ObjectId) -> Result<Option<ObjectRecord>, StorageError> {
        match self.objects.get(id.storage_key()).map_err(to_storage_io)? {
            Some(value) => Ok(Some(decode_record(&value)?)),
            None => Ok(None),
        }
    }

    fn scan_entity(&self, entity: &str) -> Result<Vec<ObjectRecord>, StorageError> {
        let mut records = Vec::new();
        for item in self.objects.scan_prefix(entity_prefix(entity)) {
            let (_, value) = item.map_err(to_storage_io)?;
            records.push(decode_record(&value)?);
        }
        Ok(records)
    }

    fn commit(&self, changes: &ChangeSet) -> Result<(), StorageError> {
        let mut batch = sled::Batch::default();

        for record in changes.written_records() {
            let value = bincode::serialize(record).map_err(|e| {
                StorageError::IoError(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("Failed to serialize {}: {}", record.id, e),
                ))
            })?;
            batch.insert(record.id.storage_key(), value);
        }
        for id in changes.deleted() {
            batch.remove(id.storage_key());
        }

        self.objects.apply_batch(batch).map_err(|e| {
            StorageError::IoError(io::Error::new(
                io::ErrorKind::Other,
                format!("Failed to apply batch: {}", e),
            ))
        })?;
        Ok(())
    }

    fn clear_entity(&self, entity: &str) -> Result<usize, StorageError> {
        self.clear_entities(&[entity])
    }

    fn clear_entities(&self, entities: &[&str]) -> Result<usize, StorageError> {
        let mut batch = sled::Batch::default();
        let mut removed = 0usize;
        for entity in entities {
            for item in self.objects.scan_prefix(entity_prefix(entity)).keys() {
                let key = item.map_err(to_storage_io)?;
                batch.remove(key);
                removed += 1;
            }
        }
        self.objects.apply_batch(batch).map_err(to_storage_io)?;
        Ok(removed)
    }

    fn flush(&self) -> Result<(), StorageError> {
        self.db.flush().map_err(|e| {
            StorageError::IoError(io::Error::new(
                io::ErrorKind::Other,
                format!("Failed to flush database: {}", e),
            ))
        })?;
        Ok(())
    }
}

fn decode_record(raw: &[u8]) -> Result<ObjectRecord, StorageError> {
    bincode::deserialize(raw)
        .map_err(|e| StorageError::Corrupt(format!("Failed to deserialize object record: {}", e)))
}

fn to_storage_io(err: sled::Error) -> StorageError {
    StorageError::IoError(io::Error::new(io::ErrorKind::Other, err.to_string()))
}

fn to_storage_data(err: serde_json::Error) -> StorageError {
    StorageError::IoError(io::Error::new(io::ErrorKind::InvalidData, err.to_string()))
}

//! Pending change tracking for a single context.

use crate::object::ObjectRecord;
use crate::types::ObjectId;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Result of looking an object up in one change set.
#[derive(Debug, PartialEq)]
pub enum Lookup<'a> {
    /// Inserted or updated here; this is the current snapshot.
    Present(&'a ObjectRecord),
    /// Deleted here; ancestors must not be consulted.
    Deleted,
    /// Untouched here; ask the parent.
    Unknown,
}

/// Number of pending objects per change kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PendingCounts {
    pub inserted: usize,
    pub updated: usize,
    pub deleted: usize,
}

impl PendingCounts {
    pub fn total(&self) -> usize {
        self.inserted + self.updated + self.deleted
    }
}

/// Inserted, updated and deleted objects not yet pushed to the parent.
///
/// An id appears in at most one of the three sets. Objects inserted here and
/// then deleted here leave no trace.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    inserted: BTreeMap<ObjectId, ObjectRecord>,
    updated: BTreeMap<ObjectId, ObjectRecord>,
    deleted: BTreeSet<ObjectId>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.inserted.is_empty() && self.updated.is_empty() && self.deleted.is_empty()
    }

    pub fn counts(&self) -> PendingCounts {
        PendingCounts {
            inserted: self.inserted.len(),
            updated: self.updated.len(),
            deleted: self.deleted.len(),
        }
    }

    pub fn inserted(&self) -> impl Iterator<Item = &ObjectRecord> {
        self.inserted.values()
    }

    pub fn updated(&self) -> impl Iterator<Item = &ObjectRecord> {
        self.updated.values()
    }

    pub fn deleted(&self) -> impl Iterator<Item = &ObjectId> {
        self.deleted.iter()
    }

    /// Inserted and updated records: everything a commit writes.
    pub fn written_records(&self) -> impl Iterator<Item = &ObjectRecord> {
        self.inserted.values().chain(self.updated.values())
    }

    pub fn record_insert(&mut self, record: ObjectRecord) {
        self.deleted.remove(&record.id);
        self.updated.remove(&record.id);
        self.inserted.insert(record.id.clone(), record);
    }

    /// Record a new snapshot of an existing object.
    pub fn record_update(&mut self, record: ObjectRecord) {
        if let Some(existing) = self.inserted.get_mut(&record.id) {
            *existing = record;
            return;
        }
        self.deleted.remove(&record.id);
        self.updated.insert(record.id.clone(), record);
    }

    pub fn record_delete(&mut self, id: ObjectId) {
        if self.inserted.remove(&id).is_some() {
            return;
        }
        self.updated.remove(&id);
        self.deleted.insert(id);
    }

    pub fn lookup(&self, id: &ObjectId) -> Lookup<'_> {
        if self.deleted.contains(id) {
            return Lookup::Deleted;
        }
        match self.inserted.get(id).or_else(|| self.updated.get(id)) {
            Some(record) => Lookup::Present(record),
            None => Lookup::Unknown,
        }
    }

    /// Fold a child's committed changes into this change set.
    ///
    /// The child's snapshot replaces ours. An object the child updates that
    /// we inserted stays an insert, and a child delete of one of our inserts
    /// cancels the insert.
    pub fn absorb(&mut self, child: ChangeSet) {
        for (_, record) in child.inserted {
            self.record_insert(record);
        }
        for (_, record) in child.updated {
            self.record_update(record);
        }
        for id in child.deleted {
            self.record_delete(id);
        }
    }

    /// Apply this change set to a view of one entity's objects.
    pub fn overlay(&self, entity: &str, view: &mut BTreeMap<ObjectId, ObjectRecord>) {
        for id in self.deleted.iter().filter(|id| id.entity() == entity) {
            view.remove(id);
        }
        for record in self.written_records().filter(|r| r.entity() == entity) {
            view.insert(record.id.clone(), record.clone());
        }
    }

    /// Drop every pending change, returning what was dropped.
    pub fn take(&mut self) -> ChangeSet {
        std::mem::take(self)
    }
}

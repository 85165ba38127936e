//! Contexts
//!
//! A context is an isolated working set of objects layered over its parent:
//! reads fall through its own pending changes, then each ancestor's, then the
//! store. [`Context::commit`] pushes the pending changes exactly one level up;
//! durable saves go through [`crate::manager::ContextManager::save`], which
//! repeats the commit up the chain.
//!
//! Every operation runs on the context's confinement lock. Work units passed
//! to [`Context::perform`] may call back into the same context, and may commit
//! into ancestors, but must not enter a descendant's `perform`: locks are only
//! ever taken from descendant to ancestor.

pub mod arena;
pub mod changes;

pub use arena::{Parent, StoreSlot};
pub use changes::{ChangeSet, Lookup, PendingCounts};

use crate::error::ContextError;
use crate::manager::Shared;
use crate::model::{check_deleted_targets, validate_record};
use crate::object::{AttributeMap, ObjectRecord, Value};
use crate::types::{ContextId, ObjectId};
use arena::ContextSlot;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// What a context is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextRole {
    /// Foreground context; one per manager.
    Main,
    /// Fresh context for isolated work off the foreground path.
    Background,
    /// Shared background context, created on first use.
    Concurrent,
    /// Scratch child of the main context, created on first use.
    Temporary,
    /// Root of the in-memory coordinator; never reaches the durable store.
    InMemory,
    /// Attached directly to the durable coordinator.
    Detached,
}

impl fmt::Display for ContextRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ContextRole::Main => "main",
            ContextRole::Background => "background",
            ContextRole::Concurrent => "concurrent",
            ContextRole::Temporary => "temporary",
            ContextRole::InMemory => "in_memory",
            ContextRole::Detached => "detached",
        };
        f.write_str(name)
    }
}

/// Where a commit landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitOutcome {
    /// Objects inserted, updated or deleted by the commit.
    pub objects: usize,
    /// The level the changes were pushed into.
    pub target: Parent,
}

/// Handle to a context owned by a [`crate::manager::ContextManager`].
///
/// Handles are cheap to clone and may be moved to worker threads. A handle
/// outlives its context only as a dangling id: once the context is destroyed,
/// every operation fails with [`ContextError::UnknownContext`].
#[derive(Clone)]
pub struct Context {
    id: ContextId,
    role: ContextRole,
    shared: Arc<Shared>,
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("id", &self.id)
            .field("role", &self.role)
            .finish()
    }
}

impl PartialEq for Context {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && Arc::ptr_eq(&self.shared, &other.shared)
    }
}

impl Eq for Context {}

impl Context {
    pub(crate) fn new(id: ContextId, role: ContextRole, shared: Arc<Shared>) -> Self {
        Self { id, role, shared }
    }

    pub fn id(&self) -> ContextId {
        self.id
    }

    pub fn role(&self) -> ContextRole {
        self.role
    }

    /// Parent context id, or `None` for a context attached to a coordinator.
    pub fn parent_id(&self) -> Result<Option<ContextId>, ContextError> {
        Ok(match self.slot()?.parent {
            Parent::Context(id) => Some(id),
            Parent::Store(_) => None,
        })
    }

    /// Coordinator this context's chain ends at.
    pub fn store_slot(&self) -> Result<StoreSlot, ContextError> {
        Ok(self.slot()?.root)
    }

    /// Whether the context is still registered with its manager.
    pub fn is_alive(&self) -> bool {
        self.shared.arena.contains(self.id)
    }

    pub(crate) fn belongs_to(&self, shared: &Arc<Shared>) -> bool {
        Arc::ptr_eq(&self.shared, shared)
    }

    fn slot(&self) -> Result<Arc<ContextSlot>, ContextError> {
        self.shared.arena.get(self.id)
    }

    /// Run a unit of work with exclusive access to this context.
    ///
    /// Other threads touching this context block until `work` returns.
    pub fn perform<R, F>(&self, work: F) -> Result<R, ContextError>
    where
        F: FnOnce(&Context) -> R,
    {
        let slot = self.slot()?;
        let _confined = slot.lock();
        Ok(work(self))
    }

    /// Insert a new object. Model defaults fill attributes not given.
    pub fn insert(&self, entity: &str, attributes: AttributeMap) -> Result<ObjectId, ContextError> {
        let description = self
            .shared
            .model()
            .entity(entity)
            .ok_or_else(|| ContextError::UnknownEntity(entity.to_string()))?;

        let mut attributes = attributes;
        for attribute in &description.attributes {
            if let Some(default) = &attribute.default {
                if !attributes.contains_key(&attribute.name) {
                    attributes.insert(attribute.name.clone(), default.to_value(attribute.kind)?);
                }
            }
        }

        let slot = self.slot()?;
        let guard = slot.lock();
        let id = self.shared.coordinator(slot.root).new_object_id(entity)?;
        guard
            .borrow_mut()
            .record_insert(ObjectRecord::new(id.clone(), attributes));
        debug!(context = %self.id, object = %id, "Inserted object");
        Ok(id)
    }

    /// Current snapshot of an object as seen from this context.
    pub fn get(&self, id: &ObjectId) -> Result<Option<ObjectRecord>, ContextError> {
        let slot = self.slot()?;
        let guard = slot.lock();
        let local = match guard.borrow().lookup(id) {
            Lookup::Present(record) => Some(Some(record.clone())),
            Lookup::Deleted => Some(None),
            Lookup::Unknown => None,
        };
        match local {
            Some(found) => Ok(found),
            None => self.resolve_from(slot.parent, id),
        }
    }

    /// Whether an object is visible from this context.
    pub fn exists(&self, id: &ObjectId) -> Result<bool, ContextError> {
        Ok(self.get(id)?.is_some())
    }

    /// Set one attribute or relationship of a visible object.
    pub fn set(
        &self,
        id: &ObjectId,
        attribute: &str,
        value: impl Into<Value>,
    ) -> Result<(), ContextError> {
        let mut changes = AttributeMap::new();
        changes.insert(attribute.to_string(), value.into());
        self.update(id, changes)
    }

    /// Merge attribute values into a visible object.
    pub fn update(&self, id: &ObjectId, attributes: AttributeMap) -> Result<(), ContextError> {
        let slot = self.slot()?;
        let guard = slot.lock();
        let mut record = self
            .get(id)?
            .ok_or_else(|| ContextError::ObjectNotFound(id.clone()))?;
        record.attributes.extend(attributes);
        guard.borrow_mut().record_update(record);
        debug!(context = %self.id, object = %id, "Updated object");
        Ok(())
    }

    /// Delete a visible object.
    pub fn delete(&self, id: &ObjectId) -> Result<(), ContextError> {
        let slot = self.slot()?;
        let guard = slot.lock();
        if !self.exists(id)? {
            return Err(ContextError::ObjectNotFound(id.clone()));
        }
        guard.borrow_mut().record_delete(id.clone());
        debug!(context = %self.id, object = %id, "Deleted object");
        Ok(())
    }

    /// Every object of `entity` visible from this context, ordered by id.
    pub fn fetch(&self, entity: &str) -> Result<Vec<ObjectRecord>, ContextError> {
        if self.shared.model().entity(entity).is_none() {
            return Err(ContextError::UnknownEntity(entity.to_string()));
        }

        let slot = self.slot()?;
        let guard = slot.lock();
        let ancestors = self.shared.arena.ancestors(self.id)?;

        let mut view: BTreeMap<ObjectId, ObjectRecord> = self
            .shared
            .coordinator(slot.root)
            .scan_entity(entity)?
            .into_iter()
            .map(|record| (record.id.clone(), record))
            .collect();
        for ancestor in ancestors.iter().rev() {
            let ancestor_guard = ancestor.lock();
            ancestor_guard.borrow().overlay(entity, &mut view);
        }
        guard.borrow().overlay(entity, &mut view);

        Ok(view.into_values().collect())
    }

    /// Number of objects of `entity` visible from this context.
    pub fn count(&self, entity: &str) -> Result<usize, ContextError> {
        Ok(self.fetch(entity)?.len())
    }

    pub fn has_changes(&self) -> Result<bool, ContextError> {
        let slot = self.slot()?;
        let guard = slot.lock();
        let pending = !guard.borrow().is_empty();
        Ok(pending)
    }

    pub fn pending_counts(&self) -> Result<PendingCounts, ContextError> {
        let slot = self.slot()?;
        let guard = slot.lock();
        let counts = guard.borrow().counts();
        Ok(counts)
    }

    /// Discard every pending change. Returns what was discarded.
    pub fn rollback(&self) -> Result<PendingCounts, ContextError> {
        let slot = self.slot()?;
        let guard = slot.lock();
        let dropped = guard.borrow_mut().take().counts();
        if dropped.total() > 0 {
            debug!(context = %self.id, discarded = dropped.total(), "Rolled back context");
        }
        Ok(dropped)
    }

    /// Validate pending changes and push them one level up.
    ///
    /// Into a parent context, the changes are merged into the parent's
    /// pending state under the parent's lock. Into a coordinator, they are
    /// written as one atomic store batch. On any error the pending changes
    /// stay where they were.
    pub fn commit(&self) -> Result<CommitOutcome, ContextError> {
        let slot = self.slot()?;
        let guard = slot.lock();

        if guard.borrow().is_empty() {
            return Ok(CommitOutcome {
                objects: 0,
                target: slot.parent,
            });
        }

        {
            let changes = guard.borrow();
            self.validate_pending(&slot, &changes)?;
        }

        let objects = match slot.parent {
            Parent::Context(parent_id) => {
                let parent = self.shared.arena.get(parent_id)?;
                let parent_guard = parent.lock();
                let pending = guard.borrow_mut().take();
                let objects = pending.counts().total();
                parent_guard.borrow_mut().absorb(pending);
                debug!(
                    context = %self.id,
                    parent = %parent_id,
                    objects,
                    "Committed changes into parent context"
                );
                objects
            }
            Parent::Store(store) => {
                let objects = {
                    let changes = guard.borrow();
                    self.shared.coordinator(store).commit(&changes)?;
                    changes.counts().total()
                };
                guard.borrow_mut().take();
                info!(
                    context = %self.id,
                    store = ?store,
                    objects,
                    "Committed changes to store"
                );
                objects
            }
        };

        Ok(CommitOutcome {
            objects,
            target: slot.parent,
        })
    }

    fn validate_pending(&self, slot: &ContextSlot, changes: &ChangeSet) -> Result<(), ContextError> {
        let model = self.shared.model();
        for record in changes.written_records() {
            validate_record(model, record, |target| match changes.lookup(target) {
                Lookup::Present(_) => Ok(true),
                Lookup::Deleted => Ok(false),
                Lookup::Unknown => Ok(self.resolve_from(slot.parent, target)?.is_some()),
            })?;
        }

        let deleted: BTreeSet<ObjectId> = changes.deleted().cloned().collect();
        if deleted.is_empty() {
            return Ok(());
        }
        for entity in &model.entities {
            let may_reference = entity
                .relationships
                .iter()
                .any(|r| deleted.iter().any(|id| id.entity() == r.destination));
            if !may_reference {
                continue;
            }
            // The view already lacks the deleted records and carries this
            // context's pending edits, so cleared references pass.
            for record in self.fetch(&entity.name)? {
                check_deleted_targets(model, &record, &deleted)?;
            }
        }
        Ok(())
    }

    /// Look an object up starting at `parent` and walking toward the store.
    ///
    /// Each ancestor is locked only while its own change set is consulted.
    fn resolve_from(
        &self,
        parent: Parent,
        id: &ObjectId,
    ) -> Result<Option<ObjectRecord>, ContextError> {
        let mut cursor = parent;
        loop {
            match cursor {
                Parent::Store(store) => return Ok(self.shared.coordinator(store).get(id)?),
                Parent::Context(ancestor_id) => {
                    let ancestor = self.shared.arena.get(ancestor_id)?;
                    let ancestor_guard = ancestor.lock();
                    let found = match ancestor_guard.borrow().lookup(id) {
                        Lookup::Present(record) => Some(Some(record.clone())),
                        Lookup::Deleted => Some(None),
                        Lookup::Unknown => None,
                    };
                    if let Some(found) = found {
                        return Ok(found);
                    }
                    cursor = ancestor.parent;
                }
            }
        }
    }
}

//! Context arena: the context tree as id-keyed slots with parent ids.

use crate::context::changes::ChangeSet;
use crate::context::ContextRole;
use crate::error::ContextError;
use crate::types::ContextId;
use parking_lot::{ReentrantMutex, ReentrantMutexGuard, RwLock};
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Which coordinator a root context writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreSlot {
    Durable,
    InMemory,
}

/// Parent link of a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parent {
    Store(StoreSlot),
    Context(ContextId),
}

/// One context's entry in the arena.
///
/// The reentrant lock is the context's confinement: every operation on the
/// context runs while holding it, and a thread already inside a work unit on
/// this context may re-enter. The `RefCell` is only borrowed for the span of
/// a single operation step.
pub(crate) struct ContextSlot {
    pub id: ContextId,
    pub role: ContextRole,
    pub parent: Parent,
    pub root: StoreSlot,
    state: ReentrantMutex<RefCell<ChangeSet>>,
}

impl ContextSlot {
    pub fn lock(&self) -> ReentrantMutexGuard<'_, RefCell<ChangeSet>> {
        self.state.lock()
    }
}

pub(crate) struct ContextArena {
    slots: RwLock<HashMap<ContextId, Arc<ContextSlot>>>,
    next_id: AtomicU64,
}

impl ContextArena {
    pub fn new() -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a new context. A context parent must already be registered.
    pub fn register(
        &self,
        role: ContextRole,
        parent: Parent,
    ) -> Result<Arc<ContextSlot>, ContextError> {
        let mut slots = self.slots.write();
        let root = match parent {
            Parent::Store(store) => store,
            Parent::Context(parent_id) => {
                slots
                    .get(&parent_id)
                    .ok_or(ContextError::UnknownContext(parent_id))?
                    .root
            }
        };
        let id = ContextId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let slot = Arc::new(ContextSlot {
            id,
            role,
            parent,
            root,
            state: ReentrantMutex::new(RefCell::new(ChangeSet::default())),
        });
        slots.insert(id, Arc::clone(&slot));
        Ok(slot)
    }

    pub fn get(&self, id: ContextId) -> Result<Arc<ContextSlot>, ContextError> {
        self.slots
            .read()
            .get(&id)
            .cloned()
            .ok_or(ContextError::UnknownContext(id))
    }

    pub fn contains(&self, id: ContextId) -> bool {
        self.slots.read().contains_key(&id)
    }

    /// Remove a context that has no live children.
    pub fn remove(&self, id: ContextId) -> Result<Arc<ContextSlot>, ContextError> {
        let mut slots = self.slots.write();
        if slots
            .values()
            .any(|slot| slot.parent == Parent::Context(id))
        {
            return Err(ContextError::ContextInUse(
                id,
                "context still has child contexts".to_string(),
            ));
        }
        slots.remove(&id).ok_or(ContextError::UnknownContext(id))
    }

    /// Ancestor slots of `id`, nearest first, excluding `id` itself.
    pub fn ancestors(&self, id: ContextId) -> Result<Vec<Arc<ContextSlot>>, ContextError> {
        let slots = self.slots.read();
        let mut out = Vec::new();
        let mut cursor = slots.get(&id).ok_or(ContextError::UnknownContext(id))?.parent;
        while let Parent::Context(parent_id) = cursor {
            let parent = slots
                .get(&parent_id)
                .ok_or(ContextError::UnknownContext(parent_id))?;
            cursor = parent.parent;
            out.push(Arc::clone(parent));
        }
        Ok(out)
    }

    /// Every live slot, ordered by id.
    pub fn all(&self) -> Vec<Arc<ContextSlot>> {
        let mut slots: Vec<Arc<ContextSlot>> = self.slots.read().values().cloned().collect();
        slots.sort_by_key(|slot| slot.id);
        slots
    }

    pub fn len(&self) -> usize {
        self.slots.read().len()
    }
}

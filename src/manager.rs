//! Context Manager
//!
//! Owns the durable store, the object model and the context tree of one
//! process. The manager is constructed explicitly at the composition root and
//! passed to whoever needs it; cloning it shares the same instance.

use crate::config::StrataConfig;
use crate::context::arena::ContextArena;
use crate::context::{Context, ContextRole, Parent, StoreSlot};
use crate::coordinator::{PurgeMode, PurgeReport, StoreCoordinator};
use crate::error::ContextError;
use crate::model::{loader, Model};
use crate::store::{MemoryStore, PersistentStore, SledStore, StoreKind, StoreMetadata};
use crate::types::ContextId;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Parent given to contexts made by [`ContextManager::background_context`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackgroundParent {
    /// Child of the main context; saves propagate through main.
    #[default]
    Main,
    /// Sibling of the main context, attached to the durable coordinator.
    Coordinator,
}

/// Runtime knobs of a manager, usually taken from [`StrataConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerSettings {
    /// Where `background_context` attaches new contexts.
    pub background_parent: BackgroundParent,
    /// How `delete_all_contents` clears the durable store.
    pub purge_mode: PurgeMode,
    /// Flush the durable store after every save that reaches it.
    pub flush_on_save: bool,
}

impl Default for ManagerSettings {
    fn default() -> Self {
        Self {
            background_parent: BackgroundParent::Main,
            purge_mode: PurgeMode::Atomic,
            flush_on_save: true,
        }
    }
}

impl From<&StrataConfig> for ManagerSettings {
    fn from(config: &StrataConfig) -> Self {
        Self {
            background_parent: config.contexts.background_parent,
            purge_mode: config.purge.mode,
            flush_on_save: config.store.flush_on_save,
        }
    }
}

/// Result of [`ContextManager::save`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// The context had nothing pending; nothing was touched.
    NoChanges,
    Saved {
        /// Objects committed by the saved context itself.
        objects: usize,
        /// Commits performed, the saved context's included.
        levels: usize,
        /// Coordinator the changes reached.
        store: StoreSlot,
    },
}

#[derive(Default)]
struct Singletons {
    concurrent: Option<ContextId>,
    temporary: Option<ContextId>,
    in_memory: Option<ContextId>,
}

/// State shared by the manager and every context handle it hands out.
pub(crate) struct Shared {
    pub(crate) arena: ContextArena,
    durable: StoreCoordinator,
    in_memory: StoreCoordinator,
    settings: ManagerSettings,
    main: ContextId,
    singletons: Mutex<Singletons>,
}

impl Shared {
    pub(crate) fn coordinator(&self, slot: StoreSlot) -> &StoreCoordinator {
        match slot {
            StoreSlot::Durable => &self.durable,
            StoreSlot::InMemory => &self.in_memory,
        }
    }

    pub(crate) fn model(&self) -> &Arc<Model> {
        self.durable.model()
    }
}

#[derive(Clone)]
pub struct ContextManager {
    shared: Arc<Shared>,
}

impl ContextManager {
    /// Load the model, open the configured store and create the main context.
    ///
    /// Any failure here is fatal: no manager is produced.
    pub fn open(config: &StrataConfig) -> Result<Self, ContextError> {
        let model = loader::load(&config.model.path)?;
        let store: Arc<dyn PersistentStore> = match config.store.backend {
            StoreKind::Sled => Arc::new(SledStore::open(&config.store.path)?),
            StoreKind::Memory => Arc::new(MemoryStore::new()),
        };
        info!(
            backend = %config.store.backend,
            path = %config.store.path.display(),
            model = %model.name,
            "Opening store"
        );
        Self::with_store(Arc::new(model), store, ManagerSettings::from(config))
    }

    /// Build a manager over an already opened store.
    pub fn with_store(
        model: Arc<Model>,
        store: Arc<dyn PersistentStore>,
        settings: ManagerSettings,
    ) -> Result<Self, ContextError> {
        let durable = StoreCoordinator::attach(Arc::clone(&model), store, settings.flush_on_save)?;
        let in_memory =
            StoreCoordinator::attach(Arc::clone(&model), Arc::new(MemoryStore::new()), false)?;

        let arena = ContextArena::new();
        let main = arena
            .register(ContextRole::Main, Parent::Store(StoreSlot::Durable))?
            .id;

        debug!(main = %main, "Context manager ready");
        Ok(Self {
            shared: Arc::new(Shared {
                arena,
                durable,
                in_memory,
                settings,
                main,
                singletons: Mutex::new(Singletons::default()),
            }),
        })
    }

    /// Manager whose durable store lives in memory.
    pub fn in_memory(model: Model) -> Result<Self, ContextError> {
        Self::with_store(
            Arc::new(model),
            Arc::new(MemoryStore::new()),
            ManagerSettings::default(),
        )
    }

    pub fn model(&self) -> &Arc<Model> {
        self.shared.model()
    }

    pub fn settings(&self) -> &ManagerSettings {
        &self.shared.settings
    }

    pub fn store_metadata(&self) -> &StoreMetadata {
        self.shared.durable.metadata()
    }

    pub fn store_kind(&self) -> StoreKind {
        self.shared.durable.store_kind()
    }

    /// Number of live contexts, the main context included.
    pub fn context_count(&self) -> usize {
        self.shared.arena.len()
    }

    /// The foreground context. Always the same context for this manager.
    pub fn main_context(&self) -> Context {
        Context::new(self.shared.main, ContextRole::Main, Arc::clone(&self.shared))
    }

    /// A fresh context for isolated work, parented per `background_parent`.
    pub fn background_context(&self) -> Result<Context, ContextError> {
        self.register(ContextRole::Background, self.background_parent())
    }

    /// A fresh context parented to `parent`, for nested units of work.
    pub fn background_context_from(&self, parent: &Context) -> Result<Context, ContextError> {
        self.check_owned(parent)?;
        self.register(ContextRole::Background, Parent::Context(parent.id()))
    }

    /// Generic factory: `None` attaches the new context directly to the
    /// durable coordinator, `Some(parent)` nests it under `parent`.
    pub fn create_context(&self, parent: Option<&Context>) -> Result<Context, ContextError> {
        match parent {
            Some(parent) => self.background_context_from(parent),
            None => self.register(ContextRole::Detached, Parent::Store(StoreSlot::Durable)),
        }
    }

    /// Shared background context, created on first use.
    pub fn concurrent_context(&self) -> Result<Context, ContextError> {
        let parent = self.background_parent();
        self.singleton(ContextRole::Concurrent, parent, |s| &mut s.concurrent)
    }

    /// Scratch child of the main context, created on first use.
    pub fn temporary_main_context(&self) -> Result<Context, ContextError> {
        let parent = Parent::Context(self.shared.main);
        self.singleton(ContextRole::Temporary, parent, |s| &mut s.temporary)
    }

    /// Context over a private in-memory store, created on first use.
    pub fn in_memory_context(&self) -> Result<Context, ContextError> {
        let parent = Parent::Store(StoreSlot::InMemory);
        self.singleton(ContextRole::InMemory, parent, |s| &mut s.in_memory)
    }

    /// Remove a context, discarding its pending changes.
    ///
    /// The main context and the lazily created singletons live as long as the
    /// manager. A context with live children cannot be destroyed.
    pub fn destroy_context(&self, context: &Context) -> Result<(), ContextError> {
        self.check_owned(context)?;
        if context.role() != ContextRole::Background && context.role() != ContextRole::Detached {
            return Err(ContextError::ContextInUse(
                context.id(),
                format!("{} context lives as long as the manager", context.role()),
            ));
        }
        let slot = self.shared.arena.remove(context.id())?;
        let guard = slot.lock();
        let discarded = guard.borrow_mut().take().counts().total();
        debug!(context = %context.id(), discarded, "Destroyed context");
        Ok(())
    }

    /// Save a context and every ancestor up to its coordinator.
    ///
    /// `None` means the main context. A context with nothing pending is left
    /// alone. Otherwise the context commits into its parent, then the parent
    /// commits into its own parent, and so on until a coordinator writes the
    /// changes to its store. Each commit takes the committing context's own
    /// lock. The first failure is returned as is; levels already committed
    /// stay committed and the failing level keeps its pending changes.
    pub fn save(&self, context: Option<&Context>) -> Result<SaveOutcome, ContextError> {
        let start = match context {
            Some(context) => {
                self.check_owned(context)?;
                context.clone()
            }
            None => self.main_context(),
        };

        if !start.has_changes()? {
            return Ok(SaveOutcome::NoChanges);
        }

        let mut current = start;
        let mut objects = 0usize;
        let mut levels = 0usize;
        loop {
            let outcome = current.commit().map_err(|e| {
                warn!(
                    context = %current.id(),
                    role = %current.role(),
                    level = levels,
                    kind = e.kind(),
                    error = %e,
                    "Save failed"
                );
                e
            })?;
            if levels == 0 {
                objects = outcome.objects;
            }
            levels += 1;

            match outcome.target {
                Parent::Store(store) => {
                    info!(
                        objects,
                        levels,
                        store = ?store,
                        "Saved context chain"
                    );
                    return Ok(SaveOutcome::Saved {
                        objects,
                        levels,
                        store,
                    });
                }
                Parent::Context(parent_id) => {
                    let role = self.shared.arena.get(parent_id)?.role;
                    current = Context::new(parent_id, role, Arc::clone(&self.shared));
                }
            }
        }
    }

    /// [`ContextManager::save`] on tokio's blocking pool.
    pub async fn save_async(&self, context: Option<Context>) -> Result<SaveOutcome, ContextError> {
        let manager = self.clone();
        tokio::task::spawn_blocking(move || manager.save(context.as_ref()))
            .await
            .map_err(|e| ContextError::Runtime(format!("save task failed: {}", e)))?
    }

    /// Remove every persisted object of every entity from the durable store.
    ///
    /// Atomicity follows the configured [`PurgeMode`]. In `best_effort` mode an
    /// interruption returns `PartialDeleteFailure` and leaves the entities
    /// listed there cleared. On success, pending changes of every context
    /// rooted at the durable store are discarded too, so nothing stale can be
    /// saved back over the emptied store.
    pub fn delete_all_contents(&self) -> Result<PurgeReport, ContextError> {
        let mut report = self.shared.durable.purge(self.shared.settings.purge_mode)?;

        let mut discarded = 0usize;
        for slot in self.shared.arena.all() {
            if slot.root != StoreSlot::Durable {
                continue;
            }
            let guard = slot.lock();
            discarded += guard.borrow_mut().take().counts().total();
        }
        report.discarded_pending = discarded;

        info!(
            mode = %report.mode,
            removed = report.removed,
            discarded_pending = discarded,
            "Deleted all store contents"
        );
        Ok(report)
    }

    /// Flush the durable store to its medium.
    pub fn flush(&self) -> Result<(), ContextError> {
        self.shared.durable.flush()
    }

    fn background_parent(&self) -> Parent {
        match self.shared.settings.background_parent {
            BackgroundParent::Main => Parent::Context(self.shared.main),
            BackgroundParent::Coordinator => Parent::Store(StoreSlot::Durable),
        }
    }

    fn register(&self, role: ContextRole, parent: Parent) -> Result<Context, ContextError> {
        let slot = self.shared.arena.register(role, parent)?;
        debug!(context = %slot.id, role = %role, parent = ?parent, "Created context");
        Ok(Context::new(slot.id, role, Arc::clone(&self.shared)))
    }

    fn singleton<F>(
        &self,
        role: ContextRole,
        parent: Parent,
        pick: F,
    ) -> Result<Context, ContextError>
    where
        F: FnOnce(&mut Singletons) -> &mut Option<ContextId>,
    {
        let mut singletons = self.shared.singletons.lock();
        let entry = pick(&mut *singletons);
        if let Some(id) = *entry {
            return Ok(Context::new(id, role, Arc::clone(&self.shared)));
        }
        let context = self.register(role, parent)?;
        *entry = Some(context.id());
        Ok(context)
    }

    fn check_owned(&self, context: &Context) -> Result<(), ContextError> {
        if context.belongs_to(&self.shared) && self.shared.arena.contains(context.id()) {
            Ok(())
        } else {
            Err(ContextError::UnknownContext(context.id()))
        }
    }
}

//! Strata: Layered Object Contexts over a Persistent Store
//!
//! A [`ContextManager`] owns a durable object store, the object model that
//! describes it, and a tree of editing contexts. Changes made in a context
//! stay private to it until the context commits into its parent; saving a
//! context commits it and every ancestor until the changes reach the store.

pub mod cli;
pub mod config;
pub mod context;
pub mod coordinator;
pub mod error;
pub mod logging;
pub mod manager;
pub mod model;
pub mod object;
pub mod store;
pub mod types;

pub use context::{ChangeSet, CommitOutcome, Context, ContextRole, PendingCounts, Parent, StoreSlot};
pub use coordinator::{PurgeMode, PurgeReport, StoreCoordinator};
pub use error::{ContextError, ModelError, StorageError};
pub use manager::{BackgroundParent, ContextManager, ManagerSettings, SaveOutcome};
pub use model::{AttributeKind, EntityDescription, Model};
pub use object::{attributes, AttributeMap, ObjectRecord, Value};
pub use store::{MemoryStore, PersistentStore, SledStore, StoreKind, StoreMetadata};
pub use types::{ContextId, ObjectId};

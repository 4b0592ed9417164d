//! indexsync - keeps a derived search index consistent with a relational
//! primary store
//!
//! ## Flow
//!
//! ```text
//! before save/delete/unlink ─► capture dependents (links still exist)
//!          store mutates
//! after save/delete/link    ─► re-index the instance (unless suspended)
//!                              recapture dependents, union, re-index them
//! ```
//!
//! Bulk operations suspend direct re-indexing for a set of entity types.
//! Leaving the scope backfills every index fed by those types with the
//! entities changed since the scope began (minus a small buffer).
//!
//! ## Layout
//!
//! - `shared`: entity types, keys, records, clock
//! - `features::registry`: index definitions, schema, applicability
//! - `features::propagation`: dependent discovery and snapshot merge
//! - `features::suspension`: scopes, scope stores, backfill
//! - `features::dispatch`: lifecycle events to propagation
//! - `engine`: wiring
//! - `cli`: `create-index` / `update-index`
//! - `infrastructure`: in-memory store and index
//!
//! ## Usage
//!
//! ```rust,ignore
//! use indexsync::{ChangeEvent, SyncEngine};
//!
//! let engine = SyncEngine::builder(registry, store).build()?;
//! engine.dispatcher().register_registry_hooks();
//!
//! engine.dispatch(&ChangeEvent::before_save(&book))?;
//! store.save(&mut book)?;
//! engine.dispatch(&ChangeEvent::after_save(&book))?;
//! ```

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod features;
pub mod infrastructure;
pub mod shared;

// Re-exports
pub use config::{ConfigError, SyncConfig};
pub use engine::{SyncEngine, SyncEngineBuilder};
pub use errors::{Result, SyncError};
pub use features::dispatch::{
    ChangeDispatcher, ChangeEvent, ChangeKind, HookSet, RelationAction, RelationPhase,
};
pub use features::propagation::{
    DependencyResolver, DependentSet, PendingDependents, PendingSnapshots, PropagationReport,
    Propagator,
};
pub use features::registry::{
    DependencyMap, IndexDefinition, IndexRegistry, IndexRegistryBuilder, PrimaryStore,
    RecordQuery, RegisteredIndex, Schema,
};
pub use features::suspension::{
    affected_indexes, Backfill, BackfillReport, LocalScopeStore, ScopeStore, SharedScopeStore,
    SuspensionGuard, SuspensionManager, SuspensionScope,
};
pub use shared::{Clock, EntityType, IndexKey, ManualClock, PrimaryKey, Record, RelationPath, SystemClock};

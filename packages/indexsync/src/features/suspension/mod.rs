//! Suspension of direct re-indexing
//!
//! Bulk operations open a scope over a set of entity types. While it is
//! active, saving an instance of a suspended type skips that instance's own
//! re-index; dependents of other types are still propagated. Closing the
//! scope backfills everything changed during the window.
//!
//! Scopes live in a [`ScopeStore`]: process-local ([`LocalScopeStore`]) or
//! in a shared cache ([`SharedScopeStore`]) when several processes mutate
//! the same primary store.

pub mod backfill;
pub mod guard;
pub mod infrastructure;
pub mod manager;
pub mod ports;
pub mod scope;

pub use backfill::{affected_indexes, Backfill, BackfillReport};
pub use guard::SuspensionGuard;
pub use infrastructure::{LocalScopeStore, SharedScopeStore};
pub use manager::SuspensionManager;
pub use ports::ScopeStore;
pub use scope::SuspensionScope;

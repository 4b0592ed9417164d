//! Shared-cache backends for indexsync
//!
//! Suspension scopes must be visible to every worker that mutates the
//! primary store. Within one process an in-memory list is enough; across
//! processes the list lives in a shared cache under a fixed key and is read,
//! modified and written back on every change.
//!
//! ## Backends
//!
//! - [`InMemoryCache`]: single process, for tests and embedded use
//! - [`SqliteCache`]: file-backed, shared by every process opening the file
//!   (feature `sqlite`, on by default)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use indexsync_storage::{SharedCache, SharedCacheExt, SqliteCache};
//!
//! let cache = SqliteCache::open("/var/run/app/indexsync.db")?;
//! cache.set_json("suspended_models", &Vec::<String>::new())?;
//! ```

pub mod domain;
pub mod error;
pub mod infrastructure;

pub use error::{ErrorKind, Result, StorageError};

pub use domain::{SharedCache, SharedCacheExt};
pub use infrastructure::InMemoryCache;

#[cfg(feature = "sqlite")]
pub use infrastructure::SqliteCache;

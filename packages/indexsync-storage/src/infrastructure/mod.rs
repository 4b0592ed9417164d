//! Infrastructure layer - shared cache adapters

pub mod memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use memory::InMemoryCache;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteCache;

//! In-memory adapters
//!
//! A primary store and a search index that live entirely in memory. Used by
//! the test suites and handy for embedding the engine in prototypes.

pub mod memory_index;
pub mod memory_store;

pub use memory_index::{DocumentBuilder, InMemoryIndex, IndexCall};
pub use memory_store::{InMemoryStore, RelationKind, StoredRecord};

//! Index registry lookup
//!
//! - `ports`: the index definition and primary store interfaces
//! - `schema`: live entity types and their subtype relation
//! - `index_registry`: the frozen `(entity type, name)` -> definition map

pub mod index_registry;
pub mod ports;
pub mod schema;

pub use index_registry::{IndexRegistry, IndexRegistryBuilder, RegisteredIndex};
pub use ports::{DependencyMap, IndexDefinition, PrimaryStore, RecordQuery};
pub use schema::Schema;

//! Ports: index definition and primary store traits

use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crate::errors::Result;
use crate::shared::models::{EntityType, IndexKey, PrimaryKey, Record, RelationPath};

/// Entity types feeding an index document, with the lookup path from the
/// index's root entity to an instance of that type
pub type DependencyMap = HashMap<EntityType, RelationPath>;

/// Lazy description of a filtered set of root entities
///
/// Nothing is read until the owning index counts or indexes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordQuery {
    pub index: IndexKey,
    /// Only entities modified at or after this instant
    pub since: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

impl RecordQuery {
    pub fn new(index: IndexKey) -> Self {
        Self {
            index,
            since: None,
            limit: None,
        }
    }

    pub fn since(mut self, since: Option<DateTime<Utc>>) -> Self {
        self.since = since;
        self
    }

    pub fn limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    /// Root entity type the query selects from
    pub fn entity_type(&self) -> &EntityType {
        &self.index.entity_type
    }
}

/// Trait that every index definition must implement
///
/// Definitions are registered once at startup and shared between threads.
/// All operations are synchronous: they run in-line with the mutation that
/// triggered them.
pub trait IndexDefinition: Send + Sync {
    /// Owning (root) entity type
    fn entity_type(&self) -> EntityType;

    /// Index name, unique per entity type
    fn name(&self) -> &str;

    fn key(&self) -> IndexKey {
        IndexKey::new(self.entity_type(), self.name())
    }

    /// Other entity types whose changes alter this index's documents
    fn dependencies(&self) -> DependencyMap {
        DependencyMap::new()
    }

    /// Root entities changed at or after `since`, at most `limit` of them
    fn filtered_query(
        &self,
        since: Option<DateTime<Utc>>,
        limit: Option<usize>,
    ) -> Result<RecordQuery> {
        Ok(RecordQuery::new(self.key()).since(since).limit(limit))
    }

    /// Number of entities a query selects
    fn count(&self, query: &RecordQuery) -> Result<usize>;

    /// Upsert the document for one entity
    ///
    /// Must be idempotent: indexing the same entity twice leaves the same
    /// document as indexing it once.
    fn index_instance(&self, record: &dyn Record) -> Result<()>;

    /// Bulk upsert every entity of a query. Returns the number indexed.
    fn index_batch(&self, query: &RecordQuery) -> Result<usize>;

    /// (Re)create the backend mapping, dropping existing documents
    fn put_mapping(&self) -> Result<()>;
}

/// Read-only view of the primary store used for dependent discovery
pub trait PrimaryStore: Send + Sync {
    /// Keys of `root` entities that reach `instance` through `path`
    fn related_keys(
        &self,
        root: &EntityType,
        path: &RelationPath,
        instance: &dyn Record,
    ) -> Result<BTreeSet<PrimaryKey>>;

    /// Load `root` entities by key. Missing keys are skipped.
    fn load(&self, root: &EntityType, keys: &BTreeSet<PrimaryKey>)
        -> Result<Vec<Arc<dyn Record>>>;
}

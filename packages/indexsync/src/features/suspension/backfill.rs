//! Backfill after a suspension scope closes
//!
//! Every index fed by a suspended type re-indexes the root entities changed
//! since the scope started. This is what repairs the direct re-indexing
//! skipped while the scope was active.

use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{error, info};

use super::scope::SuspensionScope;
use crate::errors::{Result, SyncError};
use crate::features::registry::{IndexRegistry, RegisteredIndex};
use crate::shared::models::{EntityType, IndexKey};

/// Indexes applicable to one of `types` or depending on one of them
///
/// Applicability is polymorphic: suspending a subtype affects every index
/// owned by one of its supertypes.
pub fn affected_indexes(
    registry: &IndexRegistry,
    types: &BTreeSet<EntityType>,
) -> Vec<Arc<RegisteredIndex>> {
    let schema = registry.schema();
    registry
        .iter()
        .filter(|entry| {
            types
                .iter()
                .any(|ty| schema.is_subtype_of(ty, entry.entity_type()) || entry.depends_on(ty))
        })
        .cloned()
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackfillReport {
    /// Indexes backfilled successfully
    pub indexes: Vec<IndexKey>,
    /// Documents re-indexed across those indexes
    pub indexed: usize,
}

pub struct Backfill {
    registry: Arc<IndexRegistry>,
}

impl Backfill {
    pub fn new(registry: Arc<IndexRegistry>) -> Self {
        Self { registry }
    }

    /// Re-index everything changed since `scope.start`
    ///
    /// Every affected index is attempted. When some fail, the first
    /// failure is returned once the rest have run.
    pub fn run(&self, scope: &SuspensionScope) -> Result<BackfillReport> {
        let mut report = BackfillReport::default();
        let mut first_error: Option<SyncError> = None;

        for entry in affected_indexes(&self.registry, &scope.types) {
            let definition = entry.definition();
            let result = definition
                .filtered_query(Some(scope.start), None)
                .and_then(|query| definition.index_batch(&query));

            match result {
                Ok(count) => {
                    info!("Backfilled {} {} documents", count, entry.key());
                    report.indexed += count;
                    report.indexes.push(entry.key().clone());
                }
                Err(e) => {
                    error!("Backfill of {} failed: {}", entry.key(), e);
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(report),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::registry::{IndexDefinition, Schema};
    use crate::infrastructure::{InMemoryIndex, InMemoryStore};

    fn ty(model: &str) -> EntityType {
        EntityType::new("library", model)
    }

    fn library() -> IndexRegistry {
        let schema = Arc::new(Schema::with_types([ty("book"), ty("author"), ty("tag")]));
        schema.register_subtype(ty("ebook"), ty("book"));
        let store = Arc::new(InMemoryStore::new(Arc::clone(&schema)));

        IndexRegistry::builder()
            .register(Arc::new(
                InMemoryIndex::new(ty("book"), "books", Arc::clone(&store))
                    .depends_on(ty("author"), "author"),
            ) as Arc<dyn IndexDefinition>)
            .build(schema)
            .unwrap()
    }

    fn affected(registry: &IndexRegistry, model: &str) -> Vec<String> {
        affected_indexes(registry, &BTreeSet::from([ty(model)]))
            .iter()
            .map(|entry| entry.name().to_string())
            .collect()
    }

    #[test]
    fn test_subtype_scope_reaches_supertype_indexes() {
        let registry = library();

        assert_eq!(affected(&registry, "ebook"), vec!["books"]);
        assert_eq!(affected(&registry, "book"), vec!["books"]);
    }

    #[test]
    fn test_dependency_scope_reaches_dependent_indexes() {
        let registry = library();

        assert_eq!(affected(&registry, "author"), vec!["books"]);
        assert!(affected(&registry, "tag").is_empty());
    }
}

//! Index registry
//!
//! Maps `(entity type, index name)` to index definitions. Populated once
//! through [`IndexRegistryBuilder`] and read-only afterwards.
//!
//! Two lookups are cached against the schema generation:
//! - `indexes_for(ty)`: definitions whose owning type is `ty` or a supertype
//! - `search_types()`: live types with at least one applicable definition

use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::debug;

use super::ports::{DependencyMap, IndexDefinition};
use super::schema::Schema;
use crate::errors::{Result, SyncError};
use crate::shared::models::{EntityType, IndexKey};

/// A definition together with the metadata read from it at registration
pub struct RegisteredIndex {
    key: IndexKey,
    definition: Arc<dyn IndexDefinition>,
    dependencies: DependencyMap,
}

impl RegisteredIndex {
    pub fn key(&self) -> &IndexKey {
        &self.key
    }

    pub fn entity_type(&self) -> &EntityType {
        &self.key.entity_type
    }

    pub fn name(&self) -> &str {
        &self.key.name
    }

    pub fn definition(&self) -> &dyn IndexDefinition {
        self.definition.as_ref()
    }

    pub fn dependencies(&self) -> &DependencyMap {
        &self.dependencies
    }

    pub fn depends_on(&self, ty: &EntityType) -> bool {
        self.dependencies.contains_key(ty)
    }
}

impl std::fmt::Debug for RegisteredIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredIndex")
            .field("key", &self.key)
            .field("dependencies", &self.dependencies)
            .finish()
    }
}

#[derive(Default)]
pub struct IndexRegistryBuilder {
    definitions: Vec<Arc<dyn IndexDefinition>>,
}

impl IndexRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, definition: Arc<dyn IndexDefinition>) -> Self {
        self.definitions.push(definition);
        self
    }

    /// Freeze the registry. Fails on a duplicate `(entity type, name)`.
    pub fn build(self, schema: Arc<Schema>) -> Result<IndexRegistry> {
        let mut entries = Vec::with_capacity(self.definitions.len());
        let mut by_key = HashMap::with_capacity(self.definitions.len());

        for definition in self.definitions {
            let key = definition.key();
            if by_key.contains_key(&key) {
                return Err(SyncError::DuplicateIndex(key));
            }
            let dependencies = definition.dependencies();
            debug!(
                "Registered index {} ({} dependencies)",
                key,
                dependencies.len()
            );
            by_key.insert(key.clone(), entries.len());
            entries.push(Arc::new(RegisteredIndex {
                key,
                definition,
                dependencies,
            }));
        }

        Ok(IndexRegistry {
            schema,
            entries,
            by_key,
            applicable: DashMap::new(),
            search_types: RwLock::new(None),
        })
    }
}

pub struct IndexRegistry {
    schema: Arc<Schema>,
    entries: Vec<Arc<RegisteredIndex>>,
    by_key: HashMap<IndexKey, usize>,
    /// Concrete type -> (schema generation, entry positions)
    applicable: DashMap<EntityType, (u64, Vec<usize>)>,
    search_types: RwLock<Option<(u64, BTreeSet<EntityType>)>>,
}

impl IndexRegistry {
    pub fn builder() -> IndexRegistryBuilder {
        IndexRegistryBuilder::new()
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Definitions whose owning type is `ty` or one of its supertypes
    pub fn indexes_for(&self, ty: &EntityType) -> Vec<Arc<RegisteredIndex>> {
        let generation = self.schema.generation();

        if let Some(cached) = self.applicable.get(ty) {
            if cached.0 == generation {
                return cached.1.iter().map(|&i| self.entries[i].clone()).collect();
            }
        }

        let positions: Vec<usize> = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| self.schema.is_subtype_of(ty, entry.entity_type()))
            .map(|(i, _)| i)
            .collect();
        let found = positions.iter().map(|&i| self.entries[i].clone()).collect();
        self.applicable.insert(ty.clone(), (generation, positions));
        found
    }

    /// Live entity types with at least one applicable index
    pub fn search_types(&self) -> BTreeSet<EntityType> {
        let generation = self.schema.generation();
        if let Some((cached_gen, types)) = self.search_types.read().as_ref() {
            if *cached_gen == generation {
                return types.clone();
            }
        }

        let types: BTreeSet<EntityType> = self
            .schema
            .live_types()
            .into_iter()
            .filter(|ty| !self.indexes_for(ty).is_empty())
            .collect();
        debug!("Recomputed search-eligible types: {} types", types.len());
        *self.search_types.write() = Some((generation, types.clone()));
        types
    }

    pub fn is_search_eligible(&self, ty: &EntityType) -> bool {
        self.search_types().contains(ty)
    }

    /// Resolve CLI selectors: `app`, `app.model` or `app.model.index`
    ///
    /// An empty selector list selects every index. Matching is
    /// ASCII case-insensitive. Fails when nothing matches.
    pub fn indexes_matching<S: AsRef<str>>(
        &self,
        selectors: &[S],
    ) -> Result<Vec<Arc<RegisteredIndex>>> {
        let matched: Vec<_> = self
            .entries
            .iter()
            .filter(|entry| {
                selectors.is_empty()
                    || selectors
                        .iter()
                        .any(|s| selector_matches(s.as_ref(), entry.key()))
            })
            .cloned()
            .collect();

        if matched.is_empty() {
            return Err(SyncError::NoMatchingIndexes(
                selectors.iter().map(|s| s.as_ref().to_string()).collect(),
            ));
        }
        Ok(matched)
    }

    pub fn get(&self, key: &IndexKey) -> Option<Arc<RegisteredIndex>> {
        self.by_key.get(key).map(|&i| self.entries[i].clone())
    }

    /// Registration order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<RegisteredIndex>> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn selector_matches(selector: &str, key: &IndexKey) -> bool {
    let parts: Vec<&str> = selector.split('.').collect();
    let ty = &key.entity_type;
    match parts.as_slice() {
        [app] => app.eq_ignore_ascii_case(&ty.app_label),
        [app, model] => {
            app.eq_ignore_ascii_case(&ty.app_label) && model.eq_ignore_ascii_case(&ty.model_name)
        }
        [app, model, name] => {
            app.eq_ignore_ascii_case(&ty.app_label)
                && model.eq_ignore_ascii_case(&ty.model_name)
                && name.eq_ignore_ascii_case(&key.name)
        }
        _ => false,
    }
}

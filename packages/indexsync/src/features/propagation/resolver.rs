//! Dependency resolver
//!
//! For a changed instance, finds every registered index that declares the
//! instance's type as a dependency and queries the root entities reachable
//! through the declared relation path. Read-only: one store query per
//! matching index.

use std::sync::Arc;
use tracing::trace;

use super::dependent_set::DependentSet;
use crate::errors::Result;
use crate::features::registry::{IndexRegistry, PrimaryStore};
use crate::shared::models::Record;

pub struct DependencyResolver {
    registry: Arc<IndexRegistry>,
    store: Arc<dyn PrimaryStore>,
}

impl DependencyResolver {
    pub fn new(registry: Arc<IndexRegistry>, store: Arc<dyn PrimaryStore>) -> Self {
        Self { registry, store }
    }

    /// Root entities whose documents depend on `record`, per index
    ///
    /// Unsaved records have no dependents. Indexes whose owning type has
    /// left the live schema are skipped.
    pub fn dependents_of(&self, record: &dyn Record) -> Result<DependentSet> {
        let mut dependents = DependentSet::new();
        if record.primary_key().is_none() {
            return Ok(dependents);
        }

        let ty = record.entity_type();
        let schema = self.registry.schema();
        for entry in self.registry.iter() {
            if !schema.is_live(entry.entity_type()) {
                continue;
            }
            let Some(path) = entry.dependencies().get(&ty) else {
                continue;
            };
            let keys = self.store.related_keys(entry.entity_type(), path, record)?;
            trace!(
                "{} depends on {} via '{}': {} roots",
                entry.key(),
                ty,
                path,
                keys.len()
            );
            dependents.insert(entry.key().clone(), keys);
        }

        Ok(dependents)
    }
}

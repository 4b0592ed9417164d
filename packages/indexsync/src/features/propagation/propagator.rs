//! Snapshot and merge
//!
//! ```text
//! before_change(record)  -> pending   (dependents while old links exist)
//!   ... store mutates ...
//! after_change(record, pending, direct)
//!   1. direct re-index through every applicable index (if `direct`)
//!   2. recompute dependents against the new state
//!   3. merge with `pending` by set union
//!   4. load and re-index every merged dependent
//! ```

use std::sync::Arc;
use tracing::debug;

use super::dependent_set::DependentSet;
use super::pending::PendingDependents;
use super::resolver::DependencyResolver;
use crate::errors::Result;
use crate::features::registry::{IndexRegistry, PrimaryStore};
use crate::shared::models::{IndexKey, Record};

/// Outcome of one post-change phase
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropagationReport {
    /// Indexes the changed instance itself was written to
    pub direct: Vec<IndexKey>,
    /// Merged pre- and post-change dependents
    pub dependents: DependentSet,
    /// Dependent documents re-indexed
    pub reindexed: usize,
}

pub struct Propagator {
    registry: Arc<IndexRegistry>,
    store: Arc<dyn PrimaryStore>,
    resolver: DependencyResolver,
}

impl Propagator {
    pub fn new(registry: Arc<IndexRegistry>, store: Arc<dyn PrimaryStore>) -> Self {
        let resolver = DependencyResolver::new(Arc::clone(&registry), Arc::clone(&store));
        Self {
            registry,
            store,
            resolver,
        }
    }

    pub fn resolver(&self) -> &DependencyResolver {
        &self.resolver
    }

    /// Capture dependents before `record` is mutated
    pub fn before_change(&self, record: &dyn Record) -> Result<PendingDependents> {
        self.before_change_with(record, &[])
    }

    /// Capture dependents of `record` and of the records on the other side
    /// of a relation about to change
    pub fn before_change_with(
        &self,
        record: &dyn Record,
        related: &[Arc<dyn Record>],
    ) -> Result<PendingDependents> {
        Ok(PendingDependents::new(self.capture(record, related)?))
    }

    pub fn after_change(
        &self,
        record: &dyn Record,
        pending: PendingDependents,
        direct: bool,
    ) -> Result<PropagationReport> {
        self.after_change_with(record, &[], pending, direct)
    }

    pub fn after_change_with(
        &self,
        record: &dyn Record,
        related: &[Arc<dyn Record>],
        pending: PendingDependents,
        direct: bool,
    ) -> Result<PropagationReport> {
        let mut report = PropagationReport::default();

        if direct {
            for entry in self.registry.indexes_for(&record.entity_type()) {
                entry.definition().index_instance(record)?;
                report.direct.push(entry.key().clone());
            }
        }

        let mut dependents = pending.into_inner();
        dependents.merge(self.capture(record, related)?);

        for (key, pks) in &dependents {
            if pks.is_empty() {
                continue;
            }
            let Some(entry) = self.registry.get(key) else {
                continue;
            };
            for dependent in self.store.load(entry.entity_type(), pks)? {
                entry.definition().index_instance(dependent.as_ref())?;
                report.reindexed += 1;
            }
        }

        if report.reindexed > 0 {
            debug!(
                "Re-indexed {} dependents of {} {}",
                report.reindexed,
                record.entity_type(),
                record
                    .primary_key()
                    .map(|pk| pk.to_string())
                    .unwrap_or_default()
            );
        }
        report.dependents = dependents;
        Ok(report)
    }

    fn capture(&self, record: &dyn Record, related: &[Arc<dyn Record>]) -> Result<DependentSet> {
        let mut dependents = self.resolver.dependents_of(record)?;
        for other in related {
            dependents.merge(self.resolver.dependents_of(other.as_ref())?);
        }
        Ok(dependents)
    }
}

//! Pre-phase snapshots
//!
//! Dependents captured before a mutation must reach the matching
//! post-phase exactly once. Callers that drive both phases themselves hold
//! a [`PendingDependents`] token. Event-driven callers stash it in
//! [`PendingSnapshots`], keyed by instance and thread so concurrent
//! mutations of different instances never see each other's snapshot.

use dashmap::DashMap;
use std::thread::{self, ThreadId};

use super::dependent_set::DependentSet;
use crate::shared::models::{EntityType, PrimaryKey, Record};

/// Dependents captured before one mutation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[must_use = "pass the snapshot to the post-change phase"]
pub struct PendingDependents {
    dependents: DependentSet,
}

impl PendingDependents {
    pub fn new(dependents: DependentSet) -> Self {
        Self { dependents }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn dependents(&self) -> &DependentSet {
        &self.dependents
    }

    /// Fold another snapshot into this one
    pub fn absorb(&mut self, other: PendingDependents) {
        self.dependents.merge(other.dependents);
    }

    pub fn into_inner(self) -> DependentSet {
        self.dependents
    }
}

type SnapshotKey = (EntityType, PrimaryKey, ThreadId);

/// In-flight snapshots between a pre-hook and its post-hook
#[derive(Debug, Default)]
pub struct PendingSnapshots {
    inner: DashMap<SnapshotKey, PendingDependents>,
}

impl PendingSnapshots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a snapshot to `record` for the current thread
    ///
    /// Unsaved records cannot be keyed and have no dependents yet, so
    /// nothing is stored for them. A second pre-hook for the same instance
    /// replaces the earlier snapshot.
    pub fn stash(&self, record: &dyn Record, pending: PendingDependents) {
        if let Some(key) = Self::key(record) {
            self.inner.insert(key, pending);
        }
    }

    /// Detach the snapshot of `record`, empty when none was stashed
    pub fn take(&self, record: &dyn Record) -> PendingDependents {
        Self::key(record)
            .and_then(|key| self.inner.remove(&key))
            .map(|(_, pending)| pending)
            .unwrap_or_default()
    }

    /// Drop the snapshot of `record` without a post phase
    ///
    /// For mutations that failed after their pre-hook ran. Returns whether
    /// a snapshot was stashed.
    pub fn discard(&self, record: &dyn Record) -> bool {
        Self::key(record)
            .map(|key| self.inner.remove(&key).is_some())
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    fn key(record: &dyn Record) -> Option<SnapshotKey> {
        record
            .primary_key()
            .map(|pk| (record.entity_type(), pk, thread::current().id()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::models::IndexKey;
    use std::any::Any;
    use std::sync::Arc;

    #[derive(Debug)]
    struct Row(Option<i64>);

    impl Record for Row {
        fn entity_type(&self) -> EntityType {
            EntityType::new("library", "author")
        }
        fn primary_key(&self) -> Option<PrimaryKey> {
            self.0.map(PrimaryKey::Int)
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn snapshot(ids: &[i64]) -> PendingDependents {
        let mut set = DependentSet::new();
        set.insert(
            IndexKey::new(EntityType::new("library", "book"), "books"),
            ids.iter().copied().map(PrimaryKey::Int),
        );
        PendingDependents::new(set)
    }

    #[test]
    fn test_take_consumes_the_snapshot() {
        let pending = PendingSnapshots::new();
        pending.stash(&Row(Some(1)), snapshot(&[10, 11]));

        assert_eq!(pending.take(&Row(Some(1))), snapshot(&[10, 11]));
        assert_eq!(pending.take(&Row(Some(1))), PendingDependents::empty());
        assert!(pending.is_empty());
    }

    #[test]
    fn test_discard_drops_an_abandoned_snapshot() {
        let pending = PendingSnapshots::new();
        pending.stash(&Row(Some(3)), snapshot(&[7]));

        assert!(pending.discard(&Row(Some(3))));
        assert!(pending.is_empty());
        assert!(!pending.discard(&Row(Some(3))));
        assert!(!pending.discard(&Row(None)));
    }

    #[test]
    fn test_unsaved_records_are_not_stashed() {
        let pending = PendingSnapshots::new();
        pending.stash(&Row(None), snapshot(&[1]));
        assert!(pending.is_empty());
    }

    #[test]
    fn test_snapshots_are_per_thread() {
        let pending = Arc::new(PendingSnapshots::new());
        pending.stash(&Row(Some(1)), snapshot(&[1]));

        let other = Arc::clone(&pending);
        let seen = std::thread::spawn(move || {
            other.stash(&Row(Some(1)), snapshot(&[2]));
            other.take(&Row(Some(1)))
        })
        .join()
        .unwrap();

        assert_eq!(seen, snapshot(&[2]));
        assert_eq!(pending.take(&Row(Some(1))), snapshot(&[1]));
    }
}

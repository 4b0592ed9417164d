//! Dependent set: index -> keys of root entities to re-index

use std::collections::btree_map::{self, BTreeMap};
use std::collections::BTreeSet;

use crate::shared::models::{IndexKey, PrimaryKey};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependentSet {
    entries: BTreeMap<IndexKey, BTreeSet<PrimaryKey>>,
}

impl DependentSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `keys` for `index`. Indexes with no keys are kept so a
    /// matched-but-empty dependency stays visible.
    pub fn insert(&mut self, index: IndexKey, keys: impl IntoIterator<Item = PrimaryKey>) {
        self.entries.entry(index).or_default().extend(keys);
    }

    /// Per-index set union
    pub fn merge(&mut self, other: DependentSet) {
        for (index, keys) in other.entries {
            self.entries.entry(index).or_default().extend(keys);
        }
    }

    pub fn merge_all(sets: impl IntoIterator<Item = DependentSet>) -> Self {
        let mut merged = Self::new();
        for set in sets {
            merged.merge(set);
        }
        merged
    }

    pub fn get(&self, index: &IndexKey) -> Option<&BTreeSet<PrimaryKey>> {
        self.entries.get(index)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, IndexKey, BTreeSet<PrimaryKey>> {
        self.entries.iter()
    }

    /// Total number of keys across all indexes
    pub fn total(&self) -> usize {
        self.entries.values().map(BTreeSet::len).sum()
    }

    /// True when no index has any key
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

impl IntoIterator for DependentSet {
    type Item = (IndexKey, BTreeSet<PrimaryKey>);
    type IntoIter = btree_map::IntoIter<IndexKey, BTreeSet<PrimaryKey>>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a> IntoIterator for &'a DependentSet {
    type Item = (&'a IndexKey, &'a BTreeSet<PrimaryKey>);
    type IntoIter = btree_map::Iter<'a, IndexKey, BTreeSet<PrimaryKey>>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::models::EntityType;
    use proptest::prelude::*;

    fn books() -> IndexKey {
        IndexKey::new(EntityType::new("library", "book"), "books")
    }

    fn keys(ids: &[i64]) -> BTreeSet<PrimaryKey> {
        ids.iter().copied().map(PrimaryKey::Int).collect()
    }

    #[test]
    fn test_merge_is_union() {
        let mut before = DependentSet::new();
        before.insert(books(), keys(&[1, 2]));
        let mut after = DependentSet::new();
        after.insert(books(), keys(&[2, 3]));

        let merged = DependentSet::merge_all([before, after]);
        assert_eq!(merged.get(&books()), Some(&keys(&[1, 2, 3])));
        assert_eq!(merged.total(), 3);
    }

    #[test]
    fn test_empty_entries_do_not_count() {
        let mut set = DependentSet::new();
        set.insert(books(), Vec::new());
        assert!(set.is_empty());
        assert_eq!(set.iter().count(), 1);
    }

    proptest! {
        #[test]
        fn prop_merge_never_loses_keys(
            left in proptest::collection::btree_set(0i64..50, 0..20),
            right in proptest::collection::btree_set(0i64..50, 0..20),
        ) {
            let mut a = DependentSet::new();
            a.insert(books(), left.iter().copied().map(PrimaryKey::Int));
            let mut b = DependentSet::new();
            b.insert(books(), right.iter().copied().map(PrimaryKey::Int));

            let merged = DependentSet::merge_all([a, b]);
            let expected: BTreeSet<PrimaryKey> =
                left.union(&right).copied().map(PrimaryKey::Int).collect();
            prop_assert_eq!(merged.get(&books()).cloned().unwrap_or_default(), expected);
        }
    }
}

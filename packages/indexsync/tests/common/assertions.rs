//! Assertions on index backend traffic

use indexsync::infrastructure::{InMemoryIndex, IndexCall};
use indexsync::PrimaryKey;
use std::collections::BTreeSet;

/// Assert `index_instance` was called for exactly these keys (any order)
pub fn assert_indexed(index: &InMemoryIndex, expected: &[PrimaryKey]) {
    let actual: BTreeSet<PrimaryKey> = index.indexed_keys().into_iter().collect();
    let expected: BTreeSet<PrimaryKey> = expected.iter().cloned().collect();
    assert_eq!(
        actual,
        expected,
        "Unexpected index_instance calls: {:?}",
        index.calls()
    );
}

/// Assert the index saw no backend traffic at all
pub fn assert_untouched(index: &InMemoryIndex) {
    assert!(
        index.calls().is_empty(),
        "Expected no backend calls, got: {:?}",
        index.calls()
    );
}

/// Backfill batches issued against the index
pub fn batches(index: &InMemoryIndex) -> Vec<IndexCall> {
    index
        .calls()
        .into_iter()
        .filter(|call| matches!(call, IndexCall::IndexBatch { .. }))
        .collect()
}

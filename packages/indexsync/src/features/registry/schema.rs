//! Live schema of entity types
//!
//! Tracks which entity types currently exist and the subtype relation
//! between them. Every mutation bumps `generation`, which is the
//! invalidation trigger for caches derived from the schema (per-type index
//! applicability, the search-eligible type set).

use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::shared::models::EntityType;

#[derive(Debug, Default)]
struct SchemaState {
    live: BTreeSet<EntityType>,
    parents: HashMap<EntityType, EntityType>,
}

#[derive(Debug, Default)]
pub struct Schema {
    state: RwLock<SchemaState>,
    generation: AtomicU64,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schema with the given root types registered
    pub fn with_types(types: impl IntoIterator<Item = EntityType>) -> Self {
        let schema = Self::new();
        for ty in types {
            schema.register(ty);
        }
        schema
    }

    pub fn register(&self, ty: EntityType) {
        self.state.write().live.insert(ty);
        self.bump();
    }

    /// Register `ty` as a direct subtype of `parent`
    pub fn register_subtype(&self, ty: EntityType, parent: EntityType) {
        {
            let mut state = self.state.write();
            state.parents.insert(ty.clone(), parent);
            state.live.insert(ty);
        }
        self.bump();
    }

    /// Drop a type from the live schema. Returns whether it was live.
    ///
    /// Subtypes keep their parent link.
    pub fn remove(&self, ty: &EntityType) -> bool {
        let removed = {
            let mut state = self.state.write();
            state.parents.remove(ty);
            state.live.remove(ty)
        };
        self.bump();
        removed
    }

    pub fn is_live(&self, ty: &EntityType) -> bool {
        self.state.read().live.contains(ty)
    }

    /// Reflexive, transitive subtype test
    pub fn is_subtype_of(&self, ty: &EntityType, ancestor: &EntityType) -> bool {
        self.ancestors(ty).iter().any(|t| t == ancestor)
    }

    /// `ty` followed by its parents, nearest first
    pub fn ancestors(&self, ty: &EntityType) -> Vec<EntityType> {
        let state = self.state.read();
        let mut chain = vec![ty.clone()];
        let mut seen: HashSet<&EntityType> = HashSet::new();
        let mut current = ty;
        // Cycles are a registration mistake; stop instead of spinning.
        while let Some(parent) = state.parents.get(current) {
            if !seen.insert(parent) || parent == ty {
                break;
            }
            chain.push(parent.clone());
            current = parent;
        }
        chain
    }

    pub fn live_types(&self) -> BTreeSet<EntityType> {
        self.state.read().live.clone()
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    fn bump(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ty(model: &str) -> EntityType {
        EntityType::new("library", model)
    }

    #[test]
    fn test_subtype_is_reflexive_and_transitive() {
        let schema = Schema::with_types([ty("item")]);
        schema.register_subtype(ty("book"), ty("item"));
        schema.register_subtype(ty("ebook"), ty("book"));

        assert!(schema.is_subtype_of(&ty("ebook"), &ty("ebook")));
        assert!(schema.is_subtype_of(&ty("ebook"), &ty("book")));
        assert!(schema.is_subtype_of(&ty("ebook"), &ty("item")));
        assert!(!schema.is_subtype_of(&ty("book"), &ty("ebook")));
        assert_eq!(
            schema.ancestors(&ty("ebook")),
            vec![ty("ebook"), ty("book"), ty("item")]
        );
    }

    #[test]
    fn test_remove_bumps_generation() {
        let schema = Schema::with_types([ty("book"), ty("author")]);
        let before = schema.generation();

        assert!(schema.remove(&ty("author")));
        assert!(!schema.is_live(&ty("author")));
        assert!(schema.generation() > before);
        assert!(!schema.remove(&ty("author")));
    }

    #[test]
    fn test_parent_cycle_terminates() {
        let schema = Schema::new();
        schema.register_subtype(ty("a"), ty("b"));
        schema.register_subtype(ty("b"), ty("a"));

        assert_eq!(schema.ancestors(&ty("a")), vec![ty("a"), ty("b")]);
        assert!(!schema.is_subtype_of(&ty("a"), &ty("c")));
    }
}

//! In-memory shared cache
//!
//! HashMap-backed cache. Shared between threads of one process when
//! wrapped in an `Arc`; useless across processes.

use parking_lot::RwLock;
use std::collections::HashMap;

use crate::domain::SharedCache;
use crate::Result;

#[derive(Debug, Default)]
pub struct InMemoryCache {
    entries: RwLock<HashMap<String, String>>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl SharedCache for InMemoryCache {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .write()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.entries.write().remove(key).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SharedCacheExt;
    use std::sync::Arc;

    #[test]
    fn test_set_get_delete() {
        let cache = InMemoryCache::new();
        assert_eq!(cache.get("suspended_models").unwrap(), None);

        cache.set("suspended_models", "[]").unwrap();
        assert_eq!(cache.get("suspended_models").unwrap().as_deref(), Some("[]"));
        assert_eq!(cache.len(), 1);

        assert!(cache.delete("suspended_models").unwrap());
        assert!(!cache.delete("suspended_models").unwrap());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_json_helpers() {
        let cache = InMemoryCache::new();
        cache
            .set_json("scopes", &vec!["library.book", "library.author"])
            .unwrap();

        let scopes: Option<Vec<String>> = cache.get_json("scopes").unwrap();
        assert_eq!(
            scopes,
            Some(vec!["library.book".to_string(), "library.author".to_string()])
        );

        let missing: Option<Vec<String>> = cache.get_json("missing").unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn test_shared_through_arc() {
        let cache = Arc::new(InMemoryCache::new());
        let other = Arc::clone(&cache);

        cache.set("k", "v").unwrap();
        assert_eq!(other.get("k").unwrap().as_deref(), Some("v"));
    }
}

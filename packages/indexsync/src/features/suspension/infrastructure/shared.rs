//! Shared-cache scope store
//!
//! The whole scope list is stored as JSON under one cache key. Every push
//! and remove reads the list, changes it and writes it back. Backends only
//! guarantee atomic get/set per key, so two workers changing the list at
//! the same moment can lose one of the updates. Suspension is advisory and
//! backfill plus the buffer window repair what a lost scope lets through.

use indexsync_storage::{SharedCache, SharedCacheExt};
use tracing::debug;

use crate::config::DEFAULT_CACHE_KEY;
use crate::errors::{Result, SyncError};
use crate::features::suspension::ports::ScopeStore;
use crate::features::suspension::scope::SuspensionScope;

pub struct SharedScopeStore<C: SharedCache> {
    cache: C,
    key: String,
}

impl<C: SharedCache> SharedScopeStore<C> {
    pub fn new(cache: C) -> Self {
        Self::with_key(cache, DEFAULT_CACHE_KEY)
    }

    pub fn with_key(cache: C, key: impl Into<String>) -> Self {
        Self {
            cache,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    fn load(&self) -> Result<Vec<SuspensionScope>> {
        Ok(self
            .cache
            .get_json::<Vec<SuspensionScope>>(&self.key)?
            .unwrap_or_default())
    }

    fn save(&self, scopes: &[SuspensionScope]) -> Result<()> {
        self.cache.set_json(&self.key, scopes)?;
        Ok(())
    }
}

impl<C: SharedCache> ScopeStore for SharedScopeStore<C> {
    fn push(&self, scope: SuspensionScope) -> Result<()> {
        let mut scopes = self.load()?;
        scopes.push(scope);
        debug!("{} active suspension scopes under '{}'", scopes.len(), self.key);
        self.save(&scopes)
    }

    fn remove(&self, scope: &SuspensionScope) -> Result<()> {
        let mut scopes = self.load()?;
        let pos = scopes
            .iter()
            .position(|s| s == scope)
            .ok_or_else(|| SyncError::ScopeNotFound(scope.to_string()))?;
        scopes.remove(pos);
        self.save(&scopes)
    }

    fn snapshot(&self) -> Result<Vec<SuspensionScope>> {
        self.load()
    }
}

//! Process-local scope store
//!
//! Valid only for suspensions and mutations within one process. The
//! process-wide instance starts empty and is only changed by enter/exit.

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::sync::Arc;

use crate::errors::{Result, SyncError};
use crate::features::suspension::ports::ScopeStore;
use crate::features::suspension::scope::SuspensionScope;
use crate::shared::models::EntityType;

static PROCESS_WIDE: Lazy<Arc<LocalScopeStore>> = Lazy::new(|| Arc::new(LocalScopeStore::new()));

#[derive(Debug, Default)]
pub struct LocalScopeStore {
    scopes: Mutex<Vec<SuspensionScope>>,
}

impl LocalScopeStore {
    /// Private list, for tests and isolated engines
    pub fn new() -> Self {
        Self::default()
    }

    /// The list shared by every engine in this process
    pub fn process_wide() -> Arc<LocalScopeStore> {
        Arc::clone(&PROCESS_WIDE)
    }
}

impl ScopeStore for LocalScopeStore {
    fn push(&self, scope: SuspensionScope) -> Result<()> {
        self.scopes.lock().push(scope);
        Ok(())
    }

    fn remove(&self, scope: &SuspensionScope) -> Result<()> {
        let mut scopes = self.scopes.lock();
        match scopes.iter().position(|s| s == scope) {
            Some(pos) => {
                scopes.remove(pos);
                Ok(())
            }
            None => Err(SyncError::ScopeNotFound(scope.to_string())),
        }
    }

    fn snapshot(&self) -> Result<Vec<SuspensionScope>> {
        Ok(self.scopes.lock().clone())
    }

    fn is_suspended(&self, ty: &EntityType) -> Result<bool> {
        Ok(self.scopes.lock().iter().any(|scope| scope.contains(ty)))
    }
}

//! Sync engine: wiring of registry, store, suspension and dispatch
//!
//! ```rust,ignore
//! let engine = SyncEngine::builder(registry, store)
//!     .config(SyncConfig::from_yaml("indexsync.yaml")?.with_env_overrides()?)
//!     .shared_cache(Arc::new(SqliteCache::open("/var/run/app/indexsync.db")?))
//!     .build()?;
//! engine.dispatcher().register_registry_hooks();
//!
//! engine.suspended(None, false, || bulk_import(&store))?;
//! ```

use std::collections::BTreeSet;
use std::sync::Arc;

use indexsync_storage::SharedCache;

use crate::config::{ConfigError, SyncConfig};
use crate::errors::{Result, SyncError};
use crate::features::dispatch::{ChangeDispatcher, ChangeEvent};
use crate::features::propagation::PropagationReport;
use crate::features::registry::{IndexRegistry, PrimaryStore};
use crate::features::suspension::{
    LocalScopeStore, ScopeStore, SharedScopeStore, SuspensionGuard, SuspensionManager,
};
use crate::shared::clock::{Clock, SystemClock};
use crate::shared::models::{EntityType, Record};

pub struct SyncEngineBuilder {
    registry: Arc<IndexRegistry>,
    store: Arc<dyn PrimaryStore>,
    config: SyncConfig,
    clock: Option<Arc<dyn Clock>>,
    scope_store: Option<Arc<dyn ScopeStore>>,
    shared_cache: Option<Arc<dyn SharedCache>>,
}

impl SyncEngineBuilder {
    pub fn config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Use this scope store, ignoring `use_shared_cache`
    pub fn scope_store(mut self, store: Arc<dyn ScopeStore>) -> Self {
        self.scope_store = Some(store);
        self
    }

    /// Cache backing the scope list when `use_shared_cache` is set
    pub fn shared_cache(mut self, cache: Arc<dyn SharedCache>) -> Self {
        self.shared_cache = Some(cache);
        self
    }

    pub fn build(self) -> Result<SyncEngine> {
        self.config.validate()?;

        let scope_store: Arc<dyn ScopeStore> = match (self.scope_store, self.config.use_shared_cache)
        {
            (Some(store), _) => store,
            (None, true) => {
                let cache = self.shared_cache.ok_or(ConfigError::MissingSharedCache)?;
                Arc::new(SharedScopeStore::with_key(cache, self.config.cache_key.clone()))
            }
            (None, false) => LocalScopeStore::process_wide(),
        };
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));

        let suspension = Arc::new(SuspensionManager::new(
            Arc::clone(&self.registry),
            scope_store,
            clock,
            self.config.suspension_buffer(),
        ));
        let dispatcher = ChangeDispatcher::new(
            Arc::clone(&self.registry),
            Arc::clone(&self.store),
            Arc::clone(&suspension),
        );

        Ok(SyncEngine {
            config: self.config,
            registry: self.registry,
            suspension,
            dispatcher,
        })
    }
}

pub struct SyncEngine {
    config: SyncConfig,
    registry: Arc<IndexRegistry>,
    suspension: Arc<SuspensionManager>,
    dispatcher: ChangeDispatcher,
}

impl SyncEngine {
    pub fn builder(registry: Arc<IndexRegistry>, store: Arc<dyn PrimaryStore>) -> SyncEngineBuilder {
        SyncEngineBuilder {
            registry,
            store,
            config: SyncConfig::default(),
            clock: None,
            scope_store: None,
            shared_cache: None,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<IndexRegistry> {
        &self.registry
    }

    pub fn dispatcher(&self) -> &ChangeDispatcher {
        &self.dispatcher
    }

    pub fn suspension(&self) -> &Arc<SuspensionManager> {
        &self.suspension
    }

    pub fn dispatch(&self, event: &ChangeEvent<'_>) -> Result<Option<PropagationReport>> {
        self.dispatcher.dispatch(event)
    }

    /// Call on the failure path of a mutation whose before-event was
    /// dispatched; otherwise its snapshot stays stashed
    pub fn abandon(&self, instance: &dyn Record) -> bool {
        self.dispatcher.abandon(instance)
    }

    pub fn is_suspended(&self, ty: &EntityType) -> Result<bool> {
        self.suspension.is_suspended(ty)
    }

    /// Open a suspension scope held by the returned guard
    pub fn suspend(&self, types: Option<BTreeSet<EntityType>>) -> Result<SuspensionGuard> {
        self.open_scope(types, false)
    }

    /// Like [`suspend`](Self::suspend), but closing the guard (dropping it
    /// included) skips backfill
    pub fn suspend_permanent(
        &self,
        types: Option<BTreeSet<EntityType>>,
    ) -> Result<SuspensionGuard> {
        self.open_scope(types, true)
    }

    fn open_scope(
        &self,
        types: Option<BTreeSet<EntityType>>,
        permanent: bool,
    ) -> Result<SuspensionGuard> {
        let scope = self.suspension.enter(types)?;
        Ok(SuspensionGuard::new(
            Arc::clone(&self.suspension),
            scope,
            permanent,
        ))
    }

    /// Run `body` inside a suspension scope
    ///
    /// The scope is closed on every exit path, unwinding included, and a
    /// permanent scope never backfills. When `body` fails and
    /// closing fails too, the body's error is returned with the exit error
    /// attached.
    pub fn suspended<T, F>(
        &self,
        types: Option<BTreeSet<EntityType>>,
        permanent: bool,
        body: F,
    ) -> Result<T>
    where
        F: FnOnce() -> Result<T>,
    {
        let guard = self.open_scope(types, permanent)?;
        let outcome = body();
        let exited = guard.close().map(|_| ());

        match (outcome, exited) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(exit)) => Err(exit),
            (Err(original), Ok(())) => Err(original),
            (Err(original), Err(exit)) => Err(SyncError::ExitAfterFailure {
                original: Box::new(original),
                exit: Box::new(exit),
            }),
        }
    }
}

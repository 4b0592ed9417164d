//! Suspension manager
//!
//! Scopes are additive: a type stays suspended while any active scope
//! contains it. Entering records `start = now - buffer`; a non-permanent
//! exit backfills every index fed by the scope's types.

use chrono::Duration;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::backfill::{Backfill, BackfillReport};
use super::ports::ScopeStore;
use super::scope::SuspensionScope;
use crate::errors::{Result, SyncError};
use crate::features::registry::IndexRegistry;
use crate::shared::clock::Clock;
use crate::shared::models::EntityType;

pub struct SuspensionManager {
    registry: Arc<IndexRegistry>,
    store: Arc<dyn ScopeStore>,
    clock: Arc<dyn Clock>,
    buffer: Duration,
    backfill: Backfill,
}

impl SuspensionManager {
    pub fn new(
        registry: Arc<IndexRegistry>,
        store: Arc<dyn ScopeStore>,
        clock: Arc<dyn Clock>,
        buffer: Duration,
    ) -> Self {
        let backfill = Backfill::new(Arc::clone(&registry));
        Self {
            registry,
            store,
            clock,
            buffer,
            backfill,
        }
    }

    /// Open a scope over `types`, or over every search-eligible type when
    /// `types` is `None` or empty
    pub fn enter(&self, types: Option<BTreeSet<EntityType>>) -> Result<SuspensionScope> {
        let types = match types {
            Some(types) if !types.is_empty() => types,
            _ => self.registry.search_types(),
        };
        let scope = SuspensionScope::new(types, self.clock.now() - self.buffer);
        self.store.push(scope.clone())?;
        info!("Suspended indexing for {}", scope);
        Ok(scope)
    }

    /// Close `scope`. Returns the backfill report unless `permanent`.
    ///
    /// A shared scope list can lose a scope to a concurrent writer. The
    /// backfill still runs in that case; `ScopeNotFound` is reported once
    /// it has.
    pub fn exit(
        &self,
        scope: &SuspensionScope,
        permanent: bool,
    ) -> Result<Option<BackfillReport>> {
        let removed = self.store.remove(scope);
        if permanent {
            removed?;
            debug!("Permanent exit of {}: no backfill", scope);
            return Ok(None);
        }
        if let Err(e) = &removed {
            warn!("{}; backfilling anyway", e);
        }

        match (removed, self.backfill.run(scope)) {
            (Ok(()), Ok(report)) => {
                info!(
                    "Resumed indexing for {}: {} documents backfilled across {} indexes",
                    scope,
                    report.indexed,
                    report.indexes.len()
                );
                Ok(Some(report))
            }
            (Err(missing), Ok(report)) => {
                info!(
                    "Backfilled {} documents for lost scope {}",
                    report.indexed, scope
                );
                Err(missing)
            }
            (Ok(()), Err(e)) => Err(e),
            (Err(missing), Err(e)) => Err(SyncError::ExitAfterFailure {
                original: Box::new(missing),
                exit: Box::new(e),
            }),
        }
    }

    pub fn is_suspended(&self, ty: &EntityType) -> Result<bool> {
        self.store.is_suspended(ty)
    }

    pub fn active_scopes(&self) -> Result<Vec<SuspensionScope>> {
        self.store.snapshot()
    }

    pub fn buffer(&self) -> Duration {
        self.buffer
    }
}

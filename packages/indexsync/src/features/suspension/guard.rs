//! RAII suspension handle

use std::sync::Arc;
use tracing::error;

use super::backfill::BackfillReport;
use super::manager::SuspensionManager;
use super::scope::SuspensionScope;
use crate::errors::Result;

/// Keeps a scope active until exited or dropped
///
/// Dropping an un-exited guard (early return, `?`, panic unwind) closes the
/// scope the way the guard was opened: a regular guard backfills, a
/// permanent one does not. Failures on that path can only be logged; call
/// [`close`](Self::close) to see them.
#[must_use = "the scope closes as soon as the guard is dropped"]
pub struct SuspensionGuard {
    manager: Arc<SuspensionManager>,
    scope: SuspensionScope,
    permanent: bool,
    active: bool,
}

impl SuspensionGuard {
    pub(crate) fn new(
        manager: Arc<SuspensionManager>,
        scope: SuspensionScope,
        permanent: bool,
    ) -> Self {
        Self {
            manager,
            scope,
            permanent,
            active: true,
        }
    }

    pub fn scope(&self) -> &SuspensionScope {
        &self.scope
    }

    /// Whether closing skips backfill
    pub fn is_permanent(&self) -> bool {
        self.permanent
    }

    /// Close the scope the way the guard was opened
    pub fn close(mut self) -> Result<Option<BackfillReport>> {
        self.active = false;
        self.manager.exit(&self.scope, self.permanent)
    }

    /// Close the scope and backfill
    pub fn exit(mut self) -> Result<Option<BackfillReport>> {
        self.active = false;
        self.manager.exit(&self.scope, false)
    }

    /// Close the scope without backfill
    pub fn exit_permanent(mut self) -> Result<()> {
        self.active = false;
        self.manager.exit(&self.scope, true).map(|_| ())
    }
}

impl Drop for SuspensionGuard {
    fn drop(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;
        if let Err(e) = self.manager.exit(&self.scope, self.permanent) {
            error!("Failed to close suspension scope {}: {}", self.scope, e);
        }
    }
}

impl std::fmt::Debug for SuspensionGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SuspensionGuard")
            .field("scope", &self.scope)
            .field("permanent", &self.permanent)
            .field("active", &self.active)
            .finish()
    }
}

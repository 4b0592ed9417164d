//! Ports: scope store trait

use crate::errors::Result;
use crate::shared::models::EntityType;

use super::scope::SuspensionScope;

/// Ordered list of active suspension scopes
///
/// Scopes are pushed on enter and removed by value on exit. A type is
/// suspended while any scope in the list contains it.
pub trait ScopeStore: Send + Sync {
    fn push(&self, scope: SuspensionScope) -> Result<()>;

    /// Remove the first scope equal to `scope`
    ///
    /// Fails with `ScopeNotFound` when no scope matches: enter/exit pairing
    /// is broken.
    fn remove(&self, scope: &SuspensionScope) -> Result<()>;

    /// Active scopes in entry order
    fn snapshot(&self) -> Result<Vec<SuspensionScope>>;

    fn is_suspended(&self, ty: &EntityType) -> Result<bool> {
        Ok(self.snapshot()?.iter().any(|scope| scope.contains(ty)))
    }
}

//! Scope store backends

pub mod local;
pub mod shared;

pub use local::LocalScopeStore;
pub use shared::SharedScopeStore;

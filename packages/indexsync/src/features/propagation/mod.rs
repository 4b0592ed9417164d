//! Dependency propagation
//!
//! Dependents are captured before and after every mutation and merged by
//! set union, so both "was related, now isn't" and "wasn't related, now is"
//! get re-indexed.

pub mod dependent_set;
pub mod pending;
pub mod propagator;
pub mod resolver;

pub use dependent_set::DependentSet;
pub use pending::{PendingDependents, PendingSnapshots};
pub use propagator::{PropagationReport, Propagator};
pub use resolver::DependencyResolver;

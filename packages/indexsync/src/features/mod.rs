//! Feature slices
//!
//! Each slice owns its ports (traits at the boundary) and the logic behind
//! them:
//!
//! - `registry`: index definitions, live schema, applicability lookup
//! - `propagation`: dependent discovery, pre/post snapshot merge
//! - `suspension`: scope tracking and backfill
//! - `dispatch`: lifecycle events wired to propagation

pub mod dispatch;
pub mod propagation;
pub mod registry;
pub mod suspension;

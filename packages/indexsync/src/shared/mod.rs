//! Shared models and utilities

pub mod clock;
pub mod models;

pub use clock::{Clock, ManualClock, SystemClock};
pub use models::{EntityType, IndexKey, PrimaryKey, Record, RelationPath};

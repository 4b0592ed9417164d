//! Change dispatch: primary-store events in, propagation out

pub mod dispatcher;
pub mod events;

pub use dispatcher::{ChangeDispatcher, HookSet};
pub use events::{ChangeEvent, ChangeKind, RelationAction, RelationPhase};

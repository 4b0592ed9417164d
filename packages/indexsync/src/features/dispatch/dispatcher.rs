//! Change dispatcher
//!
//! Turns lifecycle events into pre/post propagation phases:
//!
//! | Event                        | Phase  |
//! |------------------------------|--------|
//! | before save / delete         | pre    |
//! | relation changed (before)    | pre    |
//! | after save / delete          | post   |
//! | relation changed (after)     | post   |
//!
//! Pre phases stash a dependent snapshot on the in-flight instance. Post
//! phases re-index the instance itself (unless its type is suspended or has
//! no index) and then every merged dependent. Suspension never stops
//! dependent propagation.
//!
//! Only types wired with [`ChangeDispatcher::register_entity_hooks`] are
//! handled; events for other types are ignored.

use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, trace, warn};

use super::events::{ChangeEvent, ChangeKind, RelationPhase};
use crate::errors::Result;
use crate::features::propagation::{PendingSnapshots, PropagationReport, Propagator};
use crate::features::registry::{IndexRegistry, PrimaryStore};
use crate::features::suspension::SuspensionManager;
use crate::shared::models::{EntityType, Record};

/// Event families a type is wired for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HookSet {
    pub save: bool,
    pub delete: bool,
    pub relations: bool,
}

impl HookSet {
    pub const ALL: HookSet = HookSet {
        save: true,
        delete: true,
        relations: true,
    };

    pub const NONE: HookSet = HookSet {
        save: false,
        delete: false,
        relations: false,
    };

    pub fn accepts(&self, kind: &ChangeKind) -> bool {
        match kind {
            ChangeKind::BeforeSave | ChangeKind::AfterSave => self.save,
            ChangeKind::BeforeDelete | ChangeKind::AfterDelete => self.delete,
            ChangeKind::RelationChanged { .. } => self.relations,
        }
    }
}

impl Default for HookSet {
    fn default() -> Self {
        Self::ALL
    }
}

pub struct ChangeDispatcher {
    registry: Arc<IndexRegistry>,
    store: Arc<dyn PrimaryStore>,
    propagator: Propagator,
    suspension: Arc<SuspensionManager>,
    pending: PendingSnapshots,
    hooks: DashMap<EntityType, HookSet>,
}

impl ChangeDispatcher {
    pub fn new(
        registry: Arc<IndexRegistry>,
        store: Arc<dyn PrimaryStore>,
        suspension: Arc<SuspensionManager>,
    ) -> Self {
        let propagator = Propagator::new(Arc::clone(&registry), Arc::clone(&store));
        Self {
            registry,
            store,
            propagator,
            suspension,
            pending: PendingSnapshots::new(),
            hooks: DashMap::new(),
        }
    }

    /// Wire lifecycle events of `ty`. Subtypes without their own wiring
    /// inherit it.
    pub fn register_entity_hooks(&self, ty: EntityType, hooks: HookSet) {
        debug!("Wired {} hooks: {:?}", ty, hooks);
        self.hooks.insert(ty, hooks);
    }

    /// Wire every search-eligible type and every declared dependency type.
    /// Returns the number of types wired.
    pub fn register_registry_hooks(&self) -> usize {
        let mut types = self.registry.search_types();
        for entry in self.registry.iter() {
            types.extend(entry.dependencies().keys().cloned());
        }
        let count = types.len();
        for ty in types {
            self.register_entity_hooks(ty, HookSet::ALL);
        }
        count
    }

    /// Wiring of `ty`, or of its nearest wired supertype
    pub fn hooks_for(&self, ty: &EntityType) -> Option<HookSet> {
        self.registry
            .schema()
            .ancestors(ty)
            .iter()
            .find_map(|t| self.hooks.get(t).map(|h| *h))
    }

    pub fn propagator(&self) -> &Propagator {
        &self.propagator
    }

    /// Snapshots captured by pre phases still waiting for their post phase
    pub fn pending(&self) -> &PendingSnapshots {
        &self.pending
    }

    /// Forget the pre-phase snapshot of a mutation that failed before its
    /// post phase could run
    pub fn abandon(&self, instance: &dyn Record) -> bool {
        let dropped = self.pending.discard(instance);
        if dropped {
            debug!("Dropped pending snapshot of {}", instance.entity_type());
        }
        dropped
    }

    /// Handle one event. Post phases return what was re-indexed.
    pub fn dispatch(&self, event: &ChangeEvent<'_>) -> Result<Option<PropagationReport>> {
        let runtime = event.instance.entity_type();
        if !self.registry.schema().is_subtype_of(&runtime, &event.sender) {
            warn!(
                "Event declared for {} carries a {} instance; resetting sender to {}",
                event.sender, runtime, runtime
            );
        }

        let Some(hooks) = self.hooks_for(&runtime) else {
            trace!("No hooks wired for {}", runtime);
            return Ok(None);
        };
        if !hooks.accepts(&event.kind) {
            trace!("{} not wired for {:?}", runtime, event.kind);
            return Ok(None);
        }

        let related = self.related_records(&event.kind)?;
        match event.kind.phase() {
            RelationPhase::Before => {
                let pending = self
                    .propagator
                    .before_change_with(event.instance, &related)?;
                self.pending.stash(event.instance, pending);
                Ok(None)
            }
            RelationPhase::After => {
                let pending = self.pending.take(event.instance);
                let direct = self.should_index_directly(&runtime)?;
                let report =
                    self.propagator
                        .after_change_with(event.instance, &related, pending, direct)?;
                Ok(Some(report))
            }
        }
    }

    fn should_index_directly(&self, ty: &EntityType) -> Result<bool> {
        if !self.registry.is_search_eligible(ty) {
            trace!("{} has no index", ty);
            return Ok(false);
        }
        if self.suspension.is_suspended(ty)? {
            debug!("Skipping indexing for '{}': suspended", ty);
            return Ok(false);
        }
        Ok(true)
    }

    fn related_records(&self, kind: &ChangeKind) -> Result<Vec<Arc<dyn Record>>> {
        match kind {
            ChangeKind::RelationChanged {
                related_type,
                related_keys,
                ..
            } if !related_keys.is_empty() => self.store.load(related_type, related_keys),
            _ => Ok(Vec::new()),
        }
    }
}

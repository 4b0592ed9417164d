//! Primary-store lifecycle events

use std::collections::BTreeSet;

use crate::shared::models::{EntityType, PrimaryKey, Record};

/// Which side of the mutation an event fires on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationPhase {
    Before,
    After,
}

/// Link operation of a relation change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationAction {
    Add,
    Remove,
    /// Every link of the relation dropped at once
    Clear,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeKind {
    BeforeSave,
    AfterSave,
    BeforeDelete,
    AfterDelete,
    RelationChanged {
        phase: RelationPhase,
        action: RelationAction,
        /// Type on the other side of the relation
        related_type: EntityType,
        /// Keys on the other side being linked or unlinked (may be empty
        /// for `Clear`)
        related_keys: BTreeSet<PrimaryKey>,
    },
}

impl ChangeKind {
    pub fn phase(&self) -> RelationPhase {
        match self {
            ChangeKind::BeforeSave | ChangeKind::BeforeDelete => RelationPhase::Before,
            ChangeKind::AfterSave | ChangeKind::AfterDelete => RelationPhase::After,
            ChangeKind::RelationChanged { phase, .. } => *phase,
        }
    }
}

/// One lifecycle event delivered by the primary store
///
/// `sender` is the type the event was declared for; the instance carries
/// its concrete runtime type, which wins when the two disagree.
#[derive(Debug, Clone)]
pub struct ChangeEvent<'a> {
    pub sender: EntityType,
    pub instance: &'a dyn Record,
    pub kind: ChangeKind,
}

impl<'a> ChangeEvent<'a> {
    pub fn new(sender: EntityType, instance: &'a dyn Record, kind: ChangeKind) -> Self {
        Self {
            sender,
            instance,
            kind,
        }
    }

    /// Event declared for the instance's own type
    fn own(instance: &'a dyn Record, kind: ChangeKind) -> Self {
        Self::new(instance.entity_type(), instance, kind)
    }

    pub fn before_save(instance: &'a dyn Record) -> Self {
        Self::own(instance, ChangeKind::BeforeSave)
    }

    pub fn after_save(instance: &'a dyn Record) -> Self {
        Self::own(instance, ChangeKind::AfterSave)
    }

    pub fn before_delete(instance: &'a dyn Record) -> Self {
        Self::own(instance, ChangeKind::BeforeDelete)
    }

    pub fn after_delete(instance: &'a dyn Record) -> Self {
        Self::own(instance, ChangeKind::AfterDelete)
    }

    pub fn relation_changed(
        instance: &'a dyn Record,
        phase: RelationPhase,
        action: RelationAction,
        related_type: EntityType,
        related_keys: impl IntoIterator<Item = PrimaryKey>,
    ) -> Self {
        Self::own(
            instance,
            ChangeKind::RelationChanged {
                phase,
                action,
                related_type,
                related_keys: related_keys.into_iter().collect(),
            },
        )
    }

    /// Override the declared sender type
    pub fn with_sender(mut self, sender: EntityType) -> Self {
        self.sender = sender;
        self
    }
}

//! In-memory primary store
//!
//! Test-grade relational store: rows with JSON fields, foreign-key and
//! many-to-many relations, modification timestamps. Primary keys are
//! integers drawn from one counter shared by every type, so a subtype row
//! and its supertype view share a key.
//!
//! Deleting a row drops every link touching it. That is exactly the case
//! where dependents are only reachable before the delete.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::any::Any;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use crate::errors::{Result, SyncError};
use crate::features::registry::{PrimaryStore, Schema};
use crate::shared::clock::{Clock, SystemClock};
use crate::shared::models::{EntityType, PrimaryKey, Record, RelationPath};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    /// At most one target per owner
    ForeignKey,
    ManyToMany,
}

#[derive(Debug, Clone)]
struct RelationDef {
    target: EntityType,
    kind: RelationKind,
}

type RelationKey = (EntityType, String);

/// A row, saved or not
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    entity_type: EntityType,
    pk: Option<PrimaryKey>,
    fields: Map<String, Value>,
    modified_at: Option<DateTime<Utc>>,
}

impl StoredRecord {
    /// Unsaved row
    pub fn new(entity_type: EntityType) -> Self {
        Self {
            entity_type,
            pk: None,
            fields: Map::new(),
            modified_at: None,
        }
    }

    pub fn with_field(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: &str, value: impl Into<Value>) {
        self.fields.insert(name.to_string(), value.into());
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn key(&self) -> Option<&PrimaryKey> {
        self.pk.as_ref()
    }
}

impl Record for StoredRecord {
    fn entity_type(&self) -> EntityType {
        self.entity_type.clone()
    }

    fn primary_key(&self) -> Option<PrimaryKey> {
        self.pk.clone()
    }

    fn modified_at(&self) -> Option<DateTime<Utc>> {
        self.modified_at
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug, Default)]
struct StoreState {
    next_pk: i64,
    rows: BTreeMap<PrimaryKey, StoredRecord>,
    relations: HashMap<RelationKey, RelationDef>,
    /// (owner key, target key) pairs per relation
    links: HashMap<RelationKey, BTreeSet<(PrimaryKey, PrimaryKey)>>,
}

pub struct InMemoryStore {
    schema: Arc<Schema>,
    clock: Arc<dyn Clock>,
    state: RwLock<StoreState>,
}

impl InMemoryStore {
    pub fn new(schema: Arc<Schema>) -> Self {
        Self::with_clock(schema, Arc::new(SystemClock))
    }

    pub fn with_clock(schema: Arc<Schema>, clock: Arc<dyn Clock>) -> Self {
        Self {
            schema,
            clock,
            state: RwLock::new(StoreState {
                next_pk: 1,
                ..StoreState::default()
            }),
        }
    }

    pub fn define_foreign_key(&self, owner: &EntityType, field: &str, target: &EntityType) {
        self.define(owner, field, target, RelationKind::ForeignKey);
    }

    pub fn define_many_to_many(&self, owner: &EntityType, field: &str, target: &EntityType) {
        self.define(owner, field, target, RelationKind::ManyToMany);
    }

    fn define(&self, owner: &EntityType, field: &str, target: &EntityType, kind: RelationKind) {
        let key = (owner.clone(), field.to_string());
        let mut state = self.state.write();
        state.relations.insert(
            key.clone(),
            RelationDef {
                target: target.clone(),
                kind,
            },
        );
        state.links.entry(key).or_default();
    }

    /// Insert or update `record`, assigning a key on first save and
    /// stamping the modification time
    pub fn save(&self, record: &mut StoredRecord) -> Result<()> {
        let mut state = self.state.write();
        let pk = match &record.pk {
            Some(pk) => pk.clone(),
            None => {
                let pk = PrimaryKey::Int(state.next_pk);
                state.next_pk += 1;
                record.pk = Some(pk.clone());
                pk
            }
        };
        record.modified_at = Some(self.clock.now());
        state.rows.insert(pk, record.clone());
        Ok(())
    }

    /// Remove the row and every link touching it. Returns whether it existed.
    pub fn delete(&self, record: &StoredRecord) -> Result<bool> {
        let pk = record
            .pk
            .clone()
            .ok_or_else(|| SyncError::store("cannot delete an unsaved record"))?;
        let mut state = self.state.write();
        let existed = state.rows.remove(&pk).is_some();
        for pairs in state.links.values_mut() {
            pairs.retain(|(owner, target)| *owner != pk && *target != pk);
        }
        Ok(existed)
    }

    /// Current row of type `ty` (or a subtype) with key `pk`
    pub fn get(&self, ty: &EntityType, pk: &PrimaryKey) -> Option<StoredRecord> {
        let state = self.state.read();
        state
            .rows
            .get(pk)
            .filter(|row| self.schema.is_subtype_of(&row.entity_type, ty))
            .cloned()
    }

    /// Point a foreign key at `target`, or clear it with `None`
    pub fn set_foreign_key(
        &self,
        owner: &StoredRecord,
        field: &str,
        target: Option<&PrimaryKey>,
    ) -> Result<()> {
        let owner_pk = Self::saved_key(owner)?;
        let mut state = self.state.write();
        let (key, def) = self.relation(&state, &owner.entity_type, field)?;
        if def.kind != RelationKind::ForeignKey {
            return Err(SyncError::store(format!(
                "{}.{} is not a foreign key",
                owner.entity_type, field
            )));
        }
        let pairs = state.links.entry(key).or_default();
        pairs.retain(|(o, _)| *o != owner_pk);
        if let Some(target) = target {
            pairs.insert((owner_pk, target.clone()));
        }
        Ok(())
    }

    /// Link `owner` to each of `targets` through a many-to-many relation
    pub fn add_links(
        &self,
        owner: &StoredRecord,
        field: &str,
        targets: impl IntoIterator<Item = PrimaryKey>,
    ) -> Result<()> {
        let owner_pk = Self::saved_key(owner)?;
        let mut state = self.state.write();
        let (key, _) = self.many_to_many(&state, &owner.entity_type, field)?;
        let pairs = state.links.entry(key).or_default();
        for target in targets {
            pairs.insert((owner_pk.clone(), target));
        }
        Ok(())
    }

    pub fn remove_links(
        &self,
        owner: &StoredRecord,
        field: &str,
        targets: impl IntoIterator<Item = PrimaryKey>,
    ) -> Result<()> {
        let owner_pk = Self::saved_key(owner)?;
        let mut state = self.state.write();
        let (key, _) = self.many_to_many(&state, &owner.entity_type, field)?;
        let pairs = state.links.entry(key).or_default();
        for target in targets {
            pairs.remove(&(owner_pk.clone(), target));
        }
        Ok(())
    }

    /// Drop every link of `owner` through `field`. Returns the unlinked keys.
    pub fn clear_links(&self, owner: &StoredRecord, field: &str) -> Result<BTreeSet<PrimaryKey>> {
        let owner_pk = Self::saved_key(owner)?;
        let mut state = self.state.write();
        let (key, _) = self.relation(&state, &owner.entity_type, field)?;
        let pairs = state.links.entry(key).or_default();
        let removed: BTreeSet<PrimaryKey> = pairs
            .iter()
            .filter(|(o, _)| *o == owner_pk)
            .map(|(_, t)| t.clone())
            .collect();
        pairs.retain(|(o, _)| *o != owner_pk);
        Ok(removed)
    }

    /// Rows reached from `owner` through `field`
    pub fn related(&self, owner: &StoredRecord, field: &str) -> Result<Vec<StoredRecord>> {
        let Some(owner_pk) = owner.pk.as_ref() else {
            return Ok(Vec::new());
        };
        let state = self.state.read();
        let (key, _) = self.relation(&state, &owner.entity_type, field)?;
        Ok(state
            .links
            .get(&key)
            .into_iter()
            .flatten()
            .filter(|(o, _)| o == owner_pk)
            .filter_map(|(_, t)| state.rows.get(t).cloned())
            .collect())
    }

    /// Rows of `ty` (or a subtype) modified at or after `since`, in key
    /// order, at most `limit`
    pub fn query(
        &self,
        ty: &EntityType,
        since: Option<DateTime<Utc>>,
        limit: Option<usize>,
    ) -> Vec<StoredRecord> {
        let state = self.state.read();
        state
            .rows
            .values()
            .filter(|row| self.schema.is_subtype_of(&row.entity_type, ty))
            .filter(|row| match (since, row.modified_at) {
                (Some(since), Some(at)) => at >= since,
                (Some(_), None) => false,
                (None, _) => true,
            })
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.state.read().rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn saved_key(record: &StoredRecord) -> Result<PrimaryKey> {
        record.pk.clone().ok_or_else(|| {
            SyncError::store(format!("unsaved {} has no relations", record.entity_type))
        })
    }

    /// Relation `field` declared on `ty` or its nearest supertype
    fn relation(
        &self,
        state: &StoreState,
        ty: &EntityType,
        field: &str,
    ) -> Result<(RelationKey, RelationDef)> {
        self.schema
            .ancestors(ty)
            .into_iter()
            .find_map(|owner| {
                let key = (owner, field.to_string());
                state.relations.get(&key).cloned().map(|def| (key, def))
            })
            .ok_or_else(|| SyncError::store(format!("{} has no relation '{}'", ty, field)))
    }

    fn many_to_many(
        &self,
        state: &StoreState,
        ty: &EntityType,
        field: &str,
    ) -> Result<(RelationKey, RelationDef)> {
        let (key, def) = self.relation(state, ty, field)?;
        if def.kind != RelationKind::ManyToMany {
            return Err(SyncError::store(format!(
                "{}.{} is not a many-to-many relation",
                ty, field
            )));
        }
        Ok((key, def))
    }

    /// Keys reached by following `segments` from one row
    fn follow(
        &self,
        state: &StoreState,
        start: (&EntityType, &PrimaryKey),
        segments: &[&str],
    ) -> Result<BTreeSet<PrimaryKey>> {
        let mut frontier: Vec<(EntityType, PrimaryKey)> = vec![(start.0.clone(), start.1.clone())];
        for segment in segments {
            let mut next = Vec::new();
            for (ty, pk) in &frontier {
                let (key, def) = self.relation(state, ty, segment)?;
                let Some(pairs) = state.links.get(&key) else {
                    continue;
                };
                for (_, target) in pairs.iter().filter(|(o, _)| o == pk) {
                    let target_ty = state
                        .rows
                        .get(target)
                        .map(|row| row.entity_type.clone())
                        .unwrap_or_else(|| def.target.clone());
                    next.push((target_ty, target.clone()));
                }
            }
            frontier = next;
        }
        Ok(frontier.into_iter().map(|(_, pk)| pk).collect())
    }
}

impl PrimaryStore for InMemoryStore {
    fn related_keys(
        &self,
        root: &EntityType,
        path: &RelationPath,
        instance: &dyn Record,
    ) -> Result<BTreeSet<PrimaryKey>> {
        let Some(target) = instance.primary_key() else {
            return Ok(BTreeSet::new());
        };
        let segments: Vec<&str> = path.segments().collect();
        if segments.is_empty() {
            return Err(SyncError::store(format!("empty relation path for {}", root)));
        }

        let state = self.state.read();
        let mut keys = BTreeSet::new();
        for row in state.rows.values() {
            if !self.schema.is_subtype_of(&row.entity_type, root) {
                continue;
            }
            let Some(pk) = row.pk.as_ref() else {
                continue;
            };
            if self
                .follow(&state, (&row.entity_type, pk), &segments)?
                .contains(&target)
            {
                keys.insert(pk.clone());
            }
        }
        Ok(keys)
    }

    fn load(
        &self,
        root: &EntityType,
        keys: &BTreeSet<PrimaryKey>,
    ) -> Result<Vec<Arc<dyn Record>>> {
        let state = self.state.read();
        Ok(keys
            .iter()
            .filter_map(|pk| state.rows.get(pk))
            .filter(|row| self.schema.is_subtype_of(&row.entity_type, root))
            .map(|row| Arc::new(row.clone()) as Arc<dyn Record>)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::clock::ManualClock;
    use chrono::{Duration, TimeZone};

    fn ty(model: &str) -> EntityType {
        EntityType::new("library", model)
    }

    fn store() -> (InMemoryStore, Arc<ManualClock>) {
        let schema = Arc::new(Schema::with_types([ty("author"), ty("book"), ty("tag")]));
        schema.register_subtype(ty("ebook"), ty("book"));
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        ));
        let store = InMemoryStore::with_clock(schema, clock.clone());
        store.define_foreign_key(&ty("book"), "author", &ty("author"));
        store.define_many_to_many(&ty("book"), "tags", &ty("tag"));
        (store, clock)
    }

    fn saved(store: &InMemoryStore, model: &str) -> StoredRecord {
        let mut record = StoredRecord::new(ty(model));
        store.save(&mut record).unwrap();
        record
    }

    #[test]
    fn test_related_keys_follow_foreign_key_and_subtypes() {
        let (store, _) = store();
        let author = saved(&store, "author");
        let book = saved(&store, "book");
        let ebook = saved(&store, "ebook");
        store.set_foreign_key(&book, "author", author.key()).unwrap();
        store.set_foreign_key(&ebook, "author", author.key()).unwrap();

        let keys = store
            .related_keys(&ty("book"), &RelationPath::from("author"), &author)
            .unwrap();
        assert_eq!(
            keys,
            BTreeSet::from([book.primary_key().unwrap(), ebook.primary_key().unwrap()])
        );
    }

    #[test]
    fn test_delete_drops_links() {
        let (store, _) = store();
        let book = saved(&store, "book");
        let tag = saved(&store, "tag");
        store
            .add_links(&book, "tags", [tag.primary_key().unwrap()])
            .unwrap();

        assert!(store.delete(&tag).unwrap());
        assert!(store.related(&book, "tags").unwrap().is_empty());
        assert!(store
            .related_keys(&ty("book"), &RelationPath::from("tags"), &tag)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_query_since_and_limit() {
        let (store, clock) = store();
        saved(&store, "book");
        clock.advance(Duration::minutes(5));
        let cutoff = clock.now();
        let second = saved(&store, "book");
        saved(&store, "ebook");

        let recent = store.query(&ty("book"), Some(cutoff), None);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].key(), second.key());
        assert_eq!(store.query(&ty("book"), None, Some(1)).len(), 1);
        assert_eq!(store.query(&ty("ebook"), None, None).len(), 1);
    }

    #[test]
    fn test_relation_kind_is_enforced() {
        let (store, _) = store();
        let book = saved(&store, "book");

        assert!(store.add_links(&book, "author", [PrimaryKey::Int(9)]).is_err());
        assert!(store.set_foreign_key(&book, "tags", None).is_err());
        assert!(store.related(&book, "publisher").is_err());
    }
}

//! In-memory index
//!
//! An [`IndexDefinition`] whose backend is a map of documents. Every call
//! is recorded so tests can assert on backend traffic. Documents are built
//! from the current store row; a row that no longer exists removes its
//! document.

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::trace;

use super::memory_store::{InMemoryStore, StoredRecord};
use crate::errors::{Result, SyncError};
use crate::features::registry::{DependencyMap, IndexDefinition, RecordQuery};
use crate::shared::models::{EntityType, IndexKey, PrimaryKey, Record, RelationPath};

/// Backend operation observed by an [`InMemoryIndex`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexCall {
    PutMapping,
    IndexInstance(PrimaryKey),
    Count {
        since: Option<DateTime<Utc>>,
        limit: Option<usize>,
    },
    IndexBatch {
        since: Option<DateTime<Utc>>,
        limit: Option<usize>,
        indexed: usize,
    },
}

pub type DocumentBuilder = dyn Fn(&StoredRecord, &InMemoryStore) -> Value + Send + Sync;

pub struct InMemoryIndex {
    key: IndexKey,
    dependencies: DependencyMap,
    store: Arc<InMemoryStore>,
    builder: Box<DocumentBuilder>,
    documents: RwLock<BTreeMap<PrimaryKey, Value>>,
    calls: Mutex<Vec<IndexCall>>,
    fail_next: Mutex<Option<String>>,
}

impl InMemoryIndex {
    pub fn new(entity_type: EntityType, name: &str, store: Arc<InMemoryStore>) -> Self {
        Self {
            key: IndexKey::new(entity_type, name),
            dependencies: DependencyMap::new(),
            store,
            builder: Box::new(|record: &StoredRecord, _: &InMemoryStore| default_document(record)),
            documents: RwLock::new(BTreeMap::new()),
            calls: Mutex::new(Vec::new()),
            fail_next: Mutex::new(None),
        }
    }

    /// Declare that documents read `ty`, reached from the root via `path`
    pub fn depends_on(mut self, ty: EntityType, path: &str) -> Self {
        self.dependencies.insert(ty, RelationPath::from(path));
        self
    }

    pub fn with_document(
        mut self,
        builder: impl Fn(&StoredRecord, &InMemoryStore) -> Value + Send + Sync + 'static,
    ) -> Self {
        self.builder = Box::new(builder);
        self
    }

    /// Make the next backend write fail with `message`
    pub fn fail_next(&self, message: impl Into<String>) {
        *self.fail_next.lock() = Some(message.into());
    }

    pub fn document(&self, pk: &PrimaryKey) -> Option<Value> {
        self.documents.read().get(pk).cloned()
    }

    pub fn documents(&self) -> BTreeMap<PrimaryKey, Value> {
        self.documents.read().clone()
    }

    pub fn calls(&self) -> Vec<IndexCall> {
        self.calls.lock().clone()
    }

    /// Keys passed to `index_instance`, in call order
    pub fn indexed_keys(&self) -> Vec<PrimaryKey> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                IndexCall::IndexInstance(pk) => Some(pk.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    fn record_call(&self, call: IndexCall) {
        trace!("{}: {:?}", self.key, call);
        self.calls.lock().push(call);
    }

    fn check_failure(&self) -> Result<()> {
        match self.fail_next.lock().take() {
            Some(message) => Err(SyncError::index(&self.key, message)),
            None => Ok(()),
        }
    }

    fn upsert(&self, row: &StoredRecord) {
        if let Some(pk) = row.key() {
            let document = (self.builder)(row, self.store.as_ref());
            self.documents.write().insert(pk.clone(), document);
        }
    }
}

fn default_document(record: &StoredRecord) -> Value {
    let mut document = Value::Object(record.fields().clone());
    if let Some(pk) = record.key() {
        document["id"] = json!(pk);
    }
    document
}

impl IndexDefinition for InMemoryIndex {
    fn entity_type(&self) -> EntityType {
        self.key.entity_type.clone()
    }

    fn name(&self) -> &str {
        &self.key.name
    }

    fn key(&self) -> IndexKey {
        self.key.clone()
    }

    fn dependencies(&self) -> DependencyMap {
        self.dependencies.clone()
    }

    fn count(&self, query: &RecordQuery) -> Result<usize> {
        self.record_call(IndexCall::Count {
            since: query.since,
            limit: query.limit,
        });
        Ok(self
            .store
            .query(query.entity_type(), query.since, query.limit)
            .len())
    }

    fn index_instance(&self, record: &dyn Record) -> Result<()> {
        self.check_failure()?;
        if record.as_any().downcast_ref::<StoredRecord>().is_none() {
            return Err(SyncError::index(
                &self.key,
                format!("{} is not an in-memory store record", record.entity_type()),
            ));
        }
        let pk = record
            .primary_key()
            .ok_or_else(|| SyncError::index(&self.key, "cannot index an unsaved record"))?;
        self.record_call(IndexCall::IndexInstance(pk.clone()));

        match self.store.get(&self.key.entity_type, &pk) {
            Some(current) => self.upsert(&current),
            None => {
                self.documents.write().remove(&pk);
            }
        }
        Ok(())
    }

    fn index_batch(&self, query: &RecordQuery) -> Result<usize> {
        self.check_failure()?;
        let rows = self
            .store
            .query(query.entity_type(), query.since, query.limit);
        for row in &rows {
            self.upsert(row);
        }
        self.record_call(IndexCall::IndexBatch {
            since: query.since,
            limit: query.limit,
            indexed: rows.len(),
        });
        Ok(rows.len())
    }

    fn put_mapping(&self) -> Result<()> {
        self.check_failure()?;
        self.documents.write().clear();
        self.record_call(IndexCall::PutMapping);
        Ok(())
    }
}

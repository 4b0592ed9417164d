//! Library fixture
//!
//! ```text
//! publisher <-publisher- author <-author- book -tags-> tag
//!                                           ^
//!                                         ebook (subtype)
//! ```
//!
//! Indexes:
//! - `library.book.books`: title, author name, publisher name, tag names
//! - `library.author.authors`: name, publisher name

use chrono::{TimeZone, Utc};
use indexsync::infrastructure::{InMemoryIndex, InMemoryStore, StoredRecord};
use indexsync::{
    ChangeEvent, Clock, EntityType, IndexDefinition, IndexRegistry, LocalScopeStore, ManualClock,
    PrimaryKey, PropagationReport, RelationAction, RelationPhase, Schema, SyncConfig, SyncEngine,
};
use indexsync_storage::SharedCache;
use serde_json::{json, Value};
use std::sync::Arc;

pub fn ty(model: &str) -> EntityType {
    EntityType::new("library", model)
}

fn name_of(record: &StoredRecord) -> Option<String> {
    record
        .field("name")
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn first_related(store: &InMemoryStore, record: &StoredRecord, field: &str) -> Option<StoredRecord> {
    store
        .related(record, field)
        .ok()
        .and_then(|rows| rows.into_iter().next())
}

fn book_document(book: &StoredRecord, store: &InMemoryStore) -> Value {
    let author = first_related(store, book, "author");
    let publisher = author
        .as_ref()
        .and_then(|a| first_related(store, a, "publisher"));
    let tags: Vec<String> = store
        .related(book, "tags")
        .unwrap_or_default()
        .iter()
        .filter_map(name_of)
        .collect();

    json!({
        "title": book.field("title"),
        "author": author.as_ref().and_then(name_of),
        "publisher": publisher.as_ref().and_then(name_of),
        "tags": tags,
    })
}

fn author_document(author: &StoredRecord, store: &InMemoryStore) -> Value {
    let publisher = first_related(store, author, "publisher");
    json!({
        "name": author.field("name"),
        "publisher": publisher.as_ref().and_then(name_of),
    })
}

pub struct Library {
    pub clock: Arc<ManualClock>,
    pub schema: Arc<Schema>,
    pub store: Arc<InMemoryStore>,
    pub books: Arc<InMemoryIndex>,
    pub authors: Arc<InMemoryIndex>,
    pub registry: Arc<IndexRegistry>,
    pub engine: SyncEngine,
}

impl Library {
    pub fn new() -> Self {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap(),
        ));

        let schema = Arc::new(Schema::with_types([
            ty("publisher"),
            ty("author"),
            ty("book"),
            ty("tag"),
        ]));
        schema.register_subtype(ty("ebook"), ty("book"));

        let store = Arc::new(InMemoryStore::with_clock(
            Arc::clone(&schema),
            clock.clone(),
        ));
        store.define_foreign_key(&ty("author"), "publisher", &ty("publisher"));
        store.define_foreign_key(&ty("book"), "author", &ty("author"));
        store.define_many_to_many(&ty("book"), "tags", &ty("tag"));

        let books = Arc::new(
            InMemoryIndex::new(ty("book"), "books", Arc::clone(&store))
                .depends_on(ty("author"), "author")
                .depends_on(ty("publisher"), "author__publisher")
                .depends_on(ty("tag"), "tags")
                .with_document(book_document),
        );
        let authors = Arc::new(
            InMemoryIndex::new(ty("author"), "authors", Arc::clone(&store))
                .depends_on(ty("publisher"), "publisher")
                .with_document(author_document),
        );

        let registry = Arc::new(
            IndexRegistry::builder()
                .register(Arc::clone(&books) as Arc<dyn IndexDefinition>)
                .register(Arc::clone(&authors) as Arc<dyn IndexDefinition>)
                .build(Arc::clone(&schema))
                .unwrap(),
        );

        let engine = SyncEngine::builder(Arc::clone(&registry), store.clone())
            .clock(clock.clone())
            .scope_store(Arc::new(LocalScopeStore::new()))
            .build()
            .unwrap();
        engine.dispatcher().register_registry_hooks();

        Self {
            clock,
            schema,
            store,
            books,
            authors,
            registry,
            engine,
        }
    }

    /// Another engine over the same store and registry, as a second
    /// worker process would build it
    pub fn worker(&self, config: SyncConfig, cache: Arc<dyn SharedCache>) -> SyncEngine {
        let engine = SyncEngine::builder(Arc::clone(&self.registry), self.store.clone())
            .config(config)
            .clock(self.clock.clone())
            .shared_cache(cache)
            .build()
            .unwrap();
        engine.dispatcher().register_registry_hooks();
        engine
    }

    pub fn now(&self) -> chrono::DateTime<Utc> {
        self.clock.now()
    }

    pub fn reset_calls(&self) {
        self.books.clear_calls();
        self.authors.clear_calls();
    }

    // ------------------------------------------------------------------
    // Store mutations wrapped in lifecycle events
    // ------------------------------------------------------------------

    pub fn create(&self, model: &str, fields: &[(&str, &str)]) -> StoredRecord {
        self.create_with(&self.engine, model, fields)
    }

    pub fn create_with(
        &self,
        engine: &SyncEngine,
        model: &str,
        fields: &[(&str, &str)],
    ) -> StoredRecord {
        let mut record = StoredRecord::new(ty(model));
        for (name, value) in fields {
            record.set(name, *value);
        }
        self.save_with(engine, &mut record);
        record
    }

    pub fn save(&self, record: &mut StoredRecord) -> Option<PropagationReport> {
        self.save_with(&self.engine, record)
    }

    pub fn save_with(
        &self,
        engine: &SyncEngine,
        record: &mut StoredRecord,
    ) -> Option<PropagationReport> {
        engine.dispatch(&ChangeEvent::before_save(&*record)).unwrap();
        self.store.save(record).unwrap();
        engine.dispatch(&ChangeEvent::after_save(&*record)).unwrap()
    }

    /// Save after pointing a foreign key elsewhere
    pub fn set_foreign_key(
        &self,
        record: &mut StoredRecord,
        field: &str,
        target: &StoredRecord,
    ) -> Option<PropagationReport> {
        self.engine
            .dispatch(&ChangeEvent::before_save(&*record))
            .unwrap();
        self.store
            .set_foreign_key(record, field, target.key())
            .unwrap();
        self.store.save(record).unwrap();
        self.engine
            .dispatch(&ChangeEvent::after_save(&*record))
            .unwrap()
    }

    pub fn delete(&self, record: &StoredRecord) -> Option<PropagationReport> {
        self.engine
            .dispatch(&ChangeEvent::before_delete(record))
            .unwrap();
        self.store.delete(record).unwrap();
        self.engine
            .dispatch(&ChangeEvent::after_delete(record))
            .unwrap()
    }

    pub fn add_tags(&self, book: &StoredRecord, tags: &[&StoredRecord]) -> Option<PropagationReport> {
        let keys = keys_of(tags);
        self.relation(book, RelationAction::Add, keys.clone(), |store| {
            store.add_links(book, "tags", keys).unwrap();
        })
    }

    pub fn remove_tags(
        &self,
        book: &StoredRecord,
        tags: &[&StoredRecord],
    ) -> Option<PropagationReport> {
        let keys = keys_of(tags);
        self.relation(book, RelationAction::Remove, keys.clone(), |store| {
            store.remove_links(book, "tags", keys).unwrap();
        })
    }

    /// Clear all tags; both phases carry the keys linked before the clear
    pub fn clear_tags(&self, book: &StoredRecord) -> Option<PropagationReport> {
        let keys: Vec<PrimaryKey> = self
            .store
            .related(book, "tags")
            .unwrap()
            .iter()
            .map(pk)
            .collect();
        self.relation(book, RelationAction::Clear, keys, |store| {
            store.clear_links(book, "tags").unwrap();
        })
    }

    fn relation(
        &self,
        book: &StoredRecord,
        action: RelationAction,
        keys: Vec<PrimaryKey>,
        mutate: impl FnOnce(&InMemoryStore),
    ) -> Option<PropagationReport> {
        self.engine
            .dispatch(&ChangeEvent::relation_changed(
                book,
                RelationPhase::Before,
                action,
                ty("tag"),
                keys.clone(),
            ))
            .unwrap();
        mutate(self.store.as_ref());
        self.engine
            .dispatch(&ChangeEvent::relation_changed(
                book,
                RelationPhase::After,
                action,
                ty("tag"),
                keys,
            ))
            .unwrap()
    }
}

pub fn pk(record: &StoredRecord) -> PrimaryKey {
    record.key().cloned().expect("record is saved")
}

pub fn keys_of(records: &[&StoredRecord]) -> Vec<PrimaryKey> {
    records.iter().map(|r| pk(r)).collect()
}

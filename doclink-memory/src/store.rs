//! In-memory engine implementation.
//!
//! Collections are kept as ordered maps from surrogate key to physical record, guarded by an
//! async-safe read-write lock. Keys are assigned per collection, starting at 1, and are never
//! reused while the collection exists.

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    path::PathBuf,
    sync::{Arc, atomic::{AtomicBool, Ordering}},
    time::Duration,
};
use async_trait::async_trait;
use bson::{Bson, Document, doc};
use mea::{mutex::Mutex, rwlock::RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use doclink_core::{
    engine::{CollectionOptions, KEY_FIELD, META_FIELD, NativeQuery, SortDirection, StoreEngine, StoreEngineBuilder},
    error::{EngineError, EngineResult},
};

use crate::{
    evaluator::{Comparable, PredicateEvaluator},
    persistence::{CollectionSnapshot, Snapshot, spawn_autosave},
};

type StoreMap = HashMap<String, StoredCollection>;


/// One collection: its options, the next key to hand out, and its records by key.
#[derive(Debug, Clone)]
pub(crate) struct StoredCollection {
    options: CollectionOptions,
    next_key: i64,
    records: BTreeMap<i64, Document>,
}

impl StoredCollection {
    fn new(options: CollectionOptions) -> Self {
        Self { options, next_key: 1, records: BTreeMap::new() }
    }

    /// Checks that storing `candidates` (replacing any records with the same keys) keeps
    /// every unique field unique. Null and missing values are not constrained.
    fn check_unique(&self, collection: &str, candidates: &[Document]) -> EngineResult<()> {
        if self.options.unique.is_empty() {
            return Ok(());
        }

        let replaced = candidates
            .iter()
            .filter_map(record_key)
            .collect::<HashSet<_>>();

        for field in &self.options.unique {
            let mut seen = self
                .records
                .iter()
                .filter(|(key, _)| !replaced.contains(*key))
                .filter_map(|(_, record)| unique_value(record.get(field)))
                .collect::<HashSet<_>>();

            for candidate in candidates {
                let Some(value) = unique_value(candidate.get(field)) else {
                    continue;
                };

                if !seen.insert(value) {
                    return Err(EngineError::UniqueViolation {
                        collection: collection.to_string(),
                        field: field.clone(),
                        value: candidate.get(field).map(Bson::to_string).unwrap_or_default(),
                    });
                }
            }
        }

        Ok(())
    }

    fn snapshot(&self, name: &str) -> CollectionSnapshot {
        CollectionSnapshot {
            name: name.to_string(),
            unique: self.options.unique.clone(),
            next_key: self.next_key,
            records: self.records.values().cloned().collect(),
        }
    }

    fn restore(snapshot: CollectionSnapshot) -> EngineResult<(String, Self)> {
        let mut records = BTreeMap::new();

        for record in snapshot.records {
            let key = record_key(&record).ok_or_else(|| {
                EngineError::Persistence(format!("record without key in collection {}", snapshot.name))
            })?;
            records.insert(key, record);
        }

        // Never hand out a key that is already on disk, whatever the stored counter says.
        let after_last = match records.keys().next_back() {
            Some(last) => last.checked_add(1).ok_or_else(|| {
                EngineError::Persistence(format!("key space exhausted in collection {}", snapshot.name))
            })?,
            None => 1,
        };
        let next_key = after_last.max(snapshot.next_key);

        Ok((
            snapshot.name,
            Self {
                options: CollectionOptions { unique: snapshot.unique },
                next_key,
                records,
            },
        ))
    }
}

fn record_key(record: &Document) -> Option<i64> {
    match record.get(KEY_FIELD)? {
        Bson::Int64(key) => Some(*key),
        Bson::Int32(key) => Some(i64::from(*key)),
        _ => None,
    }
}

// Hashable identity of a value for uniqueness checks. Integers key on their exact value and
// integral doubles within i64 range share that key.
fn unique_value(value: Option<&Bson>) -> Option<String> {
    match value? {
        Bson::Null => None,
        Bson::Int32(n) => Some(format!("i:{n}")),
        Bson::Int64(n) => Some(format!("i:{n}")),
        Bson::Double(n) if n.fract() == 0.0 && *n >= i64::MIN as f64 && *n < i64::MAX as f64 => {
            Some(format!("i:{}", *n as i64))
        }
        Bson::Double(n) => Some(format!("d:{n}")),
        Bson::String(s) => Some(format!("s:{s}")),
        other => Some(format!("o:{other}")),
    }
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}


/// Shared state behind every clone of a [`MemoryEngine`].
#[derive(Debug)]
pub(crate) struct EngineState {
    /// The main storage map: collection name -> collection
    collections: RwLock<StoreMap>,
    /// Set by every mutation, cleared when a snapshot is taken
    pub(crate) dirty: AtomicBool,
    /// Snapshot file, if persistence is enabled
    path: Option<PathBuf>,
    autosave: Mutex<Option<JoinHandle<()>>>,
}

impl EngineState {
    fn new(path: Option<PathBuf>) -> Self {
        Self {
            collections: RwLock::new(StoreMap::new()),
            dirty: AtomicBool::new(false),
            path,
            autosave: Mutex::new(None),
        }
    }

    fn touch(&self) {
        self.dirty.store(true, Ordering::Release);
    }

    async fn snapshot(&self) -> Snapshot {
        let store = self.collections.read().await;

        let mut collections = store
            .iter()
            .map(|(name, collection)| collection.snapshot(name))
            .collect::<Vec<_>>();
        collections.sort_by(|a, b| a.name.cmp(&b.name));

        Snapshot { collections }
    }

    /// Writes the current state to the snapshot file, if one is configured.
    pub(crate) async fn save(&self) -> EngineResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        self.snapshot()
            .await
            .write(path)
            .await
    }

    async fn load(&self) -> EngineResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let Some(snapshot) = Snapshot::read(path).await? else {
            return Ok(());
        };

        let mut store = self.collections.write().await;
        for collection in snapshot.collections {
            let (name, collection) = StoredCollection::restore(collection)?;
            store.insert(name, collection);
        }

        Ok(())
    }
}


/// Embedded, in-process document engine.
///
/// This struct implements the [`StoreEngine`] trait on top of in-memory maps guarded by
/// async-aware read-write locks. Every write completes against memory before it returns;
/// when a snapshot file is configured, durability is provided separately by an autosave
/// task and by [`StoreEngine::flush`].
///
/// # Thread Safety
///
/// `MemoryEngine` is cloneable and uses an `Arc`-wrapped internal state. Multiple clones of
/// the same instance share the same underlying data.
///
/// # Example
///
/// ```ignore
/// use doclink_memory::MemoryEngine;
/// use doclink_core::engine::{CollectionOptions, StoreEngine};
/// use bson::doc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let engine = MemoryEngine::new();
///     engine.create_collection("users", CollectionOptions::default()).await?;
///
///     let keys = engine.insert_documents(vec![doc! { "name": "Alice" }], "users").await?;
///     assert_eq!(keys, vec![1]);
///
///     Ok(())
/// }
/// ```
#[derive(Clone, Debug)]
pub struct MemoryEngine {
    state: Arc<EngineState>,
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryEngine {
    /// Creates a new, empty engine without persistence.
    pub fn new() -> Self {
        Self { state: Arc::new(EngineState::new(None)) }
    }

    /// Creates a builder for an engine with persistence options.
    pub fn builder() -> MemoryEngineBuilder {
        MemoryEngineBuilder::default()
    }

    /// Returns `true` if there are mutations not yet written to the snapshot file.
    pub fn is_dirty(&self) -> bool {
        self.state.dirty.load(Ordering::Acquire)
    }

    fn sort_records(records: &mut [&Document], query: &NativeQuery) {
        if query.sort.is_empty() {
            return;
        }

        records.sort_by(|a, b| {
            for key in &query.sort {
                let left = Comparable::of(a.get(&key.field));
                let right = Comparable::of(b.get(&key.field));

                let ordering = match key.direction {
                    SortDirection::Asc => left.sort_cmp(&right),
                    SortDirection::Desc => right.sort_cmp(&left),
                };

                if ordering.is_ne() {
                    return ordering;
                }
            }

            std::cmp::Ordering::Equal
        });
    }
}

#[async_trait]
impl StoreEngine for MemoryEngine {
    async fn create_collection(&self, name: &str, options: CollectionOptions) -> EngineResult<()> {
        let mut store = self.state.collections.write().await;

        if !store.contains_key(name) {
            info!(target: "doclink::memory", collection = name, unique = ?options.unique, "Collection created");
            store.insert(name.to_string(), StoredCollection::new(options));
            self.state.touch();
        }

        Ok(())
    }

    async fn describe_collection(&self, name: &str) -> EngineResult<Option<CollectionOptions>> {
        Ok(
            self.state.collections
                .read()
                .await
                .get(name)
                .map(|collection| collection.options.clone())
        )
    }

    async fn list_collections(&self) -> EngineResult<Vec<String>> {
        Ok(
            self.state.collections
                .read()
                .await
                .keys()
                .cloned()
                .collect()
        )
    }

    async fn insert_documents(&self, documents: Vec<Document>, collection: &str) -> EngineResult<Vec<i64>> {
        let mut store = self.state.collections.write().await;
        let stored = store
            .get_mut(collection)
            .ok_or_else(|| EngineError::CollectionNotFound(collection.to_string()))?;

        if documents.iter().any(|document| document.contains_key(KEY_FIELD)) {
            return Err(EngineError::InvalidDocument(format!(
                "document already carries {KEY_FIELD}, use an update instead"
            )));
        }

        stored.check_unique(collection, &documents)?;

        if i64::try_from(documents.len())
            .ok()
            .and_then(|count| stored.next_key.checked_add(count))
            .is_none()
        {
            return Err(EngineError::InvalidDocument(format!("key space exhausted in collection {collection}")));
        }

        let now = now_millis();
        let mut keys = Vec::with_capacity(documents.len());

        for mut document in documents {
            let key = stored.next_key;
            stored.next_key += 1;

            document.insert(KEY_FIELD, key);
            document.insert(META_FIELD, doc! { "revision": 0_i64, "created": now, "updated": now });
            stored.records.insert(key, document);
            keys.push(key);
        }

        self.state.touch();
        debug!(target: "doclink::memory", collection, keys = ?keys, "Documents inserted");

        Ok(keys)
    }

    async fn update_documents(&self, documents: Vec<Document>, collection: &str) -> EngineResult<Vec<Document>> {
        let mut store = self.state.collections.write().await;
        let stored = store
            .get_mut(collection)
            .ok_or_else(|| EngineError::CollectionNotFound(collection.to_string()))?;

        let mut keyed = Vec::with_capacity(documents.len());
        for document in documents {
            let key = record_key(&document).ok_or_else(|| {
                EngineError::InvalidDocument(format!("document without {KEY_FIELD} cannot be updated"))
            })?;
            if !stored.records.contains_key(&key) {
                return Err(EngineError::DocumentNotFound(key, collection.to_string()));
            }
            keyed.push((key, document));
        }

        let candidates = keyed.iter().map(|(_, document)| document.clone()).collect::<Vec<_>>();
        stored.check_unique(collection, &candidates)?;

        let now = now_millis();
        let mut updated = Vec::with_capacity(keyed.len());

        for (key, mut document) in keyed {
            let previous = stored
                .records
                .get(&key)
                .and_then(|record| record.get_document(META_FIELD).ok());
            let created = previous
                .and_then(|meta| meta.get_i64("created").ok())
                .unwrap_or(now);
            let revision = previous
                .and_then(|meta| meta.get_i64("revision").ok())
                .unwrap_or(0);

            document.insert(KEY_FIELD, key);
            document.insert(META_FIELD, doc! { "revision": revision + 1, "created": created, "updated": now });
            stored.records.insert(key, document.clone());
            updated.push(document);
        }

        self.state.touch();
        debug!(target: "doclink::memory", collection, count = updated.len(), "Documents updated");

        Ok(updated)
    }

    async fn delete_documents(&self, keys: Vec<i64>, collection: &str) -> EngineResult<usize> {
        let mut store = self.state.collections.write().await;
        let stored = store
            .get_mut(collection)
            .ok_or_else(|| EngineError::CollectionNotFound(collection.to_string()))?;

        let removed = keys
            .iter()
            .filter(|key| stored.records.remove(*key).is_some())
            .count();

        if removed > 0 {
            self.state.touch();
        }
        debug!(target: "doclink::memory", collection, count = removed, "Documents deleted");

        Ok(removed)
    }

    async fn get_documents(&self, keys: Vec<i64>, collection: &str) -> EngineResult<Vec<Document>> {
        let store = self.state.collections.read().await;
        let Some(stored) = store.get(collection) else {
            return Ok(vec![]);
        };

        let wanted = keys.into_iter().collect::<HashSet<_>>();

        Ok(
            stored.records
                .iter()
                .filter(|(key, _)| wanted.contains(*key))
                .map(|(_, record)| record.clone())
                .collect()
        )
    }

    async fn query_documents(&self, query: NativeQuery, collection: &str) -> EngineResult<Vec<Document>> {
        let store = self.state.collections.read().await;
        let Some(stored) = store.get(collection) else {
            return Ok(vec![]);
        };

        let mut matched = PredicateEvaluator::filter_records(
            stored.records.values(),
            query.predicate.as_ref(),
        )?;

        Self::sort_records(&mut matched, &query);

        Ok(
            matched
                .into_iter()
                .skip(query.offset.unwrap_or(0))
                .take(query.limit.unwrap_or(usize::MAX))
                .cloned()
                .collect()
        )
    }

    async fn count_documents(&self, predicate: Option<Document>, collection: &str) -> EngineResult<usize> {
        let store = self.state.collections.read().await;
        let Some(stored) = store.get(collection) else {
            return Ok(0);
        };

        Ok(PredicateEvaluator::filter_records(stored.records.values(), predicate.as_ref())?.len())
    }

    async fn flush(&self) -> EngineResult<()> {
        if self.state.path.is_none() {
            return Ok(());
        }

        self.state.dirty.store(false, Ordering::Release);
        if let Err(err) = self.state.save().await {
            self.state.touch();
            return Err(err);
        }

        Ok(())
    }

    async fn shutdown(self) -> EngineResult<()> {
        if let Some(task) = self.state.autosave.lock().await.take() {
            task.abort();
        }

        self.flush().await
    }
}


/// Builder for constructing [`MemoryEngine`] instances.
///
/// Without a filename the engine is purely in-memory. With a filename, `autoload` reads an
/// existing snapshot at build time and `autosave_interval` starts a periodic flush.
///
/// # Example
///
/// ```ignore
/// use doclink_memory::MemoryEngine;
/// use doclink_core::engine::StoreEngineBuilder;
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() {
///     let engine = MemoryEngine::builder()
///         .filename("data.db")
///         .autoload(true)
///         .autosave_interval(Duration::from_secs(10))
///         .build()
///         .await
///         .unwrap();
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryEngineBuilder {
    filename: Option<PathBuf>,
    autoload: bool,
    autosave_interval: Option<Duration>,
}

impl MemoryEngineBuilder {
    /// Sets the snapshot file.
    pub fn filename(mut self, filename: impl Into<PathBuf>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    /// Loads an existing snapshot when the engine is built.
    pub fn autoload(mut self, autoload: bool) -> Self {
        self.autoload = autoload;
        self
    }

    /// Flushes pending mutations every `interval`.
    pub fn autosave_interval(mut self, interval: Duration) -> Self {
        self.autosave_interval = Some(interval);
        self
    }
}

#[async_trait]
impl StoreEngineBuilder for MemoryEngineBuilder {
    type Engine = MemoryEngine;

    async fn build(self) -> EngineResult<Self::Engine> {
        let state = Arc::new(EngineState::new(self.filename.clone()));

        if self.autoload {
            state.load().await?;
        }

        if let (Some(_), Some(interval)) = (&self.filename, self.autosave_interval) {
            let task = spawn_autosave(Arc::downgrade(&state), interval);
            *state.autosave.lock().await = Some(task);
        }

        Ok(MemoryEngine { state })
    }
}

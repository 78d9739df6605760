//! The database handle: open/close lifecycle and atomic record operations.
//!
//! A [`Database`] is an explicitly opened, cheaply clonable handle over one
//! durable database. File-backed opens are idempotent per path: a
//! process-wide registry hands back the already-open handle, so two opens of
//! the same path never race each other's snapshot file.
//!
//! Every mutating operation is atomic: the interior lock is held from
//! validation through the durable commit, and a failed commit reverts the
//! in-memory change before the error is returned. Callers never observe a
//! half-applied operation.

use crate::{
    clock::{Clock, SystemClock},
    error::Result,
    index::IndexKey,
    record::{shallow_merge, Record},
    schema::{CollectionSchema, DatabaseSchema},
    snapshot::DatabaseSnapshot,
    CollectionName, RecordId, StoreError, Timestamp,
};
use dashmap::DashMap;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use tokio::sync::Mutex;

/// Where a database keeps its durable copy.
#[derive(Debug, Clone)]
enum Storage {
    /// No durability; state lives and dies with the handle.
    InMemory,
    /// JSON snapshot file, rewritten atomically after every mutation.
    File(PathBuf),
}

/// Configuration for opening a database.
pub struct DatabaseConfig {
    schema: DatabaseSchema,
    storage: Storage,
    clock: Arc<dyn Clock>,
}

impl DatabaseConfig {
    /// An in-memory database (no durable copy, no registry entry).
    pub fn in_memory(schema: DatabaseSchema) -> Self {
        Self {
            schema,
            storage: Storage::InMemory,
            clock: Arc::new(SystemClock),
        }
    }

    /// A file-backed database at `path`.
    pub fn at_path(schema: DatabaseSchema, path: impl Into<PathBuf>) -> Self {
        Self {
            schema,
            storage: Storage::File(path.into()),
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the clock used for `updated_at` stamps.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

/// Runtime state of one collection: records plus rebuilt secondary indexes.
struct CollectionState {
    schema: CollectionSchema,
    records: BTreeMap<RecordId, Record>,
    indexes: HashMap<String, BTreeMap<IndexKey, BTreeSet<RecordId>>>,
}

impl CollectionState {
    fn new(schema: CollectionSchema) -> Self {
        let indexes = schema
            .indexes
            .iter()
            .map(|def| (def.name.clone(), BTreeMap::new()))
            .collect();
        Self {
            schema,
            records: BTreeMap::new(),
            indexes,
        }
    }

    /// Index entries a payload produces: `(index name, key)` pairs.
    fn index_keys(&self, payload: &serde_json::Value) -> Vec<(String, IndexKey)> {
        self.schema
            .indexes
            .iter()
            .filter_map(|def| {
                let value = payload.get(&def.key_path)?;
                IndexKey::from_value(value).map(|key| (def.name.clone(), key))
            })
            .collect()
    }

    /// Check unique constraints for a payload that will be stored under
    /// `id`, ignoring entries already owned by `id` itself.
    fn check_unique(&self, id: &str, payload: &serde_json::Value) -> Result<()> {
        for def in self.schema.indexes.iter().filter(|d| d.unique) {
            let Some(value) = payload.get(&def.key_path) else {
                continue;
            };
            let Some(key) = IndexKey::from_value(value) else {
                continue;
            };
            let taken = self
                .indexes
                .get(&def.name)
                .and_then(|map| map.get(&key))
                .map(|ids| ids.iter().any(|other| other != id))
                .unwrap_or(false);
            if taken {
                return Err(StoreError::DuplicateKey {
                    collection: self.schema.name.clone(),
                    index: def.name.clone(),
                    key: key.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Insert a record and link its index entries. Uniqueness must already
    /// have been checked.
    fn insert(&mut self, record: Record) {
        for (index, key) in self.index_keys(&record.payload) {
            self.indexes
                .entry(index)
                .or_default()
                .entry(key)
                .or_default()
                .insert(record.id.clone());
        }
        self.records.insert(record.id.clone(), record);
    }

    /// Remove a record and unlink its index entries.
    fn remove(&mut self, id: &str) -> Option<Record> {
        let record = self.records.remove(id)?;
        for (index, key) in self.index_keys(&record.payload) {
            if let Some(map) = self.indexes.get_mut(&index) {
                if let Some(ids) = map.get_mut(&key) {
                    ids.remove(id);
                    if ids.is_empty() {
                        map.remove(&key);
                    }
                }
            }
        }
        Some(record)
    }
}

struct State {
    collections: HashMap<CollectionName, CollectionState>,
}

impl State {
    fn for_schema(schema: &DatabaseSchema) -> Self {
        let collections = schema
            .collections
            .values()
            .map(|c| (c.name.clone(), CollectionState::new(c.clone())))
            .collect();
        Self { collections }
    }

    fn collection(&self, name: &str) -> Result<&CollectionState> {
        self.collections
            .get(name)
            .ok_or_else(|| StoreError::CollectionNotFound(name.to_string()))
    }

    fn collection_mut(&mut self, name: &str) -> Result<&mut CollectionState> {
        self.collections
            .get_mut(name)
            .ok_or_else(|| StoreError::CollectionNotFound(name.to_string()))
    }

    fn snapshot(&self, schema_version: crate::SchemaVersion) -> DatabaseSnapshot {
        let mut snapshot = DatabaseSnapshot::new(schema_version);
        for collection in self.collections.values() {
            for record in collection.records.values() {
                snapshot.add_record(collection.schema.name.clone(), record.clone());
            }
        }
        snapshot
    }
}

struct DatabaseInner {
    schema: DatabaseSchema,
    storage: Storage,
    clock: Arc<dyn Clock>,
    state: Mutex<State>,
}

/// Handle to an open database.
#[derive(Clone)]
pub struct Database {
    inner: Arc<DatabaseInner>,
}

/// Process-wide registry of file-backed handles, keyed by path. Makes
/// `open` idempotent: the same path always resolves to the same handle.
fn registry() -> &'static DashMap<PathBuf, Database> {
    static REGISTRY: OnceLock<DashMap<PathBuf, Database>> = OnceLock::new();
    REGISTRY.get_or_init(DashMap::new)
}

impl Database {
    /// Open a database.
    ///
    /// File-backed: if the path is already open in this process, the
    /// existing handle is returned. A fresh path creates the schema and
    /// writes an initial snapshot; an existing file is loaded and its
    /// indexes rebuilt. Fails with [`StoreError::Unavailable`] if the file
    /// cannot be read, written, or was written by an incompatible version.
    pub async fn open(config: DatabaseConfig) -> Result<Database> {
        let path = match &config.storage {
            Storage::InMemory => {
                let state = State::for_schema(&config.schema);
                return Ok(Self::from_parts(config, state));
            }
            Storage::File(path) => path.clone(),
        };

        if let Some(existing) = registry().get(&path) {
            let db = existing.value().clone();
            drop(existing);
            if db.inner.schema.version != config.schema.version {
                return Err(StoreError::Unavailable(format!(
                    "{} is already open with schema version {}",
                    path.display(),
                    db.inner.schema.version
                )));
            }
            return Ok(db);
        }

        let exists = tokio::fs::try_exists(&path)
            .await
            .map_err(|e| StoreError::Unavailable(format!("{}: {e}", path.display())))?;

        let db = if exists {
            let json = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| StoreError::Unavailable(format!("{}: {e}", path.display())))?;
            let snapshot = DatabaseSnapshot::from_json(&json)?;
            snapshot.validate(&config.schema)?;
            let state = Self::rebuild(&config.schema, snapshot)?;
            tracing::debug!(path = %path.display(), "opened existing database");
            Self::from_parts(config, state)
        } else {
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| StoreError::Unavailable(format!("{}: {e}", parent.display())))?;
            }
            let state = State::for_schema(&config.schema);
            let db = Self::from_parts(config, state);
            // Schema creation point: the one-time initial snapshot.
            let state = db.inner.state.lock().await;
            db.persist_locked(&state)
                .await
                .map_err(StoreError::Unavailable)?;
            drop(state);
            tracing::debug!(path = %path.display(), "created new database");
            db
        };

        match registry().entry(path) {
            dashmap::mapref::entry::Entry::Occupied(entry) => Ok(entry.get().clone()),
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                entry.insert(db.clone());
                Ok(db)
            }
        }
    }

    fn from_parts(config: DatabaseConfig, state: State) -> Self {
        Self {
            inner: Arc::new(DatabaseInner {
                schema: config.schema,
                storage: config.storage,
                clock: config.clock,
                state: Mutex::new(state),
            }),
        }
    }

    /// Rebuild runtime state (records + indexes) from a loaded snapshot.
    fn rebuild(schema: &DatabaseSchema, snapshot: DatabaseSnapshot) -> Result<State> {
        let mut state = State::for_schema(schema);
        for (collection_name, records) in snapshot.collections {
            let collection = state.collection_mut(&collection_name)?;
            for (_, record) in records {
                let key = collection
                    .schema
                    .primary_key(&record.payload)
                    .map_err(|e| StoreError::Unavailable(format!("corrupt snapshot: {e}")))?;
                if key != record.id {
                    return Err(StoreError::Unavailable(format!(
                        "corrupt snapshot: record '{}' keyed as '{}'",
                        key, record.id
                    )));
                }
                collection
                    .check_unique(&record.id, &record.payload)
                    .map_err(|e| StoreError::Unavailable(format!("corrupt snapshot: {e}")))?;
                collection.insert(record);
            }
        }
        Ok(state)
    }

    /// Persist the current state. No-op for in-memory databases. Must be
    /// called with the state lock held.
    async fn persist_locked(&self, state: &State) -> std::result::Result<(), String> {
        let Storage::File(path) = &self.inner.storage else {
            return Ok(());
        };
        let snapshot = state.snapshot(self.inner.schema.version);
        let json =
            serde_json::to_string(&snapshot).map_err(|e| format!("serialize snapshot: {e}"))?;
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| format!("write {}: {e}", tmp.display()))?;
        tokio::fs::rename(&tmp, path)
            .await
            .map_err(|e| format!("rename {}: {e}", path.display()))?;
        Ok(())
    }

    /// Current time from the handle's clock, in milliseconds. Domain
    /// timestamps and store stamps come from the same source.
    pub fn now_ms(&self) -> Timestamp {
        self.inner.clock.now_ms()
    }

    /// Get a record by primary key. Absence is a value, not an error.
    pub async fn get(&self, collection: &str, id: &str) -> Result<Option<Record>> {
        let state = self.inner.state.lock().await;
        Ok(state.collection(collection)?.records.get(id).cloned())
    }

    /// Insert a new record. Fails with [`StoreError::DuplicateKey`] if the
    /// primary key or any unique index value is already taken.
    pub async fn add(&self, collection: &str, payload: serde_json::Value) -> Result<Record> {
        let mut state = self.inner.state.lock().await;
        let col = state.collection_mut(collection)?;
        let id = col.schema.primary_key(&payload)?;

        if col.records.contains_key(&id) {
            return Err(StoreError::DuplicateKey {
                collection: collection.to_string(),
                index: "primary".to_string(),
                key: id,
            });
        }
        col.check_unique(&id, &payload)?;

        let record = Record::new(id.clone(), payload, self.inner.clock.now_ms());
        col.insert(record.clone());

        if let Err(e) = self.persist_locked(&state).await {
            tracing::warn!(%collection, id = %id, error = %e, "commit failed, reverting insert");
            state.collection_mut(collection)?.remove(&id);
            return Err(StoreError::TransactionFailed(e));
        }
        Ok(record)
    }

    /// Insert or replace by primary key (full replace). `created_at` of an
    /// existing record is preserved; `updated_at` is re-stamped.
    pub async fn put(&self, collection: &str, payload: serde_json::Value) -> Result<Record> {
        let mut state = self.inner.state.lock().await;
        let col = state.collection_mut(collection)?;
        let id = col.schema.primary_key(&payload)?;
        col.check_unique(&id, &payload)?;

        let old = col.remove(&id);
        let record = match &old {
            Some(prev) => {
                let mut next = prev.clone();
                next.replace_payload(payload, self.inner.clock.now_ms());
                next
            }
            None => Record::new(id.clone(), payload, self.inner.clock.now_ms()),
        };
        col.insert(record.clone());

        if let Err(e) = self.persist_locked(&state).await {
            tracing::warn!(%collection, id = %id, error = %e, "commit failed, reverting put");
            let col = state.collection_mut(collection)?;
            col.remove(&id);
            if let Some(prev) = old {
                col.insert(prev);
            }
            return Err(StoreError::TransactionFailed(e));
        }
        Ok(record)
    }

    /// Atomic read-merge-write: shallow-merge `patch` over the existing
    /// payload. Fails with [`StoreError::NotFound`] if no record exists for
    /// `id`, leaving the store unchanged. The primary-key field is
    /// immutable.
    pub async fn merge_update(
        &self,
        collection: &str,
        id: &str,
        patch: serde_json::Value,
    ) -> Result<Record> {
        let mut state = self.inner.state.lock().await;
        let col = state.collection_mut(collection)?;

        let patch_obj = patch
            .as_object()
            .ok_or_else(|| StoreError::InvalidRecord("merge update must be an object".into()))?;

        let existing = col
            .records
            .get(id)
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?
            .clone();

        if let Some(patched_key) = patch_obj.get(&col.schema.key_path) {
            if patched_key.as_str() != Some(id) {
                return Err(StoreError::InvalidRecord(format!(
                    "primary key '{}' is immutable",
                    col.schema.key_path
                )));
            }
        }

        let base = existing
            .payload
            .as_object()
            .ok_or_else(|| StoreError::InvalidRecord("stored payload is not an object".into()))?;
        let merged = serde_json::Value::Object(shallow_merge(base, patch_obj));
        col.check_unique(id, &merged)?;

        let mut record = existing.clone();
        record.replace_payload(merged, self.inner.clock.now_ms());
        col.remove(id);
        col.insert(record.clone());

        if let Err(e) = self.persist_locked(&state).await {
            tracing::warn!(%collection, id = %id, error = %e, "commit failed, reverting merge");
            let col = state.collection_mut(collection)?;
            col.remove(id);
            col.insert(existing);
            return Err(StoreError::TransactionFailed(e));
        }
        Ok(record)
    }

    /// Equality scan over a declared secondary index. Results come back in
    /// deterministic store order; callers impose domain ordering.
    pub async fn query_by_index(
        &self,
        collection: &str,
        index: &str,
        key: impl Into<IndexKey>,
    ) -> Result<Vec<Record>> {
        let state = self.inner.state.lock().await;
        let col = state.collection(collection)?;
        if col.schema.index(index).is_none() {
            return Err(StoreError::IndexNotFound {
                collection: collection.to_string(),
                index: index.to_string(),
            });
        }

        let key = key.into();
        let records = col
            .indexes
            .get(index)
            .and_then(|map| map.get(&key))
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| col.records.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default();
        Ok(records)
    }

    /// Every record in a collection, in primary-key order.
    pub async fn query_all(&self, collection: &str) -> Result<Vec<Record>> {
        let state = self.inner.state.lock().await;
        Ok(state
            .collection(collection)?
            .records
            .values()
            .cloned()
            .collect())
    }

    /// Persist and release the handle's registry entry. Later opens of the
    /// same path will load from the file.
    pub async fn close(&self) -> Result<()> {
        if let Storage::File(path) = &self.inner.storage {
            let state = self.inner.state.lock().await;
            self.persist_locked(&state)
                .await
                .map_err(StoreError::TransactionFailed)?;
            registry().remove(path);
            tracing::debug!(path = %path.display(), "closed database");
        }
        Ok(())
    }
}

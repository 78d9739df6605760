//! Snapshot types for persisting and restoring database state.
//!
//! A snapshot is the on-disk layout of a database: every record of every
//! collection, plus enough versioning to refuse files this build cannot
//! read. Uses `BTreeMap` throughout so serialization is deterministic.
//! Indexes are not persisted; they are rebuilt from records on open.

use crate::{error::Result, CollectionName, DatabaseSchema, Record, RecordId, SchemaVersion, StoreError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Version of the snapshot file format.
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// A point-in-time snapshot of database state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseSnapshot {
    /// Snapshot file format version.
    pub format_version: u32,
    /// Schema version at the time of the snapshot.
    pub schema_version: SchemaVersion,
    /// All records, by collection then record id.
    pub collections: BTreeMap<CollectionName, BTreeMap<RecordId, Record>>,
}

impl DatabaseSnapshot {
    /// Create an empty snapshot for the given schema version.
    pub fn new(schema_version: SchemaVersion) -> Self {
        Self {
            format_version: SNAPSHOT_FORMAT_VERSION,
            schema_version,
            collections: BTreeMap::new(),
        }
    }

    /// Add a record under `collection`.
    pub fn add_record(&mut self, collection: impl Into<CollectionName>, record: Record) {
        self.collections
            .entry(collection.into())
            .or_default()
            .insert(record.id.clone(), record);
    }

    /// Get a record from the snapshot.
    pub fn get_record(&self, collection: &str, id: &str) -> Option<&Record> {
        self.collections.get(collection)?.get(id)
    }

    /// Total record count across collections.
    pub fn record_count(&self) -> usize {
        self.collections.values().map(|c| c.len()).sum()
    }

    /// Validate the snapshot against a schema: version must match and every
    /// collection in the file must be declared.
    pub fn validate(&self, schema: &DatabaseSchema) -> Result<()> {
        if self.schema_version != schema.version {
            return Err(StoreError::Unavailable(format!(
                "schema version mismatch: file has {}, expected {}",
                self.schema_version, schema.version
            )));
        }

        for collection_name in self.collections.keys() {
            if schema.get_collection(collection_name).is_none() {
                return Err(StoreError::CollectionNotFound(collection_name.clone()));
            }
        }

        Ok(())
    }

    /// Serialize to JSON with deterministic ordering.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| StoreError::Unavailable(e.to_string()))
    }

    /// Deserialize from JSON, rejecting files newer than this build.
    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: Self =
            serde_json::from_str(json).map_err(|e| StoreError::Unavailable(e.to_string()))?;

        if snapshot.format_version > SNAPSHOT_FORMAT_VERSION {
            return Err(StoreError::Unavailable(format!(
                "unsupported snapshot format version: {} (max supported: {})",
                snapshot.format_version, SNAPSHOT_FORMAT_VERSION
            )));
        }

        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CollectionSchema, IndexDef};
    use serde_json::json;

    fn test_schema() -> DatabaseSchema {
        DatabaseSchema::new(1).with_collection(
            CollectionSchema::new("users", "id")
                .with_index(IndexDef::unique("email", "email")),
        )
    }

    #[test]
    fn create_empty_snapshot() {
        let snapshot = DatabaseSnapshot::new(1);
        assert_eq!(snapshot.format_version, SNAPSHOT_FORMAT_VERSION);
        assert_eq!(snapshot.schema_version, 1);
        assert_eq!(snapshot.record_count(), 0);
    }

    #[test]
    fn add_and_get_record() {
        let mut snapshot = DatabaseSnapshot::new(1);
        snapshot.add_record(
            "users",
            Record::new("user-1", json!({"id": "user-1", "name": "Alice"}), 1000),
        );

        assert_eq!(snapshot.record_count(), 1);
        let record = snapshot.get_record("users", "user-1").unwrap();
        assert_eq!(record.payload["name"], "Alice");
    }

    #[test]
    fn json_roundtrip() {
        let mut snapshot = DatabaseSnapshot::new(1);
        snapshot.add_record(
            "users",
            Record::new("user-1", json!({"id": "user-1", "name": "Alice"}), 1000),
        );

        let json = snapshot.to_json().unwrap();
        let restored = DatabaseSnapshot::from_json(&json).unwrap();
        assert_eq!(snapshot, restored);
    }

    #[test]
    fn deterministic_serialization() {
        let mut snapshot1 = DatabaseSnapshot::new(1);
        let mut snapshot2 = DatabaseSnapshot::new(1);

        let a = Record::new("user-a", json!({"id": "user-a"}), 1000);
        let b = Record::new("user-b", json!({"id": "user-b"}), 1000);

        snapshot1.add_record("users", a.clone());
        snapshot1.add_record("users", b.clone());

        // Insert in reverse order; BTreeMap keeps serialization identical.
        snapshot2.add_record("users", b);
        snapshot2.add_record("users", a);

        assert_eq!(snapshot1.to_json().unwrap(), snapshot2.to_json().unwrap());
    }

    #[test]
    fn validate_version_mismatch() {
        let snapshot = DatabaseSnapshot::new(99);
        let result = snapshot.validate(&test_schema());
        assert!(matches!(result, Err(StoreError::Unavailable(_))));
    }

    #[test]
    fn validate_unknown_collection() {
        let mut snapshot = DatabaseSnapshot::new(1);
        snapshot.add_record("visits", Record::new("v1", json!({"id": "v1"}), 1000));

        let result = snapshot.validate(&test_schema());
        assert!(matches!(result, Err(StoreError::CollectionNotFound(c)) if c == "visits"));
    }

    #[test]
    fn reject_future_format_version() {
        let json = r#"{
            "formatVersion": 999,
            "schemaVersion": 1,
            "collections": {}
        }"#;

        let result = DatabaseSnapshot::from_json(json);
        assert!(matches!(result, Err(StoreError::Unavailable(_))));
    }
}

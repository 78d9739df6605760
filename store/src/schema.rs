//! Schema definition and payload validation.
//!
//! A schema declares the collections of a database, the key path each
//! collection is keyed by, and its secondary indexes. Schema creation happens
//! exactly once, on the first-ever open of a database path; later opens must
//! present a schema with the same version.

use crate::{error::Result, CollectionName, SchemaVersion, StoreError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Declaration of a secondary index over a collection field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexDef {
    /// Index name, used in `query_by_index` calls.
    pub name: String,
    /// The payload field the index is built over.
    pub key_path: String,
    /// Unique indexes reject inserts whose key already belongs to another
    /// record.
    pub unique: bool,
}

impl IndexDef {
    /// Declare a unique index.
    pub fn unique(name: impl Into<String>, key_path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key_path: key_path.into(),
            unique: true,
        }
    }

    /// Declare a non-unique index.
    pub fn non_unique(name: impl Into<String>, key_path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key_path: key_path.into(),
            unique: false,
        }
    }
}

/// Schema for a single collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionSchema {
    /// Collection name.
    pub name: CollectionName,
    /// The payload field holding the primary key (a non-empty string).
    pub key_path: String,
    /// Secondary indexes.
    pub indexes: Vec<IndexDef>,
}

impl CollectionSchema {
    /// Create a collection schema keyed by `key_path`.
    pub fn new(name: impl Into<CollectionName>, key_path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key_path: key_path.into(),
            indexes: Vec::new(),
        }
    }

    /// Builder-style method to declare an index.
    pub fn with_index(mut self, index: IndexDef) -> Self {
        self.indexes.push(index);
        self
    }

    /// Look up an index declaration by name.
    pub fn index(&self, name: &str) -> Option<&IndexDef> {
        self.indexes.iter().find(|i| i.name == name)
    }

    /// Validate a payload and extract its primary key.
    ///
    /// The payload must be a JSON object whose `key_path` field is a
    /// non-empty string.
    pub fn primary_key(&self, payload: &serde_json::Value) -> Result<String> {
        let obj = payload
            .as_object()
            .ok_or_else(|| StoreError::InvalidRecord("payload must be an object".into()))?;

        match obj.get(&self.key_path) {
            Some(serde_json::Value::String(key)) if !key.is_empty() => Ok(key.clone()),
            Some(serde_json::Value::String(_)) => Err(StoreError::InvalidRecord(format!(
                "primary key '{}' must not be empty",
                self.key_path
            ))),
            Some(_) => Err(StoreError::InvalidRecord(format!(
                "primary key '{}' must be a string",
                self.key_path
            ))),
            None => Err(StoreError::InvalidRecord(format!(
                "missing primary key '{}'",
                self.key_path
            ))),
        }
    }
}

/// Schema for an entire database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseSchema {
    /// Schema version; bumped when collections or indexes change.
    pub version: SchemaVersion,
    /// Collection schemas by name.
    pub collections: HashMap<CollectionName, CollectionSchema>,
}

impl DatabaseSchema {
    /// Create an empty schema at the given version.
    pub fn new(version: SchemaVersion) -> Self {
        Self {
            version,
            collections: HashMap::new(),
        }
    }

    /// Builder-style method to add a collection.
    pub fn with_collection(mut self, collection: CollectionSchema) -> Self {
        self.collections.insert(collection.name.clone(), collection);
        self
    }

    /// Get a collection schema by name.
    pub fn get_collection(&self, name: &str) -> Option<&CollectionSchema> {
        self.collections.get(name)
    }
}

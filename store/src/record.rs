//! Record type and the shallow-merge primitive.

use crate::{RecordId, Timestamp};
use serde::{Deserialize, Serialize};

/// A stored record: a JSON object payload plus store-stamped metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    /// Primary key, extracted from the payload at the collection's key path.
    pub id: RecordId,
    /// The record data (always a JSON object).
    pub payload: serde_json::Value,
    /// When the record was first inserted (milliseconds since epoch).
    /// Preserved across replaces and merges.
    pub created_at: Timestamp,
    /// Stamped by the store on every persisted write.
    pub updated_at: Timestamp,
}

impl Record {
    /// Create a new record stamped at `timestamp`.
    pub fn new(id: impl Into<RecordId>, payload: serde_json::Value, timestamp: Timestamp) -> Self {
        Self {
            id: id.into(),
            payload,
            created_at: timestamp,
            updated_at: timestamp,
        }
    }

    /// Replace the payload, keeping `created_at` and re-stamping `updated_at`.
    pub fn replace_payload(&mut self, payload: serde_json::Value, timestamp: Timestamp) {
        self.payload = payload;
        self.updated_at = timestamp;
    }
}

/// Shallow-merge `patch` over `base`: every top-level field present in the
/// patch overwrites the corresponding field in the base (including explicit
/// `null`), and every field absent from the patch is preserved exactly.
pub fn shallow_merge(
    base: &serde_json::Map<String, serde_json::Value>,
    patch: &serde_json::Map<String, serde_json::Value>,
) -> serde_json::Map<String, serde_json::Value> {
    let mut merged = base.clone();
    for (key, value) in patch {
        merged.insert(key.clone(), value.clone());
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn as_map(value: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
        match value {
            serde_json::Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn create_record() {
        let record = Record::new("user-1", json!({"name": "Alice"}), 1000);

        assert_eq!(record.id, "user-1");
        assert_eq!(record.payload, json!({"name": "Alice"}));
        assert_eq!(record.created_at, 1000);
        assert_eq!(record.updated_at, 1000);
    }

    #[test]
    fn replace_keeps_created_at() {
        let mut record = Record::new("user-1", json!({"name": "Alice"}), 1000);
        record.replace_payload(json!({"name": "Alice Smith"}), 2000);

        assert_eq!(record.payload, json!({"name": "Alice Smith"}));
        assert_eq!(record.created_at, 1000);
        assert_eq!(record.updated_at, 2000);
    }

    #[test]
    fn merge_overwrites_mentioned_fields_only() {
        let base = as_map(json!({"a": 1, "b": 2}));
        let patch = as_map(json!({"b": 3}));

        let merged = shallow_merge(&base, &patch);
        assert_eq!(serde_json::Value::Object(merged), json!({"a": 1, "b": 3}));
    }

    #[test]
    fn merge_with_explicit_null() {
        let base = as_map(json!({"a": 1, "b": 2}));
        let patch = as_map(json!({"b": null}));

        let merged = shallow_merge(&base, &patch);
        assert_eq!(
            serde_json::Value::Object(merged),
            json!({"a": 1, "b": null})
        );
    }

    #[test]
    fn merge_is_shallow() {
        let base = as_map(json!({"nested": {"x": 1, "y": 2}}));
        let patch = as_map(json!({"nested": {"x": 9}}));

        // The nested object is replaced wholesale, not merged.
        let merged = shallow_merge(&base, &patch);
        assert_eq!(
            serde_json::Value::Object(merged),
            json!({"nested": {"x": 9}})
        );
    }

    #[test]
    fn serialization_roundtrip() {
        let record = Record::new("user-1", json!({"name": "Alice", "age": 30}), 1000);
        let json = serde_json::to_string(&record).unwrap();
        let parsed: Record = serde_json::from_str(&json).unwrap();
        assert_eq!(record, parsed);
    }

    proptest! {
        #[test]
        fn merge_preserves_unmentioned_and_applies_patch(
            base in proptest::collection::hash_map("[a-z]{1,8}", any::<i64>(), 0..8),
            patch in proptest::collection::hash_map("[a-z]{1,8}", any::<i64>(), 0..8),
        ) {
            let base_map: serde_json::Map<String, serde_json::Value> = base
                .iter()
                .map(|(k, v)| (k.clone(), json!(v)))
                .collect();
            let patch_map: serde_json::Map<String, serde_json::Value> = patch
                .iter()
                .map(|(k, v)| (k.clone(), json!(v)))
                .collect();

            let merged = shallow_merge(&base_map, &patch_map);

            // Every patched field carries the patch value.
            for (key, value) in &patch {
                prop_assert_eq!(merged.get(key), Some(&json!(value)));
            }
            // Every unmentioned base field is preserved exactly.
            for (key, value) in &base {
                if !patch.contains_key(key) {
                    prop_assert_eq!(merged.get(key), Some(&json!(value)));
                }
            }
            // No fields appear from nowhere.
            for key in merged.keys() {
                prop_assert!(base.contains_key(key) || patch.contains_key(key));
            }
        }
    }
}

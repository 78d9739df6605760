//! Secondary-index keys.
//!
//! An [`IndexKey`] is the totally ordered projection of an indexable JSON
//! value. Index maps are `BTreeMap<IndexKey, BTreeSet<RecordId>>`, so scans
//! come back in a deterministic order.

use serde_json::Value;

/// A key in a secondary index.
///
/// Strings, integers, and booleans are indexable. Floats, nulls, arrays, and
/// objects are not: a record whose indexed field holds one of those (or is
/// missing entirely) simply has no entry in that index.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IndexKey {
    Bool(bool),
    Number(i128),
    Text(String),
}

impl IndexKey {
    /// Extract an index key from a JSON value, if it is indexable.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(IndexKey::Text(s.clone())),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(IndexKey::Number(i as i128))
                } else {
                    n.as_u64().map(|u| IndexKey::Number(u as i128))
                }
            }
            Value::Bool(b) => Some(IndexKey::Bool(*b)),
            _ => None,
        }
    }
}

impl From<&str> for IndexKey {
    fn from(s: &str) -> Self {
        IndexKey::Text(s.to_string())
    }
}

impl From<String> for IndexKey {
    fn from(s: String) -> Self {
        IndexKey::Text(s)
    }
}

impl From<u64> for IndexKey {
    fn from(n: u64) -> Self {
        IndexKey::Number(n as i128)
    }
}

impl From<i64> for IndexKey {
    fn from(n: i64) -> Self {
        IndexKey::Number(n as i128)
    }
}

impl From<bool> for IndexKey {
    fn from(b: bool) -> Self {
        IndexKey::Bool(b)
    }
}

impl std::fmt::Display for IndexKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IndexKey::Bool(b) => write!(f, "{b}"),
            IndexKey::Number(n) => write!(f, "{n}"),
            IndexKey::Text(s) => write!(f, "{s}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extract_indexable_values() {
        assert_eq!(
            IndexKey::from_value(&json!("d@x.com")),
            Some(IndexKey::Text("d@x.com".into()))
        );
        assert_eq!(
            IndexKey::from_value(&json!(100u64)),
            Some(IndexKey::Number(100))
        );
        assert_eq!(
            IndexKey::from_value(&json!(-5i64)),
            Some(IndexKey::Number(-5))
        );
        assert_eq!(
            IndexKey::from_value(&json!(true)),
            Some(IndexKey::Bool(true))
        );
    }

    #[test]
    fn unindexable_values() {
        assert_eq!(IndexKey::from_value(&json!(null)), None);
        assert_eq!(IndexKey::from_value(&json!(1.5)), None);
        assert_eq!(IndexKey::from_value(&json!([1, 2])), None);
        assert_eq!(IndexKey::from_value(&json!({"a": 1})), None);
    }

    #[test]
    fn integer_equality_across_sign_width() {
        // u64 and i64 extractions of the same magnitude compare equal.
        assert_eq!(IndexKey::from(100u64), IndexKey::from(100i64));
    }

    #[test]
    fn ordering_is_total_within_variant() {
        assert!(IndexKey::from(1u64) < IndexKey::from(2u64));
        assert!(IndexKey::from("a") < IndexKey::from("b"));
    }
}

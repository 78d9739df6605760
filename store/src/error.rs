//! Error types for the CareSync store.

use crate::{CollectionName, RecordId};
use thiserror::Error;

/// All possible errors from the store.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The backing storage could not be opened or has become unusable.
    /// Terminal for the handle; every operation attempted in this state fails.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("collection not found: {0}")]
    CollectionNotFound(CollectionName),

    #[error("index not found: {collection}.{index}")]
    IndexNotFound {
        collection: CollectionName,
        index: String,
    },

    #[error("record not found: {collection}/{id}")]
    NotFound {
        collection: CollectionName,
        id: RecordId,
    },

    /// Uniqueness violation on insert: the primary key or a unique index
    /// value already belongs to another record.
    #[error("duplicate key '{key}' for {collection}.{index}")]
    DuplicateKey {
        collection: CollectionName,
        index: String,
        key: String,
    },

    #[error("invalid record: {0}")]
    InvalidRecord(String),

    /// The in-memory mutation could not be committed to durable storage.
    /// The store is left exactly as it was before the call.
    #[error("transaction failed: {0}")]
    TransactionFailed(String),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

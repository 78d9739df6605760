//! # CareSync Store
//!
//! An indexed local data store with transactional read-modify-write
//! semantics and secondary-index lookups.
//!
//! This crate is the durable leaf of the CareSync stack. It owns named
//! collections of JSON records inside a single versioned database, and
//! exposes atomic single-record operations plus equality scans over
//! declared secondary indexes. It knows nothing about the domain stored in
//! it.
//!
//! ## Design Principles
//!
//! - **Atomic operations**: every multi-step operation (merge-update,
//!   uniqueness-checked insert) runs as one unit; no caller can observe a
//!   read that happened without its write.
//! - **Absence is a value**: `get` never fails for "not found".
//! - **Deterministic**: collections and indexes iterate in stable order, so
//!   scans and snapshots are reproducible.
//! - **Explicit lifecycle**: databases are opened into a handle and closed;
//!   opening the same path twice in one process yields the same handle.
//!
//! ## Core Concepts
//!
//! ### Records
//!
//! A [`Record`] is a JSON object payload keyed by a string primary key
//! declared in the schema, plus store-stamped `created_at` / `updated_at`
//! timestamps. `updated_at` is re-stamped on every persisted write.
//!
//! ### Schema
//!
//! A [`DatabaseSchema`] declares collections ([`CollectionSchema`]) with a
//! primary-key path and secondary indexes ([`IndexDef`]), unique or not.
//! Schema creation happens exactly once, on the first-ever open of a path;
//! later opens reuse the stored data as-is.
//!
//! ### Merge-updates
//!
//! [`Database::merge_update`] is the atomic read-modify-write primitive: it
//! shallow-merges a partial object over the existing payload, preserving
//! every unmentioned field, and fails with `NotFound` (store untouched) if
//! the target does not exist.
//!
//! ## Quick Start
//!
//! ```rust
//! use caresync_store::{
//!     CollectionSchema, Database, DatabaseConfig, DatabaseSchema, IndexDef,
//! };
//! use serde_json::json;
//!
//! # async fn demo() -> Result<(), caresync_store::StoreError> {
//! // 1. Declare a schema
//! let schema = DatabaseSchema::new(1).with_collection(
//!     CollectionSchema::new("users", "id")
//!         .with_index(IndexDef::unique("email", "email")),
//! );
//!
//! // 2. Open a database
//! let db = Database::open(DatabaseConfig::in_memory(schema)).await?;
//!
//! // 3. Insert and read back
//! db.add("users", json!({"id": "u1", "email": "alice@example.com"}))
//!     .await?;
//! assert!(db.get("users", "u1").await?.is_some());
//!
//! // 4. Secondary-index lookup
//! let by_email = db
//!     .query_by_index("users", "email", "alice@example.com")
//!     .await?;
//! assert_eq!(by_email.len(), 1);
//! # Ok(())
//! # }
//! ```
//!
//! ## Persistence
//!
//! File-backed databases persist as a versioned JSON snapshot
//! ([`DatabaseSnapshot`]), rewritten atomically after every mutation. A
//! failed commit reverts the in-memory change and surfaces
//! [`StoreError::TransactionFailed`]; the store never ends up half-applied.

pub mod clock;
pub mod database;
pub mod error;
pub mod index;
pub mod record;
pub mod schema;
pub mod snapshot;

// Re-export main types at crate root
pub use clock::{Clock, ManualClock, SystemClock};
pub use database::{Database, DatabaseConfig};
pub use error::{Result, StoreError};
pub use index::IndexKey;
pub use record::{shallow_merge, Record};
pub use schema::{CollectionSchema, DatabaseSchema, IndexDef};
pub use snapshot::{DatabaseSnapshot, SNAPSHOT_FORMAT_VERSION};

/// Type aliases for clarity
pub type RecordId = String;
pub type CollectionName = String;
pub type Timestamp = u64;
pub type SchemaVersion = u32;

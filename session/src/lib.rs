//! # CareSync Session
//!
//! Session state and optimistic synchronization for CareSync, a local-first
//! health-report sharing application with two roles: patients create
//! reports, doctors review reports routed to them.
//!
//! This crate sits on top of [`caresync_store`] and holds the single source
//! of truth for the current session (role, identity, profile) and the
//! currently visible report collection. Every mutation goes through an
//! optimistic protocol:
//!
//! 1. the in-memory state is updated immediately,
//! 2. the corresponding store merge-update is issued as an outstanding
//!    task,
//! 3. on success the write is acknowledged; on failure the entity is
//!    marked dirty so the divergence is observable (and retryable) rather
//!    than silent.
//!
//! There is no network anywhere in this crate: the "services" in [`auth`]
//! and [`reports`] are local-store operations standing in for what would be
//! remote calls in a deployed version.
//!
//! ## Quick Start
//!
//! ```rust
//! use caresync_session::{app_schema, auth, NewUser, ReportStatus, Session, UserRole};
//! use caresync_store::{Database, DatabaseConfig};
//!
//! # async fn demo() -> Result<(), caresync_session::SessionError> {
//! let db = Database::open(DatabaseConfig::in_memory(app_schema())).await?;
//!
//! let doctor = auth::register(
//!     &db,
//!     NewUser {
//!         name: "Dr. Demir".into(),
//!         email: "d@x.com".into(),
//!         password: "s3cret".into(),
//!         role: UserRole::Doctor,
//!         specialization: Some("cardiology".into()),
//!     },
//! )
//! .await?;
//!
//! let session = Session::new(db);
//! session.sign_in(&doctor).await;
//! session.load_reports().await?;
//!
//! session
//!     .update_report_status("r1", ReportStatus::Reviewed, Some("Looks fine".into()))
//!     .await?;
//! session.flush().await;
//! # Ok(())
//! # }
//! ```

pub mod attachment;
pub mod auth;
pub mod config;
pub mod error;
pub mod pending;
pub mod reports;
pub mod session;
pub mod types;

// Re-export main types at crate root
pub use attachment::{decode_data_uri, encode_data_uri, AttachmentError};
pub use auth::NewUser;
pub use config::{Config, ConfigError};
pub use error::{Result, SessionError};
pub use pending::{EntityKey, WriteState};
pub use session::{Session, SessionState};
pub use types::{
    app_schema, HealthReport, ProfileUpdate, ReportStatus, User, UserProfile, UserRole, REPORTS,
    SCHEMA_VERSION, USERS,
};

//! The process-wide session: current identity, the visible report
//! collection, and the optimistic synchronization protocol.
//!
//! All UI-facing mutations go through [`Session`]. Writes are optimistic:
//! in-memory state is updated first, then the store write is issued as an
//! outstanding task. In-memory state is deliberately allowed to run ahead
//! of the store; a failed write leaves the entity marked dirty (see
//! [`Session::dirty`]) rather than rolling the visible value back.

use crate::config::Config;
use crate::error::Result;
use crate::pending::{EntityKey, PendingWrites};
use crate::reports;
use crate::types::{
    app_schema, HealthReport, ProfileUpdate, ReportStatus, User, UserProfile, UserRole, REPORTS,
    USERS,
};
use caresync_store::{Database, DatabaseConfig};
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory session state. A cache with write-through intent: the store
/// owns the durable copy.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub role: UserRole,
    pub user_id: Option<String>,
    pub display_name: String,
    pub profile: UserProfile,
    /// The currently loaded report collection for the active identity,
    /// newest first.
    pub reports: Vec<HealthReport>,
    /// Cached doctor profiles, refreshed on demand.
    pub doctors: Vec<User>,
    /// Busy flag, pass-through for the UI.
    pub loading: bool,
    /// Panel-selection flag, pass-through for the UI.
    pub panel_open: bool,
}

struct SessionInner {
    db: Database,
    state: RwLock<SessionState>,
    pending: PendingWrites,
}

/// Cheaply clonable handle to the process-wide session.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl Session {
    /// Create a session over an already-open database.
    pub fn new(db: Database) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                db,
                state: RwLock::new(SessionState::default()),
                pending: PendingWrites::new(),
            }),
        }
    }

    /// Open the application database at the configured path and create a
    /// session over it.
    pub async fn open(config: &Config) -> Result<Self> {
        let db =
            Database::open(DatabaseConfig::at_path(app_schema(), config.database_path())).await?;
        Ok(Self::new(db))
    }

    /// The underlying database handle.
    pub fn database(&self) -> &Database {
        &self.inner.db
    }

    /// A snapshot of the current session state.
    pub async fn state(&self) -> SessionState {
        self.inner.state.read().await.clone()
    }

    /// Replace session state wholesale. Synchronous with respect to the
    /// store: no store interaction happens here.
    pub async fn set_session(
        &self,
        role: UserRole,
        name: impl Into<String>,
        user_id: Option<String>,
        profile: Option<UserProfile>,
    ) {
        let mut state = self.inner.state.write().await;
        *state = SessionState {
            role,
            user_id,
            display_name: name.into(),
            profile: profile.unwrap_or_default(),
            ..SessionState::default()
        };
    }

    /// Convenience: start a session for a registered user.
    pub async fn sign_in(&self, user: &User) {
        self.set_session(
            user.role,
            user.name.clone(),
            Some(user.id.clone()),
            Some(user.profile.clone()),
        )
        .await;
    }

    /// Reset to an unauthenticated guest session.
    pub async fn sign_out(&self) {
        self.set_session(UserRole::Guest, "", None, None).await;
    }

    /// UI pass-through: toggle the panel-selection flag.
    pub async fn set_panel_open(&self, open: bool) {
        self.inner.state.write().await.panel_open = open;
    }

    /// Load the report collection for the active identity: patients get
    /// reports they own, doctors get reports routed to them. A no-op
    /// without an identity.
    ///
    /// The loading flag is always cleared, success or failure. On failure
    /// the previously held collection is kept (stale, not corrupted) and
    /// the typed error is returned; an empty result and a failed fetch are
    /// distinguishable.
    pub async fn load_reports(&self) -> Result<()> {
        let (role, user_id) = {
            let state = self.inner.state.read().await;
            (state.role, state.user_id.clone())
        };
        let Some(user_id) = user_id else {
            return Ok(());
        };
        if role == UserRole::Guest {
            return Ok(());
        }

        self.inner.state.write().await.loading = true;

        let fetched = if role == UserRole::Patient {
            reports::reports_for_patient(&self.inner.db, &user_id).await
        } else {
            reports::reports_for_doctor(&self.inner.db, &user_id).await
        };

        let mut state = self.inner.state.write().await;
        state.loading = false;
        match fetched {
            Ok(reports) => {
                state.reports = reports;
                Ok(())
            }
            Err(e) => {
                tracing::warn!(role = role.as_str(), error = %e, "report fetch failed; keeping previous collection");
                Err(e)
            }
        }
    }

    /// Refresh the cached doctor list. On failure the previous cache is
    /// kept and the error returned.
    pub async fn load_doctors(&self) -> Result<()> {
        match reports::all_doctors(&self.inner.db).await {
            Ok(doctors) => {
                self.inner.state.write().await.doctors = doctors;
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "doctor fetch failed; keeping previous cache");
                Err(e)
            }
        }
    }

    /// Prepend a report to the in-memory collection without touching the
    /// store. Used for immediate feedback after an externally-performed
    /// save.
    pub async fn add_report_local(&self, report: HealthReport) {
        self.inner.state.write().await.reports.insert(0, report);
    }

    /// Optimistically set a report's status (and optionally notes).
    ///
    /// The in-memory report is rewritten synchronously, before the store
    /// write settles. The write runs as an outstanding task; if it fails,
    /// the report stays visible with its optimistic value and its key
    /// appears in [`Session::dirty`].
    pub async fn update_report_status(
        &self,
        id: &str,
        status: ReportStatus,
        notes: Option<String>,
    ) -> Result<()> {
        {
            let mut state = self.inner.state.write().await;
            if let Some(report) = state.reports.iter_mut().find(|r| r.id == id) {
                report.status = status;
                if let Some(notes) = &notes {
                    report.doctor_notes = Some(notes.clone());
                }
            }
        }

        let patch = reports::status_patch(status, notes.as_deref())?;
        self.spawn_write(REPORTS, id, patch).await;
        Ok(())
    }

    /// Optimistically merge a partial update into the active profile and
    /// display name, then persist it with the same outstanding-write
    /// protocol. A no-op without an active identity.
    pub async fn update_profile(&self, update: ProfileUpdate) -> Result<()> {
        let user_id = self.inner.state.read().await.user_id.clone();
        let Some(user_id) = user_id else {
            tracing::debug!("profile update ignored: no active identity");
            return Ok(());
        };

        {
            let mut guard = self.inner.state.write().await;
            let state = &mut *guard;
            update.apply_to(&mut state.display_name, &mut state.profile);
        }

        self.spawn_write(USERS, &user_id, update.to_patch()).await;
        Ok(())
    }

    /// Issue a merge-update as an outstanding task tracked by the
    /// pending-write ledger.
    async fn spawn_write(&self, collection: &'static str, record_id: &str, patch: serde_json::Value) {
        let ticket = self
            .inner
            .pending
            .register(collection, record_id, patch.clone())
            .await;

        let inner = Arc::clone(&self.inner);
        let record_id = record_id.to_string();
        let handle = tokio::spawn(async move {
            match inner.db.merge_update(collection, &record_id, patch).await {
                Ok(_) => inner.pending.settle_ok(ticket).await,
                Err(e) => {
                    tracing::warn!(
                        %collection,
                        %record_id,
                        error = %e,
                        "optimistic write failed; marking entity dirty"
                    );
                    inner.pending.settle_failed(ticket).await;
                }
            }
        });
        self.inner.pending.track(handle).await;
    }

    /// Await every outstanding store write.
    pub async fn flush(&self) {
        self.inner.pending.flush().await;
    }

    /// Entities whose optimistic write failed: in-memory state is ahead of
    /// the store for these.
    pub async fn dirty(&self) -> Vec<EntityKey> {
        self.inner.pending.dirty().await
    }

    /// Re-issue every failed write with its recorded merge payload.
    /// Returns how many entities remain dirty afterwards.
    pub async fn retry_dirty(&self) -> usize {
        for (ticket, key, patch) in self.inner.pending.failed_entries().await {
            match self
                .inner
                .db
                .merge_update(&key.collection, &key.record_id, patch)
                .await
            {
                Ok(_) => self.inner.pending.remove(ticket).await,
                Err(e) => {
                    tracing::warn!(
                        collection = %key.collection,
                        record_id = %key.record_id,
                        error = %e,
                        "retry failed; entity stays dirty"
                    );
                }
            }
        }
        self.inner.pending.dirty().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use caresync_store::DatabaseConfig;

    async fn test_session() -> Session {
        let db = Database::open(DatabaseConfig::in_memory(app_schema()))
            .await
            .unwrap();
        Session::new(db)
    }

    fn report(id: &str, timestamp: u64) -> HealthReport {
        HealthReport {
            id: id.into(),
            user_id: "p1".into(),
            target_doctor_id: "d1".into(),
            timestamp,
            status: ReportStatus::Pending,
            doctor_notes: None,
            title: String::new(),
            file_name: None,
            attachment: None,
            updated_at: 0,
        }
    }

    #[tokio::test]
    async fn set_session_replaces_wholesale() {
        let session = test_session().await;
        session.add_report_local(report("r1", 100)).await;

        session
            .set_session(UserRole::Doctor, "Dr. D", Some("d1".into()), None)
            .await;

        let state = session.state().await;
        assert_eq!(state.role, UserRole::Doctor);
        assert_eq!(state.display_name, "Dr. D");
        assert_eq!(state.user_id.as_deref(), Some("d1"));
        // Wholesale replacement: the previous collection is gone.
        assert!(state.reports.is_empty());
    }

    #[tokio::test]
    async fn sign_out_resets_to_guest() {
        let session = test_session().await;
        session
            .set_session(UserRole::Patient, "Pat", Some("p1".into()), None)
            .await;
        session.sign_out().await;

        let state = session.state().await;
        assert_eq!(state.role, UserRole::Guest);
        assert_eq!(state.user_id, None);
    }

    #[tokio::test]
    async fn add_report_local_prepends() {
        let session = test_session().await;
        session.add_report_local(report("r1", 100)).await;
        session.add_report_local(report("r2", 200)).await;

        let state = session.state().await;
        let ids: Vec<_> = state.reports.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["r2", "r1"]);
    }

    #[tokio::test]
    async fn load_reports_without_identity_is_a_noop() {
        let session = test_session().await;
        session.add_report_local(report("r1", 100)).await;

        session.load_reports().await.unwrap();

        // Nothing fetched, nothing replaced.
        assert_eq!(session.state().await.reports.len(), 1);
        assert!(!session.state().await.loading);
    }

    #[tokio::test]
    async fn panel_flag_passes_through() {
        let session = test_session().await;
        session.set_panel_open(true).await;
        assert!(session.state().await.panel_open);
        session.set_panel_open(false).await;
        assert!(!session.state().await.panel_open);
    }
}

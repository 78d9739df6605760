//! Typed report and profile services over the store.
//!
//! Thin, stateless wrappers that translate between domain types and store
//! records. Every returned report collection is sorted newest first
//! (`timestamp` descending); the sort is stable, so ties keep the store's
//! deterministic order.

use crate::error::Result;
use crate::types::{HealthReport, ProfileUpdate, ReportStatus, User, UserRole, REPORTS, USERS};
use caresync_store::Database;

fn sort_newest_first(reports: &mut [HealthReport]) {
    reports.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
}

/// Persist a newly created report.
pub async fn save_report(db: &Database, report: &HealthReport) -> Result<HealthReport> {
    let record = db.add(REPORTS, report.to_payload()).await?;
    Ok(HealthReport::from_record(&record)?)
}

/// Fetch one report by id.
pub async fn fetch_report(db: &Database, id: &str) -> Result<Option<HealthReport>> {
    match db.get(REPORTS, id).await? {
        Some(record) => Ok(Some(HealthReport::from_record(&record)?)),
        None => Ok(None),
    }
}

/// All reports owned by a patient, newest first.
pub async fn reports_for_patient(db: &Database, user_id: &str) -> Result<Vec<HealthReport>> {
    let records = db.query_by_index(REPORTS, "userId", user_id).await?;
    let mut reports = records
        .iter()
        .map(HealthReport::from_record)
        .collect::<std::result::Result<Vec<_>, _>>()?;
    sort_newest_first(&mut reports);
    Ok(reports)
}

/// All reports routed to a doctor, newest first.
pub async fn reports_for_doctor(db: &Database, doctor_id: &str) -> Result<Vec<HealthReport>> {
    let records = db.query_by_index(REPORTS, "targetDoctorId", doctor_id).await?;
    let mut reports = records
        .iter()
        .map(HealthReport::from_record)
        .collect::<std::result::Result<Vec<_>, _>>()?;
    sort_newest_first(&mut reports);
    Ok(reports)
}

/// Every registered doctor profile.
pub async fn all_doctors(db: &Database) -> Result<Vec<User>> {
    let records = db
        .query_by_index(USERS, "role", UserRole::Doctor.as_str())
        .await?;
    Ok(records
        .iter()
        .map(User::from_record)
        .collect::<std::result::Result<Vec<_>, _>>()?)
}

/// Merge a status (and optional notes) into a stored report.
///
/// `doctorNotes` is only written when notes are given; otherwise existing
/// notes are left as they are.
pub async fn update_report_status(
    db: &Database,
    id: &str,
    status: ReportStatus,
    notes: Option<&str>,
) -> Result<HealthReport> {
    let patch = status_patch(status, notes)?;
    let record = db.merge_update(REPORTS, id, patch).await?;
    Ok(HealthReport::from_record(&record)?)
}

/// Merge a partial profile update into a stored user.
pub async fn update_profile(
    db: &Database,
    user_id: &str,
    update: &ProfileUpdate,
) -> Result<User> {
    let record = db.merge_update(USERS, user_id, update.to_patch()).await?;
    Ok(User::from_record(&record)?)
}

/// The merge payload for a status update.
pub(crate) fn status_patch(
    status: ReportStatus,
    notes: Option<&str>,
) -> Result<serde_json::Value> {
    let mut patch = serde_json::Map::new();
    patch.insert("status".to_string(), serde_json::to_value(status)?);
    if let Some(notes) = notes {
        patch.insert("doctorNotes".to_string(), serde_json::Value::from(notes));
    }
    Ok(serde_json::Value::Object(patch))
}

//! Domain types: users, health reports, and the application schema.
//!
//! Field names follow the store's on-disk layout (`camelCase`), so a
//! serialized `User` or `HealthReport` is exactly the payload the store
//! persists and indexes.

use caresync_store::{CollectionSchema, DatabaseSchema, IndexDef, Record, Timestamp};
use serde::{Deserialize, Serialize};

/// Name of the users collection.
pub const USERS: &str = "users";
/// Name of the reports collection.
pub const REPORTS: &str = "reports";
/// Current application schema version.
pub const SCHEMA_VERSION: u32 = 1;

/// Role of a registered identity. Set at registration, immutable after.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Patient,
    Doctor,
    #[default]
    Guest,
}

impl UserRole {
    /// The serialized form, as stored in the `role` index.
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Patient => "patient",
            UserRole::Doctor => "doctor",
            UserRole::Guest => "guest",
        }
    }
}

/// Review state of a health report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    #[default]
    Pending,
    Reviewed,
}

/// Free-form profile fields carried by every user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub blood_group: String,
    pub age: String,
    pub height: String,
    pub weight: String,
    pub phone: String,
    pub dob: String,
}

impl Default for UserProfile {
    fn default() -> Self {
        Self {
            blood_group: "Unknown".to_string(),
            age: String::new(),
            height: String::new(),
            weight: String::new(),
            phone: String::new(),
            dob: String::new(),
        }
    }
}

/// A registered identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Globally unique, generated at registration. Immutable.
    pub id: String,
    /// Unique across all users, enforced by the store's `email` index.
    pub email: String,
    /// Salted digest, never the raw credential.
    pub password_hash: String,
    pub name: String,
    pub role: UserRole,
    /// Doctors only; may be empty.
    #[serde(default)]
    pub specialization: String,
    #[serde(flatten)]
    pub profile: UserProfile,
    /// Creation timestamp in milliseconds. Immutable.
    pub created_at: Timestamp,
}

impl User {
    /// The JSON payload the store persists for this user.
    pub fn to_payload(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }

    /// Decode a stored record back into a user.
    pub fn from_record(record: &Record) -> Result<Self, serde_json::Error> {
        serde_json::from_value(record.payload.clone())
    }
}

/// An uploaded health record, routed from a patient to one doctor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    /// Caller-supplied at creation.
    pub id: String,
    /// Owning patient. Set at creation, never changes.
    pub user_id: String,
    /// The doctor this report is routed to. Set at creation, never changes.
    pub target_doctor_id: String,
    /// Sole sort key; collections are shown newest first.
    pub timestamp: Timestamp,
    pub status: ReportStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doctor_notes: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    /// Opaque data-URI string produced by the attachment codec.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<String>,
    /// Stamped by the store on every persisted write; never serialized
    /// into the payload.
    #[serde(default, skip_serializing)]
    pub updated_at: Timestamp,
}

impl HealthReport {
    /// The JSON payload the store persists for this report.
    pub fn to_payload(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }

    /// Decode a stored record, taking `updated_at` from the store stamp.
    pub fn from_record(record: &Record) -> Result<Self, serde_json::Error> {
        let mut report: Self = serde_json::from_value(record.payload.clone())?;
        report.updated_at = record.updated_at;
        Ok(report)
    }
}

/// Partial profile update. Absent fields are left untouched by the
/// merge-update.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specialization: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blood_group: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dob: Option<String>,
}

impl ProfileUpdate {
    /// The merge-update payload: only the fields that are set.
    pub fn to_patch(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }

    /// Apply the update to an in-memory profile and name.
    pub fn apply_to(&self, name: &mut String, profile: &mut UserProfile) {
        if let Some(v) = &self.name {
            *name = v.clone();
        }
        if let Some(v) = &self.blood_group {
            profile.blood_group = v.clone();
        }
        if let Some(v) = &self.age {
            profile.age = v.clone();
        }
        if let Some(v) = &self.height {
            profile.height = v.clone();
        }
        if let Some(v) = &self.weight {
            profile.weight = v.clone();
        }
        if let Some(v) = &self.phone {
            profile.phone = v.clone();
        }
        if let Some(v) = &self.dob {
            profile.dob = v.clone();
        }
    }
}

/// The fixed application schema: two collections, keyed by `id`.
///
/// - `users`: unique index on `email`, non-unique index on `role`.
/// - `reports`: non-unique indexes on `userId`, `targetDoctorId`, and
///   `timestamp`.
pub fn app_schema() -> DatabaseSchema {
    DatabaseSchema::new(SCHEMA_VERSION)
        .with_collection(
            CollectionSchema::new(USERS, "id")
                .with_index(IndexDef::unique("email", "email"))
                .with_index(IndexDef::non_unique("role", "role")),
        )
        .with_collection(
            CollectionSchema::new(REPORTS, "id")
                .with_index(IndexDef::non_unique("userId", "userId"))
                .with_index(IndexDef::non_unique("targetDoctorId", "targetDoctorId"))
                .with_index(IndexDef::non_unique("timestamp", "timestamp")),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_value(UserRole::Doctor).unwrap(), "doctor");
        assert_eq!(UserRole::Patient.as_str(), "patient");
    }

    #[test]
    fn user_payload_is_camel_case_and_flat() {
        let user = User {
            id: "u1".into(),
            email: "a@x.com".into(),
            password_hash: "salt$digest".into(),
            name: "Alice".into(),
            role: UserRole::Patient,
            specialization: String::new(),
            profile: UserProfile::default(),
            created_at: 1000,
        };

        let payload = user.to_payload();
        assert_eq!(payload["passwordHash"], "salt$digest");
        assert_eq!(payload["createdAt"], 1000);
        // Profile fields are flattened into the top level, where the
        // store's key paths can see them.
        assert_eq!(payload["bloodGroup"], "Unknown");

        let back: User = serde_json::from_value(payload).unwrap();
        assert_eq!(back, user);
    }

    #[test]
    fn report_payload_omits_store_owned_stamp() {
        let report = HealthReport {
            id: "r1".into(),
            user_id: "p1".into(),
            target_doctor_id: "d1".into(),
            timestamp: 100,
            status: ReportStatus::Pending,
            doctor_notes: None,
            title: "x-ray".into(),
            file_name: None,
            attachment: None,
            updated_at: 9999,
        };

        let payload = report.to_payload();
        assert_eq!(payload["userId"], "p1");
        assert_eq!(payload["targetDoctorId"], "d1");
        assert!(payload.get("updatedAt").is_none());
        assert!(payload.get("doctorNotes").is_none());
    }

    #[test]
    fn report_from_record_takes_store_stamp() {
        let payload = json!({
            "id": "r1",
            "userId": "p1",
            "targetDoctorId": "d1",
            "timestamp": 100u64,
            "status": "reviewed",
            "doctorNotes": "ok",
        });
        let record = Record::new("r1", payload, 7777);

        let report = HealthReport::from_record(&record).unwrap();
        assert_eq!(report.status, ReportStatus::Reviewed);
        assert_eq!(report.doctor_notes.as_deref(), Some("ok"));
        assert_eq!(report.updated_at, 7777);
    }

    #[test]
    fn profile_update_patch_only_carries_set_fields() {
        let update = ProfileUpdate {
            blood_group: Some("O+".into()),
            ..Default::default()
        };

        assert_eq!(update.to_patch(), json!({"bloodGroup": "O+"}));
    }

    #[test]
    fn profile_update_applies_in_memory() {
        let mut name = "Alice".to_string();
        let mut profile = UserProfile::default();

        let update = ProfileUpdate {
            name: Some("Dr. Alice".into()),
            phone: Some("555-0100".into()),
            ..Default::default()
        };
        update.apply_to(&mut name, &mut profile);

        assert_eq!(name, "Dr. Alice");
        assert_eq!(profile.phone, "555-0100");
        assert_eq!(profile.blood_group, "Unknown");
    }

    #[test]
    fn app_schema_declares_both_collections() {
        let schema = app_schema();
        let users = schema.get_collection(USERS).unwrap();
        assert!(users.index("email").unwrap().unique);
        assert!(!users.index("role").unwrap().unique);

        let reports = schema.get_collection(REPORTS).unwrap();
        assert!(reports.index("userId").is_some());
        assert!(reports.index("targetDoctorId").is_some());
        assert!(reports.index("timestamp").is_some());
    }
}

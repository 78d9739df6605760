//! Registration and login against the local users collection.
//!
//! These are local-store operations standing in for what would be remote
//! calls in a deployed version. Credentials are stored as salted SHA-256
//! digests, never in the clear.

use crate::error::{Result, SessionError};
use crate::types::{User, UserProfile, UserRole, USERS};
use caresync_store::{Database, StoreError};
use data_encoding::HEXLOWER;
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Input to [`register`].
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: UserRole,
    /// Doctors only; ignored as empty for other roles.
    pub specialization: Option<String>,
}

/// Hash a password with a fresh random salt. Format: `salt$digest`, hex.
fn hash_password(password: &str) -> String {
    let mut salt = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut salt);
    let digest = digest_with_salt(&salt, password);
    format!("{}${}", HEXLOWER.encode(&salt), HEXLOWER.encode(&digest))
}

/// Check a password against a stored `salt$digest` hash.
fn verify_password(password: &str, stored: &str) -> bool {
    let Some((salt_hex, digest_hex)) = stored.split_once('$') else {
        return false;
    };
    let Ok(salt) = HEXLOWER.decode(salt_hex.as_bytes()) else {
        return false;
    };
    let digest = digest_with_salt(&salt, password);
    HEXLOWER.encode(&digest) == digest_hex
}

fn digest_with_salt(salt: &[u8], password: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    hasher.finalize().into()
}

/// Register a new identity.
///
/// The id is generated here; `created_at` comes from the store clock. A
/// conflicting email fails with [`SessionError::EmailAlreadyRegistered`]
/// and leaves the store untouched.
pub async fn register(db: &Database, new_user: NewUser) -> Result<User> {
    let user = User {
        id: uuid::Uuid::new_v4().to_string(),
        email: new_user.email,
        password_hash: hash_password(&new_user.password),
        name: new_user.name,
        role: new_user.role,
        specialization: new_user.specialization.unwrap_or_default(),
        profile: UserProfile::default(),
        created_at: db.now_ms(),
    };

    match db.add(USERS, user.to_payload()).await {
        Ok(_) => {
            tracing::debug!(user_id = %user.id, role = user.role.as_str(), "registered user");
            Ok(user)
        }
        Err(StoreError::DuplicateKey { index, .. }) if index == "email" => {
            Err(SessionError::EmailAlreadyRegistered(user.email))
        }
        Err(e) => Err(e.into()),
    }
}

/// Authenticate by email and password.
///
/// Unknown email and mismatched password both fail with the same
/// [`SessionError::InvalidCredential`].
pub async fn login(db: &Database, email: &str, password: &str) -> Result<User> {
    let matches = db.query_by_index(USERS, "email", email).await?;
    let record = matches.first().ok_or(SessionError::InvalidCredential)?;
    let user = User::from_record(record)?;

    if !verify_password(password, &user.password_hash) {
        return Err(SessionError::InvalidCredential);
    }
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::app_schema;
    use caresync_store::DatabaseConfig;

    async fn test_db() -> Database {
        Database::open(DatabaseConfig::in_memory(app_schema()))
            .await
            .unwrap()
    }

    fn doctor() -> NewUser {
        NewUser {
            name: "Dr. Demir".into(),
            email: "d@x.com".into(),
            password: "s3cret".into(),
            role: UserRole::Doctor,
            specialization: Some("cardiology".into()),
        }
    }

    #[test]
    fn hash_is_salted_and_verifiable() {
        let a = hash_password("hunter2");
        let b = hash_password("hunter2");
        assert_ne!(a, b);

        assert!(verify_password("hunter2", &a));
        assert!(verify_password("hunter2", &b));
        assert!(!verify_password("hunter3", &a));
        assert!(!verify_password("hunter2", "garbage"));
    }

    #[tokio::test]
    async fn register_then_login() {
        let db = test_db().await;
        let registered = register(&db, doctor()).await.unwrap();
        assert_eq!(registered.role, UserRole::Doctor);
        assert_eq!(registered.specialization, "cardiology");
        assert_ne!(registered.password_hash, "s3cret");

        let logged_in = login(&db, "d@x.com", "s3cret").await.unwrap();
        assert_eq!(logged_in.id, registered.id);
    }

    #[tokio::test]
    async fn duplicate_email_is_a_registration_failure() {
        let db = test_db().await;
        register(&db, doctor()).await.unwrap();

        let err = register(&db, doctor()).await.unwrap_err();
        assert!(matches!(err, SessionError::EmailAlreadyRegistered(e) if e == "d@x.com"));

        // Exactly one user record remains.
        assert_eq!(db.query_all(USERS).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn login_failures_are_uniform() {
        let db = test_db().await;
        register(&db, doctor()).await.unwrap();

        let unknown = login(&db, "nobody@x.com", "s3cret").await.unwrap_err();
        let wrong = login(&db, "d@x.com", "wrong").await.unwrap_err();

        assert_eq!(unknown.to_string(), wrong.to_string());
        assert!(matches!(unknown, SessionError::InvalidCredential));
        assert!(matches!(wrong, SessionError::InvalidCredential));
    }
}

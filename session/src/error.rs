//! Unified error handling for the synchronization layer.

use caresync_store::StoreError;
use thiserror::Error;

/// Errors surfaced by session operations and the local services.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Unknown email or mismatched credential. Deliberately the same
    /// variant for both, so login failures don't leak which one it was.
    #[error("invalid email or password")]
    InvalidCredential,

    #[error("email already registered: {0}")]
    EmailAlreadyRegistered(String),

    /// A stored record no longer decodes into its domain type.
    #[error("malformed record in store: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Result type for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_pass_through() {
        let err: SessionError = StoreError::CollectionNotFound("users".into()).into();
        assert_eq!(err.to_string(), "collection not found: users");
    }

    #[test]
    fn credential_error_is_uniform() {
        assert_eq!(
            SessionError::InvalidCredential.to_string(),
            "invalid email or password"
        );
    }
}

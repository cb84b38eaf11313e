//! Error types for the store layer

use pagecraft_common::{CommonError, DocumentId, SessionId, UserId};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    /// An active session already holds the `(document, user)` key. Raised at
    /// write time by the uniqueness constraint, never by a read-side check.
    #[error("Active session already exists for document {document_id}, user {user_id}")]
    DuplicateSession {
        document_id: DocumentId,
        user_id: UserId,
    },

    /// The session named as the supersession target is no longer the active
    /// session for its key.
    #[error("Session {session_id} is no longer active")]
    SessionVanished { session_id: SessionId },

    /// A persisted row failed to decode
    #[error("Corrupt row: {0}")]
    Corrupt(String),

    /// The backing store failed the operation
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::Unavailable(e.to_string())
    }
}

impl From<CommonError> for StoreError {
    fn from(e: CommonError) -> Self {
        StoreError::Corrupt(e.to_string())
    }
}

//! Error types for the coordinator

use crate::ingest::IngestError;
use crate::resolver::ResolveError;
use pagecraft_common::{DocumentId, SessionId, UserId};
use pagecraft_store::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoordinatorError {
    /// A race created a competing session first. Recoverable: retry the
    /// admission check and surface the resulting conflict.
    #[error("Session already exists for document {document_id}, user {user_id}")]
    SessionAlreadyExists {
        document_id: DocumentId,
        user_id: UserId,
    },

    /// The supersession target was closed or replaced before the operation
    /// completed. Recoverable: retry the admission check.
    #[error("Session {session_id} was already closed or replaced")]
    StaleSupersession { session_id: SessionId },

    /// Terminal for the request that used this id; not retried with it
    #[error("Session not found: {session_id}")]
    SessionNotFound { session_id: SessionId },

    #[error("Ingestion failed: {0}")]
    Ingestion(#[from] IngestError),

    #[error("Document resolution failed: {0}")]
    Document(#[from] ResolveError),

    /// Durable store failure. Surfaced as a hard failure; the coordinator
    /// never retries on its own.
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for CoordinatorError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::DuplicateSession {
                document_id,
                user_id,
            } => CoordinatorError::SessionAlreadyExists {
                document_id,
                user_id,
            },
            StoreError::SessionVanished { session_id } => {
                CoordinatorError::StaleSupersession { session_id }
            }
            other => CoordinatorError::Store(other),
        }
    }
}

//! Storage trait for the presence registry and the component mirror.
//!
//! Every multi-row write below is one transaction boundary: either all of its
//! rows land, or none do. That is what lets the coordinator promise that a
//! mirror entry never outlives its session and that admission races resolve
//! deterministically.

use crate::error::StoreError;
use crate::mirror::ComponentMirrorEntry;
use crate::presence::{SessionRole, SessionRow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pagecraft_common::{DocumentId, SessionId, UserId};

#[async_trait]
pub trait CoordinatorStore: Send + Sync {
    /// Look up the active session for a `(document, user)` key, if any
    async fn find_active(
        &self,
        document_id: DocumentId,
        user_id: &UserId,
    ) -> Result<Option<SessionRow>, StoreError>;

    async fn get_session(&self, session_id: SessionId) -> Result<Option<SessionRow>, StoreError>;

    /// All sessions currently open on a document, across users
    async fn sessions_for_document(
        &self,
        document_id: DocumentId,
    ) -> Result<Vec<SessionRow>, StoreError>;

    async fn components_for_session(
        &self,
        session_id: SessionId,
    ) -> Result<Vec<ComponentMirrorEntry>, StoreError>;

    /// Write a session row and all of its mirror entries atomically.
    ///
    /// Fails with [`StoreError::DuplicateSession`], writing nothing, if an
    /// active session already holds the row's `(document, user)` key.
    async fn insert_session(
        &self,
        row: SessionRow,
        entries: Vec<ComponentMirrorEntry>,
    ) -> Result<(), StoreError>;

    /// Replace `previous` with `row` in one transaction: delete the previous
    /// session's mirror entries and its row, then insert the replacement and
    /// its entries.
    ///
    /// Fails with [`StoreError::SessionVanished`], writing nothing, if
    /// `previous` is not currently the active session for the row's key.
    /// Concurrent supersessions of the same target have exactly one winner.
    async fn supersede_session(
        &self,
        previous: SessionId,
        row: SessionRow,
        entries: Vec<ComponentMirrorEntry>,
    ) -> Result<(), StoreError>;

    /// Delete a session row and all of its mirror entries atomically.
    /// Returns false (not an error) when the session was already gone.
    async fn delete_session(&self, session_id: SessionId) -> Result<bool, StoreError>;

    /// Heartbeat update; returns false when the session no longer exists
    async fn touch(&self, session_id: SessionId, now: DateTime<Utc>) -> Result<bool, StoreError>;

    /// Role change; returns false when the session no longer exists
    async fn update_role(
        &self,
        session_id: SessionId,
        role: SessionRole,
    ) -> Result<bool, StoreError>;

    /// Administrative cleanup: remove every session whose `last_action` is
    /// older than `cutoff`, together with its mirror entries. Returns the
    /// removed rows.
    async fn purge_stale(&self, cutoff: DateTime<Utc>) -> Result<Vec<SessionRow>, StoreError>;
}

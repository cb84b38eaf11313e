//! In-memory store backend.
//!
//! Both tables live behind a single mutex and every multi-step operation
//! holds the lock for its whole span, which makes the operations trivially
//! linearizable. Used by coordinator tests and as a zero-setup backend.

use crate::error::StoreError;
use crate::mirror::ComponentMirrorEntry;
use crate::presence::{SessionRole, SessionRow};
use crate::store::CoordinatorStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pagecraft_common::{DocumentId, SessionId, UserId};
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Default)]
struct Inner {
    sessions: HashMap<SessionId, SessionRow>,
    components: HashMap<SessionId, Vec<ComponentMirrorEntry>>,
}

impl Inner {
    fn active_for_key(&self, document_id: DocumentId, user_id: &UserId) -> Option<&SessionRow> {
        self.sessions
            .values()
            .find(|row| row.document_id == document_id && row.user_id == *user_id)
    }

    fn remove(&mut self, session_id: SessionId) -> Option<SessionRow> {
        self.components.remove(&session_id);
        self.sessions.remove(&session_id)
    }
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CoordinatorStore for MemoryStore {
    async fn find_active(
        &self,
        document_id: DocumentId,
        user_id: &UserId,
    ) -> Result<Option<SessionRow>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.active_for_key(document_id, user_id).cloned())
    }

    async fn get_session(&self, session_id: SessionId) -> Result<Option<SessionRow>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.sessions.get(&session_id).cloned())
    }

    async fn sessions_for_document(
        &self,
        document_id: DocumentId,
    ) -> Result<Vec<SessionRow>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut rows: Vec<SessionRow> = inner
            .sessions
            .values()
            .filter(|row| row.document_id == document_id)
            .cloned()
            .collect();
        rows.sort_by_key(|row| row.opened_at);
        Ok(rows)
    }

    async fn components_for_session(
        &self,
        session_id: SessionId,
    ) -> Result<Vec<ComponentMirrorEntry>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.components.get(&session_id).cloned().unwrap_or_default())
    }

    async fn insert_session(
        &self,
        row: SessionRow,
        entries: Vec<ComponentMirrorEntry>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();

        if inner.active_for_key(row.document_id, &row.user_id).is_some() {
            return Err(StoreError::DuplicateSession {
                document_id: row.document_id,
                user_id: row.user_id,
            });
        }

        inner.components.insert(row.session_id, entries);
        inner.sessions.insert(row.session_id, row);
        Ok(())
    }

    async fn supersede_session(
        &self,
        previous: SessionId,
        row: SessionRow,
        entries: Vec<ComponentMirrorEntry>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();

        // The target must still be the active session for the key
        let holds_key = inner
            .active_for_key(row.document_id, &row.user_id)
            .map(|active| active.session_id == previous)
            .unwrap_or(false);
        if !holds_key {
            return Err(StoreError::SessionVanished {
                session_id: previous,
            });
        }

        inner.remove(previous);
        inner.components.insert(row.session_id, entries);
        inner.sessions.insert(row.session_id, row);
        Ok(())
    }

    async fn delete_session(&self, session_id: SessionId) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        Ok(inner.remove(session_id).is_some())
    }

    async fn touch(&self, session_id: SessionId, now: DateTime<Utc>) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        match inner.sessions.get_mut(&session_id) {
            Some(row) => {
                row.last_action = now;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn update_role(
        &self,
        session_id: SessionId,
        role: SessionRole,
    ) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        match inner.sessions.get_mut(&session_id) {
            Some(row) => {
                row.role = role;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn purge_stale(&self, cutoff: DateTime<Utc>) -> Result<Vec<SessionRow>, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let stale: Vec<SessionId> = inner
            .sessions
            .values()
            .filter(|row| row.last_action < cutoff)
            .map(|row| row.session_id)
            .collect();

        let mut removed = Vec::with_capacity(stale.len());
        for session_id in stale {
            if let Some(row) = inner.remove(session_id) {
                removed.push(row);
            }
        }
        Ok(removed)
    }
}

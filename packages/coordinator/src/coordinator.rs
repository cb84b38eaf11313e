//! # Session Coordinator
//!
//! Orchestrates admission checks, session creation, forced supersession,
//! liveness evaluation and atomic teardown over the durable store.
//!
//! Every operation is safe under arbitrary interleaving of requests for the
//! same and different `(document, user)` keys: the store's write-time
//! constraints decide races, and the coordinator converts the outcomes into
//! typed results instead of masking them. For a single key, "old session
//! gone" is observed by all readers strictly before "new session visible";
//! both transitions happen inside one store transaction.

use crate::admission::AdmissionResult;
use crate::errors::CoordinatorError;
use crate::ingest::{ImportMode, IngestionAdapter};
use crate::liveness::{staleness_of, Staleness};
use crate::resolver::{DocumentResolver, Locator};
use chrono::{Duration, Utc};
use pagecraft_common::{DocumentId, SessionId, UserId, VersionId};
use pagecraft_store::{ComponentMirrorEntry, CoordinatorStore, SessionRole, SessionRow};
use std::fmt;
use std::sync::Arc;

/// Coordinator tuning
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Idle span after which a session counts as advisory-stale
    pub stale_after: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            stale_after: Duration::minutes(15),
        }
    }
}

/// Which revision a new session should mirror
#[derive(Debug, Clone)]
pub enum VersionSource {
    /// Materialize a new revision from uploaded package bytes under a
    /// pre-allocated id (the one the admission check handed out)
    New {
        version_id: VersionId,
        package: Vec<u8>,
    },

    /// Reuse an existing version pointer
    Existing(VersionId),
}

/// Inputs for opening a session
#[derive(Debug, Clone)]
pub struct CreateSession {
    pub document_id: DocumentId,
    pub version: VersionSource,
    pub user_id: UserId,
    pub role: SessionRole,
    pub node_affinity: String,
    pub client_origin: String,
    pub import_mode: ImportMode,
}

/// Why a session is being closed; recorded in the log stream only
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    UserClosed,
    Superseded,
    AdminPurge,
    ClientGone,
}

impl CloseReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            CloseReason::UserClosed => "user_closed",
            CloseReason::Superseded => "superseded",
            CloseReason::AdminPurge => "admin_purge",
            CloseReason::ClientGone => "client_gone",
        }
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct SessionCoordinator {
    store: Arc<dyn CoordinatorStore>,
    resolver: Arc<dyn DocumentResolver>,
    ingestion: Arc<dyn IngestionAdapter>,
    config: CoordinatorConfig,
}

impl SessionCoordinator {
    pub fn new(
        store: Arc<dyn CoordinatorStore>,
        resolver: Arc<dyn DocumentResolver>,
        ingestion: Arc<dyn IngestionAdapter>,
        config: CoordinatorConfig,
    ) -> Self {
        Self {
            store,
            resolver,
            ingestion,
            config,
        }
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Admission check: resolve the document and report whether the
    /// `(document, user)` key is free.
    ///
    /// Pure read. Two concurrent checks may both come back `Admitted`; the
    /// store's uniqueness constraint settles that race at creation time, so
    /// this check never needs a lock of its own.
    pub async fn check_open(
        &self,
        locator: &Locator,
        user_id: &UserId,
    ) -> Result<AdmissionResult, CoordinatorError> {
        let document_id = self.resolver.resolve_or_create(locator).await?;

        match self.store.find_active(document_id, user_id).await? {
            Some(existing) => Ok(AdmissionResult::Conflict { existing }),
            None => Ok(AdmissionResult::Admitted {
                document_id,
                version_id: VersionId::new(),
            }),
        }
    }

    /// Open a session: materialize the version if needed, expand it into
    /// structural components, and write the session row plus all mirror
    /// entries as one atomic unit.
    ///
    /// A lost race surfaces as [`CoordinatorError::SessionAlreadyExists`]
    /// with no partial writes; the caller retries the admission check.
    pub async fn create_session(
        &self,
        request: CreateSession,
    ) -> Result<SessionRow, CoordinatorError> {
        let (row, entries) = self.prepare(request).await?;
        let mirrored = entries.len();

        self.store.insert_session(row.clone(), entries).await?;

        tracing::info!(
            session_id = %row.session_id,
            document_id = %row.document_id,
            user_id = %row.user_id,
            components = mirrored,
            "session opened"
        );
        Ok(row)
    }

    /// Replace the active session for a key with a new one, as one logical
    /// transaction: the previous session's mirror entries and row are gone
    /// before the new session becomes visible, with no observable window in
    /// between.
    ///
    /// Precondition: `previous_session_id` must still be the active session
    /// for the request's `(document, user)` key. Concurrent supersessions of
    /// the same target have exactly one winner; losers observe
    /// [`CoordinatorError::StaleSupersession`] and retry the admission check.
    pub async fn force_supersede(
        &self,
        previous_session_id: SessionId,
        request: CreateSession,
    ) -> Result<SessionRow, CoordinatorError> {
        let (row, entries) = self.prepare(request).await?;
        let mirrored = entries.len();

        self.store
            .supersede_session(previous_session_id, row.clone(), entries)
            .await?;

        tracing::info!(
            previous_session_id = %previous_session_id,
            session_id = %row.session_id,
            document_id = %row.document_id,
            user_id = %row.user_id,
            components = mirrored,
            reason = %CloseReason::Superseded,
            "session superseded"
        );
        Ok(row)
    }

    /// Close a session and tear down its component mirror atomically.
    ///
    /// Idempotent: closing a session that no longer exists is a logged
    /// no-op, which also makes this safe to race against `force_supersede`
    /// on the same id.
    pub async fn close_session(
        &self,
        session_id: SessionId,
        reason: CloseReason,
        user_id: &UserId,
    ) -> Result<(), CoordinatorError> {
        let removed = self.store.delete_session(session_id).await?;

        if removed {
            tracing::info!(
                %session_id,
                user_id = %user_id,
                reason = %reason,
                "session closed"
            );
        } else {
            tracing::debug!(%session_id, reason = %reason, "close of vanished session ignored");
        }
        Ok(())
    }

    /// True if no other session on the document belongs to a different user
    pub async fn is_sole_participant(
        &self,
        document_id: DocumentId,
        session_id: SessionId,
    ) -> Result<bool, CoordinatorError> {
        let session = self
            .store
            .get_session(session_id)
            .await?
            .ok_or(CoordinatorError::SessionNotFound { session_id })?;

        let sessions = self.store.sessions_for_document(document_id).await?;
        Ok(sessions.iter().all(|other| other.user_id == session.user_id))
    }

    /// Advisory staleness verdict; never consulted by admission
    pub fn evaluate_staleness(&self, session: &SessionRow) -> Staleness {
        staleness_of(session, Utc::now(), self.config.stale_after)
    }

    /// Heartbeat. Fails silently (logged, not surfaced) when the session no
    /// longer exists.
    pub async fn touch(&self, session_id: SessionId) -> Result<(), CoordinatorError> {
        if !self.store.touch(session_id, Utc::now()).await? {
            tracing::debug!(%session_id, "heartbeat for vanished session");
        }
        Ok(())
    }

    /// Switch the role on a live session
    pub async fn change_role(
        &self,
        session_id: SessionId,
        role: SessionRole,
    ) -> Result<(), CoordinatorError> {
        if self.store.update_role(session_id, role).await? {
            Ok(())
        } else {
            Err(CoordinatorError::SessionNotFound { session_id })
        }
    }

    /// Administrative cleanup: close every session idle past the threshold
    pub async fn purge_stale_sessions(&self) -> Result<Vec<SessionRow>, CoordinatorError> {
        let cutoff = Utc::now() - self.config.stale_after;
        let removed = self.store.purge_stale(cutoff).await?;

        for session in &removed {
            tracing::info!(
                session_id = %session.session_id,
                user_id = %session.user_id,
                reason = %CloseReason::AdminPurge,
                "session closed"
            );
        }
        Ok(removed)
    }

    pub async fn session(
        &self,
        session_id: SessionId,
    ) -> Result<Option<SessionRow>, CoordinatorError> {
        Ok(self.store.get_session(session_id).await?)
    }

    pub async fn components(
        &self,
        session_id: SessionId,
    ) -> Result<Vec<ComponentMirrorEntry>, CoordinatorError> {
        Ok(self.store.components_for_session(session_id).await?)
    }

    /// Materialize the version, expand it, and assemble row + entries.
    ///
    /// Expansion runs before the store transaction: a lost race throws the
    /// work away without ever producing partial rows.
    async fn prepare(
        &self,
        request: CreateSession,
    ) -> Result<(SessionRow, Vec<ComponentMirrorEntry>), CoordinatorError> {
        let version_id = match request.version {
            VersionSource::Existing(version_id) => version_id,
            VersionSource::New {
                version_id,
                ref package,
            } => {
                self.resolver
                    .materialize_version(request.document_id, version_id, package)
                    .await?;
                version_id
            }
        };

        let components = self.ingestion.expand(version_id, request.import_mode).await?;

        let row = SessionRow::open(
            request.document_id,
            version_id,
            request.user_id,
            request.role,
            request.node_affinity,
            request.client_origin,
            Utc::now(),
        );

        let entries = components
            .into_iter()
            .map(|component| {
                ComponentMirrorEntry::new(
                    row.session_id,
                    component.component_id,
                    component.slot_path,
                    component.payload,
                )
            })
            .collect();

        Ok((row, entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::StaticIngestion;
    use crate::resolver::LocatorResolver;
    use pagecraft_store::MemoryStore;

    fn coordinator() -> SessionCoordinator {
        SessionCoordinator::new(
            Arc::new(MemoryStore::new()),
            Arc::new(LocatorResolver::new()),
            Arc::new(StaticIngestion::with_blocks(3)),
            CoordinatorConfig::default(),
        )
    }

    fn open_request(admitted: &AdmissionResult, user: &str) -> CreateSession {
        match admitted {
            AdmissionResult::Admitted {
                document_id,
                version_id,
            } => CreateSession {
                document_id: *document_id,
                version: VersionSource::New {
                    version_id: *version_id,
                    package: b"pkg".to_vec(),
                },
                user_id: UserId::new(user),
                role: SessionRole::Owner,
                node_affinity: "node-a".to_string(),
                client_origin: "designer".to_string(),
                import_mode: ImportMode::Flatten,
            },
            AdmissionResult::Conflict { .. } => panic!("expected admission"),
        }
    }

    #[tokio::test]
    async fn test_check_open_admits_free_key() {
        let coordinator = coordinator();
        let locator = Locator::new("course/a.pcpkg", true);
        let user = UserId::new("u-1");

        let result = coordinator.check_open(&locator, &user).await.unwrap();
        assert!(result.is_admitted());
    }

    #[tokio::test]
    async fn test_check_open_reports_existing_session() {
        let coordinator = coordinator();
        let locator = Locator::new("course/a.pcpkg", true);
        let user = UserId::new("u-1");

        let admitted = coordinator.check_open(&locator, &user).await.unwrap();
        let session = coordinator
            .create_session(open_request(&admitted, "u-1"))
            .await
            .unwrap();

        match coordinator.check_open(&locator, &user).await.unwrap() {
            AdmissionResult::Conflict { existing } => {
                assert_eq!(existing.session_id, session.session_id)
            }
            AdmissionResult::Admitted { .. } => panic!("expected conflict"),
        }
    }

    #[tokio::test]
    async fn test_touch_vanished_session_is_silent() {
        let coordinator = coordinator();
        coordinator.touch(SessionId::new()).await.unwrap();
    }

    #[tokio::test]
    async fn test_change_role_missing_session() {
        let coordinator = coordinator();
        let err = coordinator
            .change_role(SessionId::new(), SessionRole::Collaborator)
            .await
            .unwrap_err();
        assert!(matches!(err, CoordinatorError::SessionNotFound { .. }));
    }
}

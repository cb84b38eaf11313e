//! HTTP action layer for the designer.
//!
//! Thin orchestration over the coordinator: the open endpoint runs the
//! admission check and then either creates, force-supersedes, or reports the
//! conflict back for a user decision. Races the coordinator reports
//! (`SessionAlreadyExists`, `StaleSupersession`) come back as 2xx `retry`
//! bodies so the client repeats the admission check; they are never masked
//! as success and never escalated to hard failures.

use crate::state::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use pagecraft_common::{SessionId, UserId, VersionId};
use pagecraft_coordinator::{
    AdmissionResult, CloseReason, CoordinatorError, CreateSession, ImportMode, Locator,
    SessionRole, SessionRow, Staleness, VersionSource,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/documents/open", post(open_document))
        .route("/api/sessions/:id", get(session_status))
        .route("/api/sessions/:id/close", post(close_session))
        .route("/api/sessions/:id/heartbeat", post(heartbeat))
        .route("/api/admin/purge", post(purge_stale))
        .with_state(state)
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Deserialize)]
struct OpenRequest {
    /// Package path or name
    path: String,
    #[serde(default)]
    is_local: bool,
    user_id: String,
    role: Option<SessionRole>,
    #[serde(default)]
    import_mode: ImportMode,

    /// Uploaded package content; when present a new version is materialized
    package: Option<String>,
    /// Existing version pointer; wins over `package`
    existing_version: Option<VersionId>,

    /// Session id the user agreed to close; enables forced supersession
    force_close: Option<SessionId>,

    #[serde(default)]
    client_origin: String,
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum OpenResponse {
    Opened {
        session: SessionRow,
    },
    /// Another active session holds the key; the user decides what happens
    Conflict {
        existing: SessionRow,
        sole_participant: bool,
        staleness: Staleness,
    },
    /// A race was lost; the client repeats the admission check
    Retry {
        reason: String,
    },
}

#[derive(Debug, Deserialize)]
struct CloseRequest {
    user_id: String,
    reason: Option<String>,
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    session: SessionRow,
    component_count: usize,
    staleness: Staleness,
    sole_participant: bool,
}

#[derive(Debug, Serialize)]
struct PurgeResponse {
    closed: Vec<SessionId>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

// ============================================================================
// Handlers
// ============================================================================

async fn open_document(
    State(state): State<Arc<AppState>>,
    Json(request): Json<OpenRequest>,
) -> Response {
    let locator = Locator::new(request.path.clone(), request.is_local);
    let user = UserId::new(request.user_id.clone());

    let admission = match state.coordinator.check_open(&locator, &user).await {
        Ok(admission) => admission,
        Err(e) => return error_response(e),
    };

    match admission {
        AdmissionResult::Admitted {
            document_id,
            version_id,
        } => {
            let create = build_create(&state, document_id, version_id, &request, user);
            match state.coordinator.create_session(create).await {
                Ok(session) => {
                    (StatusCode::CREATED, Json(OpenResponse::Opened { session })).into_response()
                }
                Err(CoordinatorError::SessionAlreadyExists { .. }) => {
                    retry_response("lost_admission_race")
                }
                Err(e) => error_response(e),
            }
        }

        AdmissionResult::Conflict { existing } => match request.force_close {
            Some(previous) if previous == existing.session_id => {
                let create =
                    build_create(&state, existing.document_id, VersionId::new(), &request, user);
                match state.coordinator.force_supersede(previous, create).await {
                    Ok(session) => {
                        (StatusCode::OK, Json(OpenResponse::Opened { session })).into_response()
                    }
                    Err(CoordinatorError::StaleSupersession { .. }) => {
                        retry_response("supersession_target_gone")
                    }
                    Err(e) => error_response(e),
                }
            }
            // The session the user agreed to close is not the one holding
            // the key anymore
            Some(_) => retry_response("conflict_changed"),
            None => conflict_response(&state, existing).await,
        },
    }
}

async fn session_status(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<SessionId>,
) -> Response {
    let session = match state.coordinator.session(session_id).await {
        Ok(Some(session)) => session,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(ErrorBody {
                    error: format!("Session not found: {session_id}"),
                }),
            )
                .into_response()
        }
        Err(e) => return error_response(e),
    };

    let component_count = match state.coordinator.components(session_id).await {
        Ok(components) => components.len(),
        Err(e) => return error_response(e),
    };

    let sole_participant = state
        .coordinator
        .is_sole_participant(session.document_id, session_id)
        .await
        .unwrap_or(false);
    let staleness = state.coordinator.evaluate_staleness(&session);

    (
        StatusCode::OK,
        Json(StatusResponse {
            session,
            component_count,
            staleness,
            sole_participant,
        }),
    )
        .into_response()
}

async fn close_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<SessionId>,
    Json(request): Json<CloseRequest>,
) -> Response {
    let user = UserId::new(request.user_id);
    let reason = parse_reason(request.reason.as_deref());

    match state
        .coordinator
        .close_session(session_id, reason, &user)
        .await
    {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({ "status": "closed" })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

async fn heartbeat(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<SessionId>,
) -> Response {
    match state.coordinator.touch(session_id).await {
        Ok(()) => (StatusCode::OK, Json(serde_json::json!({ "status": "ok" }))).into_response(),
        Err(e) => error_response(e),
    }
}

async fn purge_stale(State(state): State<Arc<AppState>>) -> Response {
    match state.coordinator.purge_stale_sessions().await {
        Ok(removed) => (
            StatusCode::OK,
            Json(PurgeResponse {
                closed: removed.into_iter().map(|row| row.session_id).collect(),
            }),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn build_create(
    state: &AppState,
    document_id: pagecraft_common::DocumentId,
    version_id: VersionId,
    request: &OpenRequest,
    user: UserId,
) -> CreateSession {
    let version = match (&request.existing_version, &request.package) {
        (Some(existing), _) => VersionSource::Existing(*existing),
        (None, Some(package)) => VersionSource::New {
            version_id,
            package: package.clone().into_bytes(),
        },
        // Nothing uploaded and no pointer given: the admitted version id
        // becomes the pointer, content arrives through the spool
        (None, None) => VersionSource::Existing(version_id),
    };

    CreateSession {
        document_id,
        version,
        user_id: user,
        role: request.role.unwrap_or(SessionRole::Owner),
        node_affinity: state.node_affinity.clone(),
        client_origin: request.client_origin.clone(),
        import_mode: request.import_mode,
    }
}

async fn conflict_response(state: &AppState, existing: SessionRow) -> Response {
    // Advisory fields degrade rather than failing the conflict report
    let sole_participant = state
        .coordinator
        .is_sole_participant(existing.document_id, existing.session_id)
        .await
        .unwrap_or(false);
    let staleness = state.coordinator.evaluate_staleness(&existing);

    (
        StatusCode::OK,
        Json(OpenResponse::Conflict {
            existing,
            sole_participant,
            staleness,
        }),
    )
        .into_response()
}

fn retry_response(reason: &str) -> Response {
    (
        StatusCode::OK,
        Json(OpenResponse::Retry {
            reason: reason.to_string(),
        }),
    )
        .into_response()
}

fn parse_reason(reason: Option<&str>) -> CloseReason {
    match reason {
        Some("client_gone") => CloseReason::ClientGone,
        Some("admin_purge") => CloseReason::AdminPurge,
        Some("superseded") => CloseReason::Superseded,
        _ => CloseReason::UserClosed,
    }
}

fn error_response(error: CoordinatorError) -> Response {
    let status = match &error {
        CoordinatorError::SessionNotFound { .. } => StatusCode::NOT_FOUND,
        CoordinatorError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status.is_server_error() {
        tracing::error!(%error, "request failed");
    }

    (
        status,
        Json(ErrorBody {
            error: error.to_string(),
        }),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use pagecraft_coordinator::{
        CoordinatorConfig, LocatorResolver, SessionCoordinator, StaticIngestion,
    };
    use pagecraft_store::MemoryStore;

    fn test_state() -> Arc<AppState> {
        let coordinator = SessionCoordinator::new(
            Arc::new(MemoryStore::new()),
            Arc::new(LocatorResolver::new()),
            Arc::new(StaticIngestion::with_blocks(2)),
            CoordinatorConfig {
                stale_after: Duration::minutes(15),
            },
        );
        Arc::new(AppState {
            coordinator,
            node_affinity: "node-test".to_string(),
        })
    }

    async fn read_json(response: Response) -> (StatusCode, serde_json::Value) {
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    async fn open(state: &Arc<AppState>, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
        let request: OpenRequest = serde_json::from_value(body).unwrap();
        let response = open_document(State(state.clone()), Json(request)).await;
        read_json(response).await
    }

    fn open_body(user: &str) -> serde_json::Value {
        serde_json::json!({
            "path": "course/intro.pcpkg",
            "is_local": true,
            "user_id": user,
            "client_origin": "designer-test",
        })
    }

    #[tokio::test]
    async fn test_open_fresh_document_created() {
        let state = test_state();

        let (status, body) = open(&state, open_body("u-1")).await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["status"], "opened");
        assert_eq!(body["session"]["user_id"], "u-1");
        assert_eq!(body["session"]["node_affinity"], "node-test");
        assert_eq!(body["session"]["role"], "owner");
    }

    #[tokio::test]
    async fn test_reopen_reports_structured_conflict() {
        let state = test_state();

        let (_, first) = open(&state, open_body("u-1")).await;
        let (status, body) = open(&state, open_body("u-1")).await;

        // Logical conflict: 2xx with a structured body, per the API convention
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "conflict");
        assert_eq!(
            body["existing"]["session_id"],
            first["session"]["session_id"]
        );
        assert_eq!(body["staleness"], "fresh");
        assert_eq!(body["sole_participant"], true);
    }

    #[tokio::test]
    async fn test_force_close_supersedes() {
        let state = test_state();

        let (_, first) = open(&state, open_body("u-1")).await;
        let first_id = first["session"]["session_id"].as_str().unwrap().to_string();

        let mut body = open_body("u-1");
        body["force_close"] = serde_json::json!(first_id);
        let (status, superseded) = open(&state, body).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(superseded["status"], "opened");
        assert_ne!(superseded["session"]["session_id"].as_str().unwrap(), first_id);

        // The superseded session is gone
        let old: SessionId = first_id.parse().unwrap();
        let response = session_status(State(state.clone()), Path(old)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_force_close_against_wrong_session_retries() {
        let state = test_state();

        let (_, _first) = open(&state, open_body("u-1")).await;

        let mut body = open_body("u-1");
        body["force_close"] = serde_json::json!(SessionId::new());
        let (status, response) = open(&state, body).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(response["status"], "retry");
        assert_eq!(response["reason"], "conflict_changed");
    }

    #[tokio::test]
    async fn test_status_reports_component_count() {
        let state = test_state();

        let (_, opened) = open(&state, open_body("u-1")).await;
        let id: SessionId = opened["session"]["session_id"]
            .as_str()
            .unwrap()
            .parse()
            .unwrap();

        let response = session_status(State(state.clone()), Path(id)).await;
        let (status, body) = read_json(response).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["component_count"], 2);
        assert_eq!(body["staleness"], "fresh");
    }

    #[tokio::test]
    async fn test_status_of_missing_session_is_404() {
        let state = test_state();

        let response = session_status(State(state.clone()), Path(SessionId::new())).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_close_is_idempotent_over_http() {
        let state = test_state();

        let (_, opened) = open(&state, open_body("u-1")).await;
        let id: SessionId = opened["session"]["session_id"]
            .as_str()
            .unwrap()
            .parse()
            .unwrap();

        for _ in 0..2 {
            let response = close_session(
                State(state.clone()),
                Path(id),
                Json(CloseRequest {
                    user_id: "u-1".to_string(),
                    reason: Some("user_closed".to_string()),
                }),
            )
            .await;
            assert_eq!(response.status(), StatusCode::OK);
        }

        // The key is free again
        let (status, body) = open(&state, open_body("u-1")).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["status"], "opened");
    }

    #[tokio::test]
    async fn test_heartbeat_on_vanished_session_is_ok() {
        let state = test_state();

        let response = heartbeat(State(state.clone()), Path(SessionId::new())).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_purge_endpoint_reports_closed_sessions() {
        let state = test_state();

        let response = purge_stale(State(state.clone())).await;
        let (status, body) = read_json(response).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["closed"], serde_json::json!([]));
    }
}

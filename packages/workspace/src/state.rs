//! Server configuration and shared handler state.

use crate::package::ManifestIngestion;
use chrono::Duration;
use pagecraft_coordinator::{
    CoordinatorConfig, CoordinatorStore, LocatorResolver, SessionCoordinator,
};
use pagecraft_store::{MemoryStore, SqliteStore, StoreError};
use std::path::PathBuf;
use std::sync::Arc;

/// Runtime configuration for the workspace server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub http_port: u16,

    /// Path of the SQLite session database; in-memory store when absent
    pub database: Option<PathBuf>,

    /// Directory where uploaded package manifests are spooled
    pub spool_dir: PathBuf,

    /// Idle minutes after which a session counts as advisory-stale
    pub stale_after_minutes: i64,

    /// Name this node stamps on sessions it opens, for sticky routing
    pub node_affinity: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: 3030,
            database: None,
            spool_dir: PathBuf::from("packages"),
            stale_after_minutes: 15,
            node_affinity: "node-local".to_string(),
        }
    }
}

/// Shared state for HTTP handlers
pub struct AppState {
    pub coordinator: SessionCoordinator,
    pub node_affinity: String,
}

impl AppState {
    pub async fn from_config(config: &ServerConfig) -> Result<Self, StoreError> {
        let store: Arc<dyn CoordinatorStore> = match &config.database {
            Some(path) => Arc::new(SqliteStore::open(path).await?),
            None => Arc::new(MemoryStore::new()),
        };

        let coordinator = SessionCoordinator::new(
            store,
            Arc::new(LocatorResolver::new()),
            Arc::new(ManifestIngestion::new(config.spool_dir.clone())),
            CoordinatorConfig {
                stale_after: Duration::minutes(config.stale_after_minutes),
            },
        );

        Ok(Self {
            coordinator,
            node_affinity: config.node_affinity.clone(),
        })
    }
}

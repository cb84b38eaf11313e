//! Ingestion adapter seam.
//!
//! Expanding a package into structural components belongs to the import
//! pipeline, not the coordinator; the coordinator treats the adapter as an
//! opaque `version → [component]` function and only decides when to call it
//! and what to do with the output.

use async_trait::async_trait;
use pagecraft_common::{ComponentId, VersionId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How plugin resource paths are laid out when a package is expanded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportMode {
    /// Collapse nested plugin resource paths into a single directory
    /// namespace (default open behavior)
    #[default]
    Flatten,

    /// Keep the original nested layout, for re-importing content as a
    /// plugin-style package
    Preserve,
}

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("No package content for version {0}")]
    MissingVersion(String),

    #[error("Malformed package manifest: {0}")]
    Malformed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// One structural component produced by package expansion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentPayload {
    pub component_id: ComponentId,

    /// Resource path after import-mode normalization
    pub slot_path: String,

    /// Component content, opaque to the coordinator
    pub payload: serde_json::Value,
}

#[async_trait]
pub trait IngestionAdapter: Send + Sync {
    /// Expand a materialized version into its structural component set
    async fn expand(
        &self,
        version_id: VersionId,
        mode: ImportMode,
    ) -> Result<Vec<ComponentPayload>, IngestError>;
}

/// Normalize a component resource path according to the import mode.
/// Flattening keeps only the basename so nested plugin resources end up in
/// one shared namespace.
pub fn slot_path_for(mode: ImportMode, path: &str) -> String {
    match mode {
        ImportMode::Preserve => path.to_string(),
        ImportMode::Flatten => path
            .rsplit('/')
            .find(|segment| !segment.is_empty())
            .unwrap_or(path)
            .to_string(),
    }
}

/// Fixed-output adapter for tests and zero-setup runs
#[derive(Debug, Default)]
pub struct StaticIngestion {
    components: Vec<ComponentPayload>,
}

impl StaticIngestion {
    pub fn new(components: Vec<ComponentPayload>) -> Self {
        Self { components }
    }

    /// `count` generic text blocks with nested plugin resource paths
    pub fn with_blocks(count: usize) -> Self {
        let components = (0..count)
            .map(|i| ComponentPayload {
                component_id: ComponentId::new(format!("block-{i}")),
                slot_path: format!("plugins/text/resources/block-{i}.json"),
                payload: serde_json::json!({ "kind": "text", "index": i }),
            })
            .collect();
        Self::new(components)
    }
}

#[async_trait]
impl IngestionAdapter for StaticIngestion {
    async fn expand(
        &self,
        _version_id: VersionId,
        mode: ImportMode,
    ) -> Result<Vec<ComponentPayload>, IngestError> {
        Ok(self
            .components
            .iter()
            .map(|component| ComponentPayload {
                component_id: component.component_id.clone(),
                slot_path: slot_path_for(mode, &component.slot_path),
                payload: component.payload.clone(),
            })
            .collect())
    }
}

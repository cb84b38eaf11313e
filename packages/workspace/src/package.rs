//! Package manifest expansion.
//!
//! The import pipeline spools each materialized version as a JSON manifest
//! named `<version_id>.json`: pages of content blocks, each block carrying
//! the resource path of the plugin that renders it. Expansion turns the
//! manifest into the flat component set the coordinator mirrors per session.

use async_trait::async_trait;
use pagecraft_common::{ComponentId, VersionId};
use pagecraft_coordinator::{slot_path_for, ComponentPayload, ImportMode, IngestError, IngestionAdapter};
use serde::Deserialize;
use std::io::ErrorKind;
use std::path::PathBuf;

#[derive(Debug, Deserialize)]
pub struct PackageManifest {
    #[serde(default)]
    pub title: Option<String>,
    pub pages: Vec<PageEntry>,
}

#[derive(Debug, Deserialize)]
pub struct PageEntry {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub blocks: Vec<BlockEntry>,
}

#[derive(Debug, Deserialize)]
pub struct BlockEntry {
    pub id: String,
    pub kind: String,
    pub resource_path: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

/// Ingestion adapter backed by the manifest spool directory
pub struct ManifestIngestion {
    spool_dir: PathBuf,
}

impl ManifestIngestion {
    pub fn new(spool_dir: PathBuf) -> Self {
        Self { spool_dir }
    }
}

#[async_trait]
impl IngestionAdapter for ManifestIngestion {
    async fn expand(
        &self,
        version_id: VersionId,
        mode: ImportMode,
    ) -> Result<Vec<ComponentPayload>, IngestError> {
        let path = self.spool_dir.join(format!("{version_id}.json"));

        let raw = tokio::fs::read_to_string(&path).await.map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                IngestError::MissingVersion(version_id.to_string())
            } else {
                IngestError::Io(e)
            }
        })?;

        let manifest: PackageManifest =
            serde_json::from_str(&raw).map_err(|e| IngestError::Malformed(e.to_string()))?;

        let mut components = Vec::new();
        for page in &manifest.pages {
            for block in &page.blocks {
                components.push(ComponentPayload {
                    // Component ids are page-scoped so two pages may carry
                    // blocks with the same local id
                    component_id: ComponentId::new(format!("{}/{}", page.id, block.id)),
                    slot_path: slot_path_for(mode, &block.resource_path),
                    payload: serde_json::json!({
                        "page": page.id,
                        "page_title": page.title,
                        "kind": block.kind,
                        "data": block.data,
                    }),
                });
            }
        }

        tracing::debug!(
            %version_id,
            components = components.len(),
            "expanded package manifest"
        );
        Ok(components)
    }
}

//! Document and version resolution seam.
//!
//! The canonical document store is an external collaborator; the coordinator
//! only needs identity and version pointers from it, never content
//! semantics. [`LocatorResolver`] is the default implementation: document
//! identity is derived deterministically from the locator, so repeated opens
//! of the same package resolve to the same document without a registry
//! round-trip.

use async_trait::async_trait;
use pagecraft_common::{DocumentId, VersionId};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use unicode_normalization::UnicodeNormalization;
use uuid::Uuid;

/// Locator sufficient to resolve (or create) a document identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Locator {
    /// Package path or name as given by the client
    pub path: String,

    /// True when the package lives on the serving node itself
    #[serde(default)]
    pub is_local: bool,
}

impl Locator {
    pub fn new(path: impl Into<String>, is_local: bool) -> Self {
        Self {
            path: path.into(),
            is_local,
        }
    }
}

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("Empty locator")]
    EmptyLocator,

    #[error("Version store rejected package: {0}")]
    Rejected(String),
}

#[async_trait]
pub trait DocumentResolver: Send + Sync {
    /// Resolve the canonical document id for a locator, creating the
    /// identity if this is the first time anyone opens the package.
    async fn resolve_or_create(&self, locator: &Locator) -> Result<DocumentId, ResolveError>;

    /// Persist a new materialized revision under a pre-allocated id
    async fn materialize_version(
        &self,
        document_id: DocumentId,
        version_id: VersionId,
        package: &[u8],
    ) -> Result<(), ResolveError>;
}

// Fixed namespace for locator-derived document ids. Changing it would
// re-identify every package ever opened.
const LOCATOR_NAMESPACE: Uuid = Uuid::from_bytes([
    0x8e, 0x1f, 0x5a, 0xd2, 0x4c, 0x0b, 0x4e, 0x7a, 0x9d, 0x3f, 0x6b, 0x2c, 0x81, 0x55, 0xaa,
    0x10,
]);

/// Deterministic resolver: document identity is a v5 UUID of the normalized
/// locator. Normalization runs NFC over the path so visually identical
/// locators from different platforms cannot mint distinct documents.
#[derive(Debug, Default)]
pub struct LocatorResolver;

impl LocatorResolver {
    pub fn new() -> Self {
        Self
    }

    fn canonical(locator: &Locator) -> String {
        let normalized: String = locator.path.trim().nfc().collect();
        let scope = if locator.is_local { "local" } else { "remote" };
        format!("{scope}|{normalized}")
    }
}

#[async_trait]
impl DocumentResolver for LocatorResolver {
    async fn resolve_or_create(&self, locator: &Locator) -> Result<DocumentId, ResolveError> {
        if locator.path.trim().is_empty() {
            return Err(ResolveError::EmptyLocator);
        }

        let canonical = Self::canonical(locator);
        let id = Uuid::new_v5(&LOCATOR_NAMESPACE, canonical.as_bytes());
        Ok(DocumentId::from_uuid(id))
    }

    async fn materialize_version(
        &self,
        document_id: DocumentId,
        version_id: VersionId,
        package: &[u8],
    ) -> Result<(), ResolveError> {
        if package.is_empty() {
            return Err(ResolveError::Rejected("empty package".to_string()));
        }

        tracing::debug!(
            %document_id,
            %version_id,
            bytes = package.len(),
            "materialized version"
        );
        Ok(())
    }
}

//! Admission check results.
//!
//! The check itself is a pure read: it resolves the document identity and
//! reports whether the `(document, user)` key is free. It does not reserve
//! anything. Uniqueness is enforced by the store when the session row is
//! written, so two concurrent `Admitted` results collapse into one success
//! and one `SessionAlreadyExists` at creation time.

use pagecraft_common::{DocumentId, VersionId};
use pagecraft_store::SessionRow;

/// Outcome of the admission check for a `(locator, user)` pair
#[derive(Debug, Clone)]
pub enum AdmissionResult {
    /// No session holds the key. The version id is pre-allocated for the
    /// revision `create_session` will materialize; nothing is persisted yet.
    Admitted {
        document_id: DocumentId,
        version_id: VersionId,
    },

    /// An active session holds the key. The caller surfaces the conflict to
    /// the user or, on their say-so, force-supersedes it.
    Conflict { existing: SessionRow },
}

impl AdmissionResult {
    pub fn is_admitted(&self) -> bool {
        matches!(self, AdmissionResult::Admitted { .. })
    }
}

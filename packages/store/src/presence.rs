//! # Presence Registry Rows
//!
//! One row per live editing session. The registry is the entity at the heart
//! of admission control: for a given `(document, user)` pair at most one row
//! exists at any instant, and a forced supersession replaces the row inside a
//! single transaction so the transient overlap is never observable.

use chrono::{DateTime, Utc};
use pagecraft_common::{CommonError, DocumentId, SessionId, UserId, VersionId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Role the acting principal holds on the document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionRole {
    Owner,
    Collaborator,
}

impl SessionRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionRole::Owner => "owner",
            SessionRole::Collaborator => "collaborator",
        }
    }
}

impl fmt::Display for SessionRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionRole {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "owner" => Ok(SessionRole::Owner),
            "collaborator" => Ok(SessionRole::Collaborator),
            other => Err(CommonError::InvalidId(format!("unknown role: {other}"))),
        }
    }
}

/// One user's exclusive editing claim on a document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRow {
    pub session_id: SessionId,
    pub document_id: DocumentId,
    pub version_id: VersionId,
    pub user_id: UserId,
    pub role: SessionRole,

    /// Opaque identifier of the serving node. Advisory metadata for sticky
    /// routing, never consulted for consistency.
    pub node_affinity: String,

    /// Where the client opened from, recorded once at open
    pub client_origin: String,

    pub opened_at: DateTime<Utc>,

    /// Heartbeat timestamp; drives the staleness advisory
    pub last_action: DateTime<Utc>,
}

impl SessionRow {
    /// Build a fresh row with a newly allocated session id and both
    /// timestamps set to `now`.
    #[allow(clippy::too_many_arguments)]
    pub fn open(
        document_id: DocumentId,
        version_id: VersionId,
        user_id: UserId,
        role: SessionRole,
        node_affinity: String,
        client_origin: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            session_id: SessionId::new(),
            document_id,
            version_id,
            user_id,
            role,
            node_affinity,
            client_origin,
            opened_at: now,
            last_action: now,
        }
    }

    /// True if this row and `other` claim the same `(document, user)` key
    pub fn same_key(&self, other: &SessionRow) -> bool {
        self.document_id == other.document_id && self.user_id == other.user_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_roundtrip() {
        for role in [SessionRole::Owner, SessionRole::Collaborator] {
            assert_eq!(role.as_str().parse::<SessionRole>().unwrap(), role);
        }
    }

    #[test]
    fn test_role_rejects_unknown() {
        assert!("admin".parse::<SessionRole>().is_err());
    }

    #[test]
    fn test_open_sets_both_timestamps() {
        let now = Utc::now();
        let row = SessionRow::open(
            DocumentId::new(),
            VersionId::new(),
            UserId::new("u-1"),
            SessionRole::Owner,
            "node-a".to_string(),
            "designer".to_string(),
            now,
        );
        assert_eq!(row.opened_at, now);
        assert_eq!(row.last_action, now);
    }
}

//! # Component Mirror Entries
//!
//! Session-scoped snapshots of a document version's structural components,
//! produced in bulk by the ingestion adapter when a session opens. An entry
//! must never survive its owning session: creation and destruction happen
//! inside the same transaction that writes or removes the session row.

use pagecraft_common::{ComponentId, SessionId};
use serde::{Deserialize, Serialize};

/// One structural component mirrored for a session, keyed by
/// `(session_id, component_id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentMirrorEntry {
    pub session_id: SessionId,
    pub component_id: ComponentId,

    /// Resource path chosen by the import mode at expansion time
    pub slot_path: String,

    /// Component payload, opaque to the coordinator
    pub payload: serde_json::Value,
}

impl ComponentMirrorEntry {
    pub fn new(
        session_id: SessionId,
        component_id: ComponentId,
        slot_path: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            session_id,
            component_id,
            slot_path: slot_path.into(),
            payload,
        }
    }
}

//! Liveness advisory.
//!
//! Heartbeats drive a soft "you appear to already be logged in elsewhere,
//! but it looks idle" notice. The verdict is advisory only: admission and
//! creation rely solely on the uniqueness invariant and never consult it.

use chrono::{DateTime, Duration, Utc};
use pagecraft_store::SessionRow;
use serde::{Deserialize, Serialize};

/// Heartbeat-based verdict on whether a session is still attended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Staleness {
    Fresh,
    Stale,
}

/// Compare a session's last heartbeat against the liveness threshold
pub fn staleness_of(session: &SessionRow, now: DateTime<Utc>, stale_after: Duration) -> Staleness {
    if now - session.last_action >= stale_after {
        Staleness::Stale
    } else {
        Staleness::Fresh
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pagecraft_common::{DocumentId, UserId, VersionId};
    use pagecraft_store::SessionRole;

    fn row_with_last_action(last_action: DateTime<Utc>) -> SessionRow {
        let mut row = SessionRow::open(
            DocumentId::new(),
            VersionId::new(),
            UserId::new("u-1"),
            SessionRole::Owner,
            "node-a".to_string(),
            "designer".to_string(),
            last_action,
        );
        row.last_action = last_action;
        row
    }

    #[test]
    fn test_recent_heartbeat_is_fresh() {
        let now = Utc::now();
        let row = row_with_last_action(now - Duration::minutes(2));
        assert_eq!(staleness_of(&row, now, Duration::minutes(15)), Staleness::Fresh);
    }

    #[test]
    fn test_idle_session_is_stale() {
        let now = Utc::now();
        let row = row_with_last_action(now - Duration::minutes(20));
        assert_eq!(staleness_of(&row, now, Duration::minutes(15)), Staleness::Stale);
    }

    #[test]
    fn test_threshold_boundary_is_stale() {
        let now = Utc::now();
        let row = row_with_last_action(now - Duration::minutes(15));
        assert_eq!(staleness_of(&row, now, Duration::minutes(15)), Staleness::Stale);
    }
}

use chrono::Utc;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::shared::error::MailroomError;
use crate::shared::models::MailItem;
use crate::shared::schema::mail_items;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MailStatus {
    Received,
    Scanned,
    Forwarded,
    Archived,
}

impl MailStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Scanned => "scanned",
            Self::Forwarded => "forwarded",
            Self::Archived => "archived",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "received" => Some(Self::Received),
            "scanned" => Some(Self::Scanned),
            "forwarded" => Some(Self::Forwarded),
            "archived" => Some(Self::Archived),
            _ => None,
        }
    }

    /// received → scanned → forwarded | archived, with archived also
    /// reachable straight from received (administrative close-out).
    pub fn can_transition(self, to: MailStatus) -> bool {
        use MailStatus::*;
        matches!(
            (self, to),
            (Received, Scanned) | (Scanned, Forwarded) | (Received, Archived) | (Scanned, Archived)
        )
    }
}

/// Moves a mail item to `to`, enforcing the scan gate. The transition into
/// `scanned` is one conditional UPDATE filtered on `file_id IS NOT NULL` and
/// the expected source status; the affected-row count is the authority, so a
/// racing file attachment can never leave a stale "no file" view half-acted
/// on. Zero rows is diagnosed by re-read.
pub fn transition(
    conn: &mut PgConnection,
    item_id: Uuid,
    to: MailStatus,
) -> Result<MailItem, MailroomError> {
    use crate::shared::schema::mail_items::dsl;

    let current: MailItem = mail_items::table
        .find(item_id)
        .first(conn)
        .optional()?
        .ok_or(MailroomError::NotFound)?;

    let from = match MailStatus::parse(&current.status) {
        Some(from) if from.can_transition(to) => from,
        _ => {
            return Err(MailroomError::InvalidTransition {
                from: current.status,
                to: to.as_str().to_string(),
            })
        }
    };

    let now = Utc::now();
    let base = dsl::mail_items
        .filter(dsl::id.eq(item_id))
        .filter(dsl::status.eq(from.as_str()));
    let affected = if to == MailStatus::Scanned {
        diesel::update(base.filter(dsl::file_id.is_not_null()))
            .set((dsl::status.eq(to.as_str()), dsl::updated_at.eq(now)))
            .execute(conn)?
    } else {
        diesel::update(base)
            .set((dsl::status.eq(to.as_str()), dsl::updated_at.eq(now)))
            .execute(conn)?
    };

    if affected == 0 {
        return Err(diagnose(conn, item_id, to)?);
    }

    Ok(mail_items::table.find(item_id).first(conn)?)
}

fn diagnose(
    conn: &mut PgConnection,
    item_id: Uuid,
    to: MailStatus,
) -> Result<MailroomError, MailroomError> {
    let current: Option<MailItem> = mail_items::table.find(item_id).first(conn).optional()?;
    Ok(match current {
        None => MailroomError::NotFound,
        Some(item) => {
            if to == MailStatus::Scanned
                && item.file_id.is_none()
                && item.status == MailStatus::Received.as_str()
            {
                MailroomError::ScanNotAttached
            } else {
                MailroomError::InvalidTransition {
                    from: item.status,
                    to: to.as_str().to_string(),
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_transitions() {
        use MailStatus::*;
        assert!(Received.can_transition(Scanned));
        assert!(Received.can_transition(Archived));
        assert!(Scanned.can_transition(Forwarded));
        assert!(Scanned.can_transition(Archived));
    }

    #[test]
    fn test_rejected_transitions() {
        use MailStatus::*;
        assert!(!Received.can_transition(Forwarded));
        assert!(!Received.can_transition(Received));
        assert!(!Scanned.can_transition(Received));
        assert!(!Scanned.can_transition(Scanned));
        // terminal states
        for terminal in [Forwarded, Archived] {
            for target in [Received, Scanned, Forwarded, Archived] {
                assert!(!terminal.can_transition(target));
            }
        }
    }

    #[test]
    fn test_status_round_trip() {
        for s in ["received", "scanned", "forwarded", "archived"] {
            assert_eq!(MailStatus::parse(s).map(MailStatus::as_str), Some(s));
        }
        assert_eq!(MailStatus::parse("returned"), None);
    }
}

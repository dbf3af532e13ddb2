use chrono::Utc;
use diesel::prelude::*;
use tracing::warn;
use uuid::Uuid;

use crate::retention;
use crate::shared::error::MailroomError;
use crate::shared::models::{FileRecord, MailItem};
use crate::shared::schema::{files, mail_items};
use crate::webhook::directory::OwnerDirectory;
use crate::webhook::event::{EventType, StorageEvent};

#[derive(Debug, Clone)]
pub struct LinkOutcome {
    pub mail_item_id: Option<Uuid>,
    pub file_id: Option<Uuid>,
    pub owner_id: Option<Uuid>,
}

/// Applies a verified provider event. Safe under at-least-once delivery:
/// the file row upserts on `provider_item_id`, implicit mail item creation
/// is serialized by the claim on the file row, and the expiry stamp only
/// fires while `expires_at` is null.
pub fn apply_event(
    conn: &mut PgConnection,
    directory: &dyn OwnerDirectory,
    retention_days: i64,
    event: &StorageEvent,
) -> Result<LinkOutcome, MailroomError> {
    if event.event_type == EventType::Deleted {
        return tombstone(conn, event);
    }

    let owner_id = resolve_owner(directory, event)?;
    let file = upsert_file(conn, event)?;

    let reference = event.scan_timestamp.unwrap_or_else(Utc::now);
    let expires_at = retention::compute_expiry(reference, retention_days);

    let mail_item_id = conn.transaction::<_, MailroomError, _>(|conn| {
        let target = match (file.mail_item_id, event.mail_item_id) {
            (Some(existing), _) => existing,
            (None, Some(explicit)) => {
                mail_items::table
                    .find(explicit)
                    .first::<MailItem>(conn)
                    .optional()?
                    .ok_or(MailroomError::NotFound)?;
                claim(conn, file.id, explicit)?
            }
            (None, None) => {
                let mut item = MailItem::new_received(
                    owner_id,
                    Some(event.name.clone()),
                    None,
                    None,
                    None,
                );
                item.file_id = Some(file.id);
                item.expires_at = Some(expires_at);
                let claimed = claim(conn, file.id, item.id)?;
                if claimed == item.id {
                    diesel::insert_into(mail_items::table)
                        .values(&item)
                        .execute(conn)?;
                    return Ok(item.id);
                }
                claimed
            }
        };

        // Never overwrite an already-stamped expiry.
        diesel::update(
            mail_items::table
                .find(target)
                .filter(mail_items::expires_at.is_null()),
        )
        .set(mail_items::expires_at.eq(expires_at))
        .execute(conn)?;

        // An item already linked to a different file keeps its link; a
        // misdirected event must not silently re-point an attached scan.
        let linked = diesel::update(mail_items::table.find(target).filter(
            mail_items::file_id.is_null().or(mail_items::file_id.eq(file.id)),
        ))
        .set((
            mail_items::file_id.eq(file.id),
            mail_items::updated_at.eq(Utc::now()),
        ))
        .execute(conn)?;
        if linked == 0 {
            warn!(
                mail_item_id = %target,
                file_id = %file.id,
                provider_item_id = %event.provider_item_id,
                "mail item is linked to a different file; keeping the existing link"
            );
        }

        Ok(target)
    })?;

    Ok(LinkOutcome {
        mail_item_id: Some(mail_item_id),
        file_id: Some(file.id),
        owner_id: Some(owner_id),
    })
}

fn resolve_owner(
    directory: &dyn OwnerDirectory,
    event: &StorageEvent,
) -> Result<Uuid, MailroomError> {
    event
        .owner_id
        .or_else(|| {
            event
                .owner_external_ref
                .as_deref()
                .and_then(|r| directory.resolve(r))
        })
        .ok_or(MailroomError::OwnerNotFound)
}

fn upsert_file(conn: &mut PgConnection, event: &StorageEvent) -> Result<FileRecord, MailroomError> {
    use diesel::upsert::excluded;

    let record = file_record_from(event);
    let file = diesel::insert_into(files::table)
        .values(&record)
        .on_conflict(files::provider_item_id)
        .do_update()
        .set((
            files::path.eq(excluded(files::path)),
            files::name.eq(excluded(files::name)),
            files::size.eq(excluded(files::size)),
            files::mime.eq(excluded(files::mime)),
            files::modified_at.eq(excluded(files::modified_at)),
            files::web_url.eq(excluded(files::web_url)),
            files::deleted.eq(false),
            files::updated_at.eq(Utc::now()),
        ))
        .get_result::<FileRecord>(conn)?;
    Ok(file)
}

/// Sets the tombstone and returns early; deletes never create a mail item,
/// and a delete for a file this service never saw is a no-op.
fn tombstone(conn: &mut PgConnection, event: &StorageEvent) -> Result<LinkOutcome, MailroomError> {
    let file: Option<FileRecord> = diesel::update(
        files::table.filter(files::provider_item_id.eq(event.provider_item_id.as_str())),
    )
    .set((files::deleted.eq(true), files::updated_at.eq(Utc::now())))
    .get_result(conn)
    .optional()?;

    match file {
        Some(file) => Ok(LinkOutcome {
            mail_item_id: file.mail_item_id,
            file_id: Some(file.id),
            owner_id: None,
        }),
        None => {
            warn!(
                provider_item_id = %event.provider_item_id,
                "delete event for an unknown file; nothing to do"
            );
            Ok(LinkOutcome {
                mail_item_id: None,
                file_id: None,
                owner_id: None,
            })
        }
    }
}

/// Claims the file for `candidate`. The conditional update on
/// `mail_item_id IS NULL` takes the row lock, so exactly one of two
/// concurrent claimants wins; the loser gets the winner's id back.
fn claim(
    conn: &mut PgConnection,
    file_id: Uuid,
    candidate: Uuid,
) -> Result<Uuid, MailroomError> {
    let affected = diesel::update(
        files::table
            .find(file_id)
            .filter(files::mail_item_id.is_null()),
    )
    .set((
        files::mail_item_id.eq(candidate),
        files::updated_at.eq(Utc::now()),
    ))
    .execute(conn)?;
    if affected == 1 {
        return Ok(candidate);
    }
    let current: Option<Uuid> = files::table
        .find(file_id)
        .select(files::mail_item_id)
        .first(conn)?;
    current.ok_or(MailroomError::Store(diesel::result::Error::NotFound))
}

fn file_record_from(event: &StorageEvent) -> FileRecord {
    let now = Utc::now();
    FileRecord {
        id: Uuid::new_v4(),
        provider_item_id: event.provider_item_id.clone(),
        mail_item_id: None,
        path: event.path.clone(),
        name: event.name.clone(),
        size: event.size,
        mime: event.mime_type.clone(),
        modified_at: event.modified_at,
        web_url: event.web_url.clone(),
        deleted: false,
        created_at: now,
        updated_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::webhook::directory::FixedOwnerDirectory;
    use std::collections::HashMap;

    fn event_with_owner(owner_id: Option<Uuid>, external_ref: Option<&str>) -> StorageEvent {
        StorageEvent {
            event_type: EventType::Created,
            provider_item_id: "ITEM1".to_string(),
            path: "/scans/item1.pdf".to_string(),
            name: "item1.pdf".to_string(),
            size: None,
            mime_type: None,
            modified_at: None,
            web_url: None,
            owner_id,
            owner_external_ref: external_ref.map(str::to_string),
            mail_item_id: None,
            scan_timestamp: None,
        }
    }

    #[test]
    fn test_owner_resolution_prefers_direct_id() {
        let direct = Uuid::new_v4();
        let mapped = Uuid::new_v4();
        let directory = FixedOwnerDirectory::new(HashMap::from([("acme".to_string(), mapped)]));
        let event = event_with_owner(Some(direct), Some("acme"));
        assert_eq!(resolve_owner(&directory, &event).unwrap(), direct);
    }

    #[test]
    fn test_owner_resolution_falls_back_to_directory() {
        let mapped = Uuid::new_v4();
        let directory = FixedOwnerDirectory::new(HashMap::from([("acme".to_string(), mapped)]));
        let event = event_with_owner(None, Some("acme"));
        assert_eq!(resolve_owner(&directory, &event).unwrap(), mapped);
    }

    #[test]
    fn test_unresolvable_owner_is_an_error() {
        let directory = FixedOwnerDirectory::new(HashMap::new());
        let event = event_with_owner(None, Some("nobody"));
        let err = resolve_owner(&directory, &event).unwrap_err();
        assert_eq!(err.code(), "owner_not_found");

        let event = event_with_owner(None, None);
        assert!(resolve_owner(&directory, &event).is_err());
    }
}

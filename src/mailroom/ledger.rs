use chrono::Utc;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};

use crate::shared::error::MailroomError;
use crate::shared::models::{IdempotencyRecord, MailItem};
use crate::shared::schema::{idempotency_records, mail_items};

/// Intake keys are `YYMMDD-SSSS`, e.g. `250910-0001`. Validated before the
/// ledger is touched; malformed keys never reach the store.
pub fn validate_idempotency_key(key: &str) -> Result<(), MailroomError> {
    let bytes = key.as_bytes();
    let well_formed = bytes.len() == 11
        && bytes[..6].iter().all(|b| b.is_ascii_digit())
        && bytes[6] == b'-'
        && bytes[7..].iter().all(|b| b.is_ascii_digit());
    if well_formed {
        Ok(())
    } else {
        Err(MailroomError::InvalidKey(key.to_string()))
    }
}

/// Returns the mail item recorded under `key`, creating it via `build` on
/// first use. The item and its ledger row are inserted in one transaction;
/// a concurrent duplicate loses on the unique constraint, and the loser
/// re-reads and returns the winner's row instead of erroring. `build` is
/// never invoked when the key already exists.
pub fn create_or_get<F>(
    conn: &mut PgConnection,
    key: &str,
    build: F,
) -> Result<MailItem, MailroomError>
where
    F: FnOnce() -> MailItem,
{
    if let Some(existing) = find_by_key(conn, key)? {
        return Ok(existing);
    }

    let mut item = build();
    item.idempotency_key = Some(key.to_string());
    let record = IdempotencyRecord {
        key: key.to_string(),
        mail_item_id: item.id,
        created_at: Utc::now(),
    };

    let inserted = conn.transaction::<_, DieselError, _>(|conn| {
        diesel::insert_into(mail_items::table)
            .values(&item)
            .execute(conn)?;
        diesel::insert_into(idempotency_records::table)
            .values(&record)
            .execute(conn)?;
        Ok(())
    });

    match inserted {
        Ok(()) => Ok(item),
        Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
            // Lost the race; the winner's row is now visible.
            find_by_key(conn, key)?.ok_or(MailroomError::Store(DieselError::NotFound))
        }
        Err(e) => Err(e.into()),
    }
}

fn find_by_key(conn: &mut PgConnection, key: &str) -> Result<Option<MailItem>, MailroomError> {
    let record = idempotency_records::table
        .find(key)
        .first::<IdempotencyRecord>(conn)
        .optional()?;
    let item = match record {
        Some(record) => mail_items::table
            .find(record.mail_item_id)
            .first::<MailItem>(conn)
            .optional()?,
        None => mail_items::table
            .filter(mail_items::idempotency_key.eq(key))
            .first::<MailItem>(conn)
            .optional()?,
    };
    Ok(item)
}

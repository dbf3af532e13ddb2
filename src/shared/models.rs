use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::shared::schema::{files, idempotency_records, mail_items, scan_access_tokens};

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Insertable, AsChangeset)]
#[diesel(table_name = mail_items)]
pub struct MailItem {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub subject: Option<String>,
    pub sender_name: Option<String>,
    pub tag: Option<String>,
    pub status: String,
    pub idempotency_key: Option<String>,
    pub file_id: Option<Uuid>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Insertable, AsChangeset)]
#[diesel(table_name = files)]
pub struct FileRecord {
    pub id: Uuid,
    pub provider_item_id: String,
    pub mail_item_id: Option<Uuid>,
    pub path: String,
    pub name: String,
    pub size: Option<i64>,
    pub mime: Option<String>,
    pub modified_at: Option<DateTime<Utc>>,
    pub web_url: Option<String>,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Insertable)]
#[diesel(table_name = idempotency_records)]
pub struct IdempotencyRecord {
    pub key: String,
    pub mail_item_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Insertable)]
#[diesel(table_name = scan_access_tokens)]
pub struct ScanAccessToken {
    pub token: String,
    pub mail_item_id: Uuid,
    pub file_id: Uuid,
    pub expires_at: DateTime<Utc>,
    pub consumed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl MailItem {
    /// A fresh item in the initial state. The webhook path passes
    /// `idempotency_key = None`; operator creation always supplies one.
    pub fn new_received(
        owner_id: Uuid,
        subject: Option<String>,
        sender_name: Option<String>,
        tag: Option<String>,
        idempotency_key: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            owner_id,
            subject,
            sender_name,
            tag,
            status: "received".to_string(),
            idempotency_key,
            file_id: None,
            expires_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use diesel::debug_query;
    use diesel::pg::Pg;

    // Builds an insert against every table; keeps the models and the
    // schema declarations from drifting apart.
    #[test]
    fn test_models_insert_into_their_tables() {
        let now = Utc::now();
        let item = MailItem::new_received(Uuid::new_v4(), None, None, None, None);
        let sql = debug_query::<Pg, _>(&diesel::insert_into(mail_items::table).values(&item))
            .to_string();
        assert!(sql.contains("mail_items"));

        let file = FileRecord {
            id: Uuid::new_v4(),
            provider_item_id: "ITEM1".to_string(),
            mail_item_id: None,
            path: "/scans/item1.pdf".to_string(),
            name: "item1.pdf".to_string(),
            size: Some(20480),
            mime: Some("application/pdf".to_string()),
            modified_at: None,
            web_url: None,
            deleted: false,
            created_at: now,
            updated_at: now,
        };
        let sql =
            debug_query::<Pg, _>(&diesel::insert_into(files::table).values(&file)).to_string();
        assert!(sql.contains("files"));

        let record = IdempotencyRecord {
            key: "250910-0001".to_string(),
            mail_item_id: item.id,
            created_at: now,
        };
        let sql = debug_query::<Pg, _>(
            &diesel::insert_into(idempotency_records::table).values(&record),
        )
        .to_string();
        assert!(sql.contains("idempotency_records"));

        let token = ScanAccessToken {
            token: "deadbeef".to_string(),
            mail_item_id: item.id,
            file_id: file.id,
            expires_at: now,
            consumed_at: None,
            created_at: now,
        };
        let sql = debug_query::<Pg, _>(
            &diesel::insert_into(scan_access_tokens::table).values(&token),
        )
        .to_string();
        assert!(sql.contains("scan_access_tokens"));
    }

    #[test]
    fn test_new_received_starts_unlinked() {
        let item = MailItem::new_received(Uuid::new_v4(), None, None, None, None);
        assert_eq!(item.status, "received");
        assert!(item.file_id.is_none());
        assert!(item.expires_at.is_none());
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use uuid::Uuid;

use crate::shared::error::MailroomError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Created,
    Updated,
    Deleted,
}

/// Closed internal form of the provider's loosely-typed event payload.
/// Everything downstream of the boundary operates on this, never on raw
/// JSON fields.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageEvent {
    pub event_type: EventType,
    pub provider_item_id: String,
    pub path: String,
    pub name: String,
    #[serde(default, deserialize_with = "de_size")]
    pub size: Option<i64>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub modified_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub web_url: Option<String>,
    #[serde(default)]
    pub owner_id: Option<Uuid>,
    #[serde(default)]
    pub owner_external_ref: Option<String>,
    #[serde(default)]
    pub mail_item_id: Option<Uuid>,
    #[serde(default)]
    pub scan_timestamp: Option<DateTime<Utc>>,
}

pub fn parse_event(raw_body: &[u8]) -> Result<StorageEvent, MailroomError> {
    serde_json::from_slice(raw_body)
        .map_err(|e| MailroomError::BadRequest(format!("unparseable event: {e}")))
}

// Some provider integrations send sizes as strings.
fn de_size<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(i64),
        Str(String),
    }
    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Num(n)) => Ok(Some(n)),
        Some(Raw::Str(s)) if s.trim().is_empty() => Ok(None),
        Some(Raw::Str(s)) => s.trim().parse().map(Some).map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_created_event() {
        let body = br#"{
            "event_type": "created",
            "provider_item_id": "ITEM1",
            "path": "/scans/2025/item1.pdf",
            "name": "item1.pdf",
            "size": 20480,
            "mime_type": "application/pdf",
            "web_url": "https://files.example/item1",
            "owner_external_ref": "acme",
            "scan_timestamp": "2025-09-10T12:30:00Z"
        }"#;
        let event = parse_event(body).unwrap();
        assert_eq!(event.event_type, EventType::Created);
        assert_eq!(event.provider_item_id, "ITEM1");
        assert_eq!(event.size, Some(20480));
        assert_eq!(event.owner_external_ref.as_deref(), Some("acme"));
        assert!(event.owner_id.is_none());
    }

    #[test]
    fn test_size_accepted_as_string() {
        let body = br#"{
            "event_type": "updated",
            "provider_item_id": "ITEM1",
            "path": "/scans/item1.pdf",
            "name": "item1.pdf",
            "size": "20480"
        }"#;
        let event = parse_event(body).unwrap();
        assert_eq!(event.size, Some(20480));
    }

    #[test]
    fn test_deleted_event_minimal_body() {
        let body = br#"{
            "event_type": "deleted",
            "provider_item_id": "ITEM1",
            "path": "/scans/item1.pdf",
            "name": "item1.pdf"
        }"#;
        let event = parse_event(body).unwrap();
        assert_eq!(event.event_type, EventType::Deleted);
        assert!(event.size.is_none());
    }

    #[test]
    fn test_unknown_event_type_rejected() {
        let body = br#"{
            "event_type": "renamed",
            "provider_item_id": "ITEM1",
            "path": "/p",
            "name": "n"
        }"#;
        let err = parse_event(body).unwrap_err();
        assert_eq!(err.code(), "bad_request");
    }

    #[test]
    fn test_garbage_body_rejected() {
        assert!(parse_event(b"not json").is_err());
    }
}

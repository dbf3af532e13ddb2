//! Inbound file-storage provider webhook. Authentication runs against the
//! raw body before anything is parsed or written; processing is bounded by
//! a short timeout and the provider retries on 5xx, which is safe because
//! the linker is idempotent.

pub mod auth;
pub mod directory;
pub mod event;
pub mod linker;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{ConnectInfo, State};
use axum::http::HeaderMap;
use axum::routing::post;
use axum::{Json, Router};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::notify::OwnerEvent;
use crate::shared::error::MailroomError;
use crate::shared::state::AppState;
use self::auth::WebhookAuthenticator;

#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub mail_item_id: Option<Uuid>,
    pub file_id: Option<Uuid>,
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/api/webhooks/storage", post(receive_storage_event))
}

pub async fn receive_storage_event(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookResponse>, MailroomError> {
    WebhookAuthenticator::new(&state.config.webhook).authorize(addr.ip(), &headers, &body)?;

    let event = event::parse_event(&body)?;

    let timeout = Duration::from_secs(state.config.webhook.timeout_seconds);
    let task_state = Arc::clone(&state);
    let task_event = event.clone();
    let apply = tokio::task::spawn_blocking(move || {
        let mut conn = task_state.conn.get()?;
        linker::apply_event(
            &mut conn,
            task_state.owner_directory.as_ref(),
            task_state.config.retention_days,
            &task_event,
        )
    });

    let outcome = match tokio::time::timeout(timeout, apply).await {
        Err(_) => {
            warn!(provider_item_id = %event.provider_item_id, "webhook processing timed out");
            return Err(MailroomError::Timeout);
        }
        Ok(Err(join_err)) => return Err(MailroomError::Internal(join_err.to_string())),
        Ok(Ok(result)) => result?,
    };

    info!(
        provider_item_id = %event.provider_item_id,
        file_id = ?outcome.file_id,
        mail_item_id = ?outcome.mail_item_id,
        "storage event applied"
    );

    // Best-effort: a notification failure never unwinds the applied event.
    if let (Some(owner_id), Some(mail_item_id), Some(file_id)) =
        (outcome.owner_id, outcome.mail_item_id, outcome.file_id)
    {
        let notice = OwnerEvent::ScanLinked {
            mail_item_id,
            file_id,
        };
        if let Err(e) = state.notifier.notify(owner_id, &notice) {
            warn!(%owner_id, "owner notification failed: {e}");
        }
    }

    Ok(Json(WebhookResponse {
        mail_item_id: outcome.mail_item_id,
        file_id: outcome.file_id,
    }))
}

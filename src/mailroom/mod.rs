//! Operator-facing mail item intake and lifecycle endpoints.

pub mod ledger;
pub mod status;

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::shared::error::MailroomError;
use crate::shared::models::MailItem;
use crate::shared::schema::mail_items;
use crate::shared::state::AppState;
use self::status::MailStatus;

#[derive(Debug, Deserialize)]
pub struct CreateMailItemRequest {
    pub idempotency_key: String,
    pub owner_id: Uuid,
    pub subject: Option<String>,
    pub sender_name: Option<String>,
    pub tag: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateMailItemResponse {
    pub mail_item_id: Uuid,
    pub owner_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct StatusChangeRequest {
    pub status: String,
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/mail", post(create_mail_item))
        .route("/api/mail/:id", get(get_mail_item))
        .route("/api/mail/:id/status", put(change_status))
}

/// Replays with the same idempotency key return the original item; callers
/// cannot tell a replay from a first creation.
pub async fn create_mail_item(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateMailItemRequest>,
) -> Result<Json<CreateMailItemResponse>, MailroomError> {
    let CreateMailItemRequest {
        idempotency_key,
        owner_id,
        subject,
        sender_name,
        tag,
    } = req;
    ledger::validate_idempotency_key(&idempotency_key)?;

    let mut conn = state.conn.get()?;
    let item = ledger::create_or_get(&mut conn, &idempotency_key, || {
        MailItem::new_received(owner_id, subject, sender_name, tag, None)
    })?;

    info!(mail_item_id = %item.id, key = %idempotency_key, "mail item intake");
    Ok(Json(CreateMailItemResponse {
        mail_item_id: item.id,
        owner_id: item.owner_id,
    }))
}

pub async fn get_mail_item(
    State(state): State<Arc<AppState>>,
    Path(item_id): Path<Uuid>,
) -> Result<Json<MailItem>, MailroomError> {
    let mut conn = state.conn.get()?;
    let item: MailItem = mail_items::table
        .find(item_id)
        .first(&mut conn)
        .optional()?
        .ok_or(MailroomError::NotFound)?;
    Ok(Json(item))
}

pub async fn change_status(
    State(state): State<Arc<AppState>>,
    Path(item_id): Path<Uuid>,
    Json(req): Json<StatusChangeRequest>,
) -> Result<Json<MailItem>, MailroomError> {
    let to = MailStatus::parse(&req.status)
        .ok_or_else(|| MailroomError::BadRequest(format!("unknown status: {}", req.status)))?;

    let mut conn = state.conn.get()?;
    let item = status::transition(&mut conn, item_id, to)?;
    info!(mail_item_id = %item.id, status = %item.status, "status transition");
    Ok(Json(item))
}

//! Short-lived, single-use viewing tokens for scanned documents. Issuing
//! requires an attached file; redemption consumes the token in one atomic
//! update so two racing redemptions resolve to exactly one success.

pub mod policy;

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::Redirect;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Duration, Utc};
use diesel::prelude::*;
use rand::RngCore;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::shared::error::MailroomError;
use crate::shared::models::{FileRecord, MailItem, ScanAccessToken};
use crate::shared::schema::{files, mail_items, scan_access_tokens};
use crate::shared::state::AppState;
use self::policy::AccessPolicy;

/// Injected by the upstream gateway; authentication itself is external.
pub const REQUESTER_HEADER: &str = "X-Requester-Id";

#[derive(Debug, Serialize)]
pub struct IssueResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/mail/:id/scan-access", post(issue))
        .route("/api/scan/:token", get(redeem))
}

pub async fn issue(
    State(state): State<Arc<AppState>>,
    Path(item_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<IssueResponse>, MailroomError> {
    let requester = requester_id(&headers)?;
    let mut conn = state.conn.get()?;
    let token = issue_token(
        &mut conn,
        state.access_policy.as_ref(),
        requester,
        item_id,
        state.config.token_ttl_minutes,
    )?;
    info!(mail_item_id = %item_id, expires_at = %token.expires_at, "scan access token issued");
    Ok(Json(IssueResponse {
        token: token.token,
        expires_at: token.expires_at,
    }))
}

pub async fn redeem(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> Result<Redirect, MailroomError> {
    let mut conn = state.conn.get()?;
    let location = redeem_token(&mut conn, &token)?;
    Ok(Redirect::to(&location))
}

/// Mints a token bound to the (mail item, file) pair. The expiry is clamped
/// so no token outlives the referenced file's retention deadline.
pub fn issue_token(
    conn: &mut PgConnection,
    access_policy: &dyn AccessPolicy,
    requester: Uuid,
    item_id: Uuid,
    ttl_minutes: i64,
) -> Result<ScanAccessToken, MailroomError> {
    let item: MailItem = mail_items::table
        .find(item_id)
        .first(conn)
        .optional()?
        .ok_or(MailroomError::NotFound)?;

    if !access_policy.is_authorized_for(requester, item.owner_id) {
        return Err(MailroomError::Forbidden);
    }
    let file_id = item.file_id.ok_or(MailroomError::NoScanAvailable)?;

    let now = Utc::now();
    let token = ScanAccessToken {
        token: generate_token(),
        mail_item_id: item.id,
        file_id,
        expires_at: clamp_expiry(now + Duration::minutes(ttl_minutes), item.expires_at),
        consumed_at: None,
        created_at: now,
    };
    diesel::insert_into(scan_access_tokens::table)
        .values(&token)
        .execute(conn)?;
    Ok(token)
}

/// Consumes the token and returns the file's storage location. The
/// set-and-return is one conditional UPDATE with RETURNING; zero rows is
/// diagnosed by re-read into the terminal lifecycle errors.
pub fn redeem_token(conn: &mut PgConnection, token: &str) -> Result<String, MailroomError> {
    let now = Utc::now();
    let redeemed: Option<ScanAccessToken> = diesel::update(
        scan_access_tokens::table
            .find(token)
            .filter(scan_access_tokens::consumed_at.is_null())
            .filter(scan_access_tokens::expires_at.gt(now)),
    )
    .set(scan_access_tokens::consumed_at.eq(now))
    .get_result(conn)
    .optional()?;

    match redeemed {
        Some(consumed) => {
            let file: FileRecord = files::table.find(consumed.file_id).first(conn)?;
            Ok(file.web_url.unwrap_or(file.path))
        }
        None => {
            let existing: Option<ScanAccessToken> = scan_access_tokens::table
                .find(token)
                .first(conn)
                .optional()?;
            Err(match existing {
                None => MailroomError::NotFound,
                Some(t) if t.consumed_at.is_some() => MailroomError::AlreadyConsumed,
                Some(t) if t.expires_at <= now => MailroomError::Expired,
                Some(_) => MailroomError::Internal("token in unexpected state".to_string()),
            })
        }
    }
}

fn requester_id(headers: &HeaderMap) -> Result<Uuid, MailroomError> {
    headers
        .get(REQUESTER_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<Uuid>().ok())
        .ok_or(MailroomError::Forbidden)
}

fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn clamp_expiry(
    candidate: DateTime<Utc>,
    retention_deadline: Option<DateTime<Utc>>,
) -> DateTime<Utc> {
    match retention_deadline {
        Some(deadline) if deadline < candidate => deadline,
        _ => candidate,
    }
}

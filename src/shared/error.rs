use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Error taxonomy for the ingestion core. Every variant carries a stable
/// wire code so callers can branch without parsing messages.
#[derive(Debug, Error)]
pub enum MailroomError {
    #[error("malformed idempotency key: {0}")]
    InvalidKey(String),

    #[error("event owner could not be resolved")]
    OwnerNotFound,

    #[error("mail item has no scan attached")]
    ScanNotAttached,

    #[error("transition from '{from}' to '{to}' is not allowed")]
    InvalidTransition { from: String, to: String },

    #[error("webhook rejected: {0}")]
    Unauthorized(&'static str),

    #[error("requester is not allowed to access this mail item")]
    Forbidden,

    #[error("no scan is available for this mail item")]
    NoScanAvailable,

    #[error("not found")]
    NotFound,

    #[error("access token has expired")]
    Expired,

    #[error("access token was already consumed")]
    AlreadyConsumed,

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("processing timed out")]
    Timeout,

    #[error("internal error: {0}")]
    Internal(String),

    #[error("store error: {0}")]
    Store(#[from] diesel::result::Error),

    #[error("connection pool error: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),
}

impl MailroomError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidKey(_) => "invalid_key",
            Self::OwnerNotFound => "owner_not_found",
            Self::ScanNotAttached => "scan_not_attached",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::Unauthorized(_) => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::NoScanAvailable => "no_scan_available",
            Self::NotFound => "not_found",
            Self::Expired => "expired",
            Self::AlreadyConsumed => "already_consumed",
            Self::BadRequest(_) => "bad_request",
            Self::Timeout => "timeout",
            Self::Internal(_) => "store",
            Self::Store(_) => "store",
            Self::Pool(_) => "store",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidKey(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::OwnerNotFound | Self::NoScanAvailable | Self::NotFound => StatusCode::NOT_FOUND,
            Self::ScanNotAttached => StatusCode::CONFLICT,
            Self::InvalidTransition { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Expired | Self::AlreadyConsumed => StatusCode::GONE,
            Self::Timeout | Self::Internal(_) | Self::Store(_) | Self::Pool(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for MailroomError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(code = self.code(), "request failed: {self}");
        }
        let body = Json(json!({
            "error": self.code(),
            "message": self.to_string(),
        }));
        (status, body).into_response()
    }
}

//! API Error Taxonomy
//! Mission: One place where domain failures become HTTP status codes

use crate::auth::user_store::StoreError;
use crate::catalog::store::CatalogError;
use crate::concurrency::GuardError;
use crate::db;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Generic body for every 403. Never says whether the path exists.
pub const UNAUTHORIZED_ACCESS: &str = "Unauthorized access";
pub const SOMETHING_WENT_WRONG: &str = "Something Went Wrong";
pub const INVALID_DATA: &str = "Invalid Data";
pub const ITEM_EXISTS: &str = "Item Already Exists";

/// Errors surfaced to HTTP callers.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing, malformed, badly signed, expired or revoked token.
    #[error("authentication required")]
    Unauthenticated,
    #[error("insufficient role")]
    Forbidden,
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("record is locked by another operator")]
    LockTimeout,
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::LockTimeout => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn public_message(&self) -> String {
        match self {
            ApiError::Unauthenticated => "Invalid or expired token".to_string(),
            ApiError::Forbidden => UNAUTHORIZED_ACCESS.to_string(),
            ApiError::LockTimeout => {
                "Record is busy, please retry".to_string()
            }
            // Internal details stay in the logs.
            ApiError::Internal(_) => SOMETHING_WENT_WRONG.to_string(),
            ApiError::Conflict(msg) | ApiError::NotFound(msg) | ApiError::BadRequest(msg) => {
                msg.clone()
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Internal(detail) = &self {
            tracing::error!(detail = %detail, "request failed");
        }
        let status = self.status();
        (status, Json(json!({ "message": self.public_message() }))).into_response()
    }
}

impl From<GuardError> for ApiError {
    fn from(err: GuardError) -> Self {
        match err {
            GuardError::NotFound { table, id } => {
                ApiError::NotFound(format!("{} id {} does not exist", table, id))
            }
            GuardError::Conflict { .. } => ApiError::Conflict(
                "Conflict detected: record was updated by another operator, reload and retry"
                    .to_string(),
            ),
            GuardError::LockTimeout { .. } => ApiError::LockTimeout,
            GuardError::Rejected(msg) => ApiError::BadRequest(msg),
            ref e if e.is_unique_violation() => ApiError::BadRequest(ITEM_EXISTS.to_string()),
            GuardError::Storage(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<rusqlite::Error> for ApiError {
    fn from(err: rusqlite::Error) -> Self {
        if db::is_lock_timeout(&err) {
            ApiError::LockTimeout
        } else {
            ApiError::Internal(err.to_string())
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateEmail(_) => {
                ApiError::BadRequest("Email Already Registered".to_string())
            }
            StoreError::NotFound(_) => ApiError::NotFound("User id doesn't exist".to_string()),
            StoreError::Sqlite(e) => e.into(),
            StoreError::Hash(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<CatalogError> for ApiError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::DuplicateCategory(_) => ApiError::BadRequest(ITEM_EXISTS.to_string()),
            CatalogError::UnknownCategory(_) => {
                ApiError::NotFound("Category id does not exist".to_string())
            }
            CatalogError::Sqlite(e) => e.into(),
        }
    }
}

/// Build the `{"message": ...}` body used by every plain-text endpoint.
pub fn message(status: StatusCode, text: impl Into<String>) -> Response {
    (status, Json(json!({ "message": text.into() }))).into_response()
}

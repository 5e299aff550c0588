use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

pub const UNAUTHORIZED_MESSAGE: &str = "You are not authorized!";
pub const INVALID_FIELDS_MESSAGE: &str = "You provide incorrect field type or missing fields!";
pub const INVALID_PATH_MESSAGE: &str = "Invalid identifier in the request path!";
pub const RECORD_NOT_FOUND_MESSAGE: &str =
    "An operation failed because it depends on one or more records that were required but not found.";

/// AppError
///
/// The single error type surfaced by handlers and the repository. Its `IntoResponse`
/// impl is the global error translator: every failure leaves the service as
/// `{ "success": false, "message": ..., "details"?: ... }` with a status derived here.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{}", UNAUTHORIZED_MESSAGE)]
    Unauthorized,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    /// The request body could not be decoded into the expected payload.
    #[error("{}", INVALID_FIELDS_MESSAGE)]
    InvalidPayload(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

pub type AppResult<T> = Result<T, AppError>;

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::InvalidPayload(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        tracing::debug!("rejected path parameters: {}", rejection.body_text());
        AppError::BadRequest(INVALID_PATH_MESSAGE.to_string())
    }
}

/// classify_database_error
///
/// Maps a data-layer failure onto an HTTP status and a fixed client-facing message.
/// Postgres SQLSTATE codes are used for constraint failures; connection-level problems
/// become 503 so clients can tell an outage from a bad request.
pub fn classify_database_error(err: &sqlx::Error) -> (StatusCode, &'static str) {
    match err {
        sqlx::Error::RowNotFound => (StatusCode::NOT_FOUND, RECORD_NOT_FOUND_MESSAGE),
        sqlx::Error::Database(db) => match db.code().as_deref() {
            Some("23505") => (StatusCode::BAD_REQUEST, "Duplicate key error"),
            Some("23503") => (StatusCode::BAD_REQUEST, "Foreign key constraint failed"),
            Some("23502" | "23514" | "22P02" | "22001") => {
                (StatusCode::BAD_REQUEST, INVALID_FIELDS_MESSAGE)
            }
            Some("28P01" | "28000") => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Authentication failed. Please check your credentials!",
            ),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error"),
        },
        sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_) => (StatusCode::SERVICE_UNAVAILABLE, "Can't reach database server"),
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) | sqlx::Error::ColumnNotFound(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Error occurred during query execution",
        ),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error"),
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) | AppError::InvalidPayload(_) => StatusCode::BAD_REQUEST,
            AppError::Database(e) => classify_database_error(e).0,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        let body = match &self {
            AppError::Database(e) => {
                tracing::error!("database error: {:?}", e);
                json!({
                    "success": false,
                    "message": classify_database_error(e).1,
                })
            }
            AppError::InvalidPayload(details) => json!({
                "success": false,
                "message": INVALID_FIELDS_MESSAGE,
                "details": details,
            }),
            other => json!({
                "success": false,
                "message": other.to_string(),
            }),
        };

        (status, Json(body)).into_response()
    }
}

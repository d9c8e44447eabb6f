use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;

/// Error kinds surfaced to API callers. Background tasks (ingestor, workers, maintenance)
/// absorb their own transient/rate-limit/quota errors and never construct these; this type
/// exists for the HTTP boundary only.
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("story {0} not found")]
    NotFound(i64),

    #[error("malformed request: {0}")]
    BadRequest(String),

    #[error("{0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("upstream request error: {0}")]
    Upstream(#[from] reqwest::Error),

    #[error("{0}")]
    Unhandled(String),
}

impl From<crate::store::BlockingError> for AppError {
    fn from(err: crate::store::BlockingError) -> Self {
        match err {
            crate::store::BlockingError::Database(err) => AppError::Database(err),
            crate::store::BlockingError::Join(err) => AppError::Unhandled(err.to_string()),
        }
    }
}

impl From<crate::ingest::IngestError> for AppError {
    fn from(err: crate::ingest::IngestError) -> Self {
        match err {
            crate::ingest::IngestError::Http(err) => AppError::Upstream(err),
            crate::ingest::IngestError::Store(err) => err.into(),
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    code: &'static str,

    #[serde(skip_serializing_if = "Option::is_none")]
    msg: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Database(_) | AppError::Pool(_) | AppError::Upstream(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::Unhandled(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let code = match &self {
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::Conflict(_) => "CONFLICT",
            AppError::Database(_) => "DB_ERR",
            AppError::Pool(_) => "POOL_ERR",
            AppError::Upstream(_) => "UPSTREAM_ERR",
            AppError::Unhandled(_) => "ERR",
        };

        #[cfg(debug_assertions)]
        let msg = Some(self.to_string());
        #[cfg(not(debug_assertions))]
        let msg = match status {
            StatusCode::INTERNAL_SERVER_ERROR => None,
            _ => Some(self.to_string()),
        };

        (status, Json(ErrorResponse { code, msg })).into_response()
    }
}

impl From<&'static str> for AppError {
    fn from(e: &'static str) -> Self {
        AppError::Unhandled(e.into())
    }
}

impl From<(String, StatusCode)> for AppError {
    fn from((msg, status): (String, StatusCode)) -> Self {
        if status == StatusCode::UNPROCESSABLE_ENTITY || status == StatusCode::BAD_REQUEST {
            AppError::BadRequest(msg)
        } else {
            AppError::Unhandled(msg)
        }
    }
}

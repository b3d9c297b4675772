//! Error taxonomy for the dashboard service.
//!
//! Pure engine functions never fail for "no match"; only loaders and
//! mutating operations return these errors. Handlers convert them into
//! HTTP responses at the route boundary via [`IntoResponse`].

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// ---

#[derive(Debug, Error)]
pub enum AppError {
    // ---
    /// Malformed or inconsistent user input, detected before any network call.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A read query failed: non-success status, transport error or timeout.
    #[error("Fetch failed ({context}): status={status:?} {body}")]
    FetchFailed {
        context: String,
        status: Option<u16>,
        body: String,
    },

    /// A partial update was rejected by the store or never reached it.
    #[error("Update failed: status={status:?} {body}")]
    UpdateFailed { status: Option<u16>, body: String },

    /// An expected singleton record was absent after the query.
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    // ---
    pub fn fetch(context: impl Into<String>, err: reqwest::Error) -> Self {
        AppError::FetchFailed {
            context: context.into(),
            status: err.status().map(|s| s.as_u16()),
            body: err.to_string(),
        }
    }

    pub fn update(err: reqwest::Error) -> Self {
        AppError::UpdateFailed {
            status: err.status().map(|s| s.as_u16()),
            body: err.to_string(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        // ---
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::FetchFailed { .. } | AppError::UpdateFailed { .. } => StatusCode::BAD_GATEWAY,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // ---
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("{}", self);
        } else {
            tracing::debug!("{}", self);
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

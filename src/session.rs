//! Session context: the store API key, threaded explicitly into every call.
//!
//! The key arrives in the `x-apikey` header on each request, the same header
//! the document store expects. Handlers receive a [`Session`] through the
//! extractor and pass it to [`crate::store::RestDbClient`]; nothing reads the
//! key from ambient state. Login only validates a key; logging out is the
//! client discarding it.

use std::fmt;

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::error::AppError;

// ---

pub const API_KEY_HEADER: &str = "x-apikey";

/// Store keys are lowercase and at least this long.
pub const MIN_KEY_LEN: usize = 20;

#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    api_key: String,
}

impl Session {
    pub fn new(api_key: impl Into<String>) -> Self {
        Session {
            api_key: api_key.into(),
        }
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // ---
        let visible: String = self.api_key.chars().take(4).collect();
        f.debug_struct("Session")
            .field("api_key", &format_args!("{visible}****"))
            .finish()
    }
}

/// Reject keys that cannot be valid before asking the store.
pub fn validate_key_format(key: &str) -> Result<(), AppError> {
    // ---
    if key != key.to_lowercase() {
        return Err(AppError::Validation(
            "API key must be entirely lowercase".to_string(),
        ));
    }
    if key.chars().count() < MIN_KEY_LEN {
        return Err(AppError::Validation(format!(
            "API key is too short (minimum {MIN_KEY_LEN} characters)"
        )));
    }
    Ok(())
}

impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // ---
        let key = parts
            .headers
            .get(API_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| AppError::Unauthorized(format!("missing {API_KEY_HEADER} header")))?;

        Ok(Session::new(key))
    }
}

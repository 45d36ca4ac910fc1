use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use chrono::{DateTime, Utc};
use marquee_application::ResolvedAuthorization;
use marquee_core::{AppError, AppResult, BearerCredential};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;

mod elevation;
mod session;

pub use elevation::{promote_handler, sync_handler};
pub use session::{
    capability_check_handler, create_session_handler, logout_handler, me_handler,
};

pub const SESSION_AUTHORIZATION_KEY: &str = "resolved_authorization";

/// Authorization cached in the browser session with the time it was read from the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionAuthorization {
    pub authorization: ResolvedAuthorization,
    pub resolved_at: DateTime<Utc>,
}

pub async fn load_session_authorization(
    session: &Session,
) -> AppResult<Option<SessionAuthorization>> {
    session
        .get::<SessionAuthorization>(SESSION_AUTHORIZATION_KEY)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to read session authorization: {error}"))
        })
}

pub async fn store_session_authorization(
    session: &Session,
    authorization: &ResolvedAuthorization,
) -> AppResult<()> {
    let cached = SessionAuthorization {
        authorization: authorization.clone(),
        resolved_at: Utc::now(),
    };
    session
        .insert(SESSION_AUTHORIZATION_KEY, &cached)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to persist session authorization: {error}"))
        })
}

/// Extracts the bearer credential from the `Authorization` header.
pub fn bearer_credential(headers: &HeaderMap) -> Result<BearerCredential, AppError> {
    let value = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| AppError::InvalidCredential("missing bearer credential".to_owned()))?;

    let (scheme, token) = value
        .split_once(' ')
        .ok_or_else(|| AppError::InvalidCredential("malformed authorization header".to_owned()))?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AppError::InvalidCredential(
            "authorization scheme must be Bearer".to_owned(),
        ));
    }

    BearerCredential::new(token)
}

use axum::extract::{Request, State};
use axum::http::{HeaderMap, HeaderValue, Method, header};
use axum::middleware::Next;
use axum::response::Response;
use chrono::Utc;
use marquee_application::ResolvedAuthorization;
use marquee_core::{AppError, AppResult};
use marquee_domain::Capability;
use tower_sessions::Session;
use tracing::{info, warn};
use url::{Origin, Url};

use crate::auth::{load_session_authorization, store_session_authorization};
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn require_session(
    State(state): State<AppState>,
    session: Session,
    mut request: Request,
    next: Next,
) -> ApiResult<Response> {
    let authorization = current_authorization(&state, &session).await?;

    request.extensions_mut().insert(authorization);
    Ok(next.run(request).await)
}

/// Returns the session's cached authorization, re-reading the user record
/// once the cached copy is older than the configured bound.
pub async fn current_authorization(
    state: &AppState,
    session: &Session,
) -> AppResult<ResolvedAuthorization> {
    let cached = load_session_authorization(session)
        .await?
        .ok_or_else(|| AppError::InvalidCredential("authentication required".to_owned()))?;

    if Utc::now() - cached.resolved_at < state.session_authorization_max_age {
        return Ok(cached.authorization);
    }

    let subject = cached.authorization.subject();
    let Some(authorization) = state.identity_resolution_service.reload(subject).await? else {
        warn!(subject, "user record no longer exists, ending session");
        session
            .flush()
            .await
            .map_err(|error| AppError::Internal(format!("failed to end session: {error}")))?;
        return Err(AppError::InvalidCredential("session subject no longer exists".to_owned()));
    };

    if authorization != cached.authorization {
        info!(
            subject,
            role = authorization.role().as_str(),
            "session authorization changed since it was cached"
        );
    }
    store_session_authorization(session, &authorization).await?;

    Ok(authorization)
}

/// Fails closed unless the session's cached capability set grants `capability`.
pub fn require_capability(
    authorization: &ResolvedAuthorization,
    capability: Capability,
) -> Result<(), AppError> {
    if authorization.can(capability) {
        return Ok(());
    }

    Err(AppError::PermissionDenied(format!(
        "session is missing capability '{capability}'"
    )))
}

pub async fn require_same_origin_for_mutations(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> ApiResult<Response> {
    if is_state_changing_method(request.method()) {
        check_same_origin(request.headers(), &state.frontend_origin)?;
    }

    Ok(next.run(request).await)
}

fn check_same_origin(headers: &HeaderMap, allowed: &Origin) -> AppResult<()> {
    if let Some(fetch_site) = headers.get("sec-fetch-site")
        && fetch_site == HeaderValue::from_static("cross-site")
    {
        return Err(AppError::PermissionDenied("cross-site request blocked".to_owned()));
    }

    let origin = headers
        .get(header::ORIGIN)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    let referer = headers
        .get(header::REFERER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    if !matches_origin(origin, allowed) && !matches_origin(referer, allowed) {
        return Err(AppError::PermissionDenied("origin validation failed".to_owned()));
    }

    Ok(())
}

/// Compares the scheme, host and port of a header URL with the allowed origin.
fn matches_origin(candidate: &str, allowed: &Origin) -> bool {
    Url::parse(candidate).is_ok_and(|url| url.origin() == *allowed)
}

fn is_state_changing_method(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}

use std::str::FromStr;

use axum::Json;
use axum::extract::{Extension, Path, State};
use axum::http::{HeaderMap, StatusCode};
use marquee_application::{PresentedCredential, ResolvedAuthorization};
use marquee_core::AppError;
use marquee_domain::Capability;
use tower_sessions::Session;
use tracing::{info, warn};

use crate::dto::SessionAuthorizationResponse;
use crate::error::ApiResult;
use crate::middleware::require_capability;
use crate::state::AppState;

use super::{bearer_credential, store_session_authorization};

pub async fn create_session_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    session: Session,
) -> ApiResult<Json<SessionAuthorizationResponse>> {
    let tokens = PresentedCredential::new(bearer_credential(&headers)?);

    let resolved = tokio::time::timeout(
        state.resolution_timeout,
        state.identity_resolution_service.resolve(&tokens),
    )
    .await
    .map_err(|_| {
        warn!(
            timeout_ms = state.resolution_timeout.as_millis(),
            "session identity resolution timed out"
        );
        AppError::VerifierUnavailable("identity resolution timed out".to_owned())
    })??;

    session
        .cycle_id()
        .await
        .map_err(|error| AppError::Internal(format!("failed to rotate session id: {error}")))?;
    store_session_authorization(&session, &resolved).await?;

    info!(
        subject = resolved.subject(),
        role = resolved.role().as_str(),
        "session authorization resolved"
    );

    Ok(Json(SessionAuthorizationResponse::from(&resolved)))
}

pub async fn me_handler(
    Extension(authorization): Extension<ResolvedAuthorization>,
) -> Json<SessionAuthorizationResponse> {
    Json(SessionAuthorizationResponse::from(&authorization))
}

pub async fn logout_handler(session: Session) -> ApiResult<StatusCode> {
    session
        .flush()
        .await
        .map_err(|error| AppError::Internal(format!("failed to end session: {error}")))?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn capability_check_handler(
    Extension(authorization): Extension<ResolvedAuthorization>,
    Path(capability): Path<String>,
) -> ApiResult<StatusCode> {
    let capability = Capability::from_str(capability.as_str())?;
    require_capability(&authorization, capability)?;

    Ok(StatusCode::NO_CONTENT)
}

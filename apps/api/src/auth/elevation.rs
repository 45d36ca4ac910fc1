use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;
use marquee_application::PermissionSyncAction;

use crate::dto::{PromoteResponse, SyncResponse};
use crate::error::ApiResult;
use crate::state::AppState;

use super::bearer_credential;

pub async fn promote_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<PromoteResponse>> {
    let credential = bearer_credential(&headers)?;
    let outcome = state.elevation_service.promote(&credential).await?;

    Ok(Json(PromoteResponse::from(outcome)))
}

pub async fn sync_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<SyncResponse>> {
    let credential = bearer_credential(&headers)?;
    let outcome = state
        .permission_sync_service
        .sync_if_stale(&credential)
        .await?;

    Ok(Json(SyncResponse::from(outcome)))
}

#[cfg(test)]
mod tests;

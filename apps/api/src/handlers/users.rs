use std::str::FromStr;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use marquee_domain::{Capability, Role};

use crate::auth::bearer_credential;
use crate::dto::{ChangeRoleRequest, OverrideCapabilityRequest, UserRecordResponse};
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn get_user_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(subject): Path<String>,
) -> ApiResult<Json<UserRecordResponse>> {
    let credential = bearer_credential(&headers)?;
    let record = state
        .role_admin_service
        .find_record(&credential, subject.as_str())
        .await?;

    Ok(Json(UserRecordResponse::from_record(subject.as_str(), &record)))
}

pub async fn change_role_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(subject): Path<String>,
    Json(payload): Json<ChangeRoleRequest>,
) -> ApiResult<Json<UserRecordResponse>> {
    let credential = bearer_credential(&headers)?;
    let role = Role::from_str(payload.role.as_str())?;

    let record = state
        .role_admin_service
        .change_role(&credential, subject.as_str(), role)
        .await?;

    Ok(Json(UserRecordResponse::from_record(subject.as_str(), &record)))
}

pub async fn override_capability_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((subject, capability)): Path<(String, String)>,
    Json(payload): Json<OverrideCapabilityRequest>,
) -> ApiResult<Json<UserRecordResponse>> {
    let credential = bearer_credential(&headers)?;
    let capability = Capability::from_str(capability.as_str())?;

    let record = state
        .role_admin_service
        .override_capability(&credential, subject.as_str(), capability, payload.value)
        .await?;

    Ok(Json(UserRecordResponse::from_record(subject.as_str(), &record)))
}

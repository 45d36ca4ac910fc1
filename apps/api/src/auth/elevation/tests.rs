use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use marquee_domain::{AuditAction, CAPABILITY_SCHEMA_VERSION, CapabilitySet, Role};

use super::{promote_handler, sync_handler};
use crate::test_support::TestApi;

const OWNER: &str = "owner@example.com";

#[tokio::test]
async fn allow_listed_caller_is_promoted() {
    let api = TestApi::with_privileged(OWNER);

    let response = promote_handler(State(api.state.clone()), api.bearer("u-owner", Some(OWNER)))
        .await
        .unwrap_or_else(|_| panic!("promotion should succeed"));
    assert_eq!(response.0.outcome, "promoted");

    let record = api.record("u-owner").await;
    assert_eq!(record.role, Role::Admin);
    assert_eq!(record.capabilities, CapabilitySet::for_role(Role::Admin));

    let events = api.audit.events.lock().await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].action, AuditAction::RoleElevated);
}

#[tokio::test]
async fn repeated_promotion_reports_already_admin() {
    let api = TestApi::with_privileged(OWNER);
    let headers = api.bearer("u-owner", Some(OWNER));

    let first = promote_handler(State(api.state.clone()), headers.clone()).await;
    assert!(first.is_ok());

    let second = promote_handler(State(api.state.clone()), headers)
        .await
        .unwrap_or_else(|_| panic!("repeat promotion should succeed"));
    assert_eq!(second.0.outcome, "already_admin");
}

#[tokio::test]
async fn caller_outside_allow_list_is_forbidden() {
    let api = TestApi::with_privileged(OWNER);
    api.seed_current("u-other", Role::User).await;

    let response = promote_handler(
        State(api.state.clone()),
        api.bearer("u-other", Some("other@example.com")),
    )
    .await
    .map(IntoResponse::into_response)
    .unwrap_or_else(IntoResponse::into_response);

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(api.record("u-other").await.role, Role::User);
    assert!(api.audit.events.lock().await.is_empty());
}

#[tokio::test]
async fn stale_credential_cannot_promote() {
    let api = TestApi::with_privileged(OWNER);

    let response = promote_handler(
        State(api.state.clone()),
        api.bearer_issued_minutes_ago("u-owner", Some(OWNER), 30),
    )
    .await
    .map(IntoResponse::into_response)
    .unwrap_or_else(IntoResponse::into_response);

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn empty_allow_list_is_a_server_error() {
    let api = TestApi::new();

    let response = promote_handler(State(api.state.clone()), api.bearer("u-owner", Some(OWNER)))
        .await
        .map(IntoResponse::into_response)
        .unwrap_or_else(IntoResponse::into_response);

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn missing_bearer_is_unauthorized() {
    let api = TestApi::with_privileged(OWNER);

    let response = promote_handler(State(api.state.clone()), HeaderMap::new())
        .await
        .map(IntoResponse::into_response)
        .unwrap_or_else(IntoResponse::into_response);

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn sync_refreshes_a_stale_record() {
    let api = TestApi::new();
    api.seed("u1", Role::Vip, CAPABILITY_SCHEMA_VERSION - 1).await;

    let response = sync_handler(State(api.state.clone()), api.bearer("u1", None))
        .await
        .unwrap_or_else(|_| panic!("sync should succeed"));

    assert_eq!(response.0.outcome, "refreshed");
    assert_eq!(response.0.from_version, CAPABILITY_SCHEMA_VERSION - 1);
    assert_eq!(response.0.to_version, CAPABILITY_SCHEMA_VERSION);
    assert_eq!(
        api.record("u1").await.schema_version,
        CAPABILITY_SCHEMA_VERSION
    );
}

#[tokio::test]
async fn sync_of_current_record_is_a_no_op() {
    let api = TestApi::new();
    api.seed_current("u1", Role::User).await;

    let response = sync_handler(State(api.state.clone()), api.bearer("u1", None))
        .await
        .unwrap_or_else(|_| panic!("sync should succeed"));

    assert_eq!(response.0.outcome, "already_current");
    assert_eq!(response.0.from_version, response.0.to_version);
}

#[tokio::test]
async fn sync_without_record_is_not_found() {
    let api = TestApi::new();

    let response = sync_handler(State(api.state.clone()), api.bearer("ghost", None))
        .await
        .map(IntoResponse::into_response)
        .unwrap_or_else(IntoResponse::into_response);

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

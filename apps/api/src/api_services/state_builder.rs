use std::sync::Arc;

use marquee_application::{
    AuditRepository, ElevationService, IdentityResolutionService, IdentityVerifier,
    PermissionSyncService, RoleAdminService, TrustBoundary, UserRecordStore,
};
use marquee_core::AppError;
use marquee_infrastructure::{
    HmacTokenVerifier, HttpIdentityVerifier, PostgresAuditRepository, PostgresUserRecordStore,
};
use sqlx::PgPool;
use tracing::warn;

use crate::api_config::{ApiConfig, IdentityProviderConfig};
use crate::state::AppState;

pub fn build_app_state(pool: PgPool, config: &ApiConfig) -> Result<AppState, AppError> {
    let store = Arc::new(PostgresUserRecordStore::new(pool.clone()));
    let audit_repository = Arc::new(PostgresAuditRepository::new(pool));
    let verifier = build_identity_verifier(&config.identity_provider)?;

    if config.privileged_identities.is_empty() {
        warn!("PRIVILEGED_IDENTITY_EMAILS is not set, elevation requests will fail");
    }

    Ok(assemble_app_state(store, audit_repository, verifier, config))
}

pub fn assemble_app_state(
    store: Arc<dyn UserRecordStore>,
    audit_repository: Arc<dyn AuditRepository>,
    verifier: Arc<dyn IdentityVerifier>,
    config: &ApiConfig,
) -> AppState {
    let trust_boundary = TrustBoundary::new(verifier, config.fresh_credential_max_age);
    let permission_sync_service = PermissionSyncService::new(
        trust_boundary.clone(),
        store.clone(),
        config.override_policy,
    );

    AppState {
        identity_resolution_service: IdentityResolutionService::new(
            trust_boundary.clone(),
            store.clone(),
            Arc::new(permission_sync_service.clone()),
        ),
        permission_sync_service,
        elevation_service: ElevationService::new(
            trust_boundary.clone(),
            store.clone(),
            audit_repository.clone(),
            config.privileged_identities.clone(),
        ),
        role_admin_service: RoleAdminService::new(trust_boundary, store, audit_repository),
        frontend_origin: config.frontend_origin.clone(),
        resolution_timeout: config.resolution_timeout,
        session_authorization_max_age: config.session_authorization_max_age,
    }
}

fn build_identity_verifier(
    provider: &IdentityProviderConfig,
) -> Result<Arc<dyn IdentityVerifier>, AppError> {
    Ok(match provider {
        IdentityProviderConfig::Hmac { secret, issuer } => Arc::new(HmacTokenVerifier::new(
            secret.clone().into_bytes(),
            issuer.clone(),
        )?),
        IdentityProviderConfig::Http { endpoint } => Arc::new(HttpIdentityVerifier::new(
            reqwest::Client::new(),
            endpoint.clone(),
        )),
    })
}

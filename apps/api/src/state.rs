use std::time::Duration;

use url::Origin;

use marquee_application::{
    ElevationService, IdentityResolutionService, PermissionSyncService, RoleAdminService,
};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub identity_resolution_service: IdentityResolutionService,
    pub permission_sync_service: PermissionSyncService,
    pub elevation_service: ElevationService,
    pub role_admin_service: RoleAdminService,
    pub frontend_origin: Origin,
    pub resolution_timeout: Duration,
    pub session_authorization_max_age: chrono::Duration,
}

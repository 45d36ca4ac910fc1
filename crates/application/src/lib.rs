//! Application services and ports.

#![forbid(unsafe_code)]

mod audit_ports;
mod elevation_service;
mod identity_ports;
mod identity_resolution_service;
mod permission_sync_service;
mod role_admin_service;
mod session_context;
mod user_record_ports;

#[cfg(test)]
mod test_support;

pub use audit_ports::{AuditEvent, AuditRepository};
pub use elevation_service::{ElevationService, PrivilegedIdentityAllowList, PromotionOutcome};
pub use identity_ports::{FreshTokenSource, IdentityVerifier, PresentedCredential, TrustBoundary};
pub use identity_resolution_service::IdentityResolutionService;
pub use permission_sync_service::{PermissionSyncAction, PermissionSyncService, SyncOutcome};
pub use role_admin_service::RoleAdminService;
pub use session_context::{
    AuthStateChange, DEFAULT_RESOLUTION_TIMEOUT, ResolutionTicket, ResolvedAuthorization,
    SessionAuthState, SessionAuthorizationContext, SessionResolver,
};
pub use user_record_ports::UserRecordStore;

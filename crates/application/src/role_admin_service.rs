use std::sync::Arc;

use tracing::info;

use marquee_core::{AppError, AppResult, BearerCredential, VerifiedIdentity};
use marquee_domain::{
    AuditAction, CAPABILITY_SCHEMA_VERSION, Capability, CapabilitySet, Role, UserRecord,
};

use crate::{AuditEvent, AuditRepository, TrustBoundary, UserRecordStore};

/// Administrative role and capability mutations.
///
/// The acting subject comes from the verified credential and its permission
/// is read from the stored record, never from the caller's session.
#[derive(Clone)]
pub struct RoleAdminService {
    trust_boundary: TrustBoundary,
    store: Arc<dyn UserRecordStore>,
    audit_repository: Arc<dyn AuditRepository>,
}

impl RoleAdminService {
    /// Creates a new role administration service.
    #[must_use]
    pub fn new(
        trust_boundary: TrustBoundary,
        store: Arc<dyn UserRecordStore>,
        audit_repository: Arc<dyn AuditRepository>,
    ) -> Self {
        Self {
            trust_boundary,
            store,
            audit_repository,
        }
    }

    /// Returns a stored record for the admin surface.
    pub async fn find_record(
        &self,
        credential: &BearerCredential,
        target_subject: &str,
    ) -> AppResult<UserRecord> {
        let identity = self.trust_boundary.verify(credential).await?;
        self.require_stored_capability(&identity, Capability::ViewAdminSurface)
            .await?;

        self.load_target(target_subject).await
    }

    /// Replaces the target's role and resets its capabilities to the role's
    /// defaults at the current schema version.
    pub async fn change_role(
        &self,
        credential: &BearerCredential,
        target_subject: &str,
        role: Role,
    ) -> AppResult<UserRecord> {
        if role == Role::Admin {
            return Err(AppError::PermissionDenied(
                "the admin role can only be obtained through elevation".to_owned(),
            ));
        }

        let identity = self.trust_boundary.verify_fresh(credential).await?;
        self.require_stored_capability(&identity, Capability::ManageUsers)
            .await?;

        let previous_role = self.load_target(target_subject).await?.role;
        self.store
            .update_role(
                target_subject,
                role,
                &CapabilitySet::for_role(role),
                CAPABILITY_SCHEMA_VERSION,
            )
            .await?;

        self.audit_repository
            .append_event(AuditEvent {
                actor: identity.subject().to_owned(),
                action: AuditAction::RoleChanged,
                target_subject: target_subject.to_owned(),
                detail: Some(format!("changed role from '{previous_role}' to '{role}'")),
            })
            .await?;

        info!(
            actor = identity.subject(),
            target_subject,
            from = previous_role.as_str(),
            to = role.as_str(),
            "changed user role"
        );

        self.load_target(target_subject).await
    }

    /// Sets one capability flag on the target's record and records it as an
    /// override.
    pub async fn override_capability(
        &self,
        credential: &BearerCredential,
        target_subject: &str,
        capability: Capability,
        value: bool,
    ) -> AppResult<UserRecord> {
        let identity = self.trust_boundary.verify_fresh(credential).await?;
        self.require_stored_capability(&identity, Capability::ManageUsers)
            .await?;

        self.store
            .update_one_capability(target_subject, capability, value)
            .await?;

        self.audit_repository
            .append_event(AuditEvent {
                actor: identity.subject().to_owned(),
                action: AuditAction::CapabilityOverridden,
                target_subject: target_subject.to_owned(),
                detail: Some(format!("set '{capability}' to {value}")),
            })
            .await?;

        info!(
            actor = identity.subject(),
            target_subject,
            capability = capability.as_str(),
            value,
            "overrode capability"
        );

        self.load_target(target_subject).await
    }

    async fn require_stored_capability(
        &self,
        identity: &VerifiedIdentity,
        capability: Capability,
    ) -> AppResult<()> {
        let granted = self
            .store
            .get(identity.subject())
            .await?
            .is_some_and(|record| record.can(capability));

        if granted {
            return Ok(());
        }

        Err(AppError::PermissionDenied(format!(
            "subject '{}' is missing capability '{capability}'",
            identity.subject()
        )))
    }

    async fn load_target(&self, target_subject: &str) -> AppResult<UserRecord> {
        self.store
            .get(target_subject)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("no user record for '{target_subject}'")))
    }
}

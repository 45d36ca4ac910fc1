//! Bootstrap action that grants the administrator role.
//!
//! Elevation is the only path to [`Role::Admin`]. The allow-list of privileged
//! identities lives on the server and is never sent to clients.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};

use marquee_core::{AppError, AppResult, BearerCredential, VerifiedIdentity};
use marquee_domain::{
    AuditAction, CAPABILITY_SCHEMA_VERSION, CapabilitySet, EmailAddress, Role, UserRecord,
};

use crate::{AuditEvent, AuditRepository, TrustBoundary, UserRecordStore};

const ELEVATION_DENIED: &str = "elevation is not permitted";

/// Server-held set of identities allowed to self-elevate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrivilegedIdentityAllowList {
    emails: BTreeSet<EmailAddress>,
}

impl PrivilegedIdentityAllowList {
    /// Creates an allow-list from validated addresses.
    #[must_use]
    pub fn new(emails: impl IntoIterator<Item = EmailAddress>) -> Self {
        Self {
            emails: emails.into_iter().collect(),
        }
    }

    /// Parses a comma-separated list of addresses. Blank entries are skipped.
    pub fn parse(raw: &str) -> AppResult<Self> {
        let emails = raw
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(EmailAddress::new)
            .collect::<AppResult<BTreeSet<_>>>()?;

        Ok(Self { emails })
    }

    /// Returns whether no identity is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.emails.is_empty()
    }

    /// Returns the number of configured identities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.emails.len()
    }

    /// Returns whether the address is allowed to self-elevate.
    #[must_use]
    pub fn contains(&self, email: &EmailAddress) -> bool {
        self.emails.contains(email)
    }
}

/// Result of a successful elevation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromotionOutcome {
    /// The record was raised to administrator.
    Promoted,
    /// The record already held the administrator role; the write was a no-op.
    AlreadyAdmin,
}

/// Trust-boundary action for administrator bootstrap.
#[derive(Clone)]
pub struct ElevationService {
    trust_boundary: TrustBoundary,
    store: Arc<dyn UserRecordStore>,
    audit_repository: Arc<dyn AuditRepository>,
    allow_list: PrivilegedIdentityAllowList,
}

impl ElevationService {
    /// Creates a new elevation service.
    #[must_use]
    pub fn new(
        trust_boundary: TrustBoundary,
        store: Arc<dyn UserRecordStore>,
        audit_repository: Arc<dyn AuditRepository>,
        allow_list: PrivilegedIdentityAllowList,
    ) -> Self {
        Self {
            trust_boundary,
            store,
            audit_repository,
            allow_list,
        }
    }

    /// Promotes the verified caller to administrator if their email is on the
    /// allow-list.
    ///
    /// Callers outside the allow-list get the same generic
    /// `PermissionDenied` whether or not the token carried an email claim,
    /// and nothing is written.
    pub async fn promote(&self, credential: &BearerCredential) -> AppResult<PromotionOutcome> {
        if self.allow_list.is_empty() {
            error!("elevation requested but no privileged identities are configured");
            return Err(AppError::Misconfiguration(
                "privileged identity allow-list is empty".to_owned(),
            ));
        }

        let identity = self.trust_boundary.verify_fresh(credential).await?;
        if !self.is_privileged(&identity) {
            warn!(subject = identity.subject(), "denied elevation attempt");
            return Err(AppError::PermissionDenied(ELEVATION_DENIED.to_owned()));
        }

        let subject = identity.subject();
        let previous_role = self.load_or_provision(&identity).await?.role;

        self.store
            .update_role(
                subject,
                Role::Admin,
                &CapabilitySet::for_role(Role::Admin),
                CAPABILITY_SCHEMA_VERSION,
            )
            .await?;

        self.audit_repository
            .append_event(AuditEvent {
                actor: subject.to_owned(),
                action: AuditAction::RoleElevated,
                target_subject: subject.to_owned(),
                detail: Some(format!("elevated from '{previous_role}'")),
            })
            .await?;

        info!(subject, previous_role = previous_role.as_str(), "elevated to admin");

        Ok(if previous_role == Role::Admin {
            PromotionOutcome::AlreadyAdmin
        } else {
            PromotionOutcome::Promoted
        })
    }

    fn is_privileged(&self, identity: &VerifiedIdentity) -> bool {
        identity
            .email()
            .and_then(|email| EmailAddress::new(email).ok())
            .is_some_and(|email| self.allow_list.contains(&email))
    }

    async fn load_or_provision(&self, identity: &VerifiedIdentity) -> AppResult<UserRecord> {
        let subject = identity.subject();
        if let Some(record) = self.store.get(subject).await? {
            return Ok(record);
        }

        let record = UserRecord::provision(identity.email().map(ToOwned::to_owned), Utc::now());
        match self.store.create(subject, &record).await {
            Ok(()) => Ok(record),
            Err(AppError::AlreadyExists(_)) => self.store.get(subject).await?.ok_or_else(|| {
                AppError::Internal(format!(
                    "record for subject '{subject}' vanished after a conflicting create"
                ))
            }),
            Err(error) => Err(error),
        }
    }
}

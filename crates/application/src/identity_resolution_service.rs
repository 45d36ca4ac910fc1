//! Session-start identity resolution.
//!
//! Loads or provisions the subject's record, reconciles its capability schema
//! version through the trust-boundary resync action, and hands back the
//! resolved role and capabilities.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use marquee_core::{AppError, AppResult, VerifiedIdentity};
use marquee_domain::UserRecord;

use crate::{
    FreshTokenSource, PermissionSyncAction, ResolvedAuthorization, TrustBoundary, UserRecordStore,
};

/// Drives one identity-resolution cycle per session start.
#[derive(Clone)]
pub struct IdentityResolutionService {
    trust_boundary: TrustBoundary,
    store: Arc<dyn UserRecordStore>,
    sync_action: Arc<dyn PermissionSyncAction>,
}

impl IdentityResolutionService {
    /// Creates a new resolution service.
    #[must_use]
    pub fn new(
        trust_boundary: TrustBoundary,
        store: Arc<dyn UserRecordStore>,
        sync_action: Arc<dyn PermissionSyncAction>,
    ) -> Self {
        Self {
            trust_boundary,
            store,
            sync_action,
        }
    }

    /// Resolves the caller's role and capabilities.
    ///
    /// Credential errors are returned to the caller. A failed resync is not:
    /// the stale stored capabilities are used for this session and resync is
    /// attempted again on the next one.
    pub async fn resolve(&self, tokens: &dyn FreshTokenSource) -> AppResult<ResolvedAuthorization> {
        let credential = tokens.fresh_token(false).await?;
        let identity = self.trust_boundary.verify(&credential).await?;

        let record = match self.store.get(identity.subject()).await? {
            Some(record) => record,
            None => self.provision(&identity).await?,
        };

        let record = if record.is_stale() {
            self.resync(&identity, tokens, record).await
        } else {
            record
        };

        Ok(ResolvedAuthorization::new(
            identity.subject(),
            record.role,
            record.capabilities,
        ))
    }

    /// Re-reads the stored role and capabilities for a subject resolved earlier.
    ///
    /// Returns `None` once the subject's record no longer exists.
    pub async fn reload(&self, subject: &str) -> AppResult<Option<ResolvedAuthorization>> {
        let record = self.store.get(subject).await?;
        Ok(record.map(|record| {
            ResolvedAuthorization::new(subject, record.role, record.capabilities)
        }))
    }

    async fn provision(&self, identity: &VerifiedIdentity) -> AppResult<UserRecord> {
        let subject = identity.subject();
        let record = UserRecord::provision(identity.email().map(ToOwned::to_owned), Utc::now());

        match self.store.create(subject, &record).await {
            Ok(()) => {
                info!(subject, role = record.role.as_str(), "provisioned user record");
                Ok(record)
            }
            Err(AppError::AlreadyExists(_)) => {
                // Lost the race against a concurrent first sign-in.
                self.store.get(subject).await?.ok_or_else(|| {
                    AppError::Internal(format!(
                        "record for subject '{subject}' vanished after a conflicting create"
                    ))
                })
            }
            Err(error) => Err(error),
        }
    }

    async fn resync(
        &self,
        identity: &VerifiedIdentity,
        tokens: &dyn FreshTokenSource,
        stale: UserRecord,
    ) -> UserRecord {
        let subject = identity.subject();

        let refreshed = async {
            let fresh = tokens.fresh_token(true).await?;
            let fresh_identity = self.trust_boundary.verify(&fresh).await?;
            if fresh_identity.subject() != subject {
                return Err(AppError::InvalidCredential(
                    "refreshed credential belongs to a different subject".to_owned(),
                ));
            }
            self.sync_action.sync_if_stale(&fresh).await?;
            self.store.get(subject).await
        }
        .await;

        match refreshed {
            Ok(Some(record)) => record,
            Ok(None) => {
                warn!(subject, "record missing after resync, keeping stale capabilities");
                stale
            }
            Err(error) => {
                warn!(
                    subject,
                    stored_version = stale.schema_version,
                    %error,
                    "capability resync failed, keeping stale capabilities for this session"
                );
                stale
            }
        }
    }
}

//! Server-side capability resync for records stored at an older schema version.
//!
//! The write path always re-verifies the credential and re-reads the role
//! from the store, so a modified client cannot choose its own capabilities.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use marquee_core::{AppError, AppResult, BearerCredential};
use marquee_domain::{CAPABILITY_SCHEMA_VERSION, OverridePolicy};

use crate::{TrustBoundary, UserRecordStore};

/// Result of one resync attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Stored record was already at or above the current version; nothing written.
    AlreadyCurrent {
        /// Version found on the stored record.
        version: u32,
    },
    /// Capabilities were re-derived and written.
    Refreshed {
        /// Version found before the write.
        from_version: u32,
        /// Version written.
        to_version: u32,
    },
}

/// Trust-boundary action that re-derives stale capabilities.
///
/// Takes only a credential; the effective subject comes from verification.
#[async_trait]
pub trait PermissionSyncAction: Send + Sync {
    /// Resyncs the caller's record if its schema version is behind.
    async fn sync_if_stale(&self, credential: &BearerCredential) -> AppResult<SyncOutcome>;
}

/// In-process implementation of the resync action.
#[derive(Clone)]
pub struct PermissionSyncService {
    trust_boundary: TrustBoundary,
    store: Arc<dyn UserRecordStore>,
    override_policy: OverridePolicy,
}

impl PermissionSyncService {
    /// Creates a new service.
    #[must_use]
    pub fn new(
        trust_boundary: TrustBoundary,
        store: Arc<dyn UserRecordStore>,
        override_policy: OverridePolicy,
    ) -> Self {
        Self {
            trust_boundary,
            store,
            override_policy,
        }
    }
}

#[async_trait]
impl PermissionSyncAction for PermissionSyncService {
    async fn sync_if_stale(&self, credential: &BearerCredential) -> AppResult<SyncOutcome> {
        let identity = self.trust_boundary.verify_fresh(credential).await?;
        let subject = identity.subject();

        let record = self.store.get(subject).await?.ok_or_else(|| {
            AppError::NotFound(format!("no authorization record for subject '{subject}'"))
        })?;

        if !record.is_stale() {
            return Ok(SyncOutcome::AlreadyCurrent {
                version: record.schema_version,
            });
        }

        let capabilities = self
            .override_policy
            .reconcile(record.role, &record.overrides);
        match self.override_policy {
            OverridePolicy::VersionSticky => {
                self.store
                    .update_capabilities(subject, &capabilities, CAPABILITY_SCHEMA_VERSION)
                    .await?;
            }
            // Rewriting the stored role drops recorded overrides along with the flags.
            OverridePolicy::RoleSticky => {
                self.store
                    .update_role(subject, record.role, &capabilities, CAPABILITY_SCHEMA_VERSION)
                    .await?;
            }
        }

        info!(
            subject,
            role = record.role.as_str(),
            from_version = record.schema_version,
            to_version = CAPABILITY_SCHEMA_VERSION,
            policy = self.override_policy.as_str(),
            "resynced stale capabilities"
        );

        Ok(SyncOutcome::Refreshed {
            from_version: record.schema_version,
            to_version: CAPABILITY_SCHEMA_VERSION,
        })
    }
}

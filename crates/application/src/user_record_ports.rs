use async_trait::async_trait;

use marquee_core::AppResult;
use marquee_domain::{Capability, CapabilitySet, Role, UserRecord};

/// Repository port for per-subject authorization records.
///
/// Every operation targets exactly one subject's document and relies on the
/// store's per-document atomicity.
#[async_trait]
pub trait UserRecordStore: Send + Sync {
    /// Loads the record for a subject, if one exists.
    async fn get(&self, subject: &str) -> AppResult<Option<UserRecord>>;

    /// Creates a record if none exists.
    ///
    /// Fails with `AlreadyExists` when the subject already has a record; never
    /// overwrites.
    async fn create(&self, subject: &str, record: &UserRecord) -> AppResult<()>;

    /// Replaces the capability flags and schema version, leaving the role as is.
    async fn update_capabilities(
        &self,
        subject: &str,
        capabilities: &CapabilitySet,
        version: u32,
    ) -> AppResult<()>;

    /// Sets a new role with its capability flags and clears recorded overrides.
    async fn update_role(
        &self,
        subject: &str,
        role: Role,
        capabilities: &CapabilitySet,
        version: u32,
    ) -> AppResult<()>;

    /// Flips one flag and records it as an override, leaving the version as is.
    async fn update_one_capability(
        &self,
        subject: &str,
        capability: Capability,
        value: bool,
    ) -> AppResult<()>;
}

//! Persisted per-subject authorization record.

use chrono::{DateTime, Utc};

use crate::{
    CAPABILITY_SCHEMA_VERSION, Capability, CapabilityOverrides, CapabilitySet, Role,
};

mod document;

pub use document::{PERMISSIONS_VERSION_KEY, UserRecordDocument};

/// Authorization record for one subject, keyed externally by subject id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    /// Assigned role.
    pub role: Role,
    /// Denormalized capability flags.
    pub capabilities: CapabilitySet,
    /// Capability schema version the flags were derived at.
    pub schema_version: u32,
    /// Email claim captured when the record was provisioned.
    pub email: Option<String>,
    /// Flags explicitly overridden since the last role change.
    pub overrides: CapabilityOverrides,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp.
    pub updated_at: DateTime<Utc>,
}

impl UserRecord {
    /// Builds the record created on a subject's first successful sign-in.
    #[must_use]
    pub fn provision(email: Option<String>, now: DateTime<Utc>) -> Self {
        let role = Role::default();
        Self {
            role,
            capabilities: CapabilitySet::for_role(role),
            schema_version: CAPABILITY_SCHEMA_VERSION,
            email,
            overrides: CapabilityOverrides::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns true when the flags were derived at an older schema version.
    #[must_use]
    pub fn is_stale(&self) -> bool {
        self.schema_version < CAPABILITY_SCHEMA_VERSION
    }

    /// Returns the value of one flag.
    #[must_use]
    pub fn can(&self, capability: Capability) -> bool {
        self.capabilities.get(capability)
    }
}

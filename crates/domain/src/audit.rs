use serde::{Deserialize, Serialize};

/// Stable audit actions emitted by authorization use-cases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// Emitted when a subject is promoted through the elevation action.
    RoleElevated,
    /// Emitted when an administrator changes a subject's role.
    RoleChanged,
    /// Emitted when an administrator flips a single capability flag.
    CapabilityOverridden,
}

impl AuditAction {
    /// Returns a stable storage value for this action.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RoleElevated => "authz.role.elevated",
            Self::RoleChanged => "authz.role.changed",
            Self::CapabilityOverridden => "authz.capability.overridden",
        }
    }
}

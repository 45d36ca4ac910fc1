use std::collections::BTreeMap;

use marquee_application::{PromotionOutcome, ResolvedAuthorization, SyncOutcome};
use marquee_domain::{CapabilitySet, UserRecord};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Health response payload.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/health-response.ts"
)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Role and capability flags held by the current session.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/session-authorization-response.ts"
)]
pub struct SessionAuthorizationResponse {
    pub subject: String,
    pub role: String,
    pub capabilities: BTreeMap<String, bool>,
}

impl From<&ResolvedAuthorization> for SessionAuthorizationResponse {
    fn from(value: &ResolvedAuthorization) -> Self {
        Self {
            subject: value.subject().to_owned(),
            role: value.role().as_str().to_owned(),
            capabilities: capability_map(&value.capabilities()),
        }
    }
}

/// Result of an elevation request.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/promote-response.ts"
)]
pub struct PromoteResponse {
    pub outcome: String,
}

impl From<PromotionOutcome> for PromoteResponse {
    fn from(value: PromotionOutcome) -> Self {
        let outcome = match value {
            PromotionOutcome::Promoted => "promoted",
            PromotionOutcome::AlreadyAdmin => "already_admin",
        };
        Self {
            outcome: outcome.to_owned(),
        }
    }
}

/// Result of a capability resync request.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/sync-response.ts"
)]
pub struct SyncResponse {
    pub outcome: String,
    pub from_version: u32,
    pub to_version: u32,
}

impl From<SyncOutcome> for SyncResponse {
    fn from(value: SyncOutcome) -> Self {
        match value {
            SyncOutcome::AlreadyCurrent { version } => Self {
                outcome: "already_current".to_owned(),
                from_version: version,
                to_version: version,
            },
            SyncOutcome::Refreshed {
                from_version,
                to_version,
            } => Self {
                outcome: "refreshed".to_owned(),
                from_version,
                to_version,
            },
        }
    }
}

/// API representation of a stored user record.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/user-record-response.ts"
)]
pub struct UserRecordResponse {
    pub subject: String,
    pub role: String,
    pub capabilities: BTreeMap<String, bool>,
    pub schema_version: u32,
    pub email: Option<String>,
    pub overrides: BTreeMap<String, bool>,
    pub created_at: String,
    pub updated_at: String,
}

impl UserRecordResponse {
    pub fn from_record(subject: &str, record: &UserRecord) -> Self {
        Self {
            subject: subject.to_owned(),
            role: record.role.as_str().to_owned(),
            capabilities: capability_map(&record.capabilities),
            schema_version: record.schema_version,
            email: record.email.clone(),
            overrides: record
                .overrides
                .iter()
                .map(|(capability, value)| (capability.as_str().to_owned(), value))
                .collect(),
            created_at: record.created_at.to_rfc3339(),
            updated_at: record.updated_at.to_rfc3339(),
        }
    }
}

/// Incoming payload for role changes.
#[derive(Debug, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/change-role-request.ts"
)]
pub struct ChangeRoleRequest {
    pub role: String,
}

/// Incoming payload for single-capability overrides.
#[derive(Debug, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/override-capability-request.ts"
)]
pub struct OverrideCapabilityRequest {
    pub value: bool,
}

fn capability_map(capabilities: &CapabilitySet) -> BTreeMap<String, bool> {
    capabilities
        .iter()
        .map(|(capability, value)| (capability.as_str().to_owned(), value))
        .collect()
}

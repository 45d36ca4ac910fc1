use std::str::FromStr;

use chrono::{DateTime, Utc};
use marquee_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{CAPABILITY_SCHEMA_VERSION, Capability, CapabilityOverrides, CapabilitySet, Role};

use super::UserRecord;

/// Key holding the schema version inside the `permissions` object.
pub const PERMISSIONS_VERSION_KEY: &str = "version";

/// Wire shape of a user record in the document store.
///
/// Decoding validates the role and flag shape instead of trusting the payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecordDocument {
    /// Role storage value.
    pub role: String,
    /// Capability flags plus the `version` key.
    pub permissions: Map<String, Value>,
    /// Email captured at provisioning.
    #[serde(default)]
    pub email: Option<String>,
    /// Explicit per-subject flag overrides.
    #[serde(default)]
    pub overrides: Map<String, Value>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp.
    pub updated_at: DateTime<Utc>,
}

impl UserRecordDocument {
    /// Encodes the `permissions` object for a capability set and version.
    #[must_use]
    pub fn encode_permissions(capabilities: &CapabilitySet, version: u32) -> Map<String, Value> {
        let mut permissions: Map<String, Value> = capabilities
            .iter()
            .map(|(capability, value)| (capability.as_str().to_owned(), Value::Bool(value)))
            .collect();
        permissions.insert(
            PERMISSIONS_VERSION_KEY.to_owned(),
            Value::from(u64::from(version)),
        );
        permissions
    }

    /// Encodes the `overrides` object.
    #[must_use]
    pub fn encode_overrides(overrides: &CapabilityOverrides) -> Map<String, Value> {
        overrides
            .iter()
            .map(|(capability, value)| (capability.as_str().to_owned(), Value::Bool(value)))
            .collect()
    }
}

impl From<&UserRecord> for UserRecordDocument {
    fn from(record: &UserRecord) -> Self {
        Self {
            role: record.role.as_str().to_owned(),
            permissions: Self::encode_permissions(&record.capabilities, record.schema_version),
            email: record.email.clone(),
            overrides: Self::encode_overrides(&record.overrides),
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

impl TryFrom<UserRecordDocument> for UserRecord {
    type Error = AppError;

    fn try_from(document: UserRecordDocument) -> AppResult<Self> {
        let role = Role::from_str(document.role.as_str())?;
        let schema_version = decode_version(&document.permissions)?;
        let capabilities = decode_capabilities(&document.permissions, schema_version)?;
        let overrides = decode_overrides(&document.overrides)?;

        Ok(Self {
            role,
            capabilities,
            schema_version,
            email: document.email,
            overrides,
            created_at: document.created_at,
            updated_at: document.updated_at,
        })
    }
}

fn decode_version(permissions: &Map<String, Value>) -> AppResult<u32> {
    match permissions.get(PERMISSIONS_VERSION_KEY) {
        None | Some(Value::Null) => Ok(0),
        Some(value) => value
            .as_u64()
            .and_then(|version| u32::try_from(version).ok())
            .ok_or_else(|| {
                AppError::Validation(format!("permissions version must be an integer, got {value}"))
            }),
    }
}

// Records written before the current schema may lack newer flags; those read
// as false until resync rewrites them. Current records must be complete.
fn decode_capabilities(
    permissions: &Map<String, Value>,
    schema_version: u32,
) -> AppResult<CapabilitySet> {
    let mut capabilities = CapabilitySet::none();

    for capability in Capability::all() {
        let value = match permissions.get(capability.as_str()) {
            Some(Value::Bool(value)) => *value,
            Some(other) => {
                return Err(AppError::Validation(format!(
                    "permission '{capability}' must be a boolean, got {other}"
                )));
            }
            None if schema_version >= CAPABILITY_SCHEMA_VERSION => {
                return Err(AppError::Validation(format!(
                    "permission '{capability}' is missing from a version {schema_version} record"
                )));
            }
            None => false,
        };
        capabilities.set(*capability, value);
    }

    Ok(capabilities)
}

fn decode_overrides(overrides: &Map<String, Value>) -> AppResult<CapabilityOverrides> {
    let mut decoded = CapabilityOverrides::default();

    for (key, value) in overrides {
        // Overrides for retired flags are dropped.
        let Ok(capability) = Capability::from_str(key) else {
            continue;
        };
        let Value::Bool(value) = value else {
            return Err(AppError::Validation(format!(
                "override '{key}' must be a boolean, got {value}"
            )));
        };
        decoded.record(capability, *value);
    }

    Ok(decoded)
}

//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod audit;
mod capability;
mod email;
mod role;
mod user_record;

pub use audit::AuditAction;
pub use capability::{
    CAPABILITY_SCHEMA_VERSION, Capability, CapabilityOverrides, CapabilitySet, OverridePolicy,
};
pub use email::EmailAddress;
pub use role::Role;
pub use user_record::{PERMISSIONS_VERSION_KEY, UserRecord, UserRecordDocument};

//! Capability flags and the static role to capability matrix.

use std::str::FromStr;

use marquee_core::AppError;
use serde::{Deserialize, Serialize};

use crate::Role;

/// Current semantics version of [`CapabilitySet`].
///
/// Bump whenever a flag is added, removed, or changes meaning. Records stored
/// with a lower version are re-derived on the next session start.
pub const CAPABILITY_SCHEMA_VERSION: u32 = 2;

/// One named boolean permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Allows changing other subjects' roles and flags.
    ManageUsers,
    /// Allows deleting catalog entries.
    DeleteContent,
    /// Allows adding catalog entries.
    CreateContent,
    /// Allows editing catalog entries.
    UpdateContent,
    /// Allows opening the administration surface.
    ViewAdminSurface,
    /// Allows watching restricted titles.
    WatchRestrictedContent,
    /// Allows watching regular titles.
    WatchContent,
    /// Allows persisting watch progress.
    PersistProgress,
}

impl Capability {
    /// Returns the stable document key for this flag.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ManageUsers => "canManageUsers",
            Self::DeleteContent => "canDeleteMovie",
            Self::CreateContent => "canCreateMovie",
            Self::UpdateContent => "canEditMovie",
            Self::ViewAdminSurface => "canAccessAdmin",
            Self::WatchRestrictedContent => "canWatchRestricted",
            Self::WatchContent => "canWatchMovie",
            Self::PersistProgress => "canSaveProgress",
        }
    }

    /// Returns all known capabilities in document order.
    #[must_use]
    pub fn all() -> &'static [Self] {
        const ALL: &[Capability] = &[
            Capability::ManageUsers,
            Capability::DeleteContent,
            Capability::CreateContent,
            Capability::UpdateContent,
            Capability::ViewAdminSurface,
            Capability::WatchRestrictedContent,
            Capability::WatchContent,
            Capability::PersistProgress,
        ];

        ALL
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl FromStr for Capability {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|capability| capability.as_str() == value)
            .ok_or_else(|| AppError::Validation(format!("unknown capability key '{value}'")))
    }
}

/// Fixed-shape set of capability flags for one subject.
///
/// The key set never varies between records; only values do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct CapabilitySet {
    manage_users: bool,
    delete_content: bool,
    create_content: bool,
    update_content: bool,
    view_admin_surface: bool,
    watch_restricted_content: bool,
    watch_content: bool,
    persist_progress: bool,
}

impl CapabilitySet {
    /// Returns a set with every flag false.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Returns a set with every flag true.
    #[must_use]
    pub fn all() -> Self {
        Self {
            manage_users: true,
            delete_content: true,
            create_content: true,
            update_content: true,
            view_admin_surface: true,
            watch_restricted_content: true,
            watch_content: true,
            persist_progress: true,
        }
    }

    /// Resolves the default capability set for a role.
    ///
    /// Total over [`Role`] and returns an independent value on every call.
    #[must_use]
    pub fn for_role(role: Role) -> Self {
        match role {
            Role::Admin => Self::all(),
            Role::Editor => Self {
                manage_users: false,
                delete_content: false,
                ..Self::all()
            },
            Role::Vip => Self {
                watch_restricted_content: true,
                watch_content: true,
                persist_progress: true,
                ..Self::none()
            },
            Role::User => Self {
                watch_content: true,
                persist_progress: true,
                ..Self::none()
            },
            Role::Banned => Self::none(),
        }
    }

    /// Returns the value of one flag.
    #[must_use]
    pub fn get(&self, capability: Capability) -> bool {
        match capability {
            Capability::ManageUsers => self.manage_users,
            Capability::DeleteContent => self.delete_content,
            Capability::CreateContent => self.create_content,
            Capability::UpdateContent => self.update_content,
            Capability::ViewAdminSurface => self.view_admin_surface,
            Capability::WatchRestrictedContent => self.watch_restricted_content,
            Capability::WatchContent => self.watch_content,
            Capability::PersistProgress => self.persist_progress,
        }
    }

    /// Sets the value of one flag.
    pub fn set(&mut self, capability: Capability, value: bool) {
        let slot = match capability {
            Capability::ManageUsers => &mut self.manage_users,
            Capability::DeleteContent => &mut self.delete_content,
            Capability::CreateContent => &mut self.create_content,
            Capability::UpdateContent => &mut self.update_content,
            Capability::ViewAdminSurface => &mut self.view_admin_surface,
            Capability::WatchRestrictedContent => &mut self.watch_restricted_content,
            Capability::WatchContent => &mut self.watch_content,
            Capability::PersistProgress => &mut self.persist_progress,
        };
        *slot = value;
    }

    /// Returns a copy with one flag changed.
    #[must_use]
    pub fn with(mut self, capability: Capability, value: bool) -> Self {
        self.set(capability, value);
        self
    }

    /// Iterates over every flag in document order.
    pub fn iter(&self) -> impl Iterator<Item = (Capability, bool)> + '_ {
        Capability::all()
            .iter()
            .map(|capability| (*capability, self.get(*capability)))
    }

    /// Returns true when every flag is set.
    #[must_use]
    pub fn all_granted(&self) -> bool {
        self.iter().all(|(_, value)| value)
    }

    /// Returns true when no flag is set.
    #[must_use]
    pub fn none_granted(&self) -> bool {
        self.iter().all(|(_, value)| !value)
    }
}

/// How explicit per-subject flag overrides interact with schema resync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverridePolicy {
    /// Recorded overrides are reapplied on top of the role defaults.
    #[default]
    VersionSticky,
    /// Resync resets every flag to the role defaults.
    RoleSticky,
}

impl OverridePolicy {
    /// Returns a stable configuration value for this policy.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::VersionSticky => "version_sticky",
            Self::RoleSticky => "role_sticky",
        }
    }

    /// Derives the capabilities a resync should write for a stored role.
    #[must_use]
    pub fn reconcile(&self, role: Role, overrides: &CapabilityOverrides) -> CapabilitySet {
        let defaults = CapabilitySet::for_role(role);
        match self {
            Self::VersionSticky => overrides.apply(defaults),
            Self::RoleSticky => defaults,
        }
    }
}

impl FromStr for OverridePolicy {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "version_sticky" => Ok(Self::VersionSticky),
            "role_sticky" => Ok(Self::RoleSticky),
            _ => Err(AppError::Validation(format!(
                "unknown capability override policy '{value}'"
            ))),
        }
    }
}

/// Flags explicitly set for one subject since its last role change.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CapabilityOverrides(std::collections::BTreeMap<Capability, bool>);

impl CapabilityOverrides {
    /// Records an override, replacing any previous value for the flag.
    pub fn record(&mut self, capability: Capability, value: bool) {
        self.0.insert(capability, value);
    }

    /// Returns the overridden value for a flag, if any.
    #[must_use]
    pub fn get(&self, capability: Capability) -> Option<bool> {
        self.0.get(&capability).copied()
    }

    /// Returns true when no flag is overridden.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over recorded overrides.
    pub fn iter(&self) -> impl Iterator<Item = (Capability, bool)> + '_ {
        self.0.iter().map(|(capability, value)| (*capability, *value))
    }

    /// Applies every recorded override on top of `base`.
    #[must_use]
    pub fn apply(&self, base: CapabilitySet) -> CapabilitySet {
        self.iter()
            .fold(base, |set, (capability, value)| set.with(capability, value))
    }
}

impl FromIterator<(Capability, bool)> for CapabilityOverrides {
    fn from_iter<T: IntoIterator<Item = (Capability, bool)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

use std::str::FromStr;

use marquee_core::AppError;
use serde::{Deserialize, Serialize};

/// Role assigned to every subject.
///
/// Roles only select a default capability set; capabilities themselves are
/// independent flags, not a hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Full control, including user management.
    Admin,
    /// Catalog maintenance without user management or deletion.
    Editor,
    /// Viewer with access to restricted content.
    Vip,
    /// Default role for newly provisioned subjects.
    #[default]
    User,
    /// Subject with no capabilities.
    Banned,
}

impl Role {
    /// Returns a stable storage value for this role.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Editor => "editor",
            Self::Vip => "vip",
            Self::User => "user",
            Self::Banned => "banned",
        }
    }

    /// Returns all known roles.
    #[must_use]
    pub fn all() -> &'static [Self] {
        const ALL: &[Role] = &[Role::Admin, Role::Editor, Role::Vip, Role::User, Role::Banned];

        ALL
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "admin" => Ok(Self::Admin),
            "editor" => Ok(Self::Editor),
            "vip" => Ok(Self::Vip),
            "user" => Ok(Self::User),
            "banned" => Ok(Self::Banned),
            _ => Err(AppError::Validation(format!("unknown role value '{value}'"))),
        }
    }
}

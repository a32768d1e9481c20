//! Group-scoped roles.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Permission level a user holds on a group.
///
/// Variants are declared in ascending order so the derived `Ord` is the
/// permission order: `Viewer < Editor < Admin < Owner`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Viewer,
    Editor,
    Admin,
    /// Derived from org ownership; never stored on a membership.
    Owner,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Viewer => "Viewer",
            Role::Editor => "Editor",
            Role::Admin => "Admin",
            Role::Owner => "Owner",
        }
    }

    /// Whether this role may be written to a membership row.
    pub fn is_assignable(&self) -> bool {
        *self != Role::Owner
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "viewer" => Ok(Role::Viewer),
            "editor" => Ok(Role::Editor),
            "admin" => Ok(Role::Admin),
            "owner" => Ok(Role::Owner),
            _ => Err(ValidationError::InvalidRole),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_are_totally_ordered() {
        assert!(Role::Viewer < Role::Editor);
        assert!(Role::Editor < Role::Admin);
        assert!(Role::Admin < Role::Owner);
        assert_eq!(
            [Role::Owner, Role::Viewer, Role::Admin, Role::Editor]
                .into_iter()
                .max(),
            Some(Role::Owner)
        );
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!("editor".parse::<Role>(), Ok(Role::Editor));
        assert_eq!("Admin".parse::<Role>(), Ok(Role::Admin));
        assert_eq!("root".parse::<Role>(), Err(ValidationError::InvalidRole));
    }

    #[test]
    fn owner_is_not_assignable() {
        assert!(!Role::Owner.is_assignable());
        assert!(Role::Admin.is_assignable());
    }

    #[test]
    fn display_matches_storage_form() {
        for role in [Role::Viewer, Role::Editor, Role::Admin, Role::Owner] {
            assert_eq!(role.to_string().parse::<Role>(), Ok(role));
        }
    }
}

//! Organization-scoped roles.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CourierError;

/// A member's role within a single organization.
///
/// Roles are totally ordered: `View < Edit < Admin`. The numeric level is
/// what `require_role` compares, so variant order here is load-bearing.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    View,
    Edit,
    Admin,
}

impl Role {
    /// Numeric permission level (view=1, edit=2, admin=3).
    pub const fn level(&self) -> u8 {
        match self {
            Self::View => 1,
            Self::Edit => 2,
            Self::Admin => 3,
        }
    }

    /// The string form used on the wire and in storage.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::View => "view",
            Self::Edit => "edit",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = CourierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "view" => Ok(Self::View),
            "edit" => Ok(Self::Edit),
            "admin" => Ok(Self::Admin),
            other => Err(CourierError::invalid_argument(format!(
                "Invalid role: {}",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_total_order() {
        assert!(Role::View < Role::Edit);
        assert!(Role::Edit < Role::Admin);
        assert!(Role::View < Role::Admin);
    }

    #[test]
    fn test_role_levels() {
        assert_eq!(Role::View.level(), 1);
        assert_eq!(Role::Edit.level(), 2);
        assert_eq!(Role::Admin.level(), 3);
    }

    #[test]
    fn test_role_parse() {
        assert_eq!("view".parse::<Role>().unwrap(), Role::View);
        assert_eq!("edit".parse::<Role>().unwrap(), Role::Edit);
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert!("owner".parse::<Role>().is_err());
        assert!("Admin".parse::<Role>().is_err());
    }

    #[test]
    fn test_role_serde_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Edit).unwrap(), "\"edit\"");
        let role: Role = serde_json::from_str("\"admin\"").unwrap();
        assert_eq!(role, Role::Admin);
    }
}

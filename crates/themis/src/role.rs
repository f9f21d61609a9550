//! Closed set of user roles.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Role granted to a signed-in user.
///
/// Servers send roles in several spellings (`juez`, `JUDGE`, `ROLE_JUDGE`);
/// they are folded into this enum once, when the profile is decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Admin,
    Judge,
    Clerk,
    Operator,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Admin, Role::Judge, Role::Clerk, Role::Operator];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Judge => "JUDGE",
            Role::Clerk => "CLERK",
            Role::Operator => "OPERATOR",
        }
    }

    /// Map a server spelling onto a role, or `None` if unrecognised.
    pub fn normalize(raw: &str) -> Option<Role> {
        let lowered = raw.trim().to_lowercase();
        let name = lowered.strip_prefix("role_").unwrap_or(&lowered);
        match name {
            "admin" | "administrator" | "administrador" | "administradora" | "superadmin" => {
                Some(Role::Admin)
            }
            "judge" | "juez" | "jueza" | "magistrado" | "magistrada" => Some(Role::Judge),
            "clerk" | "secretario" | "secretaria" | "actuario" | "actuaria" => Some(Role::Clerk),
            "operator" | "operador" | "operadora" => Some(Role::Operator),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unrecognised role name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::normalize(s).ok_or_else(|| UnknownRole(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spanish_and_english_aliases() {
        assert_eq!(Role::normalize("juez"), Some(Role::Judge));
        assert_eq!(Role::normalize("JUDGE"), Some(Role::Judge));
        assert_eq!(Role::normalize(" Administrador "), Some(Role::Admin));
        assert_eq!(Role::normalize("secretaria"), Some(Role::Clerk));
        assert_eq!(Role::normalize("operador"), Some(Role::Operator));
        assert_eq!(Role::normalize("ROLE_CLERK"), Some(Role::Clerk));
    }

    #[test]
    fn test_unknown_role() {
        assert_eq!(Role::normalize("janitor"), None);
        assert!("".parse::<Role>().is_err());
    }

    #[test]
    fn test_serde_uses_canonical_names() {
        assert_eq!(serde_json::to_string(&Role::Clerk).unwrap(), "\"CLERK\"");
        let role: Role = serde_json::from_str("\"OPERATOR\"").unwrap();
        assert_eq!(role, Role::Operator);
    }

    #[test]
    fn test_display_round_trips_through_from_str() {
        for role in Role::ALL {
            assert_eq!(role.to_string().parse::<Role>().unwrap(), role);
        }
    }
}

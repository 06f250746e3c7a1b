use core::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Staff account role.
///
/// The shop has exactly two roles, so this is a closed enum rather than an
/// opaque string: the movement-type policy is a total function over it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Till operator: day-to-day sales and customer returns.
    Staff,
    /// Shop owner: everything staff can do, plus corrective/destructive
    /// movement types and administration.
    Owner,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Staff => "STAFF",
            Role::Owner => "OWNER",
        }
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A role string did not name a known role.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("staff") {
            Ok(Role::Staff)
        } else if s.eq_ignore_ascii_case("owner") {
            Ok(Role::Owner)
        } else {
            Err(UnknownRole(s.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_serialize_in_screaming_snake_case() {
        assert_eq!(serde_json::to_string(&Role::Staff).unwrap(), "\"STAFF\"");
        assert_eq!(serde_json::to_string(&Role::Owner).unwrap(), "\"OWNER\"");
    }

    #[test]
    fn role_parsing_is_case_insensitive() {
        assert_eq!("OWNER".parse::<Role>().unwrap(), Role::Owner);
        assert_eq!("staff".parse::<Role>().unwrap(), Role::Staff);
        assert!("manager".parse::<Role>().is_err());
    }
}

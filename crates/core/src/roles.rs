//! Dashboard roles.
//!
//! The role decides which dashboard a user lands on and, for shipments,
//! whether internal events are visible. Wire names match the `role`
//! field the API returns on user records.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_TEACHER: &str = "teacher";
pub const ROLE_AGENT: &str = "agent";
pub const ROLE_CLIENT: &str = "client";
pub const ROLE_STUDENT: &str = "student";

/// All valid role names.
pub const VALID_ROLES: &[&str] = &[ROLE_ADMIN, ROLE_TEACHER, ROLE_AGENT, ROLE_CLIENT, ROLE_STUDENT];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Teacher,
    /// Transit agent operating shipments.
    Agent,
    Client,
    Student,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => ROLE_ADMIN,
            Role::Teacher => ROLE_TEACHER,
            Role::Agent => ROLE_AGENT,
            Role::Client => ROLE_CLIENT,
            Role::Student => ROLE_STUDENT,
        }
    }

    /// Staff roles see internal shipment events and may update statuses.
    pub fn is_logistics_staff(self) -> bool {
        matches!(self, Role::Admin | Role::Agent)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            ROLE_ADMIN => Ok(Role::Admin),
            ROLE_TEACHER => Ok(Role::Teacher),
            ROLE_AGENT => Ok(Role::Agent),
            ROLE_CLIENT => Ok(Role::Client),
            ROLE_STUDENT => Ok(Role::Student),
            other => Err(CoreError::Validation(format!(
                "Invalid role '{other}'. Must be one of: {}",
                VALID_ROLES.join(", ")
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!("Agent".parse::<Role>().unwrap(), Role::Agent);
        assert_eq!(" admin ".parse::<Role>().unwrap(), Role::Admin);
    }

    #[test]
    fn parse_rejects_unknown() {
        let err = "driver".parse::<Role>().unwrap_err();
        assert!(err.to_string().contains("Invalid role"));
    }

    #[test]
    fn only_admin_and_agent_are_staff() {
        assert!(Role::Admin.is_logistics_staff());
        assert!(Role::Agent.is_logistics_staff());
        assert!(!Role::Client.is_logistics_staff());
        assert!(!Role::Student.is_logistics_staff());
        assert!(!Role::Teacher.is_logistics_staff());
    }

    #[test]
    fn serde_is_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Teacher).unwrap(), "\"teacher\"");
    }
}

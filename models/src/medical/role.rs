// models/src/medical/role.rs
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::ValidationError;

/// The three kinds of account. Fixed at creation; there is no role-change path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Role {
    #[default]
    Patient,
    Doctor,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Patient => "Patient",
            Role::Doctor => "Doctor",
            Role::Admin => "Admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Patient" => Ok(Role::Patient),
            "Doctor" => Ok(Role::Doctor),
            "Admin" => Ok(Role::Admin),
            other => Err(ValidationError::invalid("role", format!("unknown role '{}'", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Role;
    use std::str::FromStr;

    #[test]
    fn should_parse_known_roles() {
        assert_eq!(Role::from_str("Doctor").unwrap(), Role::Doctor);
        assert_eq!(Role::from_str("Admin").unwrap().to_string(), "Admin");
        assert!(Role::from_str("Nurse").is_err());
    }

    #[test]
    fn should_default_to_patient() {
        assert_eq!(Role::default(), Role::Patient);
    }
}

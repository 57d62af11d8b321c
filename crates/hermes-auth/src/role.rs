//! Roles carried in tokens.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Role of an authenticated user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Manages schools and users.
    Superadmin,
    /// Manages one school's classrooms and students.
    SchoolAdmin,
    /// Read access.
    #[default]
    Student,
}

impl Role {
    /// Wire name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Superadmin => "superadmin",
            Self::SchoolAdmin => "school_admin",
            Self::Student => "student",
        }
    }

    /// Whether this role may manage classrooms and students.
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        matches!(self, Self::Superadmin | Self::SchoolAdmin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "superadmin" => Ok(Self::Superadmin),
            "school_admin" => Ok(Self::SchoolAdmin),
            "student" => Ok(Self::Student),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

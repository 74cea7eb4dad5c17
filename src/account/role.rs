/// Account roles
use crate::error::{RegistryError, RegistryResult};
use serde::{Deserialize, Serialize};

/// Role carried by every account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Full edit, deletion, account management, statistics
    Admin,
    /// Address-only edits of their household head record
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }

    pub fn from_str(s: &str) -> RegistryResult<Self> {
        match s.to_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "user" => Ok(Role::User),
            _ => Err(RegistryError::Validation(format!("Invalid role: {}", s))),
        }
    }
}

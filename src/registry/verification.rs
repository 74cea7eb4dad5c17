/// Household verification state
///
/// A household starts `Unverified` and becomes `Verified` when a user-role
/// caller confirms its address. No exposed operation moves it back.
use crate::account::Caller;
use crate::registry::person::Person;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Attribution used when the caller has neither a display name nor a handle
pub const UNKNOWN_VERIFIER: &str = "Unknown User";

/// Verification status of one record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum VerificationState {
    Unverified,
    Verified {
        by: String,
        at: DateTime<Utc>,
    },
}

impl VerificationState {
    /// Read the state stored on a record
    pub fn of(person: &Person) -> Self {
        if !person.verified {
            return VerificationState::Unverified;
        }

        VerificationState::Verified {
            by: person
                .verified_by
                .clone()
                .unwrap_or_else(|| UNKNOWN_VERIFIER.to_string()),
            at: person.verified_at.unwrap_or(person.updated_at),
        }
    }

    pub fn is_verified(&self) -> bool {
        matches!(self, VerificationState::Verified { .. })
    }

    /// Apply a user confirmation. A repeated confirmation re-attributes the household.
    pub fn confirm(self, stamp: &VerificationStamp) -> Self {
        VerificationState::Verified {
            by: stamp.verified_by.clone(),
            at: stamp.verified_at,
        }
    }
}

/// The three verification fields written together on every household member
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationStamp {
    pub verified_by: String,
    pub verified_at: DateTime<Utc>,
}

impl VerificationStamp {
    pub fn new(verified_by: impl Into<String>, verified_at: DateTime<Utc>) -> Self {
        Self {
            verified_by: verified_by.into(),
            verified_at,
        }
    }

    /// Stamp attributed to the caller at `now`
    pub fn by_caller(caller: Option<&Caller>, now: DateTime<Utc>) -> Self {
        Self::new(verifier_name(caller), now)
    }
}

/// Display name, then username, then the "Unknown User" sentinel
pub fn verifier_name(caller: Option<&Caller>) -> String {
    caller
        .and_then(|c| {
            non_blank(c.display_name.as_deref()).or_else(|| non_blank(Some(c.username.as_str())))
        })
        .map(str::to_string)
        .unwrap_or_else(|| UNKNOWN_VERIFIER.to_string())
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

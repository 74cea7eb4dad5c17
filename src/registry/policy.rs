/// Role-scoped authorization policy
///
/// Pure decision functions: they never touch the store, so every denial is
/// reached before any write.
use crate::account::{Caller, Role};
use crate::config::AuthMode;
use crate::error::RegistryError;
use crate::registry::person::Person;

/// Why a request was refused
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenyReason {
    /// No caller identity where one is required
    Unauthorized,
    /// Caller lacks the role or the linkage the operation needs
    Forbidden(&'static str),
    /// Account action aimed at the caller's own account
    CannotActOnSelf(&'static str),
}

impl DenyReason {
    /// Label used for metrics and logs
    pub fn label(&self) -> &'static str {
        match self {
            DenyReason::Unauthorized => "unauthorized",
            DenyReason::Forbidden(_) => "forbidden",
            DenyReason::CannotActOnSelf(_) => "self_action",
        }
    }
}

impl From<DenyReason> for RegistryError {
    fn from(reason: DenyReason) -> Self {
        match reason {
            DenyReason::Unauthorized => {
                RegistryError::Unauthorized("Authentication required".to_string())
            }
            DenyReason::Forbidden(msg) | DenyReason::CannotActOnSelf(msg) => {
                RegistryError::Forbidden(msg.to_string())
            }
        }
    }
}

/// Outcome of classifying a person edit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditDecision {
    /// Every field may change; address changes propagate without a verification stamp
    FullEdit,
    /// Only address and map link; propagates and stamps verification
    AddressOnlyEdit,
    Denied(DenyReason),
}

/// Operations reserved for administrators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminAction<'a> {
    CreatePerson,
    DeletePerson,
    ViewHousehold,
    ViewStatistics,
    ListAccounts,
    CreateAccount,
    SetAccountActive { target_account_id: &'a str },
    DeleteAccount { target_account_id: &'a str },
}

/// Which records a list query may return
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListScope {
    AllMembers,
    HeadsOnly,
}

/// Classify an edit of `target` by `caller`
pub fn decide_edit(mode: AuthMode, caller: Option<&Caller>, target: &Person) -> EditDecision {
    match caller.map(|c| c.role) {
        None => match mode {
            AuthMode::Open => EditDecision::FullEdit,
            AuthMode::RoleAware => EditDecision::Denied(DenyReason::Unauthorized),
        },
        Some(Role::Admin) => EditDecision::FullEdit,
        Some(Role::User) => {
            if target.is_household_head() {
                EditDecision::AddressOnlyEdit
            } else {
                EditDecision::Denied(DenyReason::Forbidden(
                    "Only the head of household record can be edited",
                ))
            }
        }
    }
}

/// Admin-only operations. Self-protection applies whatever the caller's role.
pub fn authorize_admin_action(
    caller: Option<&Caller>,
    action: AdminAction<'_>,
) -> Result<(), DenyReason> {
    let caller = caller.ok_or(DenyReason::Unauthorized)?;

    match action {
        AdminAction::SetAccountActive { target_account_id } if target_account_id == caller.account_id => {
            return Err(DenyReason::CannotActOnSelf("Cannot disable your own account"));
        }
        AdminAction::DeleteAccount { target_account_id } if target_account_id == caller.account_id => {
            return Err(DenyReason::CannotActOnSelf("Cannot delete your own account"));
        }
        _ => {}
    }

    if caller.role != Role::Admin {
        return Err(DenyReason::Forbidden("Admin role required"));
    }

    Ok(())
}

/// Read access to person and geo-tag data
pub fn authorize_read(mode: AuthMode, caller: Option<&Caller>) -> Result<ListScope, DenyReason> {
    match (caller.map(|c| c.role), mode) {
        (Some(Role::User), _) => Ok(ListScope::HeadsOnly),
        (Some(Role::Admin), _) | (None, AuthMode::Open) => Ok(ListScope::AllMembers),
        (None, AuthMode::RoleAware) => Err(DenyReason::Unauthorized),
    }
}

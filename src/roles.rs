use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;

/// Role
///
/// RBAC role carried by every `User`. The set of rights for each role is fixed at compile
/// time and never mutated at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Role {
    #[default]
    User,
    Admin,
}

/// Right
///
/// A named permission checked by handlers before touching a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Right {
    GetEmails,
    ManageEmails,
    GetPolicies,
    ManagePolicies,
    GetUsers,
    ManageUsers,
    ViewDashboard,
}

const USER_RIGHTS: &[Right] = &[Right::GetEmails, Right::ManageEmails, Right::GetPolicies];

const ADMIN_RIGHTS: &[Right] = &[
    Right::GetUsers,
    Right::ManageUsers,
    Right::GetEmails,
    Right::ManageEmails,
    Right::GetPolicies,
    Right::ManagePolicies,
    Right::ViewDashboard,
];

impl Role {
    pub const ALL: [Role; 2] = [Role::User, Role::Admin];

    pub fn rights(&self) -> &'static [Right] {
        match self {
            Role::User => USER_RIGHTS,
            Role::Admin => ADMIN_RIGHTS,
        }
    }

    pub fn has_right(&self, right: Right) -> bool {
        self.rights().contains(&right)
    }

    /// Admins see every record; everyone else is scoped to the records they own.
    pub fn is_unscoped(&self) -> bool {
        *self == Role::Admin
    }
}

impl Right {
    pub fn as_str(&self) -> &'static str {
        match self {
            Right::GetEmails => "getEmails",
            Right::ManageEmails => "manageEmails",
            Right::GetPolicies => "getPolicies",
            Right::ManagePolicies => "managePolicies",
            Right::GetUsers => "getUsers",
            Right::ManageUsers => "manageUsers",
            Right::ViewDashboard => "viewDashboard",
        }
    }
}

//! Authenticated identities and the reference to them kept in a session.
//!
//! None of the profile types carry a password hash. Rows are converted into
//! profiles at the repository boundary, so a stored hash never reaches a
//! handler or a response body.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::entity::{admin, user};

pub use crate::entity::admin::AdminRole;

/// Which table a principal lives in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrincipalKind {
    User,
    Admin,
}

/// A self-registered end user, minus the secret.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct UserProfile {
    pub id: i32,
    pub email: String,
    pub name: String,
    pub created_at: DateTime<FixedOffset>,
}

impl From<user::Model> for UserProfile {
    fn from(model: user::Model) -> Self {
        Self {
            id: model.id,
            email: model.email,
            name: model.name,
            created_at: model.created_at,
        }
    }
}

/// An admin account, minus the secret.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AdminProfile {
    pub id: i32,
    pub username: String,
    pub role: AdminRole,
    pub permissions: Vec<String>,
    pub is_active: bool,
    pub created_by: Option<i32>,
    pub created_at: DateTime<FixedOffset>,
}

impl AdminProfile {
    pub fn is_primary(&self) -> bool {
        self.role == AdminRole::PrimaryAdmin
    }
}

impl From<admin::Model> for AdminProfile {
    fn from(model: admin::Model) -> Self {
        Self {
            id: model.id,
            username: model.username,
            role: model.role,
            permissions: permissions_from_json(&model.permissions),
            is_active: model.is_active,
            created_by: model.created_by,
            created_at: model.created_at,
        }
    }
}

// Non-string entries are dropped rather than failing the whole row.
fn permissions_from_json(value: &serde_json::Value) -> Vec<String> {
    match value {
        serde_json::Value::Array(items) => items
            .iter()
            .filter_map(|item| item.as_str().map(str::to_owned))
            .collect(),
        _ => Vec::new(),
    }
}

/// A resolved, live identity attached to a request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Principal {
    User(UserProfile),
    Admin(AdminProfile),
}

impl Principal {
    pub fn id(&self) -> i32 {
        match self {
            Self::User(user) => user.id,
            Self::Admin(admin) => admin.id,
        }
    }

    pub fn kind(&self) -> PrincipalKind {
        match self {
            Self::User(_) => PrincipalKind::User,
            Self::Admin(_) => PrincipalKind::Admin,
        }
    }

    /// The reference written into a session for this principal. Always the
    /// typed form.
    pub fn to_ref(&self) -> PrincipalRef {
        PrincipalRef::Typed {
            id: self.id(),
            kind: self.kind(),
        }
    }

    pub fn as_user(&self) -> Option<&UserProfile> {
        match self {
            Self::User(user) => Some(user),
            Self::Admin(_) => None,
        }
    }

    pub fn as_admin(&self) -> Option<&AdminProfile> {
        match self {
            Self::Admin(admin) => Some(admin),
            Self::User(_) => None,
        }
    }
}

/// The principal reference serialized into a session record.
///
/// New sessions always carry `Typed`. `Legacy` is the bare id written by
/// older deployments; it resolves admin-first, then user, and is rewritten to
/// `Typed` once it does. Older records also spell `kind` as `type`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrincipalRef {
    Typed {
        id: i32,
        #[serde(alias = "type")]
        kind: PrincipalKind,
    },
    Legacy(i32),
}

impl PrincipalRef {
    pub fn id(self) -> i32 {
        match self {
            Self::Typed { id, .. } | Self::Legacy(id) => id,
        }
    }
}

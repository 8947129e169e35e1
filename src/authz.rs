//! Authorization predicates over a resolved principal.
//!
//! Pure functions: no I/O, no session access. Handlers resolve the
//! principal first, then ask these.

use crate::error::AuthError;
use crate::principal::{AdminProfile, AdminRole, Principal};

/// Admin-management operations gated on the primary-admin role.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AdminAction {
    CreateSubAdmin,
    ListAdmins,
    UpdateAdmin,
    DeleteAdmin,
}

impl AdminAction {
    fn forbidden(self) -> &'static str {
        match self {
            Self::CreateSubAdmin => "Only admin can create sub-admins",
            Self::ListAdmins => "Only admin can view all admins",
            Self::UpdateAdmin => "Only admin can update sub-admins",
            Self::DeleteAdmin => "Only admin can delete sub-admins",
        }
    }
}

pub fn requires_authenticated(principal: Option<Principal>) -> Result<Principal, AuthError> {
    principal.ok_or_else(|| AuthError::Unauthenticated("Not authenticated".to_string()))
}

/// Any active admin, whatever its role.
pub fn requires_admin(principal: Option<Principal>) -> Result<AdminProfile, AuthError> {
    match principal {
        Some(Principal::Admin(admin)) => Ok(admin),
        _ => Err(AuthError::Unauthenticated(
            "Not authenticated as admin".to_string(),
        )),
    }
}

/// An admin holding exactly `role`.
///
/// A primary admin does not implicitly satisfy a `SubAdmin` requirement.
/// No principal at all is a 401; the wrong kind or role is a 403.
pub fn requires_admin_role(
    principal: Option<Principal>,
    role: AdminRole,
    action: AdminAction,
) -> Result<AdminProfile, AuthError> {
    match principal {
        None => Err(AuthError::Unauthenticated(
            "Not authenticated as admin".to_string(),
        )),
        Some(Principal::Admin(admin)) if admin.role == role => Ok(admin),
        Some(_) => Err(AuthError::Forbidden(action.forbidden().to_string())),
    }
}

/// Shorthand for the primary-admin gate on admin management.
pub fn requires_primary_admin(
    principal: Option<Principal>,
    action: AdminAction,
) -> Result<AdminProfile, AuthError> {
    requires_admin_role(principal, AdminRole::PrimaryAdmin, action)
}

/// Management update/delete may not target the caller's own record.
pub fn forbid_self_target(
    actor: &AdminProfile,
    target_id: i32,
    action: AdminAction,
) -> Result<(), AuthError> {
    if actor.id != target_id {
        return Ok(());
    }
    let message = match action {
        AdminAction::DeleteAdmin => "Cannot delete your own account",
        _ => "Cannot edit your own account through this route. Use change-password instead.",
    };
    Err(AuthError::Validation(message.to_string()))
}

/// The primary-admin record is immutable through the management surface,
/// whoever is calling.
pub fn forbid_primary_target(target: &AdminProfile, action: AdminAction) -> Result<(), AuthError> {
    if !target.is_primary() {
        return Ok(());
    }
    let message = match action {
        AdminAction::DeleteAdmin => "Cannot delete the main admin account",
        _ => "Cannot edit the main admin account",
    };
    Err(AuthError::Validation(message.to_string()))
}

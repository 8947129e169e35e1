//! Startup bootstrap of the primary admin.

use thiserror::Error;

use crate::password::{PasswordError, Passwords};
use crate::principal::{AdminProfile, AdminRole};
use crate::repository::{AdminRepository, NewAdmin, RepositoryError};

/// Permissions granted to a freshly bootstrapped primary admin.
pub const DEFAULT_PRIMARY_PERMISSIONS: [&str; 4] = ["/", "/calculators", "/users", "/settings"];

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Password(#[from] PasswordError),
}

/// Creates the primary admin if none exists. Returns the new account, or
/// `None` when one was already there.
///
/// Safe to run from several instances at once: losing the insert race shows
/// up as a username conflict and is treated as "already exists".
pub async fn ensure_primary_admin(
    admins: &AdminRepository,
    passwords: &Passwords,
    username: &str,
    password: &str,
) -> Result<Option<AdminProfile>, BootstrapError> {
    if admins.primary_admin_exists().await? {
        tracing::debug!("primary admin already present");
        return Ok(None);
    }

    let password_hash = passwords.hash(password).await?;
    let created = admins
        .create(NewAdmin {
            username: username.to_owned(),
            password_hash,
            role: AdminRole::PrimaryAdmin,
            permissions: DEFAULT_PRIMARY_PERMISSIONS.map(str::to_owned).to_vec(),
            created_by: None,
        })
        .await;

    match created {
        Ok(admin) => {
            tracing::info!(admin_id = admin.id, username = %admin.username, "primary admin bootstrapped");
            Ok(Some(admin))
        }
        Err(RepositoryError::Conflict(_)) => {
            tracing::warn!(username, "bootstrap username already taken, skipping");
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

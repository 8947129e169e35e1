//! Credential verification for both principal kinds.

use std::sync::Arc;

use tokio::sync::OnceCell;

use crate::error::AuthError;
use crate::password::{PasswordError, Passwords};
use crate::principal::{Principal, PrincipalKind};
use crate::repository::{AdminRepository, RepositoryError, UserRepository};

pub const USER_CREDENTIALS_REJECTED: &str = "Incorrect email or password.";
pub const ADMIN_CREDENTIALS_REJECTED: &str = "Incorrect username or password.";

/// Checks a claimed identifier and plaintext secret against one principal
/// kind. Read-only.
///
/// Unknown identifiers, inactive admins and wrong secrets all produce the
/// same [`AuthError::InvalidCredentials`]. Unknown identifiers still pay for
/// one hash verification so the three cases also take comparable time.
#[derive(Debug, Clone)]
pub struct CredentialVerifier {
    users: UserRepository,
    admins: AdminRepository,
    passwords: Passwords,
    decoy_hash: Arc<OnceCell<String>>,
}

impl CredentialVerifier {
    pub fn new(users: UserRepository, admins: AdminRepository, passwords: Passwords) -> Self {
        Self {
            users,
            admins,
            passwords,
            decoy_hash: Arc::new(OnceCell::new()),
        }
    }

    /// Verifies `identifier` (trimmed before lookup) and `secret` against
    /// principals of `kind`. On success the principal comes back without
    /// its hash.
    pub async fn verify(
        &self,
        kind: PrincipalKind,
        identifier: &str,
        secret: &str,
    ) -> Result<Principal, AuthError> {
        let identifier = identifier.trim();
        let (rejected, found) = match kind {
            PrincipalKind::User => (
                USER_CREDENTIALS_REJECTED,
                self.users
                    .find_credentials(identifier)
                    .await
                    .map_err(lookup_fault)?
                    .map(|(profile, hash)| (Principal::User(profile), hash)),
            ),
            PrincipalKind::Admin => (
                ADMIN_CREDENTIALS_REJECTED,
                self.admins
                    .find_active_credentials(identifier)
                    .await
                    .map_err(lookup_fault)?
                    .map(|(profile, hash)| (Principal::Admin(profile), hash)),
            ),
        };

        let Some((principal, hash)) = found else {
            self.burn_decoy(secret).await?;
            tracing::info!(?kind, identifier, "credentials rejected: unknown or inactive");
            return Err(AuthError::InvalidCredentials(rejected));
        };

        if !self.passwords.verify(secret, &hash).await.map_err(hash_fault)? {
            tracing::info!(?kind, identifier, "credentials rejected: secret mismatch");
            return Err(AuthError::InvalidCredentials(rejected));
        }

        Ok(principal)
    }

    async fn burn_decoy(&self, secret: &str) -> Result<(), AuthError> {
        let decoy = self
            .decoy_hash
            .get_or_try_init(|| self.passwords.hash("decoy-password"))
            .await
            .map_err(hash_fault)?;
        self.passwords.verify(secret, decoy).await.map_err(hash_fault)?;
        Ok(())
    }
}

fn lookup_fault(err: RepositoryError) -> AuthError {
    AuthError::store_fault("Authentication error", err)
}

fn hash_fault(err: PasswordError) -> AuthError {
    AuthError::store_fault("Authentication error", err)
}

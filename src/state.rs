//! Shared application state.

use std::sync::Arc;

use axum::extract::FromRef;
use sea_orm::DatabaseConnection;
use tower_sessions::SessionStore;

use crate::password::Passwords;
use crate::repository::{AdminRepository, UserRepository};
use crate::session::{PrincipalResolver, SessionCookies, SessionManager};
use crate::verifier::CredentialVerifier;

/// Everything a handler needs, built once around the injected pool.
#[derive(Debug, Clone)]
pub struct AppState {
    pub sessions: SessionManager,
    pub verifier: CredentialVerifier,
    pub users: UserRepository,
    pub admins: AdminRepository,
    pub passwords: Passwords,
}

impl AppState {
    pub fn new(
        conn: DatabaseConnection,
        store: Arc<dyn SessionStore>,
        cookies: SessionCookies,
        passwords: Passwords,
    ) -> Self {
        let users = UserRepository::new(conn.clone());
        let admins = AdminRepository::new(conn);
        Self {
            sessions: SessionManager::new(
                store,
                cookies,
                PrincipalResolver::new(users.clone(), admins.clone()),
            ),
            verifier: CredentialVerifier::new(users.clone(), admins.clone(), passwords.clone()),
            users,
            admins,
            passwords,
        }
    }
}

impl FromRef<AppState> for SessionManager {
    fn from_ref(state: &AppState) -> Self {
        state.sessions.clone()
    }
}

use crate::principal::{Principal, PrincipalKind, PrincipalRef};
use crate::repository::{AdminRepository, RepositoryError, UserRepository};

/// Turns a stored [`PrincipalRef`] back into a live principal.
///
/// A deleted principal, or an admin that has since been deactivated,
/// resolves to `None`: the session is left in place and simply stops
/// authenticating anyone.
#[derive(Debug, Clone)]
pub struct PrincipalResolver {
    users: UserRepository,
    admins: AdminRepository,
}

impl PrincipalResolver {
    pub fn new(users: UserRepository, admins: AdminRepository) -> Self {
        Self { users, admins }
    }

    pub async fn resolve(
        &self,
        principal_ref: PrincipalRef,
    ) -> Result<Option<Principal>, RepositoryError> {
        match principal_ref {
            PrincipalRef::Typed {
                id,
                kind: PrincipalKind::User,
            } => self.user(id).await,
            PrincipalRef::Typed {
                id,
                kind: PrincipalKind::Admin,
            } => self.admin(id).await,
            // Pre-typed records: admin first, then user. Ambiguous when both
            // tables hold the same id; rewritten to the typed form on success.
            PrincipalRef::Legacy(id) => match self.admin(id).await? {
                Some(admin) => Ok(Some(admin)),
                None => self.user(id).await,
            },
        }
    }

    async fn user(&self, id: i32) -> Result<Option<Principal>, RepositoryError> {
        Ok(self.users.find_by_id(id).await?.map(Principal::User))
    }

    async fn admin(&self, id: i32) -> Result<Option<Principal>, RepositoryError> {
        Ok(self
            .admins
            .find_by_id(id)
            .await?
            .filter(|admin| admin.is_active)
            .map(Principal::Admin))
    }
}

#[cfg(test)]
mod tests {
    use sea_orm::{ConnectOptions, Database};
    use sea_orm_migration::MigratorTrait;

    use super::*;
    use crate::migration::Migrator;
    use crate::principal::AdminRole;
    use crate::repository::{AdminChanges, NewAdmin};

    async fn resolver() -> (PrincipalResolver, UserRepository, AdminRepository) {
        let mut opt = ConnectOptions::new("sqlite::memory:");
        opt.max_connections(1).min_connections(1).sqlx_logging(false);
        let conn = Database::connect(opt).await.unwrap();
        Migrator::up(&conn, None).await.unwrap();
        let users = UserRepository::new(conn.clone());
        let admins = AdminRepository::new(conn);
        (
            PrincipalResolver::new(users.clone(), admins.clone()),
            users,
            admins,
        )
    }

    async fn admin(admins: &AdminRepository, username: &str) -> i32 {
        admins
            .create(NewAdmin {
                username: username.to_owned(),
                password_hash: "hash".to_owned(),
                role: AdminRole::SubAdmin,
                permissions: Vec::new(),
                created_by: None,
            })
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn legacy_id_prefers_an_admin() {
        let (resolver, users, admins) = resolver().await;
        let admin_id = admin(&admins, "bob").await;
        let user = users.create("a@x.com", "hash", "A").await.unwrap();
        assert_eq!(admin_id, user.id);

        let resolved = resolver.resolve(PrincipalRef::Legacy(admin_id)).await.unwrap();
        assert_eq!(resolved.map(|p| p.kind()), Some(PrincipalKind::Admin));
    }

    #[tokio::test]
    async fn legacy_id_falls_back_to_a_user() {
        let (resolver, users, _) = resolver().await;
        let user = users.create("a@x.com", "hash", "A").await.unwrap();

        let resolved = resolver
            .resolve(PrincipalRef::Legacy(user.id))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(resolved, Principal::User(user));
        assert_eq!(
            resolved.to_ref(),
            PrincipalRef::Typed {
                id: resolved.id(),
                kind: PrincipalKind::User
            }
        );
    }

    #[tokio::test]
    async fn typed_refs_do_not_cross_kinds() {
        let (resolver, users, _) = resolver().await;
        let user = users.create("a@x.com", "hash", "A").await.unwrap();

        let as_admin = PrincipalRef::Typed {
            id: user.id,
            kind: PrincipalKind::Admin,
        };
        assert!(resolver.resolve(as_admin).await.unwrap().is_none());
        assert!(resolver
            .resolve(PrincipalRef::Legacy(user.id + 1))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn inactive_admin_does_not_resolve() {
        let (resolver, _, admins) = resolver().await;
        let id = admin(&admins, "bob").await;
        admins
            .update(
                id,
                AdminChanges {
                    is_active: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let typed = PrincipalRef::Typed {
            id,
            kind: PrincipalKind::Admin,
        };
        assert!(resolver.resolve(typed).await.unwrap().is_none());
        assert!(resolver.resolve(PrincipalRef::Legacy(id)).await.unwrap().is_none());
    }
}

//! Principal persistence over an injected SeaORM connection.
//!
//! Every read hands back a profile type from [`crate::principal`]. The
//! password hash only leaves this module through the explicit
//! `*_credentials` and `password_hash` lookups used for verification.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, IntoActiveModel,
    PaginatorTrait, QueryFilter, QueryOrder, Set, SqlErr,
};
use thiserror::Error;

use crate::entity::{admin, user};
use crate::principal::{AdminProfile, AdminRole, UserProfile};

#[derive(Debug, Error)]
pub enum RepositoryError {
    /// A unique identifier is already taken. Carries the client-facing message.
    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),

    #[error("database error: {0}")]
    Database(#[from] DbErr),
}

// The store's unique constraint is the only duplicate check.
fn conflict_or(err: DbErr, message: &str) -> RepositoryError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => RepositoryError::Conflict(message.to_string()),
        _ => RepositoryError::Database(err),
    }
}

const DUPLICATE_EMAIL: &str = "User with this email already exists";
const DUPLICATE_USERNAME: &str = "Username already exists";

#[derive(Debug, Clone)]
pub struct UserRepository {
    conn: DatabaseConnection,
}

impl UserRepository {
    pub fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn create(
        &self,
        email: &str,
        password_hash: &str,
        name: &str,
    ) -> Result<UserProfile, RepositoryError> {
        let model = user::ActiveModel {
            email: Set(email.to_owned()),
            password_hash: Set(password_hash.to_owned()),
            name: Set(name.to_owned()),
            created_at: Set(Utc::now().into()),
            ..Default::default()
        }
        .insert(&self.conn)
        .await
        .map_err(|e| conflict_or(e, DUPLICATE_EMAIL))?;

        Ok(model.into())
    }

    /// Profile and stored hash for an exact (case-sensitive) email.
    pub async fn find_credentials(
        &self,
        email: &str,
    ) -> Result<Option<(UserProfile, String)>, RepositoryError> {
        let model = user::Entity::find()
            .filter(user::Column::Email.eq(email))
            .one(&self.conn)
            .await?;

        Ok(model.map(|m| {
            let hash = m.password_hash.clone();
            (m.into(), hash)
        }))
    }

    pub async fn find_by_id(&self, id: i32) -> Result<Option<UserProfile>, RepositoryError> {
        Ok(user::Entity::find_by_id(id)
            .one(&self.conn)
            .await?
            .map(Into::into))
    }

    /// Removes a user row. Used to undo a registration whose login could not
    /// be committed.
    pub async fn delete(&self, id: i32) -> Result<(), RepositoryError> {
        user::Entity::delete_by_id(id).exec(&self.conn).await?;
        Ok(())
    }
}

/// Fields for a new admin row.
#[derive(Debug, Clone)]
pub struct NewAdmin {
    pub username: String,
    pub password_hash: String,
    pub role: AdminRole,
    pub permissions: Vec<String>,
    pub created_by: Option<i32>,
}

/// Partial update applied through the admin-management surface. `None`
/// leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct AdminChanges {
    pub username: Option<String>,
    pub permissions: Option<Vec<String>>,
    pub password_hash: Option<String>,
    pub is_active: Option<bool>,
}

impl AdminChanges {
    pub fn is_empty(&self) -> bool {
        self.username.is_none()
            && self.permissions.is_none()
            && self.password_hash.is_none()
            && self.is_active.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct AdminRepository {
    conn: DatabaseConnection,
}

impl AdminRepository {
    pub fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn create(&self, new: NewAdmin) -> Result<AdminProfile, RepositoryError> {
        let now = Utc::now();
        let model = admin::ActiveModel {
            username: Set(new.username),
            password_hash: Set(new.password_hash),
            role: Set(new.role),
            permissions: Set(serde_json::json!(new.permissions)),
            is_active: Set(true),
            created_by: Set(new.created_by),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            ..Default::default()
        }
        .insert(&self.conn)
        .await
        .map_err(|e| conflict_or(e, DUPLICATE_USERNAME))?;

        Ok(model.into())
    }

    /// Profile and stored hash for an active admin. Inactive and unknown
    /// usernames both come back as `None`.
    pub async fn find_active_credentials(
        &self,
        username: &str,
    ) -> Result<Option<(AdminProfile, String)>, RepositoryError> {
        let model = admin::Entity::find()
            .filter(admin::Column::Username.eq(username))
            .filter(admin::Column::IsActive.eq(true))
            .one(&self.conn)
            .await?;

        Ok(model.map(|m| {
            let hash = m.password_hash.clone();
            (m.into(), hash)
        }))
    }

    pub async fn find_by_id(&self, id: i32) -> Result<Option<AdminProfile>, RepositoryError> {
        Ok(admin::Entity::find_by_id(id)
            .one(&self.conn)
            .await?
            .map(Into::into))
    }

    pub async fn password_hash(&self, id: i32) -> Result<Option<String>, RepositoryError> {
        Ok(admin::Entity::find_by_id(id)
            .one(&self.conn)
            .await?
            .map(|m| m.password_hash))
    }

    pub async fn set_password_hash(&self, id: i32, hash: &str) -> Result<(), RepositoryError> {
        self.update(
            id,
            AdminChanges {
                password_hash: Some(hash.to_owned()),
                ..Default::default()
            },
        )
        .await
        .map(|_| ())
    }

    /// All admins, newest first.
    pub async fn list(&self) -> Result<Vec<AdminProfile>, RepositoryError> {
        Ok(admin::Entity::find()
            .order_by_desc(admin::Column::CreatedAt)
            .order_by_desc(admin::Column::Id)
            .all(&self.conn)
            .await?
            .into_iter()
            .map(Into::into)
            .collect())
    }

    pub async fn update(
        &self,
        id: i32,
        changes: AdminChanges,
    ) -> Result<AdminProfile, RepositoryError> {
        let existing = admin::Entity::find_by_id(id)
            .one(&self.conn)
            .await?
            .ok_or_else(|| RepositoryError::NotFound("Admin not found".to_string()))?;

        let mut active = existing.into_active_model();
        if let Some(username) = changes.username {
            active.username = Set(username);
        }
        if let Some(permissions) = changes.permissions {
            active.permissions = Set(serde_json::json!(permissions));
        }
        if let Some(hash) = changes.password_hash {
            active.password_hash = Set(hash);
        }
        if let Some(is_active) = changes.is_active {
            active.is_active = Set(is_active);
        }
        active.updated_at = Set(Utc::now().into());

        let model = active
            .update(&self.conn)
            .await
            .map_err(|e| conflict_or(e, DUPLICATE_USERNAME))?;
        Ok(model.into())
    }

    pub async fn delete(&self, id: i32) -> Result<(), RepositoryError> {
        admin::Entity::delete_by_id(id).exec(&self.conn).await?;
        Ok(())
    }

    pub async fn primary_admin_exists(&self) -> Result<bool, RepositoryError> {
        let count = admin::Entity::find()
            .filter(admin::Column::Role.eq(AdminRole::PrimaryAdmin))
            .count(&self.conn)
            .await?;
        Ok(count > 0)
    }
}

//! Admin entity model.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Role of an admin account.
///
/// Stored as the strings `admin` and `sub_admin`, which are also the values
/// clients see.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(50))")]
pub enum AdminRole {
    /// The single bootstrapped account that manages sub-admins.
    #[sea_orm(string_value = "admin")]
    #[serde(rename = "admin")]
    PrimaryAdmin,
    /// An account created by the primary admin.
    #[sea_orm(string_value = "sub_admin")]
    #[serde(rename = "sub_admin")]
    SubAdmin,
}

/// An admin account row.
///
/// `permissions` is a JSON array of opaque strings. `created_by` points at the
/// admin that created this one and is nulled if that admin is deleted.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "admins")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub username: String,
    pub password_hash: String,
    pub role: AdminRole,
    pub permissions: Json,
    pub is_active: bool,
    pub created_by: Option<i32>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

//! Session entity model.
//!
//! Maps to the `session` table written by
//! [`DbSessionStore`](crate::session_store::DbSessionStore).

use sea_orm::entity::prelude::*;

/// SeaORM entity model representing one persisted session record.
///
/// # Database Schema
///
/// | Column      | Type                    | Description                         |
/// |-------------|-------------------------|-------------------------------------|
/// | id          | TEXT (Primary Key)      | Session ID                          |
/// | data        | BLOB / BYTEA            | MessagePack serialized record       |
/// | expiry_date | TIMESTAMPTZ             | Absolute expiry, indexed for sweeps |
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "session")]
pub struct Model {
    /// The session identifier in its string form.
    ///
    /// Corresponds to `tower_sessions::session::Id`, which renders as
    /// URL-safe base64.
    #[sea_orm(primary_key, auto_increment = false, column_type = "Text")]
    pub id: String,

    /// The MessagePack-serialized `tower_sessions::session::Record`, including
    /// the serialized principal reference.
    pub data: Vec<u8>,

    /// When the session stops being loadable.
    ///
    /// Loads filter on this column, and the expired-session sweep deletes
    /// rows whose expiry has passed.
    pub expiry_date: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

//! Database entity models.
//!
//! SeaORM entity definitions for the three tables the authentication core
//! touches. The schema itself is owned by [`crate::migration`].

/// Durable session rows keyed by session id.
pub mod session;

/// Self-registered end users.
pub mod user;

/// Primary-admin and sub-admin accounts.
pub mod admin;

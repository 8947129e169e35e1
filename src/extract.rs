//! Extractors exposing the session and its principal to handlers.

use std::convert::Infallible;

use axum::{
    extract::{rejection::JsonRejection, FromRef, FromRequest, FromRequestParts},
    http::request::Parts,
};

use crate::error::AuthError;
use crate::principal::Principal;
use crate::session::{Session, SessionManager};

impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<Session>().cloned().ok_or_else(|| {
            AuthError::store_fault("Session unavailable", "session pipeline is not installed")
        })
    }
}

/// The live principal behind the request's session, or `None`.
///
/// Never rejects: missing, expired, orphaned and unreadable sessions all
/// come through as `None`.
pub struct CurrentPrincipal(pub Option<Principal>);

impl<S> FromRequestParts<S> for CurrentPrincipal
where
    SessionManager: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Some(session) = parts.extensions.get::<Session>().cloned() else {
            return Ok(Self(None));
        };
        let manager = SessionManager::from_ref(state);
        Ok(Self(manager.resolve(&session).await))
    }
}

/// `Json` whose rejections render as [`AuthError::Validation`].
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AuthError))]
pub struct JsonBody<T>(pub T);

impl From<JsonRejection> for AuthError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

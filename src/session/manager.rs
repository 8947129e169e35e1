use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use time::OffsetDateTime;
use tokio::task::JoinHandle;
use tower_sessions::{session::Id, ExpiredDeletion, SessionStore};

use super::{Lifecycle, PrincipalResolver, Session, SessionCookies};
use crate::error::AuthError;
use crate::principal::{Principal, PrincipalRef};

/// Absolute lifetime of an authenticated session, counted from login.
pub const SESSION_LIFETIME: time::Duration = time::Duration::days(30);

/// Owns session lifecycle: attach, authenticate, persist, resolve, end.
///
/// Holds the durable store behind the `tower_sessions::SessionStore` trait
/// and never asks it for a new id on an existing session.
#[derive(Debug, Clone)]
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    cookies: SessionCookies,
    resolver: PrincipalResolver,
    lifetime: time::Duration,
}

impl SessionManager {
    pub fn new(
        store: Arc<dyn SessionStore>,
        cookies: SessionCookies,
        resolver: PrincipalResolver,
    ) -> Self {
        Self {
            store,
            cookies,
            resolver,
            lifetime: SESSION_LIFETIME,
        }
    }

    /// Attaches the session named by the request cookie, or a fresh
    /// in-memory one.
    ///
    /// A store read failure degrades to an anonymous session: most routes
    /// have public read paths, and a write still in flight from a
    /// concurrent request looks the same as a missing record.
    pub async fn begin(&self, headers: &HeaderMap) -> Session {
        let Some(id) = self.cookies.session_id(headers) else {
            return Session::anonymous(self.lifetime);
        };

        match self.store.load(&id).await {
            Ok(Some(record)) => Session::loaded(record),
            Ok(None) => {
                tracing::debug!(session_id = %id, "session not found or expired");
                Session::anonymous(self.lifetime)
            }
            Err(e) => {
                tracing::warn!(session_id = %id, error = %e, "session load failed, treating as anonymous");
                Session::anonymous(self.lifetime)
            }
        }
    }

    /// Writes `principal` into the current session under its current id.
    ///
    /// Nothing in this path replaces the id. The write reaches the store when
    /// the pipeline persists the session, before the response leaves.
    pub fn authenticate(&self, session: &Session, principal: &Principal) {
        session.set_principal(
            principal.to_ref(),
            OffsetDateTime::now_utc() + self.lifetime,
        );
        tracing::info!(
            session_id = %session.id(),
            principal_id = principal.id(),
            kind = ?principal.kind(),
            "session authenticated"
        );
    }

    /// Authenticates and persists in one step, for handlers that must know
    /// the login committed before doing anything else.
    ///
    /// On a failed write the session is put back the way it was, so the
    /// pipeline has nothing left to retry and the client keeps whatever
    /// login it already had.
    pub async fn login(&self, session: &Session, principal: &Principal) -> Result<(), AuthError> {
        let checkpoint = session.checkpoint();
        self.authenticate(session, principal);
        if let Err(e) = self.persist(session).await {
            session.restore(checkpoint);
            return Err(e);
        }
        Ok(())
    }

    /// Flushes pending changes to the durable store.
    ///
    /// The write runs on its own task, so it completes even if the request
    /// future is dropped because the client went away. Returns the id to
    /// deliver in the cookie, or `None` when there was nothing to write.
    pub async fn persist(&self, session: &Session) -> Result<Option<Id>, AuthError> {
        let Some((mut record, stored, required)) = session.pending_write() else {
            return Ok(None);
        };

        let store = Arc::clone(&self.store);
        let write = tokio::spawn(async move {
            if stored {
                store.save(&record).await?;
            } else {
                store.create(&mut record).await?;
            }
            Ok::<_, tower_sessions::session_store::Error>(record.id)
        });

        let outcome = match write.await {
            Ok(result) => result.map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };

        match outcome {
            Ok(committed_id) => {
                session.mark_persisted(committed_id);
                Ok(Some(session.id()))
            }
            Err(detail) if required => {
                Err(AuthError::store_fault("Failed to save session", detail))
            }
            Err(detail) => {
                tracing::warn!(session_id = %session.id(), error = %detail, "best-effort session write failed");
                Ok(None)
            }
        }
    }

    /// The live principal behind the session, if any.
    ///
    /// Lookup failures are logged and treated as unauthenticated. A legacy
    /// bare-id reference that resolves is rewritten to the typed form.
    pub async fn resolve(&self, session: &Session) -> Option<Principal> {
        let principal_ref = session.principal_ref()?;
        match self.resolver.resolve(principal_ref).await {
            Ok(Some(principal)) => {
                if let PrincipalRef::Legacy(_) = principal_ref {
                    session.upgrade_principal(principal.to_ref());
                }
                Some(principal)
            }
            Ok(None) => {
                tracing::debug!(session_id = %session.id(), ?principal_ref, "session principal no longer resolves");
                None
            }
            Err(e) => {
                tracing::warn!(session_id = %session.id(), error = %e, "principal lookup failed, treating as anonymous");
                None
            }
        }
    }

    /// Destroys the session in the store and marks it for cookie removal.
    ///
    /// Ending a session that was never stored, or was already ended,
    /// succeeds.
    pub async fn end(&self, session: &Session) -> Result<(), AuthError> {
        if session.is_stored() {
            let id = session.id();
            let store = Arc::clone(&self.store);
            tokio::spawn(async move { store.delete(&id).await })
                .await
                .map_err(|e| AuthError::store_fault("Failed to destroy session", e))?
                .map_err(|e| AuthError::store_fault("Failed to destroy session", e))?;
            tracing::info!(session_id = %id, "session destroyed");
        }
        session.mark_ended();
        Ok(())
    }

    // Runs after the handler and before the response is handed back.
    async fn commit(&self, session: &Session, mut response: Response) -> Response {
        if session.lifecycle() == Lifecycle::Ended {
            if let Some(clear) = self.cookies.clear() {
                response.headers_mut().append(header::SET_COOKIE, clear);
            }
            return response;
        }

        if let Err(e) = self.persist(session).await {
            return e.into_response();
        }
        if session.take_issue_cookie() {
            if let Some(cookie) = self.cookies.issue(session.id()) {
                response.headers_mut().append(header::SET_COOKIE, cookie);
            }
        }
        response
    }
}

/// Request pipeline stage: attach the session, run the handler, then persist
/// before the response is committed.
///
/// A failed required write replaces the handler's response with a 500, so a
/// client is never told it is logged in on a session the next request cannot
/// find.
pub async fn session_pipeline(
    State(manager): State<SessionManager>,
    mut request: Request,
    next: Next,
) -> Response {
    let session = manager.begin(request.headers()).await;
    request.extensions_mut().insert(session.clone());
    let response = next.run(request).await;
    manager.commit(&session, response).await
}

/// Periodically deletes expired sessions from the store.
pub fn spawn_expired_sweep<S>(store: S, period: std::time::Duration) -> JoinHandle<()>
where
    S: ExpiredDeletion + Clone,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            match store.delete_expired().await {
                Ok(()) => tracing::debug!("expired sessions swept"),
                Err(e) => tracing::warn!(error = %e, "expired session sweep failed"),
            }
        }
    })
}

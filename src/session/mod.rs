//! Server-side sessions keyed by a signed cookie.
//!
//! A [`Session`] is the request-scoped view of one `tower_sessions` record.
//! The [`SessionManager`] owns its whole lifecycle:
//!
//! ```text
//! Anonymous ──authenticate──▶ Authenticating ──persist ok──▶ Authenticated ─┐
//!     │                                                        │    ▲        │
//!     └────────────────────── end ──────▶ Ended ◀──── end ─────┘    └────────┘
//! ```
//!
//! The session id never changes once a client holds it. Authentication
//! writes the principal reference into the current record and nothing else;
//! the only time an id can be replaced is when the store rejects a freshly
//! minted, never-issued id as a collision on first insert.

mod cookie;
mod manager;
mod resolve;

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{de::DeserializeOwned, Serialize};
use time::OffsetDateTime;
use tower_sessions::session::{Id, Record};

pub use cookie::{CookieSettings, SessionCookies, SESSION_COOKIE_NAME};
pub use manager::{session_pipeline, spawn_expired_sweep, SessionManager, SESSION_LIFETIME};
pub use resolve::PrincipalResolver;

use crate::principal::PrincipalRef;

/// Record key holding the serialized [`PrincipalRef`].
pub const PRINCIPAL_KEY: &str = "principal";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lifecycle {
    /// No principal reference.
    Anonymous,
    /// Principal reference written, not yet committed to the store.
    Authenticating,
    /// Principal reference committed to the store.
    Authenticated,
    /// Destroyed by logout; the cookie is cleared on the way out.
    Ended,
}

// Required changes fail the request if they cannot be persisted; best-effort
// ones are dropped with a warning.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Dirty {
    Clean,
    BestEffort,
    Required,
}

#[derive(Clone, Debug)]
struct Inner {
    record: Record,
    stored: bool,
    dirty: Dirty,
    lifecycle: Lifecycle,
    // Set by a successful write; the pipeline delivers the cookie once.
    issue_cookie: bool,
}

/// Snapshot of a session taken before a change that may have to be undone.
#[derive(Clone, Debug)]
pub(crate) struct Checkpoint(Inner);

/// Handle to the current request's session record.
///
/// Cheap to clone; every clone sees the same state. The pipeline inserts one
/// into request extensions before any handler runs.
#[derive(Clone, Debug)]
pub struct Session {
    inner: Arc<Mutex<Inner>>,
}

impl Session {
    /// A fresh, empty session that exists only in memory until it acquires
    /// data.
    pub(crate) fn anonymous(lifetime: time::Duration) -> Self {
        Self::from_inner(Inner {
            record: Record {
                id: Id::default(),
                data: Default::default(),
                expiry_date: OffsetDateTime::now_utc() + lifetime,
            },
            stored: false,
            dirty: Dirty::Clean,
            lifecycle: Lifecycle::Anonymous,
            issue_cookie: false,
        })
    }

    /// A session loaded from the durable store.
    pub(crate) fn loaded(record: Record) -> Self {
        let lifecycle = if record.data.contains_key(PRINCIPAL_KEY) {
            Lifecycle::Authenticated
        } else {
            Lifecycle::Anonymous
        };
        Self::from_inner(Inner {
            record,
            stored: true,
            dirty: Dirty::Clean,
            lifecycle,
            issue_cookie: false,
        })
    }

    fn from_inner(inner: Inner) -> Self {
        Self {
            inner: Arc::new(Mutex::new(inner)),
        }
    }

    pub fn id(&self) -> Id {
        self.inner.lock().record.id
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.inner.lock().lifecycle
    }

    pub fn expiry_date(&self) -> OffsetDateTime {
        self.inner.lock().record.expiry_date
    }

    /// Whether a row for this session exists in the durable store.
    pub fn is_stored(&self) -> bool {
        self.inner.lock().stored
    }

    /// The stored principal reference, if any. A value that does not decode
    /// is treated as absent.
    pub fn principal_ref(&self) -> Option<PrincipalRef> {
        let inner = self.inner.lock();
        if inner.lifecycle == Lifecycle::Ended {
            return None;
        }
        let value = inner.record.data.get(PRINCIPAL_KEY)?;
        match serde_json::from_value(value.clone()) {
            Ok(principal_ref) => Some(principal_ref),
            Err(e) => {
                tracing::warn!(session_id = %inner.record.id, error = %e, "undecodable principal reference");
                None
            }
        }
    }

    /// Reads auxiliary session state.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let inner = self.inner.lock();
        let value = inner.record.data.get(key)?;
        serde_json::from_value(value.clone()).ok()
    }

    /// Writes auxiliary session state. The principal slot is reserved for
    /// [`SessionManager::authenticate`] and is ignored here.
    pub fn insert<T: Serialize>(&self, key: &str, value: T) -> Result<(), serde_json::Error> {
        if key == PRINCIPAL_KEY {
            return Ok(());
        }
        let value = serde_json::to_value(value)?;
        let mut inner = self.inner.lock();
        inner.record.data.insert(key.to_owned(), value);
        inner.mark(Dirty::Required);
        Ok(())
    }

    pub fn remove(&self, key: &str) {
        if key == PRINCIPAL_KEY {
            return;
        }
        let mut inner = self.inner.lock();
        if inner.record.data.remove(key).is_some() {
            inner.mark(Dirty::Required);
        }
    }

    pub(crate) fn set_principal(&self, principal_ref: PrincipalRef, expiry: OffsetDateTime) {
        let mut inner = self.inner.lock();
        inner.record.data.insert(
            PRINCIPAL_KEY.to_owned(),
            serde_json::json!(principal_ref),
        );
        inner.record.expiry_date = expiry;
        inner.lifecycle = Lifecycle::Authenticating;
        inner.mark(Dirty::Required);
    }

    /// Rewrites a legacy reference into its typed form. Persisted
    /// opportunistically.
    pub(crate) fn upgrade_principal(&self, principal_ref: PrincipalRef) {
        let mut inner = self.inner.lock();
        if inner.lifecycle == Lifecycle::Ended {
            return;
        }
        inner.record.data.insert(
            PRINCIPAL_KEY.to_owned(),
            serde_json::json!(principal_ref),
        );
        inner.mark(Dirty::BestEffort);
    }

    /// What the pipeline should write, if anything: a copy of the record and
    /// whether the write is required.
    pub(crate) fn pending_write(&self) -> Option<(Record, bool, bool)> {
        let inner = self.inner.lock();
        let worth_writing = inner.stored || !inner.record.data.is_empty();
        if inner.lifecycle == Lifecycle::Ended || inner.dirty == Dirty::Clean || !worth_writing {
            return None;
        }
        Some((
            inner.record.clone(),
            inner.stored,
            inner.dirty == Dirty::Required,
        ))
    }

    /// Records a successful write. `committed_id` only differs from the
    /// current id for a first insert that hit a collision.
    pub(crate) fn mark_persisted(&self, committed_id: Id) {
        let mut inner = self.inner.lock();
        if !inner.stored {
            inner.record.id = committed_id;
        }
        inner.stored = true;
        inner.dirty = Dirty::Clean;
        inner.issue_cookie = true;
        if inner.lifecycle == Lifecycle::Authenticating {
            inner.lifecycle = Lifecycle::Authenticated;
        }
    }

    /// Whether a write succeeded since the cookie was last delivered. Clears
    /// the flag.
    pub(crate) fn take_issue_cookie(&self) -> bool {
        std::mem::take(&mut self.inner.lock().issue_cookie)
    }

    pub(crate) fn checkpoint(&self) -> Checkpoint {
        Checkpoint(self.inner.lock().clone())
    }

    /// Puts the session back exactly as it was at `checkpoint`.
    pub(crate) fn restore(&self, checkpoint: Checkpoint) {
        *self.inner.lock() = checkpoint.0;
    }

    pub(crate) fn mark_ended(&self) {
        let mut inner = self.inner.lock();
        inner.record.data.clear();
        inner.stored = false;
        inner.dirty = Dirty::Clean;
        inner.issue_cookie = false;
        inner.lifecycle = Lifecycle::Ended;
    }
}

impl Inner {
    fn mark(&mut self, dirty: Dirty) {
        self.dirty = self.dirty.max(dirty);
    }
}

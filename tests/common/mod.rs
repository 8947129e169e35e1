#![allow(dead_code)]

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use argon2::Params;
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use calcdir_auth::{
    bootstrap,
    migration::{Migrator, MigratorTrait},
    password::Passwords,
    repository::AdminRepository,
    routes::{router, RouterOptions},
    session::{CookieSettings, SessionCookies, SESSION_COOKIE_NAME},
    session_store::DbSessionStore,
    store, AppState, SessionStore,
};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use serde_json::Value;
use tower::ServiceExt;
use tower_sessions::session::{Id, Record};

pub const SECRET: &[u8] = b"integration-test-signing-secret";
pub const PRIMARY_USERNAME: &str = "admin";
pub const PRIMARY_PASSWORD: &str = "admin123";

/// Session store that can be told to refuse writes.
#[derive(Debug, Clone)]
pub struct SwitchableStore {
    inner: DbSessionStore,
    fail_writes: Arc<AtomicBool>,
}

impl SwitchableStore {
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn refused(&self) -> bool {
        self.fail_writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionStore for SwitchableStore {
    async fn create(&self, record: &mut Record) -> store::Result<()> {
        if self.refused() {
            return Err(store::Error::Backend("connection reset".into()));
        }
        self.inner.create(record).await
    }

    async fn save(&self, record: &Record) -> store::Result<()> {
        if self.refused() {
            return Err(store::Error::Backend("connection reset".into()));
        }
        self.inner.save(record).await
    }

    async fn load(&self, id: &Id) -> store::Result<Option<Record>> {
        self.inner.load(id).await
    }

    async fn delete(&self, id: &Id) -> store::Result<()> {
        self.inner.delete(id).await
    }
}

pub struct TestApp {
    pub router: Router,
    pub conn: DatabaseConnection,
    pub store: SwitchableStore,
    pub cookies: SessionCookies,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_options(RouterOptions::default()).await
    }

    pub async fn with_options(options: RouterOptions) -> Self {
        let mut opt = ConnectOptions::new("sqlite::memory:");
        // One connection: every in-memory SQLite connection is its own database.
        opt.max_connections(1).min_connections(1).sqlx_logging(false);
        let conn = Database::connect(opt).await.unwrap();
        Migrator::up(&conn, None).await.unwrap();

        let passwords = Passwords::with_params(Params::new(1024, 1, 1, None).unwrap());
        bootstrap::ensure_primary_admin(
            &AdminRepository::new(conn.clone()),
            &passwords,
            PRIMARY_USERNAME,
            PRIMARY_PASSWORD,
        )
        .await
        .unwrap();

        let store = SwitchableStore {
            inner: DbSessionStore::new(conn.clone()),
            fail_writes: Arc::new(AtomicBool::new(false)),
        };
        let cookies = SessionCookies::new(SECRET, CookieSettings::development());
        let state = AppState::new(
            conn.clone(),
            Arc::new(store.clone()),
            cookies.clone(),
            passwords,
        );

        Self {
            router: router(state, options),
            conn,
            store,
            cookies,
        }
    }

    /// A fresh browser with an empty cookie jar.
    pub fn client(&self) -> Client {
        Client {
            router: self.router.clone(),
            cookie: None,
        }
    }

    pub fn store(&self) -> DbSessionStore {
        DbSessionStore::new(self.conn.clone())
    }
}

pub struct Response {
    pub status: StatusCode,
    pub body: Value,
    /// The session cookie pair from `Set-Cookie`, if one was sent.
    pub set_cookie: Option<String>,
}

/// Drives the router like a browser holding one cookie jar.
pub struct Client {
    router: Router,
    pub cookie: Option<String>,
}

impl Client {
    pub async fn get(&mut self, uri: &str) -> Response {
        self.send(Method::GET, uri, None).await
    }

    pub async fn post(&mut self, uri: &str, body: Value) -> Response {
        self.send(Method::POST, uri, Some(body.to_string())).await
    }

    pub async fn put(&mut self, uri: &str, body: Value) -> Response {
        self.send(Method::PUT, uri, Some(body.to_string())).await
    }

    pub async fn delete(&mut self, uri: &str) -> Response {
        self.send(Method::DELETE, uri, None).await
    }

    pub async fn send(&mut self, method: Method, uri: &str, body: Option<String>) -> Response {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(cookie) = &self.cookie {
            request = request.header(header::COOKIE, cookie);
        }
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body)),
            None => request.body(Body::empty()),
        }
        .unwrap();

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let set_cookie = response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .filter_map(|v| v.split(';').next())
            .find(|pair| pair.starts_with(&format!("{SESSION_COOKIE_NAME}=")))
            .map(str::to_owned);

        if let Some(pair) = &set_cookie {
            if pair.len() == SESSION_COOKIE_NAME.len() + 1 {
                self.cookie = None;
            } else {
                self.cookie = Some(pair.clone());
            }
        }

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };

        Response {
            status,
            body,
            set_cookie,
        }
    }
}

pub async fn register(client: &mut Client, email: &str, password: &str, name: &str) -> Response {
    client
        .post(
            "/api/auth/register",
            serde_json::json!({ "email": email, "password": password, "name": name }),
        )
        .await
}

pub async fn admin_login(client: &mut Client, username: &str, password: &str) -> Response {
    client
        .post(
            "/api/admin-auth/login",
            serde_json::json!({ "username": username, "password": password }),
        )
        .await
}

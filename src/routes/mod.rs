//! HTTP surface: `/api/auth`, `/api/admin-auth`, health and fallback.

mod admin_auth;
mod auth;

use axum::{
    http::{header, HeaderValue, Method, StatusCode},
    middleware,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use serde_json::json;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::error::expose_fault_details;
use crate::principal::{AdminProfile, AdminRole, Principal, UserProfile};
use crate::session::session_pipeline;
use crate::state::AppState;

/// Knobs for [`router`] that come from configuration.
#[derive(Clone, Debug, Default)]
pub struct RouterOptions {
    /// Echo store-fault detail in error bodies.
    pub expose_error_details: bool,
    /// Browser origins allowed to make credentialed requests.
    pub allowed_origins: Vec<HeaderValue>,
}

/// Builds the full application router.
///
/// Stage order, outermost first: tracing, CORS, fault-detail exposure,
/// session pipeline, handler. The session pipeline sits innermost so its
/// persist step finishes before any outer stage sees the response.
pub fn router(state: AppState, options: RouterOptions) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(options.allowed_origins))
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .nest("/api/auth", auth::routes())
        .nest("/api/admin-auth", admin_auth::routes())
        .route("/health", get(health))
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(
            state.sessions.clone(),
            session_pipeline,
        ))
        .layer(middleware::from_fn_with_state(
            options.expose_error_details,
            expose_fault_details,
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "message": "Server is running" }))
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "Route not found" })))
}

/// Public shape of a user in auth responses.
#[derive(Debug, Serialize)]
struct UserView {
    id: i32,
    email: String,
    name: String,
}

impl From<UserProfile> for UserView {
    fn from(user: UserProfile) -> Self {
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
        }
    }
}

/// Public shape of an admin in auth responses.
#[derive(Debug, Serialize)]
struct AdminView {
    id: i32,
    username: String,
    role: AdminRole,
    permissions: Vec<String>,
}

impl From<AdminProfile> for AdminView {
    fn from(admin: AdminProfile) -> Self {
        Self {
            id: admin.id,
            username: admin.username,
            role: admin.role,
            permissions: admin.permissions,
        }
    }
}

/// Any principal, tagged with its kind.
#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum PrincipalView {
    User(UserView),
    Admin(AdminView),
}

impl From<Principal> for PrincipalView {
    fn from(principal: Principal) -> Self {
        match principal {
            Principal::User(user) => Self::User(user.into()),
            Principal::Admin(admin) => Self::Admin(admin.into()),
        }
    }
}

// Absent and empty strings are both "missing".
fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

use axum::{extract::State, http::StatusCode, routing::{get, post}, Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{present, PrincipalView, UserView};
use crate::error::AuthError;
use crate::extract::{CurrentPrincipal, JsonBody};
use crate::password;
use crate::principal::{Principal, PrincipalKind};
use crate::session::Session;
use crate::state::AppState;

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/session", get(session_status))
}

#[derive(Debug, Deserialize)]
struct RegisterRequest {
    email: Option<String>,
    password: Option<String>,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    email: Option<String>,
    password: Option<String>,
}

/// Creates a user and logs the current session in as that user.
async fn register(
    State(state): State<AppState>,
    session: Session,
    JsonBody(body): JsonBody<RegisterRequest>,
) -> Result<(StatusCode, Json<Value>), AuthError> {
    let (Some(email), Some(password), Some(name)) = (
        present(body.email.map(|e| e.trim().to_owned())),
        present(body.password),
        present(body.name),
    ) else {
        return Err(AuthError::Validation(
            "Email, password, and name are required".to_string(),
        ));
    };
    password::check_length(&password, "Password").map_err(AuthError::Validation)?;

    let hash = state
        .passwords
        .hash(&password)
        .await
        .map_err(|e| AuthError::store_fault("Failed to register user", e))?;
    let user = state.users.create(&email, &hash, &name).await?;

    // The account only stands if the login that comes with it committed.
    if let Err(e) = state
        .sessions
        .login(&session, &Principal::User(user.clone()))
        .await
    {
        if let Err(cleanup) = state.users.delete(user.id).await {
            tracing::error!(principal_id = user.id, error = %cleanup, "failed to roll back registration");
        }
        return Err(e);
    }
    tracing::info!(principal_id = user.id, "user registered");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "User registered successfully",
            "user": UserView::from(user),
        })),
    ))
}

async fn login(
    State(state): State<AppState>,
    session: Session,
    JsonBody(body): JsonBody<LoginRequest>,
) -> Result<Json<Value>, AuthError> {
    let (Some(email), Some(password)) = (present(body.email), present(body.password)) else {
        return Err(AuthError::Validation(
            "Email and password are required".to_string(),
        ));
    };

    let principal = state
        .verifier
        .verify(PrincipalKind::User, &email, &password)
        .await?;
    state.sessions.login(&session, &principal).await?;

    let Principal::User(user) = principal else {
        return Err(AuthError::store_fault(
            "Authentication error",
            "verifier returned a non-user principal",
        ));
    };
    Ok(Json(json!({
        "message": "Login successful",
        "user": UserView::from(user),
    })))
}

async fn logout(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<Value>, AuthError> {
    state.sessions.end(&session).await?;
    Ok(Json(json!({ "message": "Logout successful" })))
}

/// Reports whoever the session belongs to, user or admin. Never fails:
/// anything short of a live principal is `authenticated: false`.
async fn session_status(CurrentPrincipal(principal): CurrentPrincipal) -> Json<Value> {
    match principal {
        Some(principal) => Json(json!({
            "authenticated": true,
            "user": PrincipalView::from(principal),
        })),
        None => Json(json!({ "authenticated": false, "user": null })),
    }
}

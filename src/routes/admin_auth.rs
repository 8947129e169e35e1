use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{present, AdminView};
use crate::authz::{self, AdminAction};
use crate::error::AuthError;
use crate::extract::{CurrentPrincipal, JsonBody};
use crate::password;
use crate::principal::{AdminRole, Principal, PrincipalKind};
use crate::repository::{AdminChanges, NewAdmin};
use crate::session::Session;
use crate::state::AppState;

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/session", get(session_status))
        .route("/change-password", post(change_password))
        .route("/create-sub-admin", post(create_sub_admin))
        .route("/admins", get(list_admins))
        .route("/admins/{id}", put(update_admin).delete(delete_admin))
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    username: Option<String>,
    password: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChangePasswordRequest {
    current_password: Option<String>,
    new_password: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreateSubAdminRequest {
    username: Option<String>,
    password: Option<String>,
    permissions: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct UpdateAdminRequest {
    username: Option<String>,
    permissions: Option<Vec<String>>,
    password: Option<String>,
    is_active: Option<bool>,
}

async fn login(
    State(state): State<AppState>,
    session: Session,
    JsonBody(body): JsonBody<LoginRequest>,
) -> Result<Json<Value>, AuthError> {
    let (Some(username), Some(password)) = (present(body.username), present(body.password))
    else {
        return Err(AuthError::Validation(
            "Username and password are required".to_string(),
        ));
    };

    let principal = state
        .verifier
        .verify(PrincipalKind::Admin, &username, &password)
        .await?;
    state.sessions.login(&session, &principal).await?;

    let Principal::Admin(admin) = principal else {
        return Err(AuthError::store_fault(
            "Authentication error",
            "verifier returned a non-admin principal",
        ));
    };
    Ok(Json(json!({
        "message": "Login successful",
        "admin": AdminView::from(admin),
    })))
}

async fn logout(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<Value>, AuthError> {
    state.sessions.end(&session).await?;
    Ok(Json(json!({ "message": "Logout successful" })))
}

async fn session_status(CurrentPrincipal(principal): CurrentPrincipal) -> Json<Value> {
    match principal {
        Some(Principal::Admin(admin)) => Json(json!({
            "authenticated": true,
            "admin": AdminView::from(admin),
        })),
        _ => Json(json!({ "authenticated": false, "admin": null })),
    }
}

/// Changes the calling admin's own password. The session stays as it is.
async fn change_password(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    JsonBody(body): JsonBody<ChangePasswordRequest>,
) -> Result<Json<Value>, AuthError> {
    let admin = authz::requires_admin(principal)?;
    let (Some(current), Some(new)) = (present(body.current_password), present(body.new_password))
    else {
        return Err(AuthError::Validation(
            "Current password and new password are required".to_string(),
        ));
    };
    password::check_length(&new, "New password").map_err(AuthError::Validation)?;

    let Some(stored_hash) = state.admins.password_hash(admin.id).await? else {
        return Err(AuthError::NotFound("Admin not found".to_string()));
    };
    let matches = state
        .passwords
        .verify(&current, &stored_hash)
        .await
        .map_err(|e| AuthError::store_fault("Failed to change password", e))?;
    if !matches {
        return Err(AuthError::InvalidCredentials("Current password is incorrect"));
    }

    let new_hash = state
        .passwords
        .hash(&new)
        .await
        .map_err(|e| AuthError::store_fault("Failed to change password", e))?;
    state.admins.set_password_hash(admin.id, &new_hash).await?;
    tracing::info!(principal_id = admin.id, "admin password changed");

    Ok(Json(json!({ "message": "Password changed successfully" })))
}

async fn create_sub_admin(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    JsonBody(body): JsonBody<CreateSubAdminRequest>,
) -> Result<(StatusCode, Json<Value>), AuthError> {
    let actor = authz::requires_primary_admin(principal, AdminAction::CreateSubAdmin)?;
    let (Some(username), Some(password)) = (
        present(body.username.map(|u| u.trim().to_owned())),
        present(body.password),
    ) else {
        return Err(AuthError::Validation(
            "Username and password are required".to_string(),
        ));
    };
    password::check_length(&password, "Password").map_err(AuthError::Validation)?;

    let password_hash = state
        .passwords
        .hash(&password)
        .await
        .map_err(|e| AuthError::store_fault("Failed to create sub-admin", e))?;
    let admin = state
        .admins
        .create(NewAdmin {
            username,
            password_hash,
            role: AdminRole::SubAdmin,
            permissions: body.permissions.unwrap_or_default(),
            created_by: Some(actor.id),
        })
        .await?;
    tracing::info!(
        principal_id = actor.id,
        admin_id = admin.id,
        username = %admin.username,
        "sub-admin created"
    );

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Sub-admin created successfully",
            "admin": AdminView::from(admin),
        })),
    ))
}

async fn list_admins(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
) -> Result<Json<Value>, AuthError> {
    authz::requires_primary_admin(principal, AdminAction::ListAdmins)?;
    let admins = state.admins.list().await?;
    Ok(Json(json!({ "admins": admins })))
}

async fn update_admin(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    CurrentPrincipal(principal): CurrentPrincipal,
    JsonBody(body): JsonBody<UpdateAdminRequest>,
) -> Result<Json<Value>, AuthError> {
    let action = AdminAction::UpdateAdmin;
    let actor = authz::requires_primary_admin(principal, action)?;
    authz::forbid_self_target(&actor, id, action)?;
    let Some(target) = state.admins.find_by_id(id).await? else {
        return Err(AuthError::NotFound("Admin not found".to_string()));
    };
    authz::forbid_primary_target(&target, action)?;

    let username = match body.username.map(|u| u.trim().to_owned()) {
        Some(u) if u.is_empty() => {
            return Err(AuthError::Validation("Username cannot be empty".to_string()))
        }
        other => other,
    };
    let password_hash = match present(body.password) {
        Some(password) => {
            password::check_length(&password, "Password").map_err(AuthError::Validation)?;
            let hash = state
                .passwords
                .hash(&password)
                .await
                .map_err(|e| AuthError::store_fault("Failed to update sub-admin", e))?;
            Some(hash)
        }
        None => None,
    };
    let changes = AdminChanges {
        username,
        permissions: body.permissions,
        password_hash,
        is_active: body.is_active,
    };
    if changes.is_empty() {
        return Err(AuthError::Validation("No fields to update".to_string()));
    }

    let admin = state.admins.update(id, changes).await?;
    tracing::info!(principal_id = actor.id, admin_id = id, "sub-admin updated");
    Ok(Json(json!({
        "message": "Sub-admin updated successfully",
        "admin": admin,
    })))
}

async fn delete_admin(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    CurrentPrincipal(principal): CurrentPrincipal,
) -> Result<Json<Value>, AuthError> {
    let action = AdminAction::DeleteAdmin;
    let actor = authz::requires_primary_admin(principal, action)?;
    authz::forbid_self_target(&actor, id, action)?;
    let Some(target) = state.admins.find_by_id(id).await? else {
        return Err(AuthError::NotFound("Admin not found".to_string()));
    };
    authz::forbid_primary_target(&target, action)?;

    state.admins.delete(id).await?;
    tracing::info!(principal_id = actor.id, admin_id = id, "sub-admin deleted");
    Ok(Json(json!({
        "message": format!("Sub-admin \"{}\" deleted successfully", target.username),
    })))
}

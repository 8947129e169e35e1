//! Error taxonomy for the authentication core and its HTTP mapping.

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::repository::RepositoryError;

/// Errors surfaced by the verifier, the session manager and the routes.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Unknown identifier, inactive admin or wrong secret. The message is
    /// the same for all three.
    #[error("{0}")]
    InvalidCredentials(&'static str),

    /// Missing or malformed request fields.
    #[error("{0}")]
    Validation(String),

    /// Duplicate identifier on create or rename.
    #[error("{0}")]
    Conflict(String),

    /// Authenticated, but the wrong kind or role for the action.
    #[error("{0}")]
    Forbidden(String),

    /// No resolved principal where one is required.
    #[error("{0}")]
    Unauthenticated(String),

    #[error("{0}")]
    NotFound(String),

    /// Durable store unreachable or erroring.
    #[error("{context}: {detail}")]
    StoreFault {
        context: &'static str,
        detail: String,
    },
}

impl AuthError {
    pub fn store_fault(context: &'static str, err: impl std::fmt::Display) -> Self {
        Self::StoreFault {
            context,
            detail: err.to_string(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidCredentials(_) | Self::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            Self::Validation(_) | Self::Conflict(_) => StatusCode::BAD_REQUEST,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::StoreFault { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<RepositoryError> for AuthError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Conflict(message) => Self::Conflict(message),
            RepositoryError::NotFound(message) => Self::NotFound(message),
            other => Self::store_fault("Database operation failed", other),
        }
    }
}

/// Raw store-fault detail, attached to the response for
/// [`expose_fault_details`] to pick up.
#[derive(Clone, Debug)]
pub struct FaultDetail {
    pub context: &'static str,
    pub detail: String,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            Self::StoreFault { context, detail } => {
                tracing::error!(error = %detail, "{context}");
                let mut response = (status, Json(json!({ "error": context }))).into_response();
                response
                    .extensions_mut()
                    .insert(FaultDetail { context, detail });
                response
            }
            other => (status, Json(json!({ "error": other.to_string() }))).into_response(),
        }
    }
}

/// Pipeline stage that re-renders store faults with their raw detail.
///
/// Installed with the `EXPOSE_ERROR_DETAILS` flag as state; a no-op when the
/// flag is off.
pub async fn expose_fault_details(
    State(enabled): State<bool>,
    request: Request,
    next: Next,
) -> Response {
    let response = next.run(request).await;
    if !enabled {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let Some(FaultDetail { context, detail }) = parts.extensions.remove::<FaultDetail>() else {
        return Response::from_parts(parts, body);
    };
    let rendered = json!({ "error": context, "details": detail }).to_string();
    parts.headers.remove(header::CONTENT_LENGTH);
    Response::from_parts(parts, Body::from(rendered))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy_maps_to_statuses() {
        let cases = [
            (AuthError::InvalidCredentials("x"), StatusCode::UNAUTHORIZED),
            (AuthError::Unauthenticated("x".into()), StatusCode::UNAUTHORIZED),
            (AuthError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (AuthError::Conflict("x".into()), StatusCode::BAD_REQUEST),
            (AuthError::Forbidden("x".into()), StatusCode::FORBIDDEN),
            (AuthError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (
                AuthError::store_fault("Failed to save session", "boom"),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }

    #[tokio::test]
    async fn store_fault_body_hides_detail() {
        let response =
            AuthError::store_fault("Failed to save session", "relation \"session\" does not exist")
                .into_response();
        assert!(response.extensions().get::<FaultDetail>().is_some());

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body, json!({ "error": "Failed to save session" }));
    }

    #[test]
    fn repository_conflict_becomes_conflict() {
        let err: AuthError = RepositoryError::Conflict("Username already exists".into()).into();
        assert!(matches!(err, AuthError::Conflict(ref m) if m == "Username already exists"));
    }
}

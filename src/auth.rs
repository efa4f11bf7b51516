//! Bearer-token guard for the admin routes.

use std::sync::Arc;

use axum::extract::{FromRef, FromRequestParts};
use axum::http::StatusCode;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::{debug, warn};

/// The configured admin token. Empty means admin routes are closed.
#[derive(Clone, Default)]
pub struct AdminKey(Option<Arc<str>>);

impl AdminKey {
    pub fn new(token: Option<String>) -> Self {
        Self(token.filter(|t| !t.trim().is_empty()).map(Arc::from))
    }

    pub fn is_configured(&self) -> bool {
        self.0.is_some()
    }

    fn accepts(&self, presented: &str) -> bool {
        match &self.0 {
            Some(expected) => constant_time_eq(expected.as_bytes(), presented.as_bytes()),
            None => false,
        }
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Extractor that only succeeds for `Authorization: Bearer <admin token>`.
pub struct Admin;

#[derive(Debug)]
pub enum AuthError {
    MissingAuthorizationHeader,
    InvalidAuthorizationHeader,
    InvalidToken,
    NotConfigured,
}

impl<S> FromRequestParts<S> for Admin
where
    AdminKey: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let key = AdminKey::from_ref(state);
        if !key.is_configured() {
            return Err(AuthError::NotConfigured);
        }
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or_else(|| {
                debug!("missing Authorization header");
                AuthError::MissingAuthorizationHeader
            })?
            .to_str()
            .map_err(|_| AuthError::InvalidAuthorizationHeader)?;
        let token = header
            .strip_prefix("Bearer ")
            .ok_or(AuthError::InvalidAuthorizationHeader)?;
        if !key.accepts(token.trim()) {
            warn!(path = %parts.uri.path(), "rejected admin token");
            return Err(AuthError::InvalidToken);
        }
        Ok(Admin)
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let message = match self {
            AuthError::MissingAuthorizationHeader => "Missing Authorization header",
            AuthError::InvalidAuthorizationHeader => {
                "Invalid Authorization header format. Expected: 'Bearer <token>'"
            }
            AuthError::InvalidToken => "Invalid admin token",
            AuthError::NotConfigured => "Admin access is not configured",
        };
        let body = serde_json::json!({ "error": message, "code": "unauthorized" });
        (StatusCode::UNAUTHORIZED, Json(body)).into_response()
    }
}

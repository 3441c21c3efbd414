// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session gate: resolves the primary bearer token to an internal user.

use crate::error::AppError;
use crate::models::UserId;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

/// Cookie holding the primary access token (set by `/auth/callback`).
pub const ACCESS_TOKEN_COOKIE: &str = "sb-access-token";
/// Cookie holding the primary refresh token.
pub const REFRESH_TOKEN_COOKIE: &str = "sb-refresh-token";

/// Authenticated caller, inserted as a request extension.
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// Identity-provider subject
    pub auth_id: String,
    pub email: Option<String>,
    /// Internal user, if a `users` row exists for the subject
    pub user_id: Option<UserId>,
}

impl AuthUser {
    /// The internal user id, or [`AppError::NoInternalUser`].
    pub fn require_user(&self) -> Result<&UserId, AppError> {
        self.user_id.as_ref().ok_or(AppError::NoInternalUser)
    }
}

/// Extract the bearer token from the `Authorization` header. Session cookies
/// are never accepted here.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Verify the caller's primary token and look up the internal user.
pub async fn authenticate(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<AuthUser, AppError> {
    let token = bearer_token(headers).ok_or(AppError::MissingToken)?;
    let identity = state.auth.verify_token(token).await?;
    let user_id = state.store.find_user_id(&identity.subject).await?;

    Ok(AuthUser {
        auth_id: identity.subject,
        email: identity.email,
        user_id,
    })
}

/// Middleware that requires a valid primary session.
pub async fn require_session(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_user = authenticate(&state, request.headers()).await?;

    tracing::debug!(
        auth_id = %auth_user.auth_id,
        has_user = auth_user.user_id.is_some(),
        "Authenticated request"
    );

    request.extensions_mut().insert(auth_user);
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_header_only() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer from-header"),
        );
        assert_eq!(bearer_token(&headers), Some("from-header"));

        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("sb-access-token=from-cookie"),
        );
        assert_eq!(bearer_token(&headers), None);
    }

    #[test]
    fn test_non_bearer_header_is_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Basic dXNlcjpwYXNz"),
        );

        assert_eq!(bearer_token(&headers), None);
    }

    #[test]
    fn test_require_user() {
        let user = AuthUser {
            auth_id: "a".to_string(),
            email: None,
            user_id: None,
        };
        assert!(matches!(user.require_user(), Err(AppError::NoInternalUser)));
    }
}

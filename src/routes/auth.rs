// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Primary login routes: Supabase code exchange and session cookies.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Redirect,
    routing::{get, post},
    Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use std::sync::Arc;

use crate::error::AppError;
use crate::middleware::auth::{ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE};
use crate::models::NewUser;
use crate::routes::health_check;
use crate::services::identity::{AuthUserRecord, PrimarySession};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/health", get(health_check))
        .route("/auth/callback", get(auth_callback))
        .route("/auth/logout", post(logout))
}

#[derive(Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    code: Option<String>,
    /// PKCE verifier, when the frontend started the flow with one
    #[serde(default)]
    code_verifier: Option<String>,
}

/// Login callback - exchange the code for a session and set cookies.
///
/// Failures redirect to the login page with an `error` parameter.
async fn auth_callback(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(params): Query<CallbackParams>,
) -> (CookieJar, Redirect) {
    let frontend_url = &state.config.frontend_url;
    let login_error =
        |reason: &str| Redirect::temporary(&format!("{}/login?error={}", frontend_url, reason));

    let Some(code) = params.code.filter(|c| !c.is_empty()) else {
        tracing::warn!("Login callback without code");
        return (jar, login_error("missing_code"));
    };

    let session = match state
        .auth
        .exchange_code_for_session(&code, params.code_verifier.as_deref())
        .await
    {
        Ok(session) => session,
        Err(AppError::Provider { status_text }) => {
            return (jar, login_error(urlencoding::encode(&status_text).as_ref()));
        }
        Err(e) => {
            tracing::error!(error = %e, "Login code exchange failed");
            return (jar, login_error("unknown_error"));
        }
    };

    let Some(user) = session_user(&session) else {
        tracing::warn!("Login code exchange returned no session");
        return (jar, login_error("no_session"));
    };

    if let Err(e) = state.store.upsert_user(&new_user(user)).await {
        tracing::warn!(error = %e, auth_id = %user.id, "Failed to store user, continuing anyway");
    }

    tracing::info!(auth_id = %user.id, "Login successful");

    let secure = state.config.secure_cookies();
    let jar = jar
        .add(session_cookie(
            ACCESS_TOKEN_COOKIE,
            session.access_token.clone(),
            secure,
            Some(time::Duration::seconds(session.expires_in)),
        ))
        .add(session_cookie(
            REFRESH_TOKEN_COOKIE,
            session.refresh_token.clone(),
            secure,
            None,
        ));

    (
        jar,
        Redirect::temporary(&format!("{}/account", frontend_url)),
    )
}

/// Clear the session cookies.
async fn logout(jar: CookieJar) -> (CookieJar, StatusCode) {
    let jar = jar
        .remove(removal_cookie(ACCESS_TOKEN_COOKIE))
        .remove(removal_cookie(REFRESH_TOKEN_COOKIE));

    (jar, StatusCode::NO_CONTENT)
}

/// The session's user, if the exchange produced a usable session.
fn session_user(session: &PrimarySession) -> Option<&AuthUserRecord> {
    if session.access_token.is_empty() || session.refresh_token.is_empty() {
        return None;
    }
    session.user.as_ref()
}

fn new_user(user: &AuthUserRecord) -> NewUser {
    let metadata = &user.user_metadata;
    let username = metadata
        .display_name()
        .map(str::to_string)
        .or_else(|| {
            user.email
                .as_deref()
                .and_then(|e| e.split('@').next())
                .map(str::to_string)
        });

    NewUser {
        auth_id: user.id.clone(),
        email: user.email.clone(),
        username,
        spotify_id: metadata.provider_id.clone(),
        spotify_display_name: metadata.display_name().map(str::to_string),
        spotify_email: user.email.clone(),
        spotify_profile_image: metadata.avatar_url.clone(),
    }
}

fn session_cookie(
    name: &'static str,
    value: String,
    secure: bool,
    max_age: Option<time::Duration>,
) -> Cookie<'static> {
    let mut cookie = Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .build();
    if let Some(max_age) = max_age {
        cookie.set_max_age(max_age);
    }
    cookie
}

fn removal_cookie(name: &'static str) -> Cookie<'static> {
    Cookie::build((name, ""))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::identity::UserMetadata;

    fn record(name: Option<&str>, email: Option<&str>) -> AuthUserRecord {
        AuthUserRecord {
            id: "auth-1".to_string(),
            email: email.map(str::to_string),
            user_metadata: UserMetadata {
                name: name.map(str::to_string),
                full_name: None,
                avatar_url: Some("https://img/avatar.jpg".to_string()),
                provider_id: Some("sp-1".to_string()),
            },
        }
    }

    #[test]
    fn test_username_falls_back_to_email_local_part() {
        let user = new_user(&record(None, Some("listener@example.com")));
        assert_eq!(user.username.as_deref(), Some("listener"));
        assert_eq!(user.spotify_id.as_deref(), Some("sp-1"));
        assert_eq!(
            user.spotify_profile_image.as_deref(),
            Some("https://img/avatar.jpg")
        );

        let named = new_user(&record(Some("DJ Listener"), Some("listener@example.com")));
        assert_eq!(named.username.as_deref(), Some("DJ Listener"));
        assert_eq!(named.spotify_display_name.as_deref(), Some("DJ Listener"));
    }

    #[test]
    fn test_session_cookie_attributes() {
        let cookie = session_cookie(
            ACCESS_TOKEN_COOKIE,
            "token".to_string(),
            true,
            Some(time::Duration::seconds(3600)),
        );

        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.max_age(), Some(time::Duration::seconds(3600)));
    }
}

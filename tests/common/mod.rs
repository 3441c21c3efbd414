// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::body::Body;
use axum::http::{header, Request};
use axum::response::Response;
use chrono::{DateTime, Utc};
use httpmock::MockServer;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use ownifi_api::config::Config;
use ownifi_api::db::{ConnectionStore, MemoryStore};
use ownifi_api::models::{
    NewUser, ServiceLink, SpotifyConnection, SpotifyProfile, SpotifyTokens, UserId,
    SPOTIFY_SERVICE,
};
use ownifi_api::routes::create_router;
use ownifi_api::AppState;
use serde::Serialize;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// App wired to an in-memory store, with Spotify and Supabase Auth served by
/// one mock server.
#[allow(dead_code)]
pub struct TestApp {
    pub router: axum::Router,
    pub state: Arc<AppState>,
    pub store: Arc<MemoryStore>,
    pub server: MockServer,
}

/// Create a test app with the default (http) frontend URL.
#[allow(dead_code)]
pub async fn create_test_app() -> TestApp {
    create_test_app_with_frontend_url("http://localhost:3000").await
}

#[allow(dead_code)]
pub async fn create_test_app_with_frontend_url(frontend_url: &str) -> TestApp {
    let server = MockServer::start_async().await;

    let config = Config {
        frontend_url: frontend_url.to_string(),
        supabase_url: server.base_url(),
        spotify_accounts_url: server.base_url(),
        spotify_api_url: server.base_url(),
        ..Config::default()
    };

    let store = Arc::new(MemoryStore::new());
    let state = Arc::new(AppState::new(config, store.clone(), reqwest::Client::new()));

    TestApp {
        router: create_router(state.clone()),
        state,
        store,
        server,
    }
}

/// Create a Supabase-style access token for `auth_id`.
#[allow(dead_code)]
pub fn create_test_jwt(auth_id: &str) -> String {
    #[derive(Serialize)]
    struct Claims<'a> {
        sub: &'a str,
        email: String,
        aud: &'a str,
        exp: usize,
        iat: usize,
    }

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as usize;

    let claims = Claims {
        sub: auth_id,
        email: format!("{auth_id}@example.com"),
        aud: "authenticated",
        exp: now + 3600,
        iat: now,
    };

    let secret = Config::default().supabase_jwt_secret.unwrap();
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(&secret),
    )
    .unwrap()
}

/// Insert a `users` row for `auth_id`.
#[allow(dead_code)]
pub async fn seed_user(store: &MemoryStore, auth_id: &str) -> UserId {
    store
        .upsert_user(&NewUser {
            auth_id: auth_id.to_string(),
            email: Some(format!("{auth_id}@example.com")),
            username: Some(auth_id.to_string()),
            spotify_id: None,
            spotify_display_name: None,
            spotify_email: None,
            spotify_profile_image: None,
        })
        .await
        .unwrap()
}

/// Insert a full Spotify connection whose access token is `"stored-access"`.
#[allow(dead_code)]
pub async fn seed_connection(store: &MemoryStore, user_id: &UserId, expires_at: DateTime<Utc>) {
    let now = Utc::now();
    store
        .replace_connection(&SpotifyConnection {
            tokens: SpotifyTokens {
                user_id: user_id.clone(),
                access_token: "stored-access".to_string(),
                refresh_token: "stored-refresh".to_string(),
                expires_at,
                last_refresh_at: now,
                refresh_count: 0,
                scopes: vec!["user-library-read".to_string()],
            },
            profile: SpotifyProfile {
                user_id: user_id.clone(),
                spotify_id: "sp-seeded".to_string(),
                display_name: Some("Seeded".to_string()),
                email: None,
                profile_image_url: None,
            },
            link: ServiceLink {
                user_id: user_id.clone(),
                service: SPOTIFY_SERVICE.to_string(),
                connected_at: now,
                last_synced_at: now,
            },
        })
        .await
        .unwrap();
}

/// Build a request, optionally with a bearer token.
#[allow(dead_code)]
pub fn request(method: &str, uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

#[allow(dead_code)]
pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Value of the `Location` header.
#[allow(dead_code)]
pub fn location(response: &Response) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .expect("missing Location header")
        .to_str()
        .unwrap()
        .to_string()
}

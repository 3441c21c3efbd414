// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Spotify accounts and Web API client.
//!
//! Handles:
//! - Authorization URL construction and code exchange
//! - Token refresh when expiring (5-minute margin)
//! - Token revocation on disconnect
//! - Authenticated Web API calls with a typed response

use crate::config::Config;
use crate::error::AppError;
use crate::models::Image;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Deserialize;

/// OAuth scopes requested when connecting an account.
pub const SCOPES: &[&str] = &[
    "ugc-image-upload",
    "user-read-recently-played",
    "user-top-read",
    "user-read-private",
    "user-read-email",
    "user-library-read",
    "user-library-modify",
    "playlist-read-private",
    "playlist-read-collaborative",
    "playlist-modify-public",
    "playlist-modify-private",
    "user-follow-modify",
    "user-follow-read",
];

/// Spotify API client.
#[derive(Clone)]
pub struct SpotifyClient {
    http: reqwest::Client,
    accounts_url: String,
    api_url: String,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
}

impl SpotifyClient {
    /// Create a new Spotify client with OAuth credentials from `config`.
    pub fn new(http: reqwest::Client, config: &Config) -> Self {
        Self {
            http,
            accounts_url: config.spotify_accounts_url.trim_end_matches('/').to_string(),
            api_url: config.spotify_api_url.trim_end_matches('/').to_string(),
            client_id: config.spotify_client_id.clone(),
            client_secret: config.spotify_client_secret.clone(),
            redirect_uri: config.spotify_redirect_uri.clone(),
        }
    }

    /// URL of the Spotify consent page for the full scope list.
    pub fn authorize_url(&self, state: &str) -> String {
        format!(
            "{}/authorize?client_id={}&response_type=code&redirect_uri={}&scope={}&show_dialog=true&state={}",
            self.accounts_url,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode(&SCOPES.join(" ")),
            urlencoding::encode(state),
        )
    }

    /// Exchange an authorization code for tokens.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenGrant, AppError> {
        let response = self
            .http
            .post(format!("{}/api/token", self.accounts_url))
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.redirect_uri.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Token exchange request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Spotify token exchange failed");
            return Err(AppError::Provider {
                status_text: reason(status),
            });
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("Failed to parse token response: {}", e)))
    }

    /// Refresh an expiring access token.
    ///
    /// Any non-success status is [`AppError::RefreshFailed`]; the refresh
    /// token should be considered dead.
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<TokenGrant, AppError> {
        let response = self
            .http
            .post(format!("{}/api/token", self.accounts_url))
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ])
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Token refresh request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::RefreshFailed(format!("HTTP {}: {}", status, body)));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("Failed to parse refresh response: {}", e)))
    }

    /// Revoke an access token.
    pub async fn revoke_token(&self, access_token: &str) -> Result<(), AppError> {
        let response = self
            .http
            .post(format!("{}/api/token/revoke", self.accounts_url))
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[
                ("token", access_token),
                ("token_type_hint", "access_token"),
            ])
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Revoke request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Provider {
                status_text: reason(response.status()),
            });
        }

        tracing::info!("Spotify token revoked");
        Ok(())
    }

    /// Get the profile of the user that owns `access_token`.
    pub async fn get_current_user(&self, access_token: &str) -> Result<SpotifyUser, AppError> {
        self.send(access_token, "/me", ProviderRequest::get()).await
    }

    /// Send a Web API request and parse the JSON response.
    pub async fn send<T: DeserializeOwned>(
        &self,
        access_token: &str,
        path: &str,
        request: ProviderRequest,
    ) -> Result<T, AppError> {
        let url = format!("{}{}", self.api_url, path);

        let mut builder = self
            .http
            .request(request.method, &url)
            .headers(provider_headers(request.headers))
            .bearer_auth(access_token);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Spotify request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(status = %status, path, "Spotify API returned error");
            return Err(AppError::Provider {
                status_text: reason(status),
            });
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("JSON parse error: {}", e)))
    }
}

/// Caller headers with `Authorization` removed and a JSON content type unless
/// the caller set one.
fn provider_headers(mut headers: HeaderMap) -> HeaderMap {
    headers.remove(AUTHORIZATION);
    if !headers.contains_key(CONTENT_TYPE) {
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    }
    headers
}

fn reason(status: reqwest::StatusCode) -> String {
    status
        .canonical_reason()
        .map(str::to_string)
        .unwrap_or_else(|| status.as_str().to_string())
}

/// Description of one Web API call (method, query, headers and body).
#[derive(Debug, Clone)]
pub struct ProviderRequest {
    pub method: Method,
    pub query: Vec<(String, String)>,
    pub headers: HeaderMap,
    pub body: Option<serde_json::Value>,
}

impl Default for ProviderRequest {
    fn default() -> Self {
        Self::get()
    }
}

impl ProviderRequest {
    pub fn get() -> Self {
        Self::new(Method::GET)
    }

    pub fn new(method: Method) -> Self {
        Self {
            method,
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// Token response from the accounts service (code exchange or refresh).
#[derive(Debug, Clone, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    /// Absent on refresh unless Spotify rotated it
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Lifetime in seconds
    pub expires_in: i64,
    /// Space-separated granted scopes
    #[serde(default)]
    pub scope: Option<String>,
}

/// Current user profile (`GET /me`).
#[derive(Debug, Clone, Deserialize)]
pub struct SpotifyUser {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub images: Vec<Image>,
}

// ─────────────────────────────────────────────────────────────────────────────
// SpotifyService - High-level service with token management
// ─────────────────────────────────────────────────────────────────────────────

use crate::db::ConnectionStore;
use crate::models::{Page, SavedTrack, TokenRefresh, UserId};
use crate::services::{lock_user, UserLocks};
use chrono::{Duration, Utc};
use std::sync::Arc;

/// Margin before token expiration when we proactively refresh (5 minutes).
pub const TOKEN_REFRESH_MARGIN_SECS: i64 = 5 * 60;

/// High-level Spotify service that manages the token lifecycle and API calls.
///
/// This service encapsulates:
/// - Token retrieval from the row store
/// - Automatic refresh when expiring (with 5-minute margin)
/// - Per-user locking to prevent duplicate refresh calls
/// - Authenticated Web API calls
#[derive(Clone)]
pub struct SpotifyService {
    client: SpotifyClient,
    store: Arc<dyn ConnectionStore>,
    /// Per-user locks shared with [`ConnectionService`](super::ConnectionService),
    /// so a refresh never interleaves with a connect or disconnect.
    locks: UserLocks,
}

impl SpotifyService {
    pub fn new(
        client: SpotifyClient,
        store: Arc<dyn ConnectionStore>,
        locks: UserLocks,
    ) -> Self {
        Self {
            client,
            store,
            locks,
        }
    }

    pub fn client(&self) -> &SpotifyClient {
        &self.client
    }

    // ─── Token Management ────────────────────────────────────────────────────

    /// Get an access token that is valid for at least the refresh margin.
    ///
    /// 1. Read the token row (fast path when not expiring)
    /// 2. Acquire the per-user lock (shared with connect and disconnect)
    /// 3. Re-read the row; another task may have refreshed while we waited
    /// 4. Refresh with Spotify and persist the result in one write
    pub async fn get_valid_access_token(&self, user_id: &UserId) -> Result<String, AppError> {
        let margin = Duration::seconds(TOKEN_REFRESH_MARGIN_SECS);

        let tokens = self
            .store
            .get_tokens(user_id)
            .await?
            .ok_or(AppError::NotConnected)?;

        if !tokens.expires_within(Utc::now(), margin) {
            return Ok(tokens.access_token);
        }

        let _guard = lock_user(&self.locks, user_id).await;

        let tokens = self
            .store
            .get_tokens(user_id)
            .await?
            .ok_or(AppError::NotConnected)?;

        let now = Utc::now();
        if !tokens.expires_within(now, margin) {
            // Another task already refreshed
            return Ok(tokens.access_token);
        }

        tracing::info!(user_id = %user_id, "Access token expiring, refreshing");

        let grant = self.client.refresh_token(&tokens.refresh_token).await?;

        let refresh = TokenRefresh {
            access_token: grant.access_token.clone(),
            refresh_token: grant.refresh_token,
            expires_at: now + Duration::seconds(grant.expires_in),
            last_refresh_at: now,
            refresh_count: tokens.refresh_count + 1,
        };

        self.store.update_tokens(user_id, &refresh).await?;

        tracing::info!(
            user_id = %user_id,
            refresh_count = refresh.refresh_count,
            "Token refreshed"
        );
        Ok(grant.access_token)
    }

    // ─── API Wrappers ────────────────────────────────────────────────────────

    /// Call the Web API on behalf of `user_id`.
    pub async fn call_provider<T: DeserializeOwned>(
        &self,
        user_id: &UserId,
        path: &str,
        request: ProviderRequest,
    ) -> Result<T, AppError> {
        let access_token = self.get_valid_access_token(user_id).await?;
        self.client.send(&access_token, path, request).await
    }

    /// One page of the user's saved tracks.
    pub async fn saved_tracks(
        &self,
        user_id: &UserId,
        limit: u32,
        offset: u32,
    ) -> Result<Page<SavedTrack>, AppError> {
        let request = ProviderRequest::get()
            .query("limit", limit)
            .query("offset", offset);
        self.call_provider(user_id, "/me/tracks", request).await
    }
}

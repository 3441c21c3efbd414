// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Spotify connection lifecycle: connect, disconnect and status.
//!
//! All mutations for one user run under that user's lock, which token
//! refresh also takes. A connect racing a disconnect, a refresh or another
//! connect always ends with either zero or exactly one token/profile/link
//! triple from a single grant.

use crate::db::ConnectionStore;
use crate::error::AppError;
use crate::models::{
    ServiceLink, SpotifyConnection, SpotifyProfile, SpotifyTokens, UserId, SPOTIFY_SERVICE,
};
use crate::services::spotify::{SpotifyClient, SCOPES};
use crate::services::{lock_user, UserLocks};
use chrono::{Duration, Utc};
use std::sync::Arc;

#[derive(Clone)]
pub struct ConnectionService {
    client: SpotifyClient,
    store: Arc<dyn ConnectionStore>,
    locks: UserLocks,
}

impl ConnectionService {
    pub fn new(client: SpotifyClient, store: Arc<dyn ConnectionStore>, locks: UserLocks) -> Self {
        Self {
            client,
            store,
            locks,
        }
    }

    /// Link a Spotify account using an authorization code.
    ///
    /// Any existing connection for the user is replaced. Every failure is
    /// reported as [`AppError::ConnectionFailed`].
    pub async fn connect(&self, user_id: &UserId, code: &str) -> Result<(), AppError> {
        let _guard = lock_user(&self.locks, user_id).await;

        self.connect_locked(user_id, code).await.map_err(|e| {
            tracing::error!(user_id = %user_id, error = %e, "Spotify connect failed");
            match e {
                AppError::ConnectionFailed(_) => e,
                other => AppError::ConnectionFailed(other.to_string()),
            }
        })
    }

    async fn connect_locked(&self, user_id: &UserId, code: &str) -> Result<(), AppError> {
        let grant = self.client.exchange_code(code).await?;
        let refresh_token = grant.refresh_token.clone().ok_or_else(|| {
            AppError::ConnectionFailed("token response has no refresh token".to_string())
        })?;

        let spotify_user = self.client.get_current_user(&grant.access_token).await?;

        let now = Utc::now();
        let scopes = match grant.scope.as_deref() {
            Some(scope) if !scope.trim().is_empty() => {
                scope.split_whitespace().map(str::to_string).collect()
            }
            _ => SCOPES.iter().map(|s| s.to_string()).collect(),
        };

        let connection = SpotifyConnection {
            tokens: SpotifyTokens {
                user_id: user_id.clone(),
                access_token: grant.access_token,
                refresh_token,
                expires_at: now + Duration::seconds(grant.expires_in),
                last_refresh_at: now,
                refresh_count: 0,
                scopes,
            },
            profile: SpotifyProfile {
                user_id: user_id.clone(),
                spotify_id: spotify_user.id.clone(),
                display_name: spotify_user.display_name,
                email: spotify_user.email,
                profile_image_url: spotify_user.images.into_iter().next().map(|i| i.url),
            },
            link: ServiceLink {
                user_id: user_id.clone(),
                service: SPOTIFY_SERVICE.to_string(),
                connected_at: now,
                last_synced_at: now,
            },
        };

        self.store.replace_connection(&connection).await?;

        tracing::info!(
            user_id = %user_id,
            spotify_id = %spotify_user.id,
            "Spotify account connected"
        );
        Ok(())
    }

    /// Remove the user's connection and revoke the access token if one was stored.
    ///
    /// Succeeds when nothing was connected. Revocation is best effort.
    pub async fn disconnect(&self, user_id: &UserId) -> Result<(), AppError> {
        let _guard = lock_user(&self.locks, user_id).await;

        let access_token = match self.store.get_tokens(user_id).await {
            Ok(tokens) => tokens.map(|t| t.access_token),
            Err(e) => {
                tracing::warn!(user_id = %user_id, error = %e, "Could not read tokens before disconnect");
                None
            }
        };

        self.store.delete_connection(user_id).await?;

        if let Some(token) = access_token {
            if let Err(e) = self.client.revoke_token(&token).await {
                tracing::warn!(
                    user_id = %user_id,
                    error = %e,
                    "Failed to revoke Spotify token (continuing)"
                );
            }
        }

        tracing::info!(user_id = %user_id, "Spotify account disconnected");
        Ok(())
    }

    /// Drop a connection whose refresh token Spotify has rejected.
    pub async fn discard_stale(&self, user_id: &UserId) -> Result<(), AppError> {
        let _guard = lock_user(&self.locks, user_id).await;

        self.store.delete_connection(user_id).await?;
        tracing::warn!(user_id = %user_id, "Removed Spotify connection after refresh rejection");
        Ok(())
    }

    /// The connected profile, if any. A caller without an internal user is
    /// simply not connected.
    pub async fn status(
        &self,
        user_id: Option<&UserId>,
    ) -> Result<Option<SpotifyProfile>, AppError> {
        match user_id {
            Some(user_id) => self.store.get_profile(user_id).await,
            None => Ok(None),
        }
    }
}

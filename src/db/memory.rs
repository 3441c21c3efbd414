// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process row store.
//!
//! Rows are kept in plain vectors (no uniqueness enforced by the container)
//! so tests can observe duplicate rows if a caller forgets to delete before
//! inserting. The whole connection row set is replaced under one write lock.

use crate::db::ConnectionStore;
use crate::error::AppError;
use crate::models::{
    NewUser, ServiceLink, SpotifyConnection, SpotifyProfile, SpotifyTokens, TokenRefresh, User,
    UserId,
};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    tokens: Vec<SpotifyTokens>,
    profiles: Vec<SpotifyProfile>,
    services: Vec<ServiceLink>,
}

/// Number of connection rows held for one user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RowCounts {
    pub tokens: usize,
    pub profiles: usize,
    pub services: usize,
}

/// Row store held in memory.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    token_writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of writes (inserts and updates) made to the tokens table.
    pub fn token_writes(&self) -> usize {
        self.token_writes.load(Ordering::SeqCst)
    }

    /// Count the token/profile/service rows held for `user_id`.
    pub async fn row_counts(&self, user_id: &UserId) -> RowCounts {
        let tables = self.tables.read().await;
        RowCounts {
            tokens: tables.tokens.iter().filter(|t| &t.user_id == user_id).count(),
            profiles: tables.profiles.iter().filter(|p| &p.user_id == user_id).count(),
            services: tables.services.iter().filter(|s| &s.user_id == user_id).count(),
        }
    }

    /// Look up a user row by internal id.
    pub async fn get_user(&self, user_id: &UserId) -> Option<User> {
        let tables = self.tables.read().await;
        tables.users.iter().find(|u| &u.id == user_id).cloned()
    }
}

#[async_trait]
impl ConnectionStore for MemoryStore {
    async fn find_user_id(&self, auth_id: &str) -> Result<Option<UserId>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .iter()
            .find(|u| u.auth_id == auth_id)
            .map(|u| u.id.clone()))
    }

    async fn upsert_user(&self, user: &NewUser) -> Result<UserId, AppError> {
        let mut tables = self.tables.write().await;

        if let Some(existing) = tables.users.iter_mut().find(|u| u.auth_id == user.auth_id) {
            existing.email = user.email.clone();
            existing.username = user.username.clone();
            existing.spotify_id = user.spotify_id.clone();
            existing.spotify_display_name = user.spotify_display_name.clone();
            existing.spotify_email = user.spotify_email.clone();
            existing.spotify_profile_image = user.spotify_profile_image.clone();
            return Ok(existing.id.clone());
        }

        let id = UserId::new(uuid::Uuid::new_v4().to_string());
        tables.users.push(User {
            id: id.clone(),
            auth_id: user.auth_id.clone(),
            email: user.email.clone(),
            username: user.username.clone(),
            spotify_id: user.spotify_id.clone(),
            spotify_display_name: user.spotify_display_name.clone(),
            spotify_email: user.spotify_email.clone(),
            spotify_profile_image: user.spotify_profile_image.clone(),
        });
        Ok(id)
    }

    async fn get_tokens(&self, user_id: &UserId) -> Result<Option<SpotifyTokens>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables.tokens.iter().find(|t| &t.user_id == user_id).cloned())
    }

    async fn update_tokens(
        &self,
        user_id: &UserId,
        refresh: &TokenRefresh,
    ) -> Result<(), AppError> {
        let mut tables = self.tables.write().await;
        self.token_writes.fetch_add(1, Ordering::SeqCst);

        for row in tables.tokens.iter_mut().filter(|t| &t.user_id == user_id) {
            row.access_token = refresh.access_token.clone();
            if let Some(refresh_token) = &refresh.refresh_token {
                row.refresh_token = refresh_token.clone();
            }
            row.expires_at = refresh.expires_at;
            row.last_refresh_at = refresh.last_refresh_at;
            row.refresh_count = refresh.refresh_count;
        }
        Ok(())
    }

    async fn get_profile(&self, user_id: &UserId) -> Result<Option<SpotifyProfile>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables
            .profiles
            .iter()
            .find(|p| &p.user_id == user_id)
            .cloned())
    }

    async fn replace_connection(&self, connection: &SpotifyConnection) -> Result<(), AppError> {
        let mut tables = self.tables.write().await;
        let user_id = &connection.tokens.user_id;

        tables.tokens.retain(|t| &t.user_id != user_id);
        tables.profiles.retain(|p| &p.user_id != user_id);
        tables
            .services
            .retain(|s| !(&s.user_id == user_id && s.service == connection.link.service));

        tables.tokens.push(connection.tokens.clone());
        tables.profiles.push(connection.profile.clone());
        tables.services.push(connection.link.clone());
        self.token_writes.fetch_add(1, Ordering::SeqCst);

        Ok(())
    }

    async fn delete_connection(&self, user_id: &UserId) -> Result<(), AppError> {
        let mut tables = self.tables.write().await;
        tables.tokens.retain(|t| &t.user_id != user_id);
        tables.profiles.retain(|p| &p.user_id != user_id);
        tables
            .services
            .retain(|s| !(&s.user_id == user_id && s.service == crate::models::SPOTIFY_SERVICE));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(auth_id: &str) -> NewUser {
        NewUser {
            auth_id: auth_id.to_string(),
            email: Some(format!("{auth_id}@example.com")),
            username: Some(auth_id.to_string()),
            spotify_id: None,
            spotify_display_name: None,
            spotify_email: None,
            spotify_profile_image: None,
        }
    }

    #[tokio::test]
    async fn test_upsert_user_is_keyed_by_auth_id() {
        let store = MemoryStore::new();

        let first = store.upsert_user(&new_user("auth-1")).await.unwrap();
        let mut changed = new_user("auth-1");
        changed.username = Some("renamed".to_string());
        let second = store.upsert_user(&changed).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(store.find_user_id("auth-1").await.unwrap(), Some(first.clone()));
        assert_eq!(
            store.get_user(&first).await.unwrap().username.as_deref(),
            Some("renamed")
        );
        assert_eq!(store.find_user_id("auth-2").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_delete_connection_without_rows_is_ok() {
        let store = MemoryStore::new();
        let user_id = UserId::new("nobody");

        store.delete_connection(&user_id).await.unwrap();
        assert_eq!(store.row_counts(&user_id).await, RowCounts::default());
    }
}

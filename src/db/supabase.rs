// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Supabase (PostgREST) client wrapper with typed row operations.
//!
//! Provides high-level operations for:
//! - Users (identity-provider subject → internal id)
//! - Spotify tokens (refreshable OAuth credentials)
//! - Spotify profiles and the `user_services` marker

use crate::db::{tables, ConnectionStore};
use crate::error::AppError;
use crate::models::{
    NewUser, SpotifyConnection, SpotifyProfile, SpotifyTokens, TokenRefresh, User, UserId,
    SPOTIFY_SERVICE,
};
use async_trait::async_trait;
use futures_util::future::try_join_all;
use reqwest::{Method, RequestBuilder};
use serde::{de::DeserializeOwned, Serialize};

/// PostgREST row store backed by the Supabase project.
#[derive(Clone)]
pub struct SupabaseStore {
    http: reqwest::Client,
    rest_url: String,
    service_key: String,
}

impl SupabaseStore {
    /// Create a store for the project at `supabase_url` using the service-role key.
    pub fn new(http: reqwest::Client, supabase_url: &str, service_key: impl Into<String>) -> Self {
        let rest_url = format!("{}/rest/v1", supabase_url.trim_end_matches('/'));
        tracing::info!(rest_url = %rest_url, "Configured Supabase row store");

        Self {
            http,
            rest_url,
            service_key: service_key.into(),
        }
    }

    fn request(&self, method: Method, table: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}/{}", self.rest_url, table))
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
    }

    /// Fetch at most one row matching all `filters`.
    async fn select_one<T: DeserializeOwned>(
        &self,
        table: &str,
        filters: &[(&str, String)],
    ) -> Result<Option<T>, AppError> {
        let response = self
            .request(Method::GET, table)
            .query(&[("select", "*"), ("limit", "1")])
            .query(filters)
            .send()
            .await
            .map_err(|e| AppError::Database(format!("select from {}: {}", table, e)))?;

        let rows: Vec<T> = check_response(response, table)
            .await?
            .json()
            .await
            .map_err(|e| AppError::Database(format!("decode {} row: {}", table, e)))?;

        Ok(rows.into_iter().next())
    }

    async fn insert<T: Serialize + Sync>(&self, table: &str, row: &T) -> Result<(), AppError> {
        let response = self
            .request(Method::POST, table)
            .header("Prefer", "return=minimal")
            .json(row)
            .send()
            .await
            .map_err(|e| AppError::Database(format!("insert into {}: {}", table, e)))?;

        check_response(response, table).await?;
        Ok(())
    }

    async fn update<T: Serialize + Sync>(
        &self,
        table: &str,
        filters: &[(&str, String)],
        patch: &T,
    ) -> Result<(), AppError> {
        let response = self
            .request(Method::PATCH, table)
            .header("Prefer", "return=minimal")
            .query(filters)
            .json(patch)
            .send()
            .await
            .map_err(|e| AppError::Database(format!("update {}: {}", table, e)))?;

        check_response(response, table).await?;
        Ok(())
    }

    async fn delete(&self, table: &str, filters: &[(&str, String)]) -> Result<(), AppError> {
        let response = self
            .request(Method::DELETE, table)
            .query(filters)
            .send()
            .await
            .map_err(|e| AppError::Database(format!("delete from {}: {}", table, e)))?;

        check_response(response, table).await?;
        Ok(())
    }

    /// Delete the token, profile and service-link rows concurrently.
    async fn delete_connection_rows(&self, user_id: &UserId) -> Result<(), AppError> {
        let by_user = [("user_id", eq(user_id))];
        let by_user_and_service = [("user_id", eq(user_id)), ("service", eq(SPOTIFY_SERVICE))];

        try_join_all([
            self.delete(tables::SPOTIFY_TOKENS, &by_user),
            self.delete(tables::SPOTIFY_PROFILES, &by_user),
            self.delete(tables::USER_SERVICES, &by_user_and_service),
        ])
        .await?;

        Ok(())
    }
}

/// PostgREST equality filter value.
fn eq(value: impl std::fmt::Display) -> String {
    format!("eq.{}", value)
}

/// Check response status and return a database error if not successful.
async fn check_response(
    response: reqwest::Response,
    table: &str,
) -> Result<reqwest::Response, AppError> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Err(AppError::Database(format!(
        "{} request failed with HTTP {}: {}",
        table, status, body
    )))
}

#[async_trait]
impl ConnectionStore for SupabaseStore {
    async fn find_user_id(&self, auth_id: &str) -> Result<Option<UserId>, AppError> {
        let user: Option<User> = self
            .select_one(tables::USERS, &[("auth_id", eq(auth_id))])
            .await?;
        Ok(user.map(|u| u.id))
    }

    async fn upsert_user(&self, user: &NewUser) -> Result<UserId, AppError> {
        let response = self
            .request(Method::POST, tables::USERS)
            .query(&[("on_conflict", "auth_id")])
            .header("Prefer", "resolution=merge-duplicates,return=representation")
            .json(user)
            .send()
            .await
            .map_err(|e| AppError::Database(format!("upsert user: {}", e)))?;

        let rows: Vec<User> = check_response(response, tables::USERS)
            .await?
            .json()
            .await
            .map_err(|e| AppError::Database(format!("decode upserted user: {}", e)))?;

        rows.into_iter()
            .next()
            .map(|u| u.id)
            .ok_or_else(|| AppError::Database("upsert returned no user row".to_string()))
    }

    async fn get_tokens(&self, user_id: &UserId) -> Result<Option<SpotifyTokens>, AppError> {
        self.select_one(tables::SPOTIFY_TOKENS, &[("user_id", eq(user_id))])
            .await
    }

    async fn update_tokens(
        &self,
        user_id: &UserId,
        refresh: &TokenRefresh,
    ) -> Result<(), AppError> {
        self.update(tables::SPOTIFY_TOKENS, &[("user_id", eq(user_id))], refresh)
            .await
    }

    async fn get_profile(&self, user_id: &UserId) -> Result<Option<SpotifyProfile>, AppError> {
        self.select_one(tables::SPOTIFY_PROFILES, &[("user_id", eq(user_id))])
            .await
    }

    /// PostgREST has no multi-table transaction, so this is delete-then-insert.
    /// A failure between the two phases leaves the user disconnected, never
    /// attached to stale tokens.
    async fn replace_connection(&self, connection: &SpotifyConnection) -> Result<(), AppError> {
        self.delete_connection_rows(&connection.tokens.user_id)
            .await?;

        tokio::try_join!(
            self.insert(tables::SPOTIFY_TOKENS, &connection.tokens),
            self.insert(tables::SPOTIFY_PROFILES, &connection.profile),
            self.insert(tables::USER_SERVICES, &connection.link),
        )?;

        Ok(())
    }

    async fn delete_connection(&self, user_id: &UserId) -> Result<(), AppError> {
        self.delete_connection_rows(user_id).await
    }
}

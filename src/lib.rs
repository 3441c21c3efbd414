// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Ownifi API: Spotify connection and saved-tracks library backend.
//!
//! This crate signs users in through Supabase Auth, links their Spotify
//! account, keeps the Spotify tokens fresh and proxies library requests.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use config::Config;
use db::ConnectionStore;
use services::{ConnectionService, SpotifyClient, SpotifyService, SupabaseAuth, UserLocks};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn ConnectionStore>,
    pub auth: SupabaseAuth,
    pub spotify: SpotifyService,
    pub connections: ConnectionService,
}

impl AppState {
    /// Wire the services around a row store and a shared HTTP client.
    pub fn new(config: Config, store: Arc<dyn ConnectionStore>, http: reqwest::Client) -> Self {
        let client = SpotifyClient::new(http.clone(), &config);
        let auth = SupabaseAuth::new(http, &config);

        // Refresh and connection changes serialize on the same per-user lock
        let locks: UserLocks = Arc::new(dashmap::DashMap::new());
        let spotify = SpotifyService::new(client.clone(), store.clone(), locks.clone());
        let connections = ConnectionService::new(client, store.clone(), locks);

        Self {
            config,
            store,
            auth,
            spotify,
            connections,
        }
    }
}

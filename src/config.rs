// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! Secrets (Spotify client secret, Supabase service key, state signing key)
//! are read once at startup and kept in memory.

use std::env;
use std::time::Duration;

const DEFAULT_FRONTEND_URL: &str = "http://localhost:3000";
const DEFAULT_PORT: u16 = 3030;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_SPOTIFY_ACCOUNTS_URL: &str = "https://accounts.spotify.com";
pub const DEFAULT_SPOTIFY_API_URL: &str = "https://api.spotify.com/v1";

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// Spotify OAuth client ID (public)
    pub spotify_client_id: String,
    /// Where Spotify sends the user after authorization (a frontend page)
    pub spotify_redirect_uri: String,
    /// Spotify accounts service base URL (authorize, token, revoke)
    pub spotify_accounts_url: String,
    /// Spotify Web API base URL
    pub spotify_api_url: String,
    /// Frontend URL for OAuth redirects
    pub frontend_url: String,
    /// Supabase project URL (REST and Auth live under it)
    pub supabase_url: String,
    /// Server port
    pub port: u16,
    /// Timeout applied to every outbound HTTP call
    pub http_timeout: Duration,

    // --- Secrets ---
    /// Spotify OAuth client secret
    pub spotify_client_secret: String,
    /// Supabase service-role key used for row access
    pub supabase_service_key: String,
    /// Supabase JWT secret; when set, bearer tokens are verified locally
    pub supabase_jwt_secret: Option<Vec<u8>>,
    /// HMAC key for signing the Spotify OAuth `state` parameter (raw bytes)
    pub oauth_state_key: Vec<u8>,
}

impl Default for Config {
    /// Default config for testing only.
    fn default() -> Self {
        Self {
            spotify_client_id: "test_client_id".to_string(),
            spotify_redirect_uri: format!("{}/auth/spotify-callback", DEFAULT_FRONTEND_URL),
            spotify_accounts_url: DEFAULT_SPOTIFY_ACCOUNTS_URL.to_string(),
            spotify_api_url: DEFAULT_SPOTIFY_API_URL.to_string(),
            frontend_url: DEFAULT_FRONTEND_URL.to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            port: DEFAULT_PORT,
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            spotify_client_secret: "test_secret".to_string(),
            supabase_service_key: "test_service_key".to_string(),
            supabase_jwt_secret: Some(b"test_jwt_secret_32_bytes_minimum!".to_vec()),
            oauth_state_key: b"test_state_key_32_bytes_minimum!".to_vec(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// A `.env` file in the working directory is honored for local development.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let frontend_url = env::var("FRONTEND_URL")
            .map(|v| v.trim_end_matches('/').to_string())
            .unwrap_or_else(|_| DEFAULT_FRONTEND_URL.to_string());

        let spotify_redirect_uri = env::var("SPOTIFY_REDIRECT_URI")
            .unwrap_or_else(|_| format!("{}/auth/spotify-callback", frontend_url));

        let port = match env::var("PORT") {
            Ok(raw) => raw
                .parse()
                .map_err(|_| ConfigError::Invalid("PORT", raw))?,
            Err(_) => DEFAULT_PORT,
        };

        let http_timeout_secs = match env::var("HTTP_TIMEOUT_SECS") {
            Ok(raw) => raw
                .parse()
                .map_err(|_| ConfigError::Invalid("HTTP_TIMEOUT_SECS", raw))?,
            Err(_) => DEFAULT_HTTP_TIMEOUT_SECS,
        };

        Ok(Self {
            spotify_client_id: required("SPOTIFY_CLIENT_ID")?,
            spotify_redirect_uri,
            spotify_accounts_url: env::var("SPOTIFY_ACCOUNTS_URL")
                .unwrap_or_else(|_| DEFAULT_SPOTIFY_ACCOUNTS_URL.to_string()),
            spotify_api_url: env::var("SPOTIFY_API_URL")
                .unwrap_or_else(|_| DEFAULT_SPOTIFY_API_URL.to_string()),
            frontend_url,
            supabase_url: required("SUPABASE_URL")?
                .trim_end_matches('/')
                .to_string(),
            port,
            http_timeout: Duration::from_secs(http_timeout_secs),

            spotify_client_secret: required("SPOTIFY_CLIENT_SECRET")?,
            supabase_service_key: required("SUPABASE_SERVICE_ROLE_KEY")?,
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .ok()
                .map(|v| v.trim().as_bytes().to_vec())
                .filter(|v| !v.is_empty()),
            oauth_state_key: required("OAUTH_STATE_KEY")?.into_bytes(),
        })
    }

    /// Whether cookies should carry the `Secure` attribute.
    pub fn secure_cookies(&self) -> bool {
        self.frontend_url.starts_with("https://")
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name)
        .map(|v| v.trim().to_string())
        .map_err(|_| ConfigError::Missing(name))
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}

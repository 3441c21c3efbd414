//! Database layer (hosted row store).
//!
//! [`ConnectionStore`] is the seam between the services and the store.
//! [`SupabaseStore`] talks to the hosted Postgres through PostgREST;
//! [`MemoryStore`] keeps rows in process (used by the test suite).

pub mod memory;
pub mod supabase;

pub use memory::{MemoryStore, RowCounts};
pub use supabase::SupabaseStore;

use crate::error::AppError;
use crate::models::{NewUser, SpotifyConnection, SpotifyProfile, SpotifyTokens, TokenRefresh, UserId};
use async_trait::async_trait;

/// Table names as constants.
pub mod tables {
    pub const USERS: &str = "users";
    pub const SPOTIFY_TOKENS: &str = "spotify_tokens";
    pub const SPOTIFY_PROFILES: &str = "spotify_profiles";
    /// Integration markers, unique per (user_id, service)
    pub const USER_SERVICES: &str = "user_services";
}

/// Row-level operations used by the session gate and the Spotify services.
#[async_trait]
pub trait ConnectionStore: Send + Sync {
    // ─── Users ───────────────────────────────────────────────────

    /// Look up the internal user id for an identity-provider subject.
    async fn find_user_id(&self, auth_id: &str) -> Result<Option<UserId>, AppError>;

    /// Create or update the user keyed by `auth_id`, returning its id.
    async fn upsert_user(&self, user: &NewUser) -> Result<UserId, AppError>;

    // ─── Tokens ──────────────────────────────────────────────────

    async fn get_tokens(&self, user_id: &UserId) -> Result<Option<SpotifyTokens>, AppError>;

    /// Persist a refreshed access token. One write.
    async fn update_tokens(&self, user_id: &UserId, refresh: &TokenRefresh)
        -> Result<(), AppError>;

    // ─── Profile ─────────────────────────────────────────────────

    async fn get_profile(&self, user_id: &UserId) -> Result<Option<SpotifyProfile>, AppError>;

    // ─── Connection row set ──────────────────────────────────────

    /// Remove any existing token/profile/link rows for the user and insert
    /// the given set.
    async fn replace_connection(&self, connection: &SpotifyConnection) -> Result<(), AppError>;

    /// Remove the token/profile/link rows for the user. Absent rows are fine.
    async fn delete_connection(&self, user_id: &UserId) -> Result<(), AppError>;
}

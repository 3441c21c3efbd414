//! User model for storage and API.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Internal user identifier (the `users.id` column).
///
/// Opaque to this service. Accepts uuid/text ids as well as numeric ids
/// from the store, and always serializes as a string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for UserId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Number(i64),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Text(s) => UserId(s),
            RawId::Number(n) => UserId(n.to_string()),
        })
    }
}

/// User row stored in the `users` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Internal id (assigned by the store)
    pub id: UserId,
    /// Identity-provider subject id (unique)
    pub auth_id: String,
    pub email: Option<String>,
    pub username: Option<String>,
    /// Spotify id reported by the identity provider at login
    pub spotify_id: Option<String>,
    pub spotify_display_name: Option<String>,
    pub spotify_email: Option<String>,
    pub spotify_profile_image: Option<String>,
}

/// Values written when a user logs in (upsert on `auth_id`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
    pub auth_id: String,
    pub email: Option<String>,
    pub username: Option<String>,
    pub spotify_id: Option<String>,
    pub spotify_display_name: Option<String>,
    pub spotify_email: Option<String>,
    pub spotify_profile_image: Option<String>,
}

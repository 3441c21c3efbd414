// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Spotify connection rows: tokens, profile and the service marker.
//!
//! The three rows for a user are written and removed as a set
//! (see [`SpotifyConnection`]).

use crate::models::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Service name recorded in `user_services` for Spotify links.
pub const SPOTIFY_SERVICE: &str = "spotify";

/// User's Spotify OAuth tokens (`spotify_tokens` row).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotifyTokens {
    pub user_id: UserId,
    pub access_token: String,
    pub refresh_token: String,
    /// When the access token expires
    #[serde(rename = "token_expires_at")]
    pub expires_at: DateTime<Utc>,
    pub last_refresh_at: DateTime<Utc>,
    #[serde(default)]
    pub refresh_count: u32,
    /// Granted OAuth scopes
    #[serde(default)]
    pub scopes: Vec<String>,
}

impl SpotifyTokens {
    /// Whether the access token expires within `margin` of `now`.
    pub fn expires_within(&self, now: DateTime<Utc>, margin: chrono::Duration) -> bool {
        self.expires_at <= now + margin
    }
}

/// Column updates written after a successful token refresh.
#[derive(Debug, Clone, Serialize)]
pub struct TokenRefresh {
    pub access_token: String,
    /// Only present when Spotify rotated the refresh token
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(rename = "token_expires_at")]
    pub expires_at: DateTime<Utc>,
    pub last_refresh_at: DateTime<Utc>,
    pub refresh_count: u32,
}

/// Spotify profile captured at connect time (`spotify_profiles` row).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SpotifyProfile {
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub user_id: UserId,
    pub spotify_id: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub profile_image_url: Option<String>,
}

/// Marker row for an active integration (`user_services` row).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceLink {
    pub user_id: UserId,
    pub service: String,
    pub connected_at: DateTime<Utc>,
    pub last_synced_at: DateTime<Utc>,
}

/// The full row set that makes up one Spotify connection.
#[derive(Debug, Clone)]
pub struct SpotifyConnection {
    pub tokens: SpotifyTokens,
    pub profile: SpotifyProfile,
    pub link: ServiceLink,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn tokens_expiring_at(expires_at: DateTime<Utc>) -> SpotifyTokens {
        SpotifyTokens {
            user_id: UserId::new("u1"),
            access_token: "access".to_string(),
            refresh_token: "refresh".to_string(),
            expires_at,
            last_refresh_at: Utc::now(),
            refresh_count: 0,
            scopes: vec![],
        }
    }

    #[test]
    fn test_expires_within_margin_boundary() {
        let now = Utc::now();
        let margin = Duration::minutes(5);

        assert!(tokens_expiring_at(now + Duration::minutes(5)).expires_within(now, margin));
        assert!(tokens_expiring_at(now - Duration::hours(1)).expires_within(now, margin));
        assert!(!tokens_expiring_at(now + Duration::minutes(6)).expires_within(now, margin));
    }

    #[test]
    fn test_tokens_row_column_names() {
        let row = serde_json::json!({
            "id": 17,
            "user_id": "u1",
            "access_token": "a",
            "refresh_token": "r",
            "token_expires_at": "2026-01-01T00:00:00+00:00",
            "last_refresh_at": "2025-12-31T23:00:00.123456+00:00",
            "refresh_count": 3,
            "scopes": ["user-library-read"]
        });

        let tokens: SpotifyTokens = serde_json::from_value(row).unwrap();
        assert_eq!(tokens.refresh_count, 3);
        assert_eq!(tokens.scopes, vec!["user-library-read"]);

        let refresh = TokenRefresh {
            access_token: "b".to_string(),
            refresh_token: None,
            expires_at: tokens.expires_at,
            last_refresh_at: tokens.last_refresh_at,
            refresh_count: 4,
        };
        let patch = serde_json::to_value(&refresh).unwrap();
        assert!(patch.get("token_expires_at").is_some());
        assert!(patch.get("refresh_token").is_none());
    }
}

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Spotify connection routes.

use axum::{
    extract::{Query, State},
    response::Redirect,
    routing::{get, post},
    Extension, Json, Router,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::error::{AppError, Result};
use crate::middleware::AuthUser;
use crate::models::SpotifyProfile;
use crate::AppState;

type HmacSha256 = Hmac<Sha256>;

/// How long a signed `state` stays valid (milliseconds).
const STATE_MAX_AGE_MS: u128 = 10 * 60 * 1000;

/// Routes reachable without a session.
pub fn public_routes() -> Router<Arc<AppState>> {
    Router::new().route("/spotify/connect", get(connect_start))
}

/// Routes behind the session gate.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/spotify/callback", get(connect_callback))
        .route("/spotify/status", get(status))
        .route("/spotify/disconnect", post(disconnect))
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SuccessResponse {
    pub success: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct StatusResponse {
    pub is_connected: bool,
    pub profile: Option<SpotifyProfile>,
}

/// Start the Spotify authorization flow.
async fn connect_start(State(state): State<Arc<AppState>>) -> Result<Redirect> {
    let oauth_state = create_state(&state.config.oauth_state_key, now_millis()?)?;
    let auth_url = state.spotify.client().authorize_url(&oauth_state);

    tracing::info!("Redirecting to Spotify authorization");
    Ok(Redirect::temporary(&auth_url))
}

#[derive(Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// OAuth callback - exchange the code and store the connection.
async fn connect_callback(
    State(state): State<Arc<AppState>>,
    Extension(auth_user): Extension<AuthUser>,
    Query(params): Query<CallbackParams>,
) -> Result<Json<SuccessResponse>> {
    if let Some(error) = params.error {
        tracing::warn!(error = %error, "Spotify authorization denied");
        return Err(AppError::Validation(format!(
            "Spotify authorization failed: {}",
            error
        )));
    }

    let code = params
        .code
        .filter(|c| !c.is_empty())
        .ok_or(AppError::MissingCode)?;

    if let Some(oauth_state) = params.state.as_deref() {
        if !verify_state(oauth_state, &state.config.oauth_state_key, now_millis()?) {
            tracing::warn!("Invalid or expired OAuth state parameter");
            return Err(AppError::InvalidState);
        }
    }

    let user_id = auth_user.require_user()?;
    state.connections.connect(user_id, &code).await?;

    Ok(Json(SuccessResponse { success: true }))
}

/// Whether the caller has a linked Spotify account.
async fn status(
    State(state): State<Arc<AppState>>,
    Extension(auth_user): Extension<AuthUser>,
) -> Result<Json<StatusResponse>> {
    let profile = state
        .connections
        .status(auth_user.user_id.as_ref())
        .await
        .map_err(|e| AppError::StatusCheckFailed(e.to_string()))?;

    Ok(Json(StatusResponse {
        is_connected: profile.is_some(),
        profile,
    }))
}

/// Unlink the caller's Spotify account.
async fn disconnect(
    State(state): State<Arc<AppState>>,
    Extension(auth_user): Extension<AuthUser>,
) -> Result<Json<SuccessResponse>> {
    let user_id = auth_user.require_user()?;
    state.connections.disconnect(user_id).await?;

    Ok(Json(SuccessResponse { success: true }))
}

fn now_millis() -> Result<u128> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("System time error: {}", e)))?
        .as_millis())
}

/// Create a signed OAuth `state`: base64url of `nonce|timestamp_hex|signature_hex`.
pub fn create_state(key: &[u8], now_ms: u128) -> Result<String> {
    let payload = format!("{}|{:x}", uuid::Uuid::new_v4(), now_ms);

    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("HMAC init failed: {}", e)))?;
    mac.update(payload.as_bytes());
    let signature = mac.finalize().into_bytes();

    let signed_state = format!("{}|{}", payload, hex::encode(signature));
    Ok(URL_SAFE_NO_PAD.encode(signed_state.as_bytes()))
}

/// Check the signature and age of an OAuth `state`.
pub fn verify_state(state: &str, key: &[u8], now_ms: u128) -> bool {
    let Some(state_str) = URL_SAFE_NO_PAD
        .decode(state)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
    else {
        return false;
    };

    // Format is "nonce|timestamp_hex|signature_hex"
    let parts: Vec<&str> = state_str.splitn(3, '|').collect();
    let [nonce, timestamp_hex, signature_hex] = parts[..] else {
        return false;
    };

    let Ok(signature) = hex::decode(signature_hex) else {
        return false;
    };

    let Ok(mut mac) = HmacSha256::new_from_slice(key) else {
        return false;
    };
    mac.update(format!("{}|{}", nonce, timestamp_hex).as_bytes());

    if mac.verify_slice(&signature).is_err() {
        tracing::error!("OAuth state signature mismatch! Potential tampering.");
        return false;
    }

    let Ok(issued_ms) = u128::from_str_radix(timestamp_hex, 16) else {
        return false;
    };

    now_ms
        .checked_sub(issued_ms)
        .is_some_and(|age| age <= STATE_MAX_AGE_MS)
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &[u8] = b"secret_key";
    const NOW: u128 = 1_767_225_600_000;

    #[test]
    fn test_state_round_trip() {
        let state = create_state(KEY, NOW).unwrap();
        assert!(verify_state(&state, KEY, NOW));
        assert!(verify_state(&state, KEY, NOW + STATE_MAX_AGE_MS));
    }

    #[test]
    fn test_states_are_unique() {
        assert_ne!(create_state(KEY, NOW).unwrap(), create_state(KEY, NOW).unwrap());
    }

    #[test]
    fn test_state_expired() {
        let state = create_state(KEY, NOW).unwrap();
        assert!(!verify_state(&state, KEY, NOW + STATE_MAX_AGE_MS + 1));
        // Issued in the future
        assert!(!verify_state(&state, KEY, NOW - 1));
    }

    #[test]
    fn test_state_wrong_secret() {
        let state = create_state(KEY, NOW).unwrap();
        assert!(!verify_state(&state, b"wrong_key", NOW));
    }

    #[test]
    fn test_state_tampered_timestamp() {
        let state = create_state(KEY, NOW).unwrap();
        let decoded = String::from_utf8(URL_SAFE_NO_PAD.decode(&state).unwrap()).unwrap();
        let parts: Vec<&str> = decoded.splitn(3, '|').collect();
        let forged = format!("{}|{:x}|{}", parts[0], NOW + 1000, parts[2]);

        assert!(!verify_state(
            &URL_SAFE_NO_PAD.encode(forged.as_bytes()),
            KEY,
            NOW
        ));
    }

    #[test]
    fn test_state_malformed() {
        assert!(!verify_state(&URL_SAFE_NO_PAD.encode("invalid|format"), KEY, NOW));
        assert!(!verify_state("%%%not-base64", KEY, NOW));
        assert!(!verify_state(&URL_SAFE_NO_PAD.encode("a|b|zz"), KEY, NOW));
    }
}

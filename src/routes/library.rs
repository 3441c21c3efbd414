// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Saved-tracks library routes.

use axum::{
    extract::{Query, State},
    routing::get,
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::error::{AppError, Result};
use crate::middleware::AuthUser;
use crate::models::SavedTrack;
use crate::routes::health_check;
use crate::AppState;

/// Largest page Spotify serves for saved tracks.
const MAX_LIMIT: i64 = 50;
const DEFAULT_OFFSET: u32 = 0;

/// Routes reachable without a session.
pub fn public_routes() -> Router<Arc<AppState>> {
    Router::new().route("/library/health", get(health_check))
}

/// Routes behind the session gate.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/library/tracks", get(get_tracks))
}

/// Query parameters are taken as strings so empty values fall back to defaults.
#[derive(Deserialize)]
struct TracksQuery {
    #[serde(default)]
    limit: Option<String>,
    #[serde(default)]
    offset: Option<String>,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct TracksResponse {
    pub tracks: Vec<SavedTrack>,
    pub total: u32,
    pub limit: u32,
    pub offset: u32,
}

/// Parse `limit`, clamped to `1..=50`.
fn parse_limit(raw: Option<&str>) -> Result<u32> {
    let limit = match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => MAX_LIMIT,
        Some(s) => s.parse::<i64>().map_err(|_| {
            AppError::Validation("Invalid 'limit' parameter: must be an integer".to_string())
        })?,
    };

    // Clamped into 1..=50, so the cast is lossless
    Ok(limit.clamp(1, MAX_LIMIT) as u32)
}

fn parse_offset(raw: Option<&str>) -> Result<u32> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(DEFAULT_OFFSET),
        Some(s) => s.parse::<u32>().map_err(|_| {
            AppError::Validation(
                "Invalid 'offset' parameter: must be a non-negative integer".to_string(),
            )
        }),
    }
}

/// One page of the caller's saved tracks.
async fn get_tracks(
    State(state): State<Arc<AppState>>,
    Extension(auth_user): Extension<AuthUser>,
    Query(params): Query<TracksQuery>,
) -> Result<Json<TracksResponse>> {
    let limit = parse_limit(params.limit.as_deref())?;
    let offset = parse_offset(params.offset.as_deref())?;
    let user_id = auth_user.require_user()?;

    tracing::debug!(user_id = %user_id, limit, offset, "Fetching saved tracks");

    let page = match state.spotify.saved_tracks(user_id, limit, offset).await {
        Ok(page) => page,
        Err(AppError::RefreshFailed(reason)) => {
            // The refresh token is dead; drop the connection so it is never reused
            if let Err(e) = state.connections.discard_stale(user_id).await {
                tracing::error!(user_id = %user_id, error = %e, "Failed to discard stale connection");
            }
            return Err(AppError::RefreshFailed(reason));
        }
        Err(e) => return Err(e),
    };

    Ok(Json(TracksResponse {
        tracks: page.items,
        total: page.total,
        limit: page.limit,
        offset: page.offset,
    }))
}

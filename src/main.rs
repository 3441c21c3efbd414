// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Ownifi API Server
//!
//! Links Spotify accounts to Supabase users and serves their saved-tracks
//! library.

use anyhow::Context;
use ownifi_api::{config::Config, db::SupabaseStore, services::http_client, AppState};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured JSON logging
    init_logging()?;

    // Load configuration from environment
    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!(port = config.port, "Starting Ownifi API");

    // One client (and connection pool) for Supabase and Spotify
    let http = http_client(config.http_timeout)?;

    let store = Arc::new(SupabaseStore::new(
        http.clone(),
        &config.supabase_url,
        config.supabase_service_key.clone(),
    ));

    // Build shared state
    let state = Arc::new(AppState::new(config.clone(), store, http));

    // Build router
    let app = ownifi_api::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() -> anyhow::Result<()> {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("ownifi_api=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .with(format)
        .init();

    Ok(())
}

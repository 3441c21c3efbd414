// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Spotify authorize redirect and signed `state` round trip.

use axum::http::StatusCode;
use httpmock::Method::{GET, POST};
use ownifi_api::config::Config;
use ownifi_api::routes::spotify::verify_state;
use serde_json::json;
use std::time::{SystemTime, UNIX_EPOCH};
use tower::ServiceExt;

mod common;

use common::{body_json, create_test_app, create_test_jwt, location, request, seed_user};

fn now_ms() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_millis()
}

/// Pull the raw `state` query value out of an authorize URL.
fn state_param(url: &str) -> String {
    url.split(['?', '&'])
        .find_map(|pair| pair.strip_prefix("state="))
        .expect("authorize URL has no state")
        .to_string()
}

#[tokio::test]
async fn test_connect_redirects_to_spotify_with_signed_state() {
    let app = create_test_app().await;

    let response = app
        .router
        .oneshot(request("GET", "/spotify/connect", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);

    let url = location(&response);
    assert!(url.starts_with(&format!("{}/authorize?", app.server.base_url())));
    assert!(url.contains("response_type=code"));
    assert!(url.contains("show_dialog=true"));
    assert!(url.contains("scope=ugc-image-upload%20"));

    // base64url without padding needs no percent-encoding
    let state = state_param(&url);
    let key = Config::default().oauth_state_key;
    assert!(verify_state(&state, &key, now_ms()));
}

#[tokio::test]
async fn test_issued_state_is_accepted_by_callback() {
    let app = create_test_app().await;
    seed_user(&app.store, "auth-1").await;

    app.server
        .mock_async(|when, then| {
            when.method(POST).path("/api/token");
            then.status(200).json_body(json!({
                "access_token": "access-1",
                "refresh_token": "refresh-1",
                "expires_in": 3600
            }));
        })
        .await;
    app.server
        .mock_async(|when, then| {
            when.method(GET).path("/me");
            then.status(200).json_body(json!({"id": "sp-1"}));
        })
        .await;

    let response = app
        .router
        .clone()
        .oneshot(request("GET", "/spotify/connect", None))
        .await
        .unwrap();
    let state = state_param(&location(&response));

    let token = create_test_jwt("auth-1");
    let response = app
        .router
        .oneshot(request(
            "GET",
            &format!("/spotify/callback?code=abc&state={state}"),
            Some(&token),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["success"], true);
}

#[tokio::test]
async fn test_state_signed_with_other_key_is_rejected() {
    let app = create_test_app().await;
    seed_user(&app.store, "auth-1").await;

    let foreign = ownifi_api::routes::spotify::create_state(b"some_other_key", now_ms()).unwrap();
    let token = create_test_jwt("auth-1");

    let response = app
        .router
        .oneshot(request(
            "GET",
            &format!("/spotify/callback?code=abc&state={foreign}"),
            Some(&token),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "invalid_state");
}

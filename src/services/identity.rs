// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Supabase Auth client: bearer verification and login code exchange.

use crate::config::Config;
use crate::error::AppError;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Audience Supabase puts in user access tokens.
const SUPABASE_AUDIENCE: &str = "authenticated";
const CLOCK_SKEW_SECS: u64 = 30;

/// Identity resolved from a valid primary bearer token.
#[derive(Debug, Clone)]
pub struct AuthIdentity {
    /// Identity-provider subject (Supabase `auth.users.id`)
    pub subject: String,
    pub email: Option<String>,
}

/// User record returned by Supabase Auth.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthUserRecord {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: UserMetadata,
}

/// Provider metadata Supabase copies from the OAuth identity.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserMetadata {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub provider_id: Option<String>,
}

impl UserMetadata {
    pub fn display_name(&self) -> Option<&str> {
        self.name.as_deref().or(self.full_name.as_deref())
    }
}

/// Session returned by the login code exchange.
#[derive(Debug, Clone, Deserialize)]
pub struct PrimarySession {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    #[serde(default)]
    pub user: Option<AuthUserRecord>,
}

#[derive(Debug, Deserialize)]
struct SessionClaims {
    sub: String,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct AuthErrorBody {
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Serialize)]
struct PkceExchange<'a> {
    auth_code: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    code_verifier: Option<&'a str>,
}

#[derive(Clone)]
enum VerifierMode {
    /// Ask Supabase Auth about every token.
    Remote,
    /// Verify HS256 tokens locally with the project JWT secret.
    SharedSecret { decoding_key: Arc<DecodingKey> },
}

/// Client for the primary identity provider.
#[derive(Clone)]
pub struct SupabaseAuth {
    http: reqwest::Client,
    auth_url: String,
    api_key: String,
    mode: VerifierMode,
}

impl SupabaseAuth {
    /// Create a client; bearer tokens are verified locally when the JWT secret
    /// is configured, otherwise against the Auth API.
    pub fn new(http: reqwest::Client, config: &Config) -> Self {
        let mode = match &config.supabase_jwt_secret {
            Some(secret) => VerifierMode::SharedSecret {
                decoding_key: Arc::new(DecodingKey::from_secret(secret)),
            },
            None => VerifierMode::Remote,
        };

        let auth_url = format!("{}/auth/v1", config.supabase_url.trim_end_matches('/'));

        tracing::info!(
            auth_url = %auth_url,
            local_verification = matches!(mode, VerifierMode::SharedSecret { .. }),
            "Initialized Supabase Auth client"
        );

        Self {
            http,
            auth_url,
            api_key: config.supabase_service_key.clone(),
            mode,
        }
    }

    /// Verify a primary bearer token and return the identity it belongs to.
    ///
    /// Rejections map to [`AppError::InvalidToken`]; transport problems to
    /// [`AppError::Upstream`].
    pub async fn verify_token(&self, token: &str) -> Result<AuthIdentity, AppError> {
        match &self.mode {
            VerifierMode::SharedSecret { decoding_key } => {
                let mut validation = Validation::new(Algorithm::HS256);
                validation.set_required_spec_claims(&["exp", "sub", "aud"]);
                validation.set_audience(&[SUPABASE_AUDIENCE]);
                validation.leeway = CLOCK_SKEW_SECS;

                let data = decode::<SessionClaims>(token, decoding_key, &validation).map_err(
                    |e| {
                        tracing::debug!(error = %e, "Bearer token rejected");
                        AppError::InvalidToken
                    },
                )?;

                Ok(AuthIdentity {
                    subject: data.claims.sub,
                    email: data.claims.email,
                })
            }
            VerifierMode::Remote => {
                let user = self.get_user(token).await?;
                Ok(AuthIdentity {
                    subject: user.id,
                    email: user.email,
                })
            }
        }
    }

    /// Fetch the user that owns `token` from the Auth API.
    pub async fn get_user(&self, token: &str) -> Result<AuthUserRecord, AppError> {
        let response = self
            .http
            .get(format!("{}/user", self.auth_url))
            .header("apikey", &self.api_key)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Supabase Auth request failed: {}", e)))?;

        let status = response.status();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(AppError::InvalidToken);
        }
        if !status.is_success() {
            return Err(AppError::Upstream(format!(
                "Supabase Auth returned HTTP {}",
                status
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("Failed to parse Supabase user: {}", e)))
    }

    /// Exchange a login authorization code for a session.
    ///
    /// A refusal by the provider is reported as [`AppError::Provider`] carrying
    /// the provider's message.
    pub async fn exchange_code_for_session(
        &self,
        code: &str,
        code_verifier: Option<&str>,
    ) -> Result<PrimarySession, AppError> {
        let response = self
            .http
            .post(format!("{}/token", self.auth_url))
            .query(&[("grant_type", "pkce")])
            .header("apikey", &self.api_key)
            .json(&PkceExchange {
                auth_code: code,
                code_verifier,
            })
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Session exchange failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body: AuthErrorBody = response.json().await.unwrap_or_default();
            let message = body
                .msg
                .or(body.error_description)
                .or(body.error)
                .unwrap_or_else(|| format!("HTTP {}", status));

            tracing::warn!(status = %status, message = %message, "Supabase code exchange refused");
            return Err(AppError::Provider {
                status_text: message,
            });
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("Failed to parse session: {}", e)))
    }
}

//! Engine authentication.
//!
//! Exchanges the configured credentials for a bearer token against the
//! engine's HTTP auth endpoint. Stateless per call: every execution performs
//! its own login round trip; no token is cached.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use viewgate_commons::{GatewayError, Result};
use viewgate_configs::EngineSettings;

/// Supplies a bearer token for one engine call.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn bearer_token(&self) -> Result<String>;
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    token: String,
}

/// Authenticator against `POST {auth_base}/login`.
///
/// TLS certificate validation is on by default; the
/// `danger_accept_invalid_certs` setting disables it for lab environments
/// and is logged loudly when enabled.
pub struct EngineAuthenticator {
    client: reqwest::Client,
    login_url: String,
    username: String,
    password: String,
}

impl EngineAuthenticator {
    pub fn new(settings: &EngineSettings) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_seconds))
            .connect_timeout(Duration::from_secs(settings.connect_timeout_seconds));

        if settings.danger_accept_invalid_certs {
            log::warn!(
                "TLS certificate validation for the auth endpoint is DISABLED by configuration"
            );
            builder = builder.danger_accept_invalid_certs(true);
        }

        let client = builder
            .build()
            .map_err(|e| GatewayError::config(format!("auth client construction failed: {}", e)))?;

        Ok(Self {
            client,
            login_url: format!("{}/login", settings.auth_base.trim_end_matches('/')),
            username: settings.username.clone(),
            password: settings.password.clone(),
        })
    }
}

#[async_trait]
impl TokenProvider for EngineAuthenticator {
    async fn bearer_token(&self) -> Result<String> {
        let response = self
            .client
            .post(&self.login_url)
            .json(&LoginRequest {
                username: &self.username,
                password: &self.password,
            })
            .send()
            .await
            .map_err(|e| GatewayError::upstream(format!("auth endpoint unreachable: {}", e)))?;

        if !response.status().is_success() {
            return Err(GatewayError::upstream(format!(
                "auth endpoint returned status {}",
                response.status()
            )));
        }

        let body: LoginResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::upstream(format!("auth response malformed: {}", e)))?;

        Ok(body.token)
    }
}

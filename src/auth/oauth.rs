//! OAuth2 token endpoint client.
//!
//! Exchanges an authorization code (or a refresh token) for an access
//! token with a form-encoded POST. The [`TokenExchange`] trait is the seam
//! the [`AuthManager`](super::AuthManager) talks through, so tests can
//! replace the HTTP call.

use serde::Deserialize;
use serde_json::Value;

use crate::error::{IpcError, Result};
use crate::handler::BoxFuture;

/// Default token endpoint.
pub const DEFAULT_TOKEN_URL: &str = "https://discord.com/api/v10/oauth2/token";

/// Default redirect URI sent with the code grant.
pub const DEFAULT_REDIRECT_URI: &str = "https://discord.com";

/// Endpoint settings for [`HttpTokenExchange`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthSettings {
    /// Token endpoint URL.
    pub token_url: String,
    /// Redirect URI registered for the application.
    pub redirect_uri: String,
}

impl Default for OAuthSettings {
    fn default() -> Self {
        Self {
            token_url: DEFAULT_TOKEN_URL.to_string(),
            redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
        }
    }
}

/// Grant sent to the token endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenGrant {
    /// `grant_type=authorization_code`
    AuthorizationCode {
        client_id: u64,
        client_secret: String,
        code: String,
    },
    /// `grant_type=refresh_token`
    RefreshToken {
        client_id: u64,
        client_secret: String,
        refresh_token: String,
    },
}

impl TokenGrant {
    /// Form fields for this grant.
    fn form(&self, redirect_uri: &str) -> Vec<(&'static str, String)> {
        match self {
            TokenGrant::AuthorizationCode {
                client_id,
                client_secret,
                code,
            } => vec![
                ("client_id", client_id.to_string()),
                ("client_secret", client_secret.clone()),
                ("grant_type", "authorization_code".to_string()),
                ("code", code.clone()),
                ("redirect_uri", redirect_uri.to_string()),
            ],
            TokenGrant::RefreshToken {
                client_id,
                client_secret,
                refresh_token,
            } => vec![
                ("client_id", client_id.to_string()),
                ("client_secret", client_secret.clone()),
                ("grant_type", "refresh_token".to_string()),
                ("refresh_token", refresh_token.clone()),
            ],
        }
    }
}

/// Successful token endpoint response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenResponse {
    /// Bearer token for AUTHENTICATE.
    pub access_token: String,
    /// Lifetime in seconds.
    pub expires_in: u64,
    /// Token for the next refresh grant.
    pub refresh_token: String,
}

/// Something that can turn a [`TokenGrant`] into a [`TokenResponse`].
pub trait TokenExchange: Send + Sync {
    /// Send `grant` to the token endpoint.
    fn exchange(&self, grant: TokenGrant) -> BoxFuture<'_, Result<TokenResponse>>;
}

/// [`TokenExchange`] over HTTPS with `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpTokenExchange {
    http: reqwest::Client,
    settings: OAuthSettings,
}

impl HttpTokenExchange {
    /// Exchange against the default endpoint.
    pub fn new() -> Self {
        Self::with_settings(OAuthSettings::default())
    }

    /// Exchange against a custom endpoint.
    pub fn with_settings(settings: OAuthSettings) -> Self {
        Self {
            http: reqwest::Client::new(),
            settings,
        }
    }

    async fn post(&self, grant: TokenGrant) -> Result<TokenResponse> {
        let form = grant.form(&self.settings.redirect_uri);
        let response = self
            .http
            .post(&self.settings.token_url)
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            let message = provider_message(&body).unwrap_or_else(|| status.to_string());
            tracing::warn!(%status, "Token exchange rejected: {}", message);
            return Err(IpcError::Authorization(message));
        }

        Ok(response.json().await?)
    }
}

impl Default for HttpTokenExchange {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenExchange for HttpTokenExchange {
    fn exchange(&self, grant: TokenGrant) -> BoxFuture<'_, Result<TokenResponse>> {
        Box::pin(self.post(grant))
    }
}

/// Pull a human readable message out of an error body.
fn provider_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    ["message", "error_description", "error"]
        .iter()
        .find_map(|key| value.get(*key).and_then(Value::as_str))
        .map(str::to_string)
}

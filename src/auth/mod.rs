//! Authorization and authentication over the IPC connection.
//!
//! The flow has two halves:
//! - `AUTHORIZE` asks the desktop app for an OAuth code, which is exchanged
//!   for an access token at the token endpoint
//! - `AUTHENTICATE` presents the access token and returns the identity of
//!   the logged in user
//!
//! The manager does not decide which path to take; callers check
//! [`AuthManager::has_usable_token`] and pick `authenticate` or `authorize`.

mod oauth;

pub use oauth::{
    HttpTokenExchange, OAuthSettings, TokenExchange, TokenGrant, TokenResponse,
    DEFAULT_REDIRECT_URI, DEFAULT_TOKEN_URL,
};

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::{json, Value};

use crate::client::Client;
use crate::config::{AccessToken, ClientConfig, ConfigStore};
use crate::error::{IpcError, Result};

/// OAuth scopes requested by `AUTHORIZE`.
pub const SCOPES: [&str; 5] = [
    "rpc",
    "messages.read",
    "rpc.notifications.read",
    "rpc.voice.read",
    "identify",
];

/// Command requesting an OAuth code from the desktop app.
pub const AUTHORIZE: &str = "AUTHORIZE";

/// Command presenting an access token.
pub const AUTHENTICATE: &str = "AUTHENTICATE";

/// Where the manager is in the auth flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    /// Nothing attempted yet.
    Unauthenticated,
    /// AUTHORIZE sent, waiting for the code.
    AuthorizationPending,
    /// Code or refresh token sent to the token endpoint.
    TokenExchangePending,
    /// AUTHENTICATE succeeded.
    Authenticated,
    /// The last attempt failed.
    Failed,
}

/// Identity returned by a successful `AUTHENTICATE`.
#[derive(Debug, Clone, PartialEq)]
pub struct Identity {
    /// The authorized application object.
    pub application: Value,
    /// The logged in user object.
    pub user: Value,
    /// Scopes granted to the token.
    pub scopes: Vec<String>,
}

impl Identity {
    fn from_data(data: &Value) -> Self {
        let scopes = data
            .get("scopes")
            .and_then(Value::as_array)
            .map(|list| {
                list.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Self {
            application: data.get("application").cloned().unwrap_or(Value::Null),
            user: data.get("user").cloned().unwrap_or(Value::Null),
            scopes,
        }
    }

    /// The user's `username`, if present.
    pub fn username(&self) -> Option<&str> {
        self.user.get("username").and_then(Value::as_str)
    }
}

/// Unix-seconds clock.
pub type Clock = Arc<dyn Fn() -> u64 + Send + Sync>;

fn system_clock() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// Drives AUTHORIZE, the token exchange and AUTHENTICATE.
pub struct AuthManager {
    config: ClientConfig,
    store: Box<dyn ConfigStore>,
    exchange: Arc<dyn TokenExchange>,
    state: AuthState,
    identity: Option<Identity>,
    clock: Clock,
}

impl AuthManager {
    /// Create a manager from an already loaded config.
    pub fn new(
        config: ClientConfig,
        store: impl ConfigStore + 'static,
        exchange: impl TokenExchange + 'static,
    ) -> Self {
        Self {
            config,
            store: Box::new(store),
            exchange: Arc::new(exchange),
            state: AuthState::Unauthenticated,
            identity: None,
            clock: Arc::new(system_clock),
        }
    }

    /// Load the config from `store` and create a manager.
    pub fn load(
        store: impl ConfigStore + 'static,
        exchange: impl TokenExchange + 'static,
    ) -> Result<Self> {
        let config = store.load()?;
        Ok(Self::new(config, store, exchange))
    }

    /// Replace the clock used for token expiry.
    pub fn with_clock(mut self, clock: impl Fn() -> u64 + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Current position in the auth flow.
    pub fn state(&self) -> AuthState {
        self.state
    }

    /// Identity from the last successful AUTHENTICATE.
    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// The config, including any token stored since loading.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The persisted access token, if any.
    pub fn stored_token(&self) -> Option<&AccessToken> {
        self.config.access_token.as_ref()
    }

    /// Whether a stored token exists and has not expired.
    pub fn has_usable_token(&self) -> bool {
        let now = (self.clock)();
        self.stored_token().is_some_and(|t| !t.is_expired(now))
    }

    /// Run the full flow: AUTHORIZE, code exchange, persist, AUTHENTICATE.
    pub async fn authorize(&mut self, client: &Client) -> Result<()> {
        let result = self.run_authorize(client).await;
        self.settle(result)
    }

    /// AUTHENTICATE with `access_token` and record the identity.
    pub async fn authenticate(&mut self, client: &Client, access_token: &str) -> Result<()> {
        let result = self.run_authenticate(client, access_token).await;
        self.settle(result)
    }

    /// Exchange the stored refresh token, persist, then AUTHENTICATE.
    pub async fn refresh(&mut self, client: &Client) -> Result<()> {
        let result = self.run_refresh(client).await;
        self.settle(result)
    }

    fn settle(&mut self, result: Result<()>) -> Result<()> {
        if result.is_err() {
            self.state = AuthState::Failed;
        }
        result
    }

    async fn run_authorize(&mut self, client: &Client) -> Result<()> {
        self.state = AuthState::AuthorizationPending;

        let args = json!({
            "client_id": self.config.client_id.to_string(),
            "client_secret": self.config.client_secret,
            "prompt": "none",
            "scopes": SCOPES,
        });
        let reply = client.command(AUTHORIZE, args).await?;

        if reply.is_error() {
            let (_, message) = reply.error_details();
            return Err(IpcError::Authorization(message));
        }

        let code = reply
            .data()
            .and_then(|d| d.get("code"))
            .and_then(Value::as_str)
            .ok_or_else(|| IpcError::Authorization("AUTHORIZE reply carried no code".into()))?
            .to_string();

        self.state = AuthState::TokenExchangePending;
        let grant = TokenGrant::AuthorizationCode {
            client_id: self.config.client_id,
            client_secret: self.config.client_secret.clone(),
            code,
        };
        let token = self.exchange.exchange(grant).await?;
        let access_token = self.persist_token(token)?;

        self.run_authenticate(client, &access_token).await
    }

    async fn run_refresh(&mut self, client: &Client) -> Result<()> {
        let refresh_token = self
            .stored_token()
            .map(|t| t.refresh_token.clone())
            .ok_or_else(|| IpcError::Authorization("No stored refresh token".into()))?;

        self.state = AuthState::TokenExchangePending;
        let grant = TokenGrant::RefreshToken {
            client_id: self.config.client_id,
            client_secret: self.config.client_secret.clone(),
            refresh_token,
        };
        let token = self.exchange.exchange(grant).await?;
        let access_token = self.persist_token(token)?;

        self.run_authenticate(client, &access_token).await
    }

    async fn run_authenticate(&mut self, client: &Client, access_token: &str) -> Result<()> {
        let reply = client
            .command(AUTHENTICATE, json!({ "access_token": access_token }))
            .await?;

        if reply.is_error() {
            let (_, message) = reply.error_details();
            return Err(IpcError::Authentication(message));
        }

        let identity = Identity::from_data(reply.data().unwrap_or(&Value::Null));
        tracing::info!(
            user = identity.username().unwrap_or("<unknown>"),
            "Authenticated"
        );
        self.identity = Some(identity);
        self.state = AuthState::Authenticated;
        Ok(())
    }

    /// Store the new token in the config and write it out.
    fn persist_token(&mut self, token: TokenResponse) -> Result<String> {
        let expires_at = (self.clock)().saturating_add(token.expires_in);
        let access_token = token.access_token.clone();

        self.config.access_token = Some(AccessToken {
            access_token: token.access_token,
            expires_at,
            refresh_token: token.refresh_token,
        });
        self.store.save(&self.config)?;

        tracing::debug!(expires_at, "Stored new access token");
        Ok(access_token)
    }
}

impl std::fmt::Debug for AuthManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthManager")
            .field("client_id", &self.config.client_id)
            .field("state", &self.state)
            .field("identity", &self.identity)
            .finish()
    }
}

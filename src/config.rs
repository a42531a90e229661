//! Persisted client configuration.
//!
//! The on-disk format is a single JSON object:
//!
//! ```json
//! {
//!   "client_id": 192741864418312192,
//!   "client_secret": "...",
//!   "client_token": "...",
//!   "access_token": {"access_token": "...", "expires_at": 1700000000, "refresh_token": "..."}
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{IpcError, Result};

/// An OAuth access token with its expiry and refresh token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
    /// Bearer token passed to AUTHENTICATE.
    pub access_token: String,
    /// Expiry as unix seconds.
    pub expires_at: u64,
    /// Token used for the refresh grant.
    pub refresh_token: String,
}

impl AccessToken {
    /// Check whether the token is expired at `now` (unix seconds).
    #[inline]
    pub fn is_expired(&self, now: u64) -> bool {
        now >= self.expires_at
    }
}

/// Application credentials plus the last issued access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Application id.
    pub client_id: u64,
    /// OAuth client secret.
    pub client_secret: String,
    /// Bot/client token.
    #[serde(default)]
    pub client_token: String,
    /// Last issued access token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<AccessToken>,
}

impl ClientConfig {
    /// Create a config without a stored token.
    pub fn new(client_id: u64, client_secret: impl Into<String>) -> Self {
        Self {
            client_id,
            client_secret: client_secret.into(),
            client_token: String::new(),
            access_token: None,
        }
    }
}

/// Storage for [`ClientConfig`].
pub trait ConfigStore: Send + Sync {
    /// Load the stored config.
    fn load(&self) -> Result<ClientConfig>;

    /// Replace the stored config.
    fn save(&self, config: &ClientConfig) -> Result<()>;
}

/// [`ConfigStore`] backed by a pretty-printed JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Store at `path`; the file is created on first save.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigStore for JsonFileStore {
    fn load(&self) -> Result<ClientConfig> {
        let content = fs::read_to_string(&self.path)?;
        serde_json::from_str(&content)
            .map_err(|e| IpcError::Config(format!("{}: {}", self.path.display(), e)))
    }

    fn save(&self, config: &ClientConfig) -> Result<()> {
        let json = serde_json::to_string_pretty(config).map_err(IpcError::Serialization)?;
        fs::write(&self.path, json)?;

        // Owner read/write only: the file holds secrets
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600))?;
        }

        tracing::info!(path = %self.path.display(), "Saved client config");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> ClientConfig {
        ClientConfig {
            client_id: 192_741_864_418_312_192,
            client_secret: "secret".to_string(),
            client_token: "token".to_string(),
            access_token: Some(AccessToken {
                access_token: "a".to_string(),
                expires_at: 1_700_000_600,
                refresh_token: "r".to_string(),
            }),
        }
    }

    #[test]
    fn test_token_expiry() {
        let token = sample().access_token.unwrap();
        assert!(!token.is_expired(1_700_000_599));
        assert!(token.is_expired(1_700_000_600));
    }

    #[test]
    fn test_config_json_shape() {
        let value = serde_json::to_value(sample()).unwrap();
        assert_eq!(
            value,
            json!({
                "client_id": 192_741_864_418_312_192u64,
                "client_secret": "secret",
                "client_token": "token",
                "access_token": {"access_token": "a", "expires_at": 1_700_000_600, "refresh_token": "r"}
            })
        );
    }

    #[test]
    fn test_config_without_token() {
        let config: ClientConfig = serde_json::from_value(json!({
            "client_id": 7,
            "client_secret": "s",
            "client_token": "t"
        }))
        .unwrap();

        assert!(config.access_token.is_none());
        assert!(serde_json::to_value(&config).unwrap().get("access_token").is_none());
    }

    #[test]
    fn test_file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("config.json"));

        store.save(&sample()).unwrap();
        assert_eq!(store.load().unwrap(), sample());
    }

    #[cfg(unix)]
    #[test]
    fn test_file_store_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("config.json"));
        store.save(&sample()).unwrap();

        let mode = fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_file_store_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("missing.json"));
        assert!(matches!(store.load(), Err(IpcError::Io(_))));
    }

    #[test]
    fn test_file_store_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();

        let store = JsonFileStore::new(&path);
        assert!(matches!(store.load(), Err(IpcError::Config(_))));
    }
}

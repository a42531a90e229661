//! Connect to the local desktop app, authenticate and print events.
//!
//! Reads credentials from `config.json` (or the path given as the first
//! argument), reuses a stored access token while it is valid, refreshes an
//! expired one and falls back to the full AUTHORIZE flow otherwise.
//!
//! ```text
//! RUST_LOG=discord_ipc_client=debug cargo run --example authorize -- config.json
//! ```

use discord_ipc_client::{AuthManager, Client, HttpTokenExchange, JsonFileStore, Result};
use serde_json::json;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let path = std::env::args().nth(1).unwrap_or_else(|| "config.json".to_string());
    let mut auth = AuthManager::load(JsonFileStore::new(path), HttpTokenExchange::new())?;

    let client = Client::builder()
        .client_id(auth.config().client_id)
        .on("notification_create", |event| async move {
            tracing::info!("Notification: {}", event.data["body"]);
            Ok(())
        })
        .connect()
        .await?;

    if auth.has_usable_token() {
        let token = auth
            .stored_token()
            .map(|t| t.access_token.clone())
            .unwrap_or_default();
        auth.authenticate(&client, &token).await?;
    } else if auth.stored_token().is_some() {
        auth.refresh(&client).await?;
    } else {
        auth.authorize(&client).await?;
    }

    client.subscribe("notification_create", json!({})).await?;
    tracing::info!("Listening for notifications, Ctrl+C to quit");

    tokio::select! {
        result = client.wait_for_shutdown() => result,
        _ = tokio::signal::ctrl_c() => Ok(()),
    }
}

//! One-shot search and filter commands.

use std::path::Path;

use tokio::io::AsyncReadExt;

use crate::config::Settings;
use crate::dispatcher::Dispatcher;

/// Run one request and print the JSON response on stdout.
pub async fn cmd_dispatch(settings: &Settings, file: Option<&Path>) -> anyhow::Result<()> {
    let body = match file {
        Some(path) => tokio::fs::read_to_string(path).await?,
        None => {
            let mut body = String::new();
            tokio::io::stdin().read_to_string(&mut body).await?;
            body
        }
    };

    let dispatcher = Dispatcher::from_settings(settings).await;
    let response = dispatcher.dispatch_json(&body).await;
    println!("{}", serde_json::to_string(&response)?);
    Ok(())
}

/// Print an engine's filters.
pub async fn cmd_filters(settings: &Settings, engine: &str, page: &str) -> anyhow::Result<()> {
    let dispatcher = Dispatcher::from_settings(settings).await;
    let filters = dispatcher.discover_filters(engine, page);
    println!("{}", serde_json::to_string_pretty(&filters)?);
    Ok(())
}

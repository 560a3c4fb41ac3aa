use anyhow::{Context, Result};
use pgvisor_core::{ConfigLoader, LauncherConfig};
use pgvisor_ipc::AdminClient;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;

pub const SUCCESS_ICON: &str = "✓";
pub const RUNNING_ICON: &str = "●";
pub const STOPPED_ICON: &str = "○";

pub async fn load_config(path: Option<&Path>) -> Result<LauncherConfig> {
    let loader = ConfigLoader::new();
    match path {
        Some(path) => loader
            .load_file(path)
            .await
            .with_context(|| format!("Failed to load {}", path.display())),
        None => loader.load().await.context("Failed to find a configuration"),
    }
}

pub fn socket_path(explicit: Option<PathBuf>) -> PathBuf {
    explicit.unwrap_or_else(pgvisor_ipc::default_socket_path)
}

/// Connects to a running supervisor's admin socket.
pub async fn connect_admin(path: &Path) -> Result<AdminClient> {
    debug!("Connecting to admin socket at {:?}", path);

    match timeout(Duration::from_secs(5), AdminClient::connect(path)).await {
        Ok(Ok(client)) => Ok(client),
        Ok(Err(e)) => Err(e).with_context(|| {
            format!(
                "Failed to connect to {}. Is the supervisor running with an admin socket?",
                path.display()
            )
        }),
        Err(_) => anyhow::bail!("Connection to {} timed out", path.display()),
    }
}

use super::LauncherConfig;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const CONFIG_FILE_NAME: &str = "pgvisor.json";

/// Config loader with auto-discovery
pub struct ConfigLoader {
    search_paths: Vec<PathBuf>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self {
            search_paths: vec![PathBuf::from("."), PathBuf::from("./config")],
        }
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_search_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.search_paths.push(path.into());
        self
    }

    /// Loads the first `pgvisor.json` found on the search path.
    pub async fn load(&self) -> crate::Result<LauncherConfig> {
        for dir in &self.search_paths {
            let candidate = dir.join(CONFIG_FILE_NAME);
            if candidate.exists() {
                return self.load_file(&candidate).await;
            }
        }

        Err(crate::Error::Config(format!(
            "no {} found in {:?}",
            CONFIG_FILE_NAME, self.search_paths
        )))
    }

    /// Load a specific config file
    pub async fn load_file(&self, path: &Path) -> crate::Result<LauncherConfig> {
        debug!("Loading launcher config from {:?}", path);
        let content = tokio::fs::read_to_string(path).await?;
        let config = Self::parse(&content)
            .map_err(|e| crate::Error::Config(format!("{}: {}", path.display(), e)))?;
        Ok(config)
    }

    /// Parses and validates a config document.
    pub fn parse(content: &str) -> crate::Result<LauncherConfig> {
        let config: LauncherConfig = serde_json::from_str(content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        Self::validate(&config)?;
        Ok(config)
    }

    fn validate(config: &LauncherConfig) -> crate::Result<()> {
        if config.processes.is_empty() {
            return Err(crate::Error::Config("no processes configured".to_string()));
        }

        // Fails on unbalanced quotes, empty commands and blank names.
        config.specs()?;

        let mut seen = HashSet::new();
        for process in &config.processes {
            if !seen.insert(process.name.as_str()) {
                warn!(
                    "Process name {:?} is used more than once; output prefixes will be ambiguous",
                    process.name
                );
            }
        }

        Ok(())
    }
}

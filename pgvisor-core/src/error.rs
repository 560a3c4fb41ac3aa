use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid command for {name}: {reason}")]
    InvalidCommand { name: String, reason: String },

    #[error("Invalid process name: {0:?}")]
    InvalidProcessName(String),

    #[error("Process spawn failed: {0}")]
    SpawnFailed(String),

    #[error("Output channel allocation failed: {0}")]
    Channel(String),

    #[error("Config error: {0}")]
    Config(String),

    /// The only runtime failure a supervisor run reports.
    #[error("process {0} failed")]
    RestartsExhausted(String),

    #[error("Signal handling error: {0}")]
    Signal(String),

    #[error("Supervisor error: {0}")]
    Supervisor(String),

    #[cfg(unix)]
    #[error("Unix error: {0}")]
    Unix(#[from] nix::errno::Errno),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// True for failures that must abort startup rather than feed the restart policy.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::InvalidCommand { .. }
                | Self::InvalidProcessName(_)
                | Self::Channel(_)
                | Self::Config(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of a supervised process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessState {
    /// Registered, never started.
    #[default]
    Idle,
    Running,
    Exited,
    /// Waiting out the restart delay.
    Restarting,
    /// Will not be started again.
    Terminal,
}

impl ProcessState {
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Exited => "exited",
            Self::Restarting => "restarting",
            Self::Terminal => "terminal",
        };
        f.write_str(s)
    }
}

/// Point-in-time view of one process, as reported over the admin socket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessStatus {
    pub name: String,
    pub state: ProcessState,
    pub pid: Option<u32>,
    pub restarts: u32,
    pub restart_policy: String,
    pub last_exit_code: Option<i32>,
}

/// What an administrative surface may ask of a running supervisor.
pub trait AdminControl: Send + Sync {
    fn supervisor_name(&self) -> &str;

    fn snapshot(&self) -> Vec<ProcessStatus>;

    /// Begins graceful shutdown. Calling it more than once has no further effect.
    fn request_stop(&self);

    fn is_stopping(&self) -> bool;
}

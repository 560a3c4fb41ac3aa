pub mod config;
pub mod error;
pub mod process;
pub mod restart;
pub mod supervisor;

pub use config::{
    ConfigLoader, LauncherConfig, OutputMode, ProcessConfig, ProcessOption, ProcessSpec,
    RestartConfig, with_env, with_restart, with_root_dir, with_stop_signal,
};
pub use error::{Error, Result};
pub use process::{CommandLine, ExitStatus, Signal};
pub use restart::{RestartDecision, RestartPolicy, RestartTracker};
pub use supervisor::{AdminControl, ProcessState, ProcessStatus};

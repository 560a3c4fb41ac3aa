#[cfg(not(unix))]
compile_error!("pgvisor-supervisor relies on POSIX process groups and only builds on unix");

#[cfg(target_os = "linux")]
mod linux;

mod managed;
mod supervisor;
pub mod unix;

pub use managed::ManagedProcess;
pub use supervisor::{StopHandle, Supervisor, SupervisorHandle};

pub use pgvisor_core::{
    Error, ProcessOption, Result, Signal, with_env, with_restart, with_root_dir,
    with_stop_signal,
};
pub use pgvisor_output::ChannelKind;

#[cfg(unix)]
mod unix;
#[cfg(unix)]
pub use unix::{AdminClient, AdminConnection, AdminServer};

use pgvisor_core::{AdminControl, ProcessStatus};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Frames larger than this are rejected before allocating.
pub const MAX_FRAME_LEN: u32 = 4 * 1024 * 1024;

pub const SOCKET_FILE_NAME: &str = "pgvisor.sock";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdminRequest {
    Ping,
    Status,
    Stop,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdminResponse {
    Pong,
    Status {
        supervisor: String,
        processes: Vec<ProcessStatus>,
    },
    Success {
        message: String,
    },
    Error {
        message: String,
    },
}

/// Answers one request against a running supervisor.
pub fn handle_request(control: &dyn AdminControl, request: &AdminRequest) -> AdminResponse {
    match request {
        AdminRequest::Ping => AdminResponse::Pong,
        AdminRequest::Status => AdminResponse::Status {
            supervisor: control.supervisor_name().to_string(),
            processes: control.snapshot(),
        },
        AdminRequest::Stop => {
            let message = if control.is_stopping() {
                "already stopping".to_string()
            } else {
                format!("stopping {}", control.supervisor_name())
            };
            control.request_stop();
            AdminResponse::Success { message }
        }
    }
}

/// `$XDG_RUNTIME_DIR/pgvisor.sock`, falling back to `/tmp`.
pub fn default_socket_path() -> PathBuf {
    std::env::var_os("XDG_RUNTIME_DIR")
        .filter(|dir| !dir.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join(SOCKET_FILE_NAME)
}

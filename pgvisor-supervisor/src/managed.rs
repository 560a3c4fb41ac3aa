use crate::unix::{prepare_command, send_group_signal};
use parking_lot::Mutex;
use pgvisor_core::{
    Error, ExitStatus, ProcessSpec, ProcessState, ProcessStatus, Result, Signal,
};
use pgvisor_output::{ChannelKind, DRAIN_TIMEOUT, OutputChannel, OutputMultiplexer, OutputSource};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// One supervised OS process across all of its runs.
///
/// The supervising task drives [`run`](Self::run); the shutdown path calls
/// [`interrupt`](Self::interrupt) and [`kill`](Self::kill) from elsewhere.
/// Both sides meet at `pid`, which is only written while its lock is held,
/// so a signal is either sent to a live child or not sent at all.
pub struct ManagedProcess {
    spec: ProcessSpec,
    source: OutputSource,
    output: Arc<OutputMultiplexer>,
    channel_kind: ChannelKind,
    pid: Mutex<Option<u32>>,
    state: watch::Sender<ProcessState>,
    restarts: AtomicU32,
    last_exit: Mutex<Option<ExitStatus>>,
}

impl fmt::Debug for ManagedProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedProcess")
            .field("name", &self.spec.name())
            .field("state", &*self.state.borrow())
            .field("pid", &*self.pid.lock())
            .finish()
    }
}

impl ManagedProcess {
    pub fn new(
        spec: ProcessSpec,
        color: u8,
        output: Arc<OutputMultiplexer>,
        channel_kind: ChannelKind,
    ) -> Self {
        let source = OutputSource::new(spec.name(), color);
        output.connect(&source);

        Self {
            spec,
            source,
            output,
            channel_kind,
            pid: Mutex::new(None),
            state: watch::Sender::new(ProcessState::Idle),
            restarts: AtomicU32::new(0),
            last_exit: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        self.spec.name()
    }

    pub fn spec(&self) -> &ProcessSpec {
        &self.spec
    }

    pub fn color(&self) -> u8 {
        self.source.color()
    }

    /// Spawns the command once and waits for it to exit.
    ///
    /// Returns `Ok(None)` without spawning when `scope` is already cancelled,
    /// or when waiting on the child failed. Channel and spawn failures are
    /// returned as errors; what they mean is up to the caller.
    pub async fn run(&self, scope: &CancellationToken) -> Result<Option<ExitStatus>> {
        let channel = OutputChannel::open(self.channel_kind)?;
        let mut pipe = self.output.pipe_output(self.source.clone(), channel)?;

        let mut child = {
            let mut pid = self.pid.lock();
            if scope.is_cancelled() {
                return Ok(None);
            }

            let stdio = pipe.channel().child_stdio()?;
            let mut cmd = self.spec.command().command();
            cmd.stdin(stdio.stdin)
                .stdout(stdio.stdout)
                .stderr(stdio.stderr);
            prepare_command(&mut cmd, pipe.channel().is_terminal());

            self.write_status("Running...");
            let child = cmd.spawn().map_err(|e| {
                Error::SpawnFailed(format!("{}: {}", self.spec.command().program(), e))
            })?;

            *pid = child.id();
            self.state.send_replace(ProcessState::Running);
            debug!("Spawned {} with pid {:?}", self.name(), *pid);
            child
        };
        pipe.release_child_end();

        let waited = child.wait().await;

        *self.pid.lock() = None;
        self.state.send_replace(ProcessState::Exited);
        pipe.drain(DRAIN_TIMEOUT).await;

        match waited {
            Ok(status) => {
                let status = ExitStatus::from_std(status);
                *self.last_exit.lock() = Some(status);
                if status.success() {
                    self.write_status(&format!("Process exited {}", status));
                } else {
                    self.write_err(&format!("Process exited {}", status));
                }
                Ok(Some(status))
            }
            Err(e) => {
                self.write_err(&e);
                Ok(None)
            }
        }
    }

    /// Sends the configured stop signal to the child's process group.
    /// Does nothing when no child is running.
    pub fn interrupt(&self) {
        let signal = self.spec.stop_signal();
        self.signal_group(signal, &format!("Stopping {}...", signal));
    }

    /// Like [`interrupt`](Self::interrupt), with SIGKILL.
    pub fn kill(&self) {
        self.signal_group(Signal::Kill, "Killing...");
    }

    fn signal_group(&self, signal: Signal, message: &str) {
        let guard = self.pid.lock();
        let Some(pid) = *guard else {
            return;
        };

        self.write_status(message);
        if let Err(e) = send_group_signal(pid, signal) {
            self.write_err(&e);
        }
    }

    pub fn running(&self) -> bool {
        self.pid.lock().is_some()
    }

    pub fn pid(&self) -> Option<u32> {
        *self.pid.lock()
    }

    pub fn state(&self) -> ProcessState {
        *self.state.borrow()
    }

    /// Resolves once the process is not running. Immediate if it never ran.
    pub async fn wait_stopped(&self) {
        let mut rx = self.state.subscribe();
        let _ = rx.wait_for(|state| !state.is_running()).await;
    }

    pub fn subscribe(&self) -> watch::Receiver<ProcessState> {
        self.state.subscribe()
    }

    pub(crate) fn mark_restarting(&self, attempt: u32) {
        self.restarts.store(attempt, Ordering::Relaxed);
        self.state.send_replace(ProcessState::Restarting);
    }

    pub(crate) fn mark_terminal(&self) {
        self.state.send_replace(ProcessState::Terminal);
    }

    pub fn status(&self) -> ProcessStatus {
        ProcessStatus {
            name: self.spec.name().to_string(),
            state: self.state(),
            pid: self.pid(),
            restarts: self.restarts.load(Ordering::Relaxed),
            restart_policy: self.spec.restart().to_string(),
            last_exit_code: (*self.last_exit.lock()).and_then(|status| status.code()),
        }
    }

    pub fn write_line(&self, line: &str) {
        self.output.write_line(&self.source, line.as_bytes());
    }

    pub fn write_status(&self, message: &str) {
        self.output.write_status(&self.source, message);
    }

    pub fn write_err(&self, err: &dyn fmt::Display) {
        self.output.write_err(&self.source, err);
    }
}

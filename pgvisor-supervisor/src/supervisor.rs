use crate::ManagedProcess;
use pgvisor_core::{
    AdminControl, Error, ProcessOption, ProcessSpec, ProcessStatus, RestartDecision,
    RestartTracker, Result, Signal,
};
use pgvisor_output::{ChannelKind, OutputMultiplexer, palette_color};
use std::fmt;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal::unix::{SignalKind, signal};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Runs a fixed set of processes until they finish, one of them exhausts its
/// restart budget, or a stop is requested.
///
/// Processes are registered with [`add_process`](Self::add_process) and the
/// whole set is driven by [`run`](Self::run), which consumes the supervisor.
/// Stopping is idempotent: every [`StopHandle`] shares one cancellation
/// token, and the first cancel starts the shutdown.
pub struct Supervisor {
    name: String,
    graceful_timeout: Duration,
    output: Arc<OutputMultiplexer>,
    channel_kind: ChannelKind,
    processes: Vec<Arc<ManagedProcess>>,
    scope: CancellationToken,
    listeners: Vec<JoinHandle<()>>,
}

impl fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Supervisor")
            .field("name", &self.name)
            .field("graceful_timeout", &self.graceful_timeout)
            .field("channel_kind", &self.channel_kind)
            .field("processes", &self.processes)
            .field("stopping", &self.scope.is_cancelled())
            .finish()
    }
}

impl Supervisor {
    /// A supervisor writing multiplexed output to stdout.
    pub fn new(name: impl Into<String>, graceful_timeout: Duration) -> Self {
        Self::with_multiplexer(name, graceful_timeout, OutputMultiplexer::stdout())
    }

    /// A supervisor writing uncoloured multiplexed output to `sink`.
    pub fn with_output(
        name: impl Into<String>,
        graceful_timeout: Duration,
        sink: Box<dyn Write + Send>,
    ) -> Self {
        Self::with_multiplexer(name, graceful_timeout, OutputMultiplexer::new(sink, false))
    }

    pub fn with_multiplexer(
        name: impl Into<String>,
        graceful_timeout: Duration,
        output: OutputMultiplexer,
    ) -> Self {
        Self {
            name: name.into(),
            graceful_timeout,
            output: Arc::new(output),
            channel_kind: ChannelKind::default(),
            processes: Vec::new(),
            scope: CancellationToken::new(),
            listeners: Vec::new(),
        }
    }

    /// Channel kind for processes registered after this call.
    pub fn with_channel_kind(mut self, kind: ChannelKind) -> Self {
        self.channel_kind = kind;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn graceful_timeout(&self) -> Duration {
        self.graceful_timeout
    }

    pub fn processes(&self) -> &[Arc<ManagedProcess>] {
        &self.processes
    }

    /// Registers a process. Command lexing errors surface here, before
    /// anything runs.
    pub fn add_process<I>(&mut self, name: &str, command: &str, options: I) -> Result<()>
    where
        I: IntoIterator<Item = ProcessOption>,
    {
        let spec = ProcessSpec::build(name, command, options)?;
        self.add_spec(spec);
        Ok(())
    }

    pub fn add_spec(&mut self, spec: ProcessSpec) {
        if self.processes.iter().any(|p| p.name() == spec.name()) {
            warn!("Process name {} registered more than once", spec.name());
        }

        let color = palette_color(self.processes.len());
        debug!(
            "Registering {} ({}), restart {}",
            spec.name(),
            spec.command(),
            spec.restart()
        );
        self.processes.push(Arc::new(ManagedProcess::new(
            spec,
            color,
            Arc::clone(&self.output),
            self.channel_kind,
        )));
    }

    /// Requests shutdown. Further calls have no effect.
    pub fn stop(&self) {
        self.scope.cancel();
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            scope: self.scope.clone(),
        }
    }

    pub fn handle(&self) -> SupervisorHandle {
        SupervisorHandle {
            name: Arc::from(self.name.as_str()),
            processes: self.processes.clone(),
            scope: self.scope.clone(),
        }
    }

    /// Forwards each of `signals` received by this process into a stop.
    pub fn stop_on_signal(&self, signals: &[Signal]) -> Result<()> {
        for &sig in signals {
            let mut stream = signal(SignalKind::from_raw(sig.as_raw()))
                .map_err(|e| Error::Signal(format!("cannot subscribe to {}: {}", sig, e)))?;
            let scope = self.scope.clone();

            tokio::spawn(async move {
                while stream.recv().await.is_some() {
                    info!("Got {}, stopping", sig);
                    scope.cancel();
                }
            });
        }
        Ok(())
    }

    /// Runs an admin surface alongside supervision. Its failure is logged
    /// and never affects the processes. It is stopped when `run` returns.
    pub fn start_admin_listener<F>(&mut self, listener: F)
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        self.listeners.push(tokio::spawn(async move {
            if let Err(e) = listener.await {
                error!("Admin listener failed: {}", e);
            }
        }));
    }

    /// Supervises every registered process until all have finished.
    ///
    /// Returns the first error any process task produced, which is
    /// [`Error::RestartsExhausted`] unless the very first spawn of a process
    /// failed. Forced termination during shutdown is not an error.
    pub async fn run(self) -> Result<()> {
        info!(
            "Supervisor {} starting {} processes",
            self.name,
            self.processes.len()
        );

        let scope = self.scope.clone();
        let mut tasks = JoinSet::new();
        for process in &self.processes {
            tasks.spawn(supervise(Arc::clone(process), scope.clone()));
        }

        let watcher = tokio::spawn(shutdown(
            self.processes.clone(),
            scope.clone(),
            self.graceful_timeout,
        ));

        let mut failure = None;
        while let Some(joined) = tasks.join_next().await {
            let result = joined
                .map_err(|e| Error::Supervisor(format!("process task failed: {}", e)))
                .and_then(|result| result);

            if let Err(e) = result {
                error!("{}", e);
                failure.get_or_insert(e);
                scope.cancel();
            }
        }

        if scope.is_cancelled() {
            if let Err(e) = watcher.await {
                warn!("Shutdown task failed: {}", e);
            }
        } else {
            watcher.abort();
        }

        for listener in &self.listeners {
            listener.abort();
        }

        info!("Supervisor {} finished", self.name);
        failure.map_or(Ok(()), Err)
    }
}

/// The restart loop of one process.
async fn supervise(process: Arc<ManagedProcess>, scope: CancellationToken) -> Result<()> {
    let mut tracker = RestartTracker::new(process.spec().restart());
    let mut started = false;

    loop {
        match process.run(&scope).await {
            Ok(_) => {}
            Err(e) if !started || e.is_configuration() => {
                process.write_err(&e);
                process.mark_terminal();
                return Err(e);
            }
            Err(e) => process.write_err(&e),
        }
        started = true;

        if scope.is_cancelled() {
            process.mark_terminal();
            return Ok(());
        }

        match tracker.next() {
            RestartDecision::Done => {
                process.write_line("done");
                process.mark_terminal();
                return Ok(());
            }
            RestartDecision::Exhausted { restarts } => {
                process.write_line("restart attempts exhausted, crashing");
                process.mark_terminal();
                debug!("{} gave up after {} restarts", process.name(), restarts);
                return Err(Error::RestartsExhausted(process.name().to_string()));
            }
            RestartDecision::Retry { attempt, delay } => {
                process.mark_restarting(attempt);
                process.write_line(&format!("restarting in {:?} [attempt {}]", delay, attempt));

                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = scope.cancelled() => {
                        process.mark_terminal();
                        return Ok(());
                    }
                }
            }
        }
    }
}

/// Interrupt everything, give it `timeout`, then kill what is left.
async fn shutdown(
    processes: Vec<Arc<ManagedProcess>>,
    scope: CancellationToken,
    timeout: Duration,
) {
    scope.cancelled().await;
    info!("supervisor stopping");

    for process in &processes {
        process.interrupt();
    }

    let all_stopped = async {
        for process in &processes {
            process.wait_stopped().await;
        }
    };
    if tokio::time::timeout(timeout, all_stopped).await.is_err() {
        warn!("Graceful timeout of {:?} elapsed, killing", timeout);
    }

    for process in &processes {
        process.kill();
    }
}

/// Cloneable trigger for [`Supervisor::stop`].
#[derive(Debug, Clone)]
pub struct StopHandle {
    scope: CancellationToken,
}

impl StopHandle {
    pub fn stop(&self) {
        self.scope.cancel();
    }

    pub fn is_stopping(&self) -> bool {
        self.scope.is_cancelled()
    }
}

/// Read and stop access to a supervisor that may be running.
#[derive(Debug, Clone)]
pub struct SupervisorHandle {
    name: Arc<str>,
    processes: Vec<Arc<ManagedProcess>>,
    scope: CancellationToken,
}

impl SupervisorHandle {
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            scope: self.scope.clone(),
        }
    }
}

impl AdminControl for SupervisorHandle {
    fn supervisor_name(&self) -> &str {
        &self.name
    }

    fn snapshot(&self) -> Vec<ProcessStatus> {
        self.processes.iter().map(|p| p.status()).collect()
    }

    fn request_stop(&self) {
        self.scope.cancel();
    }

    fn is_stopping(&self) -> bool {
        self.scope.is_cancelled()
    }
}

use parking_lot::Mutex;
use pgvisor_core::{ProcessSpec, ProcessState, Signal, with_stop_signal};
use pgvisor_output::{ChannelKind, OutputMultiplexer};
use pgvisor_supervisor::ManagedProcess;
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Clone, Default)]
struct Capture(Arc<Mutex<Vec<u8>>>);

impl Write for Capture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn managed(name: &str, command: &str) -> (Arc<ManagedProcess>, Capture) {
    let capture = Capture::default();
    let output = Arc::new(OutputMultiplexer::new(Box::new(capture.clone()), false));
    let spec = ProcessSpec::build(name, command, [with_stop_signal(Signal::Terminate)]).unwrap();
    let process = ManagedProcess::new(spec, 2, output, ChannelKind::Pipe);
    (Arc::new(process), capture)
}

#[test]
fn test_signals_are_noops_when_not_running() {
    let (process, capture) = managed("idle", "true");

    process.interrupt();
    process.kill();

    assert!(!process.running());
    assert_eq!(process.state(), ProcessState::Idle);
    assert!(capture.0.lock().is_empty());
}

#[tokio::test]
async fn test_wait_stopped_immediate_when_idle() {
    let (process, _capture) = managed("idle", "true");

    tokio::time::timeout(Duration::from_secs(1), process.wait_stopped())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_run_reports_exit_code() {
    let (process, _capture) = managed("exit3", "sh -c 'exit 3'");
    let scope = CancellationToken::new();

    let status = process.run(&scope).await.unwrap().unwrap();

    assert_eq!(status.code(), Some(3));
    assert_eq!(process.state(), ProcessState::Exited);
    assert_eq!(process.status().last_exit_code, Some(3));
    assert!(!process.running());
}

#[tokio::test]
async fn test_cancelled_scope_skips_spawn() {
    let (process, capture) = managed("late", "true");
    let scope = CancellationToken::new();
    scope.cancel();

    assert!(process.run(&scope).await.unwrap().is_none());
    assert_eq!(process.state(), ProcessState::Idle);
    assert!(capture.0.lock().is_empty());
}

#[tokio::test]
async fn test_interrupt_stops_running_child() {
    let (process, _capture) = managed("sleeper", "sleep 10");
    let scope = CancellationToken::new();

    let runner = {
        let process = Arc::clone(&process);
        let scope = scope.clone();
        tokio::spawn(async move { process.run(&scope).await })
    };

    let mut states = process.subscribe();
    states
        .wait_for(|state| state.is_running())
        .await
        .unwrap();
    assert!(process.pid().is_some());

    process.interrupt();
    let status = runner.await.unwrap().unwrap().unwrap();
    assert_eq!(status.signal(), Some(libc::SIGTERM));
}

use nix::sys::signal::killpg;
use nix::unistd::Pid;
use pgvisor_core::{Error, Result, Signal};
use std::io;
use tokio::process::Command;

#[cfg(target_os = "linux")]
use crate::linux::ensure_kill;

#[cfg(not(target_os = "linux"))]
fn ensure_kill() -> io::Result<()> {
    Ok(())
}

/// Makes the child a session (and so process-group) leader. With a pty its
/// stdin, the slave, also becomes the controlling terminal.
pub fn prepare_command(cmd: &mut Command, controlling_tty: bool) {
    // SAFETY: the closure only makes async-signal-safe syscalls.
    unsafe {
        cmd.pre_exec(move || {
            if libc::setsid() == -1 {
                return Err(io::Error::last_os_error());
            }
            if controlling_tty && libc::ioctl(0, libc::TIOCSCTTY as _, 0) == -1 {
                return Err(io::Error::last_os_error());
            }
            ensure_kill()
        });
    }
}

/// Signals every process in the group led by `pid`.
pub fn send_group_signal(pid: u32, signal: Signal) -> Result<()> {
    let pgid = i32::try_from(pid)
        .map_err(|_| Error::Signal(format!("pid {} out of range", pid)))?;
    killpg(Pid::from_raw(pgid), signal.to_nix())?;
    Ok(())
}

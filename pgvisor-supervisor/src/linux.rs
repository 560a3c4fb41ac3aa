use std::io;

/// Asks the kernel to SIGKILL the child when the thread that spawned it dies.
/// Runs between fork and exec.
pub(crate) fn ensure_kill() -> io::Result<()> {
    // SAFETY: prctl is async-signal-safe.
    if unsafe { libc::prctl(libc::PR_SET_PDEATHSIG, libc::SIGKILL) } == -1 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

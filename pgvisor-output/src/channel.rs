use nix::pty::Winsize;
use nix::sys::termios::Termios;
use pgvisor_core::{Error, OutputMode, Result};
use std::fs::File;
use std::os::fd::{AsRawFd, OwnedFd};
use std::process::Stdio;

/// How a child's output reaches the supervisor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChannelKind {
    /// A pseudo-terminal; the child sees a tty and becomes its session leader.
    #[default]
    Pty,
    /// A plain pipe shared by stdout and stderr; stdin is `/dev/null`.
    Pipe,
}

impl From<OutputMode> for ChannelKind {
    fn from(mode: OutputMode) -> Self {
        match mode {
            OutputMode::Pty => Self::Pty,
            OutputMode::Pipe => Self::Pipe,
        }
    }
}

/// The stdio triple handed to one spawn.
pub struct ChildStdio {
    pub stdin: Stdio,
    pub stdout: Stdio,
    pub stderr: Stdio,
}

/// One per-run output channel.
///
/// The supervisor keeps the reading end; the child end is dup'ed onto the
/// child's stdio and must be released once the spawn is done, otherwise the
/// reader never sees end of stream.
#[derive(Debug)]
pub struct OutputChannel {
    kind: ChannelKind,
    reader: OwnedFd,
    child_end: Option<OwnedFd>,
}

impl OutputChannel {
    pub fn open(kind: ChannelKind) -> Result<Self> {
        let (reader, child_end) = match kind {
            ChannelKind::Pty => {
                let pty = nix::pty::openpty(None::<&Winsize>, None::<&Termios>)
                    .map_err(|e| Error::Channel(format!("openpty: {}", e)))?;
                (pty.master, pty.slave)
            }
            ChannelKind::Pipe => {
                nix::unistd::pipe().map_err(|e| Error::Channel(format!("pipe: {}", e)))?
            }
        };

        set_cloexec(&reader)?;
        set_cloexec(&child_end)?;

        Ok(Self {
            kind,
            reader,
            child_end: Some(child_end),
        })
    }

    pub fn kind(&self) -> ChannelKind {
        self.kind
    }

    pub fn is_terminal(&self) -> bool {
        self.kind == ChannelKind::Pty
    }

    /// Duplicates the child end for stdin/stdout/stderr. Pipe mode gives the
    /// child no stdin.
    pub fn child_stdio(&self) -> Result<ChildStdio> {
        let child_end = self
            .child_end
            .as_ref()
            .ok_or_else(|| Error::Channel("child end already released".to_string()))?;

        let stdin = match self.kind {
            ChannelKind::Pty => Stdio::from(child_end.try_clone()?),
            ChannelKind::Pipe => Stdio::null(),
        };

        Ok(ChildStdio {
            stdin,
            stdout: Stdio::from(child_end.try_clone()?),
            stderr: Stdio::from(child_end.try_clone()?),
        })
    }

    /// Closes the supervisor's copy of the child end.
    pub fn release_child_end(&mut self) {
        self.child_end.take();
    }

    /// A blocking reader over a duplicate of the reading end.
    pub fn reader(&self) -> Result<File> {
        Ok(File::from(self.reader.try_clone()?))
    }
}

fn set_cloexec(fd: &OwnedFd) -> Result<()> {
    // SAFETY: fd is a valid open descriptor owned by the caller.
    let rc = unsafe { libc::fcntl(fd.as_raw_fd(), libc::F_SETFD, libc::FD_CLOEXEC) };
    if rc == -1 {
        return Err(Error::Channel(format!(
            "fcntl: {}",
            std::io::Error::last_os_error()
        )));
    }
    Ok(())
}

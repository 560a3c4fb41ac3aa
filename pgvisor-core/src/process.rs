use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use tokio::process::Command;

/// Signals a supervised process can be sent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Signal {
    #[default]
    Interrupt,
    Terminate,
    Kill,
    Quit,
    Hangup,
    User1,
    User2,
}

impl Signal {
    pub fn as_str(self) -> &'static str {
        match self {
            Signal::Interrupt => "SIGINT",
            Signal::Terminate => "SIGTERM",
            Signal::Kill => "SIGKILL",
            Signal::Quit => "SIGQUIT",
            Signal::Hangup => "SIGHUP",
            Signal::User1 => "SIGUSR1",
            Signal::User2 => "SIGUSR2",
        }
    }

    #[cfg(unix)]
    pub fn to_nix(self) -> nix::sys::signal::Signal {
        use nix::sys::signal::Signal as NixSignal;
        match self {
            Signal::Interrupt => NixSignal::SIGINT,
            Signal::Terminate => NixSignal::SIGTERM,
            Signal::Kill => NixSignal::SIGKILL,
            Signal::Quit => NixSignal::SIGQUIT,
            Signal::Hangup => NixSignal::SIGHUP,
            Signal::User1 => NixSignal::SIGUSR1,
            Signal::User2 => NixSignal::SIGUSR2,
        }
    }

    #[cfg(unix)]
    pub fn as_raw(self) -> i32 {
        self.to_nix() as i32
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Signal {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        let upper = s.trim().to_ascii_uppercase();
        let name = upper.strip_prefix("SIG").unwrap_or(&upper);
        match name {
            "INT" => Ok(Signal::Interrupt),
            "TERM" => Ok(Signal::Terminate),
            "KILL" => Ok(Signal::Kill),
            "QUIT" => Ok(Signal::Quit),
            "HUP" => Ok(Signal::Hangup),
            "USR1" => Ok(Signal::User1),
            "USR2" => Ok(Signal::User2),
            _ => Err(crate::Error::Signal(format!("unknown signal {:?}", s))),
        }
    }
}

impl TryFrom<String> for Signal {
    type Error = crate::Error;

    fn try_from(value: String) -> crate::Result<Self> {
        value.parse()
    }
}

impl From<Signal> for String {
    fn from(signal: Signal) -> Self {
        signal.as_str().to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitStatus {
    code: Option<i32>,
    signal: Option<i32>,
}

impl ExitStatus {
    pub fn from_std(status: std::process::ExitStatus) -> Self {
        Self {
            code: status.code(),
            #[cfg(unix)]
            signal: {
                use std::os::unix::process::ExitStatusExt;
                status.signal()
            },
            #[cfg(not(unix))]
            signal: None,
        }
    }

    pub fn new(code: Option<i32>, signal: Option<i32>) -> Self {
        Self { code, signal }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    pub fn code(&self) -> Option<i32> {
        self.code
    }

    pub fn signal(&self) -> Option<i32> {
        self.signal
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.code, self.signal) {
            (Some(code), _) => write!(f, "{}", code),
            (None, Some(signal)) => write!(f, "by signal {}", signal),
            (None, None) => f.write_str("with unknown status"),
        }
    }
}

/// A lexed command line plus the environment and directory it runs with.
///
/// Child handles are single-use, so every (re)start asks for a fresh
/// [`Command`] through [`CommandLine::command`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    program: String,
    args: Vec<String>,
    env: BTreeMap<String, String>,
    cwd: Option<PathBuf>,
}

impl CommandLine {
    /// Splits `command` with shell quoting rules.
    pub fn parse(name: &str, command: &str) -> crate::Result<Self> {
        let parts = shell_words::split(command).map_err(|e| crate::Error::InvalidCommand {
            name: name.to_string(),
            reason: e.to_string(),
        })?;

        let mut parts = parts.into_iter();
        let program = parts.next().ok_or_else(|| crate::Error::InvalidCommand {
            name: name.to_string(),
            reason: "empty command".to_string(),
        })?;

        Ok(Self {
            program,
            args: parts.collect(),
            env: BTreeMap::new(),
            cwd: None,
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn env(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    pub fn cwd(&self) -> Option<&PathBuf> {
        self.cwd.as_ref()
    }

    /// Later values for the same key replace earlier ones.
    pub fn extend_env<I, K, V>(&mut self, vars: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (k, v) in vars {
            self.env.insert(k.into(), v.into());
        }
    }

    pub fn set_cwd(&mut self, dir: impl Into<PathBuf>) {
        self.cwd = Some(dir.into());
    }

    /// Builds a fresh command; the inherited environment is kept and the
    /// overlay is applied on top of it.
    pub fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).envs(&self.env).kill_on_drop(true);

        if let Some(cwd) = &self.cwd {
            cmd.current_dir(cwd);
        }

        cmd
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut words = Vec::with_capacity(self.args.len() + 1);
        words.push(self.program.as_str());
        words.extend(self.args.iter().map(String::as_str));
        f.write_str(&shell_words::join(words))
    }
}

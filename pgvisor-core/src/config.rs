pub mod loader;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::time::Duration;

use crate::{CommandLine, RestartPolicy, Signal};

pub use loader::ConfigLoader;

/// Immutable description of one supervised process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSpec {
    name: String,
    command: CommandLine,
    stop_signal: Signal,
    restart: RestartPolicy,
}

impl ProcessSpec {
    /// Lexes `command` and validates `name`. Failures here are configuration
    /// errors and are reported before anything is started.
    pub fn new(name: impl Into<String>, command: &str) -> crate::Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(crate::Error::InvalidProcessName(name));
        }

        let command = CommandLine::parse(&name, command)?;
        Ok(Self {
            name,
            command,
            stop_signal: Signal::Interrupt,
            restart: RestartPolicy::Never,
        })
    }

    /// Builds a spec and applies `options` in order.
    pub fn build<I>(name: impl Into<String>, command: &str, options: I) -> crate::Result<Self>
    where
        I: IntoIterator<Item = ProcessOption>,
    {
        let mut spec = Self::new(name, command)?;
        for option in options {
            spec.apply(option);
        }
        Ok(spec)
    }

    /// Environment additions accumulate; everything else is last-write-wins.
    pub fn apply(&mut self, option: ProcessOption) {
        match option {
            ProcessOption::Env(vars) => self.command.extend_env(vars),
            ProcessOption::StopSignal(signal) => self.stop_signal = signal,
            ProcessOption::RootDir(dir) => self.command.set_cwd(dir),
            ProcessOption::Restart(policy) => self.restart = policy,
        }
    }

    pub fn with(mut self, option: ProcessOption) -> Self {
        self.apply(option);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn command(&self) -> &CommandLine {
        &self.command
    }

    pub fn stop_signal(&self) -> Signal {
        self.stop_signal
    }

    pub fn restart(&self) -> RestartPolicy {
        self.restart
    }
}

/// A single configuration step applied to a [`ProcessSpec`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOption {
    Env(BTreeMap<String, String>),
    StopSignal(Signal),
    RootDir(PathBuf),
    Restart(RestartPolicy),
}

pub fn with_env<I, K, V>(vars: I) -> ProcessOption
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    ProcessOption::Env(
        vars.into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect(),
    )
}

pub fn with_stop_signal(signal: Signal) -> ProcessOption {
    ProcessOption::StopSignal(signal)
}

pub fn with_root_dir(dir: impl Into<PathBuf>) -> ProcessOption {
    ProcessOption::RootDir(dir.into())
}

/// Restart the process whenever it exits. A `max_restarts` of 0 restarts forever.
pub fn with_restart(max_restarts: u32, delay: Duration) -> ProcessOption {
    ProcessOption::Restart(RestartPolicy::from_limit(max_restarts, delay))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    #[default]
    Pty,
    Pipe,
}

/// On-disk launcher description, `pgvisor.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LauncherConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_graceful_timeout_ms")]
    pub graceful_timeout_ms: u64,
    #[serde(default)]
    pub output: OutputMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_socket: Option<PathBuf>,
    #[serde(default)]
    pub processes: Vec<ProcessConfig>,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            graceful_timeout_ms: default_graceful_timeout_ms(),
            output: OutputMode::default(),
            admin_socket: None,
            processes: Vec::new(),
        }
    }
}

impl LauncherConfig {
    pub fn graceful_timeout(&self) -> Duration {
        Duration::from_millis(self.graceful_timeout_ms)
    }

    /// Turns every process entry into a spec, failing on the first bad one.
    pub fn specs(&self) -> crate::Result<Vec<ProcessSpec>> {
        self.processes.iter().map(ProcessConfig::to_spec).collect()
    }
}

fn default_name() -> String {
    "pgvisor".to_string()
}

fn default_graceful_timeout_ms() -> u64 {
    5_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessConfig {
    pub name: String,
    pub command: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub env: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_signal: Option<Signal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restart: Option<RestartConfig>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RestartConfig {
    #[serde(default)]
    pub max_restarts: u32,
    #[serde(default = "default_restart_delay_ms")]
    pub delay_ms: u64,
}

fn default_restart_delay_ms() -> u64 {
    1_000
}

impl ProcessConfig {
    pub fn to_spec(&self) -> crate::Result<ProcessSpec> {
        let mut options = Vec::new();

        if !self.env.is_empty() {
            options.push(with_env(
                self.env
                    .iter()
                    .map(|(k, v)| (k.clone(), expand_env(v))),
            ));
        }
        if let Some(signal) = self.stop_signal {
            options.push(with_stop_signal(signal));
        }
        if let Some(dir) = &self.dir {
            options.push(with_root_dir(dir.clone()));
        }
        if let Some(restart) = self.restart {
            options.push(with_restart(
                restart.max_restarts,
                Duration::from_millis(restart.delay_ms),
            ));
        }

        ProcessSpec::build(&self.name, &self.command, options)
    }
}

/// Expands `${VAR}` references from the launcher's environment. Unset
/// variables expand to nothing; an unterminated `${` is kept literally.
pub fn expand_env(value: &str) -> String {
    expand_with(value, |key| std::env::var(key).ok())
}

fn expand_with(value: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                out.push_str(&lookup(&after[..end]).unwrap_or_default());
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_defaults() {
        let spec = ProcessSpec::new("keeper", "gosu stolon stolon-keeper").unwrap();

        assert_eq!(spec.name(), "keeper");
        assert_eq!(spec.command().program(), "gosu");
        assert_eq!(spec.stop_signal(), Signal::Interrupt);
        assert_eq!(spec.restart(), RestartPolicy::Never);
        assert!(spec.command().cwd().is_none());
    }

    #[test]
    fn test_options_apply_in_order() {
        let spec = ProcessSpec::build(
            "proxy",
            "haproxy -W -db",
            [
                with_env([("A", "1")]),
                with_stop_signal(Signal::Terminate),
                with_env([("B", "2"), ("A", "override")]),
                with_stop_signal(Signal::Quit),
                with_root_dir("/tmp"),
                with_restart(3, Duration::from_secs(1)),
                with_restart(0, Duration::from_secs(2)),
            ],
        )
        .unwrap();

        let env = spec.command().env();
        assert_eq!(env.get("A").map(String::as_str), Some("override"));
        assert_eq!(env.get("B").map(String::as_str), Some("2"));
        assert_eq!(spec.stop_signal(), Signal::Quit);
        assert_eq!(spec.command().cwd(), Some(&PathBuf::from("/tmp")));
        assert_eq!(
            spec.restart(),
            RestartPolicy::Forever {
                delay: Duration::from_secs(2)
            }
        );
    }

    #[test]
    fn test_blank_name_rejected() {
        assert!(matches!(
            ProcessSpec::new("  ", "true"),
            Err(crate::Error::InvalidProcessName(_))
        ));
    }

    #[test]
    fn test_expand_with() {
        let lookup = |key: &str| match key {
            "APP" => Some("pg-app".to_string()),
            "REGION" => Some("ord".to_string()),
            _ => None,
        };

        assert_eq!(expand_with("plain", lookup), "plain");
        assert_eq!(expand_with("${APP}", lookup), "pg-app");
        assert_eq!(expand_with("${APP}.${REGION}:5432", lookup), "pg-app.ord:5432");
        assert_eq!(expand_with("x${MISSING}y", lookup), "xy");
        assert_eq!(expand_with("broken ${APP", lookup), "broken ${APP");
    }

    #[test]
    fn test_process_config_to_spec() {
        let config = ProcessConfig {
            name: "sentinel".to_string(),
            command: "stolon-sentinel".to_string(),
            env: HashMap::from([("STSENTINEL_LOG_LEVEL".to_string(), "info".to_string())]),
            dir: None,
            stop_signal: Some(Signal::Terminate),
            restart: Some(RestartConfig {
                max_restarts: 0,
                delay_ms: 3_000,
            }),
        };

        let spec = config.to_spec().unwrap();
        assert_eq!(spec.stop_signal(), Signal::Terminate);
        assert_eq!(
            spec.restart(),
            RestartPolicy::Forever {
                delay: Duration::from_secs(3)
            }
        );
        assert_eq!(
            spec.command().env().get("STSENTINEL_LOG_LEVEL").map(String::as_str),
            Some("info")
        );
    }
}

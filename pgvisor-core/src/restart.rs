use std::fmt;
use std::time::Duration;

/// What happens after a supervised process exits.
///
/// Configuration uses `max_restarts = 0` to mean "forever"; internally that
/// overload is split into [`RestartPolicy::Limited`] and [`RestartPolicy::Forever`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RestartPolicy {
    #[default]
    Never,
    Limited { max_restarts: u32, delay: Duration },
    Forever { delay: Duration },
}

impl RestartPolicy {
    /// `max_restarts == 0` restarts indefinitely.
    pub fn from_limit(max_restarts: u32, delay: Duration) -> Self {
        match max_restarts {
            0 => Self::Forever { delay },
            max_restarts => Self::Limited { max_restarts, delay },
        }
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(self, Self::Never)
    }

    pub fn delay(&self) -> Duration {
        match self {
            Self::Never => Duration::ZERO,
            Self::Limited { delay, .. } | Self::Forever { delay } => *delay,
        }
    }

    pub fn max_restarts(&self) -> Option<u32> {
        match self {
            Self::Limited { max_restarts, .. } => Some(*max_restarts),
            _ => None,
        }
    }
}

impl fmt::Display for RestartPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Never => f.write_str("never"),
            Self::Limited {
                max_restarts,
                delay,
            } => write!(f, "up to {} every {:?}", max_restarts, delay),
            Self::Forever { delay } => write!(f, "forever every {:?}", delay),
        }
    }
}

/// Outcome of consulting a [`RestartTracker`] after an exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartDecision {
    /// Restarts are disabled; the process is finished.
    Done,
    /// The restart budget is spent.
    Exhausted { restarts: u32 },
    /// Wait `delay`, then start attempt number `attempt`.
    Retry { attempt: u32, delay: Duration },
}

/// Per-process restart counter.
///
/// Owned by the task supervising the process. The counter never decreases
/// for the lifetime of the process.
#[derive(Debug, Clone)]
pub struct RestartTracker {
    policy: RestartPolicy,
    restarts: u32,
}

impl RestartTracker {
    pub fn new(policy: RestartPolicy) -> Self {
        Self {
            policy,
            restarts: 0,
        }
    }

    pub fn policy(&self) -> RestartPolicy {
        self.policy
    }

    pub fn restarts(&self) -> u32 {
        self.restarts
    }

    pub fn is_exhausted(&self) -> bool {
        match self.policy {
            RestartPolicy::Limited { max_restarts, .. } => self.restarts >= max_restarts,
            _ => false,
        }
    }

    /// Decides what follows an exit, consuming one restart when retrying.
    pub fn next(&mut self) -> RestartDecision {
        match self.policy {
            RestartPolicy::Never => RestartDecision::Done,
            RestartPolicy::Limited { .. } if self.is_exhausted() => RestartDecision::Exhausted {
                restarts: self.restarts,
            },
            policy => {
                self.restarts = self.restarts.saturating_add(1);
                RestartDecision::Retry {
                    attempt: self.restarts,
                    delay: policy.delay(),
                }
            }
        }
    }
}

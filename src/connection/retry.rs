//! Retry policy for connection attempts

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Delay strategy between failed attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Same delay after every failure
    Fixed(Duration),
    /// Doubling delay, capped at `max`
    Exponential { initial: Duration, max: Duration },
}

impl Backoff {
    /// Delay to wait after the `failures`-th consecutive failure (1-based)
    pub fn delay(&self, failures: u32) -> Duration {
        match *self {
            Backoff::Fixed(delay) => delay,
            Backoff::Exponential { initial, max } => {
                let shift = failures.saturating_sub(1).min(31);
                initial
                    .checked_mul(1u32 << shift)
                    .map_or(max, |d| std::cmp::min(d, max))
            }
        }
    }
}

/// Backoff plus an optional attempt ceiling. `None` retries forever.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub backoff: Backoff,
    pub max_attempts: Option<u32>,
}

impl RetryPolicy {
    /// Keep trying forever with a fixed delay
    pub fn forever(delay: Duration) -> Self {
        Self {
            backoff: Backoff::Fixed(delay),
            max_attempts: None,
        }
    }

    /// Start counting attempts for one connect cycle
    pub fn attempts(&self) -> Attempts {
        Attempts {
            backoff: self.backoff,
            max_attempts: self.max_attempts,
            made: 0,
        }
    }
}

/// Attempt counter for a single connect cycle
#[derive(Debug, Clone)]
pub struct Attempts {
    backoff: Backoff,
    max_attempts: Option<u32>,
    made: u32,
}

impl Attempts {
    /// Record a failed attempt.
    ///
    /// Returns the delay before the next attempt, or `None` once the ceiling
    /// is reached.
    pub fn record_failure(&mut self) -> Option<Duration> {
        self.made = self.made.saturating_add(1);
        match self.max_attempts {
            Some(max) if self.made >= max => None,
            _ => Some(self.backoff.delay(self.made)),
        }
    }

    /// Failed attempts so far
    pub fn made(&self) -> u32 {
        self.made
    }
}

/// Which layer a connect cycle was for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    Network,
    Session,
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Layer::Network => write!(f, "network"),
            Layer::Session => write!(f, "session"),
        }
    }
}

/// Only produced when a policy sets an attempt ceiling
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConnectError {
    #[error("Gave up connecting the {layer} layer after {attempts} attempts")]
    AttemptsExhausted { layer: Layer, attempts: u32 },
}

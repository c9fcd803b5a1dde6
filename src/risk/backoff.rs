use rand::Rng;
use serde::Deserialize;
use std::time::Duration;
use tokio::time::Instant;

/// Cooldown lengths after consecutive submission failures.
///
/// The n-th failure in a row waits `base * 2^(n-1)`, scaled by a random
/// factor in `[1 - jitter, 1 + jitter]` and never longer than `max_delay`.
#[derive(Debug, Clone)]
pub struct CooldownSchedule {
    base: Duration,
    max_delay: Duration,
    jitter: f64,
}

impl CooldownSchedule {
    pub fn new(base: Duration, max_delay: Duration, jitter: f64) -> Self {
        Self {
            base,
            max_delay,
            jitter: jitter.clamp(0.0, 1.0),
        }
    }

    /// Cooldown after `failures` consecutive failures (counted from 1)
    pub fn delay(&self, failures: u32) -> Duration {
        let doublings = failures.saturating_sub(1).min(31);
        let nominal = self.base.saturating_mul(1 << doublings).min(self.max_delay);

        let factor = if self.jitter > 0.0 {
            rand::thread_rng().gen_range(1.0 - self.jitter..=1.0 + self.jitter)
        } else {
            1.0
        };

        nominal.mul_f64(factor).min(self.max_delay)
    }
}

/// How the decision loop reacts to repeated submission failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetryMode {
    /// Re-evaluate and resubmit on every tick while the trigger holds
    Unthrottled,
    /// Skip submission for a capped, growing cooldown after each failure
    #[default]
    Backoff,
}

impl std::str::FromStr for RetryMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "unthrottled" => Ok(RetryMode::Unthrottled),
            "backoff" => Ok(RetryMode::Backoff),
            other => Err(format!("unknown retry mode '{}' (expected unthrottled or backoff)", other)),
        }
    }
}

/// Gate in front of order submission, driven by submission outcomes
#[derive(Debug, Clone)]
pub struct SubmissionThrottle {
    mode: RetryMode,
    schedule: CooldownSchedule,
    blocked_until: Option<Instant>,
    consecutive_failures: u32,
}

impl SubmissionThrottle {
    pub fn new(mode: RetryMode, schedule: CooldownSchedule) -> Self {
        Self {
            mode,
            schedule,
            blocked_until: None,
            consecutive_failures: 0,
        }
    }

    pub fn unthrottled() -> Self {
        Self::new(
            RetryMode::Unthrottled,
            CooldownSchedule::new(Duration::ZERO, Duration::ZERO, 0.0),
        )
    }

    pub fn mode(&self) -> RetryMode {
        self.mode
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Time left before submissions are allowed again
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.blocked_until
            .filter(|until| *until > now)
            .map(|until| until - now)
    }

    /// Register a failed submission; returns the cooldown imposed, if any
    pub fn record_failure(&mut self, now: Instant) -> Option<Duration> {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);

        match self.mode {
            RetryMode::Unthrottled => None,
            RetryMode::Backoff => {
                let delay = self.schedule.delay(self.consecutive_failures);
                self.blocked_until = Some(now + delay);
                Some(delay)
            }
        }
    }

    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
        self.blocked_until = None;
    }
}

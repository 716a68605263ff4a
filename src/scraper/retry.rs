use std::time::Duration;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Attempt budget and exponential backoff schedule (`base * 2^attempt`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Backoff after the zero-based `attempt`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// How a single attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    /// HTTP 429. Earns an extra pause of one backoff step before the usual backoff.
    RateLimited,
    Failed,
}

/// Retry loop as an explicit state machine. Attempts are zero-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    Attempting(u32),
    BackingOff { attempt: u32, delay: Duration },
    Succeeded,
    Exhausted { attempts: u32 },
}

impl RetryState {
    pub fn start() -> Self {
        RetryState::Attempting(0)
    }

    /// Transition out of `Attempting`. Other states are returned unchanged.
    pub fn on_outcome(self, outcome: AttemptOutcome, policy: &RetryPolicy) -> Self {
        let RetryState::Attempting(attempt) = self else {
            return self;
        };
        if outcome == AttemptOutcome::Success {
            return RetryState::Succeeded;
        }
        if attempt + 1 >= policy.max_attempts {
            return RetryState::Exhausted {
                attempts: attempt + 1,
            };
        }
        let mut delay = policy.backoff(attempt);
        if outcome == AttemptOutcome::RateLimited {
            delay += policy.backoff(attempt);
        }
        RetryState::BackingOff { attempt, delay }
    }

    /// Transition out of `BackingOff` once the delay has been slept.
    pub fn resume(self) -> Self {
        match self {
            RetryState::BackingOff { attempt, .. } => RetryState::Attempting(attempt + 1),
            other => other,
        }
    }
}

//! Poll scheduling strategies

use std::fmt::Debug;
use std::time::Duration;
use ticker_config::{BackoffKind, PollingPolicy};

/// Upper bound for any computed poll delay
pub const MAX_POLL_DELAY: Duration = Duration::from_secs(300);

/// Decides how long to wait before the next poll
pub trait BackoffPolicy: Debug + Send + Sync {
    /// Delay before the next poll, given the current consecutive error count
    fn next_delay(&self, consecutive_errors: u32) -> Duration;
}

/// Same period whatever happened
#[derive(Debug, Clone)]
pub struct FixedInterval {
    pub interval: Duration,
}

impl BackoffPolicy for FixedInterval {
    fn next_delay(&self, _consecutive_errors: u32) -> Duration {
        self.interval
    }
}

/// Regular period while healthy; `retry_delay * 2^(errors-1)` after errors, capped
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    pub interval: Duration,
    pub retry_delay: Duration,
    pub cap: Duration,
}

impl BackoffPolicy for ExponentialBackoff {
    fn next_delay(&self, consecutive_errors: u32) -> Duration {
        if consecutive_errors == 0 {
            return self.interval;
        }
        let shift = (consecutive_errors - 1).min(16);
        self.retry_delay
            .saturating_mul(1u32 << shift)
            .min(self.cap)
    }
}

/// Build the policy selected in configuration
pub fn backoff_from_policy(polling: &PollingPolicy) -> Box<dyn BackoffPolicy> {
    match polling.backoff {
        BackoffKind::Fixed => Box::new(FixedInterval {
            interval: polling.interval,
        }),
        BackoffKind::Exponential => Box::new(ExponentialBackoff {
            interval: polling.interval,
            retry_delay: polling.retry_delay,
            cap: MAX_POLL_DELAY,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_ignores_errors() {
        let policy = FixedInterval {
            interval: Duration::from_secs(5),
        };
        assert_eq!(policy.next_delay(0), Duration::from_secs(5));
        assert_eq!(policy.next_delay(7), Duration::from_secs(5));
    }

    #[test]
    fn exponential_doubles_and_caps() {
        let policy = ExponentialBackoff {
            interval: Duration::from_secs(5),
            retry_delay: Duration::from_secs(5),
            cap: Duration::from_secs(30),
        };

        assert_eq!(policy.next_delay(0), Duration::from_secs(5));
        assert_eq!(policy.next_delay(1), Duration::from_secs(5));
        assert_eq!(policy.next_delay(2), Duration::from_secs(10));
        assert_eq!(policy.next_delay(3), Duration::from_secs(20));
        assert_eq!(policy.next_delay(4), Duration::from_secs(30));
        assert_eq!(policy.next_delay(40), Duration::from_secs(30));
    }

    #[test]
    fn default_policy_is_fixed() {
        let policy = backoff_from_policy(&PollingPolicy::default());
        assert_eq!(policy.next_delay(2), Duration::from_secs(5));
    }
}

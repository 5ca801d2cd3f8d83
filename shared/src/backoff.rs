//! Contention-aware backoff for the response wait loop
//!
//! Every failed probe counts as one attempt at the current interval. Once the
//! waiters together have burned `PATIENCE` attempts each, the interval grows by
//! `INCREMENT`. The threshold scales with the number of live waiters, so the
//! aggregate probe rate against the store stays roughly flat as more devices
//! wait at once.

use std::time::Duration;

use crate::policy;

/// Tunables for the backoff state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub initial_interval_secs: u64,
    pub increment_secs: u64,
    pub patience: u64,
    pub max_interval_secs: u64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_interval_secs: policy::INITIAL_INTERVAL_SECS,
            increment_secs: policy::INCREMENT_SECS,
            patience: policy::PATIENCE,
            max_interval_secs: policy::MAX_INTERVAL_SECS,
        }
    }
}

/// Snapshot of the shared backoff counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffState {
    pub current_interval_secs: u64,
    pub attempts_at_current_interval: u64,
}

/// Outcome of recording one failed probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffStep {
    /// Interval unchanged, attempt counted
    Held,
    /// Patience ran out and the interval grew
    Raised { from: u64, to: u64 },
    /// Interval is already at its ceiling
    Saturated,
}

/// Backoff state machine shared by every waiter on a channel
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: BackoffPolicy,
    state: BackoffState,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(BackoffPolicy::default())
    }
}

impl Backoff {
    /// Create a backoff starting at the policy's initial interval
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            policy,
            state: BackoffState {
                current_interval_secs: policy.initial_interval_secs.min(policy.max_interval_secs),
                attempts_at_current_interval: 0,
            },
        }
    }

    pub fn policy(&self) -> BackoffPolicy {
        self.policy
    }

    pub fn state(&self) -> BackoffState {
        self.state
    }

    /// Current sleep between probes
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.state.current_interval_secs)
    }

    /// Record one failed probe made while `live_waiters` callers were waiting
    pub fn progress(&mut self, live_waiters: usize) -> BackoffStep {
        let waiters = live_waiters.max(1) as u64;
        self.state.attempts_at_current_interval += 1;

        if self.state.current_interval_secs >= self.policy.max_interval_secs {
            return BackoffStep::Saturated;
        }

        let threshold = self.policy.patience.saturating_mul(waiters);
        if self.state.attempts_at_current_interval < threshold {
            return BackoffStep::Held;
        }

        let from = self.state.current_interval_secs;
        let to = from
            .saturating_add(self.policy.increment_secs)
            .min(self.policy.max_interval_secs);
        self.state.attempts_at_current_interval = 0;
        self.state.current_interval_secs = to;

        BackoffStep::Raised { from, to }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probes_until_raise(backoff: &mut Backoff, waiters: usize) -> u64 {
        let mut probes = 0;
        loop {
            probes += 1;
            if let BackoffStep::Raised { .. } = backoff.progress(waiters) {
                return probes;
            }
        }
    }

    #[test]
    fn test_initial_state() {
        let backoff = Backoff::default();
        assert_eq!(backoff.state().current_interval_secs, 10);
        assert_eq!(backoff.state().attempts_at_current_interval, 0);
        assert_eq!(backoff.interval(), Duration::from_secs(10));
    }

    #[test]
    fn test_single_waiter_raises_after_patience() {
        let mut backoff = Backoff::default();

        for _ in 0..9 {
            assert_eq!(backoff.progress(1), BackoffStep::Held);
        }
        assert_eq!(backoff.state().current_interval_secs, 10);

        assert_eq!(backoff.progress(1), BackoffStep::Raised { from: 10, to: 15 });
        assert_eq!(backoff.state().current_interval_secs, 15);
        assert_eq!(backoff.state().attempts_at_current_interval, 0);
    }

    #[test]
    fn test_threshold_scales_with_waiters() {
        let mut one = Backoff::default();
        let mut two = Backoff::default();
        let mut four = Backoff::default();

        assert_eq!(probes_until_raise(&mut one, 1), 10);
        assert_eq!(probes_until_raise(&mut two, 2), 20);
        assert_eq!(probes_until_raise(&mut four, 4), 40);
    }

    #[test]
    fn test_zero_waiters_treated_as_one() {
        let mut backoff = Backoff::default();
        assert_eq!(probes_until_raise(&mut backoff, 0), 10);
    }

    #[test]
    fn test_interval_monotonic_and_capped() {
        let mut backoff = Backoff::default();
        let mut last = backoff.state().current_interval_secs;

        for _ in 0..5_000 {
            backoff.progress(3);
            let now = backoff.state().current_interval_secs;
            assert!(now >= last);
            assert!(now <= policy::MAX_INTERVAL_SECS);
            last = now;
        }

        assert_eq!(last, policy::MAX_INTERVAL_SECS);
        assert_eq!(backoff.progress(3), BackoffStep::Saturated);
    }

    #[test]
    fn test_increment_capped_at_max() {
        let mut backoff = Backoff::new(BackoffPolicy {
            initial_interval_secs: 598,
            increment_secs: 5,
            patience: 1,
            max_interval_secs: 600,
        });

        assert_eq!(backoff.progress(1), BackoffStep::Raised { from: 598, to: 600 });
        assert_eq!(backoff.progress(1), BackoffStep::Saturated);
        assert_eq!(backoff.state().current_interval_secs, 600);
    }

    #[test]
    fn test_initial_interval_clamped_to_max() {
        let backoff = Backoff::new(BackoffPolicy {
            initial_interval_secs: 900,
            ..BackoffPolicy::default()
        });
        assert_eq!(backoff.state().current_interval_secs, 600);
        assert_eq!(backoff.policy().initial_interval_secs, 900);
    }
}

//! Poll delay policy.
//!
//! Three distinct delay classes, not one interval: the "active" interval
//! after a poll that returned entries, a capped exponential idle ramp after
//! empty polls, and a jittered exponential backoff after failures. A hard
//! minimum inter-request gap floors all of them.

use std::time::Duration;

use rand::Rng;

/// Configuration for poll delays.
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// Delay after a poll that returned entries.
    pub active_interval: Duration,
    /// First delay of the idle ramp.
    pub min_idle: Duration,
    /// Cap of the idle ramp.
    pub max_idle: Duration,
    /// Idle ramp multiplier.
    pub idle_multiplier: f64,
    /// Base delay of the failure backoff.
    pub failure_base: Duration,
    /// Cap of the failure backoff, before jitter.
    pub failure_max: Duration,
    /// Proportional jitter added to failure delays (0.25 = up to +25%).
    pub failure_jitter: f64,
    /// Hard floor between consecutive requests, across every branch.
    pub min_request_gap: Duration,
    /// Consecutive failures before the connection is reported lost.
    pub disconnect_threshold: u32,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            active_interval: Duration::from_millis(1000),
            min_idle: Duration::from_millis(3000),
            max_idle: Duration::from_millis(15000),
            idle_multiplier: 1.5,
            failure_base: Duration::from_millis(1000),
            failure_max: Duration::from_millis(30000),
            failure_jitter: 0.25,
            min_request_gap: Duration::from_millis(500),
            disconnect_threshold: 3,
        }
    }
}

/// Edge-triggered connection state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEdge {
    /// The failure threshold was just crossed. Reported once, not on
    /// every subsequent failure.
    Disconnected,
    /// A poll succeeded after having been disconnected. Reported once.
    Reconnected,
}

/// Pure delay state machine. Holds the idle and failure counters; the
/// caller performs the actual sleeping.
#[derive(Debug)]
pub struct BackoffPolicy {
    config: BackoffConfig,
    idle_count: u32,
    failure_count: u32,
    disconnected: bool,
}

impl BackoffPolicy {
    /// Creates a policy with fresh counters.
    #[must_use]
    pub const fn new(config: BackoffConfig) -> Self {
        Self {
            config,
            idle_count: 0,
            failure_count: 0,
            disconnected: false,
        }
    }

    /// The configuration this policy was built with.
    #[must_use]
    pub const fn config(&self) -> &BackoffConfig {
        &self.config
    }

    /// Whether the failure threshold is currently crossed.
    #[must_use]
    pub const fn is_disconnected(&self) -> bool {
        self.disconnected
    }

    /// A poll returned entries: reset both counters, delay is the active
    /// interval.
    pub fn on_entries(&mut self) -> (Duration, Option<ConnectionEdge>) {
        self.idle_count = 0;
        let edge = self.mark_connected();
        (self.floored(self.config.active_interval), edge)
    }

    /// A poll returned nothing: advance the idle ramp.
    pub fn on_empty(&mut self) -> (Duration, Option<ConnectionEdge>) {
        self.idle_count = self.idle_count.saturating_add(1);
        let edge = self.mark_connected();
        (self.floored(self.idle_delay()), edge)
    }

    /// A poll failed: advance the failure backoff. Crossing the threshold
    /// reports `Disconnected` exactly once.
    pub fn on_failure(&mut self) -> (Duration, Option<ConnectionEdge>) {
        self.failure_count = self.failure_count.saturating_add(1);
        let edge = if self.failure_count > self.config.disconnect_threshold && !self.disconnected {
            self.disconnected = true;
            Some(ConnectionEdge::Disconnected)
        } else {
            None
        };
        (self.floored(self.failure_delay()), edge)
    }

    fn mark_connected(&mut self) -> Option<ConnectionEdge> {
        self.failure_count = 0;
        if self.disconnected {
            self.disconnected = false;
            Some(ConnectionEdge::Reconnected)
        } else {
            None
        }
    }

    /// `min(max_idle, min_idle * multiplier^(n-1))` for the n-th
    /// consecutive empty poll.
    fn idle_delay(&self) -> Duration {
        let factor = self
            .config
            .idle_multiplier
            .powi(self.idle_count.saturating_sub(1) as i32);
        let millis = (self.config.min_idle.as_millis() as f64 * factor) as u64;
        Duration::from_millis(millis).min(self.config.max_idle)
    }

    fn failure_delay(&self) -> Duration {
        let factor = 2f64.powi(self.failure_count.saturating_sub(1) as i32);
        let base = (self.config.failure_base.as_millis() as f64 * factor) as u64;
        let capped = Duration::from_millis(base).min(self.config.failure_max);

        let jitter = rand::thread_rng().gen_range(0.0..=self.config.failure_jitter);
        capped.mul_f64(1.0 + jitter)
    }

    fn floored(&self, delay: Duration) -> Duration {
        delay.max(self.config.min_request_gap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> BackoffPolicy {
        BackoffPolicy::new(BackoffConfig::default())
    }

    #[test]
    fn idle_ramp_matches_expected_sequence() {
        let mut policy = policy();

        let delays: Vec<u64> = (0..5)
            .map(|_| policy.on_empty().0.as_millis() as u64)
            .collect();
        assert_eq!(delays, vec![3000, 4500, 6750, 10125, 15000]);

        // Stays capped
        assert_eq!(policy.on_empty().0, Duration::from_millis(15000));
    }

    #[test]
    fn entries_reset_the_idle_ramp() {
        let mut policy = policy();
        for _ in 0..4 {
            policy.on_empty();
        }

        let (delay, edge) = policy.on_entries();
        assert_eq!(delay, Duration::from_millis(1000));
        assert!(edge.is_none());

        // Ramp restarts from the minimum
        assert_eq!(policy.on_empty().0, Duration::from_millis(3000));
    }

    #[test]
    fn idle_ramp_is_monotonic_non_decreasing() {
        let mut policy = policy();
        let mut last = Duration::ZERO;
        for _ in 0..20 {
            let (delay, _) = policy.on_empty();
            assert!(delay >= last);
            assert!(delay <= Duration::from_millis(15000));
            last = delay;
        }
    }

    #[test]
    fn disconnected_is_edge_triggered() {
        let mut policy = policy();

        for _ in 0..3 {
            let (_, edge) = policy.on_failure();
            assert!(edge.is_none());
        }

        let (_, edge) = policy.on_failure();
        assert_eq!(edge, Some(ConnectionEdge::Disconnected));
        assert!(policy.is_disconnected());

        // Further failures stay silent
        let (_, edge) = policy.on_failure();
        assert!(edge.is_none());

        // Recovery reports once, via either success shape
        let (_, edge) = policy.on_empty();
        assert_eq!(edge, Some(ConnectionEdge::Reconnected));
        assert!(!policy.is_disconnected());
        let (_, edge) = policy.on_empty();
        assert!(edge.is_none());
    }

    #[test]
    fn success_resets_failure_counter() {
        let mut policy = policy();
        policy.on_failure();
        policy.on_failure();
        policy.on_entries();

        // Threshold counts from zero again
        for _ in 0..3 {
            let (_, edge) = policy.on_failure();
            assert!(edge.is_none());
        }
        assert_eq!(policy.on_failure().1, Some(ConnectionEdge::Disconnected));
    }

    #[test]
    fn failure_delay_grows_within_jitter_bounds() {
        let mut policy = policy();

        for expected_base in [1000u64, 2000, 4000, 8000] {
            let (delay, _) = policy.on_failure();
            let millis = delay.as_millis() as u64;
            assert!(millis >= expected_base, "got {millis} < {expected_base}");
            assert!(
                millis <= expected_base + expected_base / 4,
                "got {millis} above jitter bound for {expected_base}"
            );
        }
    }

    #[test]
    fn failure_delay_caps_before_jitter() {
        let mut policy = policy();
        for _ in 0..20 {
            policy.on_failure();
        }
        let (delay, _) = policy.on_failure();
        // 30s cap plus at most 25% jitter
        assert!(delay <= Duration::from_millis(37500));
    }

    #[test]
    fn every_branch_honors_the_request_gap_floor() {
        let config = BackoffConfig {
            active_interval: Duration::from_millis(1),
            min_idle: Duration::from_millis(1),
            failure_base: Duration::from_millis(1),
            min_request_gap: Duration::from_millis(500),
            ..Default::default()
        };
        let mut policy = BackoffPolicy::new(config);

        assert!(policy.on_entries().0 >= Duration::from_millis(500));
        assert!(policy.on_empty().0 >= Duration::from_millis(500));
        assert!(policy.on_failure().0 >= Duration::from_millis(500));
    }
}

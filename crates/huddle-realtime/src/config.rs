//! Socket and backoff configuration.

use std::time::Duration;

/// Reconnect backoff parameters.
///
/// Delays grow exponentially per consecutive failure and are capped at
/// `max`. Retries are unbounded by default; set `max_attempts` to give
/// up after that many consecutive failures.
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// Delay after the first failure.
    pub initial: Duration,
    /// Upper bound on the computed delay.
    pub max: Duration,
    /// Growth factor per additional failure.
    pub multiplier: f64,
    /// Consecutive failures tolerated before giving up; `None` retries
    /// forever.
    pub max_attempts: Option<u32>,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(32),
            multiplier: 2.0,
            max_attempts: None,
        }
    }
}

impl BackoffConfig {
    /// Builder: set initial delay, cap, and multiplier.
    pub fn with_curve(mut self, initial: Duration, max: Duration, multiplier: f64) -> Self {
        self.initial = initial;
        self.max = max;
        self.multiplier = multiplier;
        self
    }

    /// Builder: cap the number of consecutive failed attempts.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Delay to wait after `consecutive_failures` failures.
    pub fn delay(&self, consecutive_failures: u32) -> Duration {
        if consecutive_failures == 0 {
            return Duration::ZERO;
        }

        let base = self.initial.as_secs_f64();
        let multiplier = self.multiplier.powi(consecutive_failures as i32 - 1);
        let delay = base * multiplier;
        let max = self.max.as_secs_f64();

        Duration::from_secs_f64(delay.min(max))
    }

    /// Returns true if `consecutive_failures` has reached the cap.
    pub fn is_exhausted(&self, consecutive_failures: u32) -> bool {
        self.max_attempts
            .is_some_and(|max| consecutive_failures >= max)
    }
}

/// Configuration for the real-time socket client.
#[derive(Debug, Clone)]
pub struct SocketConfig {
    /// Interval between liveness pings while connected.
    pub ping_interval: Duration,

    /// How long to wait for the pong after a ping before declaring the
    /// connection dead.
    pub pong_timeout: Duration,

    /// How long `close()` waits for the peer's close frame before
    /// forcibly discarding the socket.
    pub force_close_delay: Duration,

    /// Deadline for the WebSocket handshake during `connect()`.
    pub handshake_timeout: Duration,

    /// Namespace for multiplexed channels. When set, only inbound
    /// events under this prefix are dispatched, with the prefix
    /// stripped from the event type.
    pub binding_prefix: Option<String>,

    /// Opaque credential sent in the auth frame on every open. Never
    /// inspected or refreshed here.
    pub auth_token: String,

    /// Reconnect backoff policy.
    pub backoff: BackoffConfig,
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_millis(15000),
            pong_timeout: Duration::from_millis(14000),
            force_close_delay: Duration::from_millis(2000),
            handshake_timeout: Duration::from_secs(10),
            binding_prefix: None,
            auth_token: String::new(),
            backoff: BackoffConfig::default(),
        }
    }
}

impl SocketConfig {
    /// Creates a configuration with default timers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: set the ping interval.
    pub fn with_ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval;
        self
    }

    /// Builder: set the pong timeout.
    pub fn with_pong_timeout(mut self, timeout: Duration) -> Self {
        self.pong_timeout = timeout;
        self
    }

    /// Builder: set the force-close delay.
    pub fn with_force_close_delay(mut self, delay: Duration) -> Self {
        self.force_close_delay = delay;
        self
    }

    /// Builder: set the handshake timeout.
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Builder: set the binding prefix.
    pub fn with_binding_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.binding_prefix = Some(prefix.into());
        self
    }

    /// Builder: set the auth token.
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = token.into();
        self
    }

    /// Builder: set the backoff policy.
    pub fn with_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_timers() {
        let config = SocketConfig::default();
        assert_eq!(config.ping_interval, Duration::from_millis(15000));
        assert_eq!(config.pong_timeout, Duration::from_millis(14000));
        assert_eq!(config.force_close_delay, Duration::from_millis(2000));
        assert!(config.binding_prefix.is_none());
    }

    #[test]
    fn backoff_curve() {
        let backoff = BackoffConfig::default().with_curve(
            Duration::from_secs(5),
            Duration::from_secs(300),
            2.0,
        );

        assert_eq!(backoff.delay(0), Duration::ZERO);
        assert_eq!(backoff.delay(1), Duration::from_secs(5));
        assert_eq!(backoff.delay(2), Duration::from_secs(10));
        assert_eq!(backoff.delay(3), Duration::from_secs(20));

        // Capped at max.
        assert_eq!(backoff.delay(10), Duration::from_secs(300));
    }

    #[test]
    fn backoff_unbounded_by_default() {
        let backoff = BackoffConfig::default();
        assert!(!backoff.is_exhausted(1_000_000));
    }

    #[test]
    fn backoff_exhaustion_with_cap() {
        let backoff = BackoffConfig::default().with_max_attempts(3);
        assert!(!backoff.is_exhausted(2));
        assert!(backoff.is_exhausted(3));
        assert!(backoff.is_exhausted(4));
    }

    #[test]
    fn builder_methods() {
        let config = SocketConfig::new()
            .with_ping_interval(Duration::from_secs(5))
            .with_pong_timeout(Duration::from_secs(4))
            .with_force_close_delay(Duration::from_secs(1))
            .with_handshake_timeout(Duration::from_secs(3))
            .with_binding_prefix("board")
            .with_auth_token("token");

        assert_eq!(config.ping_interval, Duration::from_secs(5));
        assert_eq!(config.pong_timeout, Duration::from_secs(4));
        assert_eq!(config.force_close_delay, Duration::from_secs(1));
        assert_eq!(config.handshake_timeout, Duration::from_secs(3));
        assert_eq!(config.binding_prefix.as_deref(), Some("board"));
        assert_eq!(config.auth_token, "token");
    }
}

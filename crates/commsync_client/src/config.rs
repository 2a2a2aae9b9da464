//! Configuration for the sync client.

use std::time::Duration;

/// Configuration for ping scheduling.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Nominal time between pings.
    pub ping_frequency: Duration,
    /// A ping may start this long before it is nominally due.
    pub near_due_window: Duration,
    /// A ping older than `stuck_multiplier × ping_frequency` means the
    /// schedule has stalled and the in-flight counter is reset.
    pub stuck_multiplier: u32,
    /// Session rotation settings.
    pub session: SessionConfig,
    /// Cache pruning settings.
    pub prune: PruneConfig,
}

impl ClientConfig {
    /// Creates a configuration with the default schedule.
    pub fn new() -> Self {
        Self {
            ping_frequency: Duration::from_secs(3),
            near_due_window: Duration::from_millis(500),
            stuck_multiplier: 10,
            session: SessionConfig::default(),
            prune: PruneConfig::default(),
        }
    }

    /// Sets the ping frequency.
    pub fn with_ping_frequency(mut self, frequency: Duration) -> Self {
        self.ping_frequency = frequency;
        self
    }

    /// Sets the near-due window.
    pub fn with_near_due_window(mut self, window: Duration) -> Self {
        self.near_due_window = window;
        self
    }

    /// Sets the stuck multiplier.
    pub fn with_stuck_multiplier(mut self, multiplier: u32) -> Self {
        self.stuck_multiplier = multiplier;
        self
    }

    /// Sets the session configuration.
    pub fn with_session(mut self, session: SessionConfig) -> Self {
        self.session = session;
        self
    }

    /// Sets the pruning configuration.
    pub fn with_prune(mut self, prune: PruneConfig) -> Self {
        self.prune = prune;
        self
    }

    /// Returns the watchdog threshold, `stuck_multiplier × ping_frequency`.
    pub fn stuck_after(&self) -> Duration {
        self.ping_frequency * self.stuck_multiplier
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for idle session rotation.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// A logged-out session expires after this much inactivity.
    pub inactivity_limit: Duration,
    /// Extra delay added after the expected expiry before rechecking.
    pub rotation_slack: Duration,
}

impl SessionConfig {
    /// Creates a configuration with the default limits.
    pub fn new() -> Self {
        Self {
            inactivity_limit: Duration::from_secs(15 * 60),
            rotation_slack: Duration::from_millis(10),
        }
    }

    /// Sets the inactivity limit.
    pub fn with_inactivity_limit(mut self, limit: Duration) -> Self {
        self.inactivity_limit = limit;
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for message cache pruning.
#[derive(Debug, Clone)]
pub struct PruneConfig {
    /// A thread is kept at least this long after it was last opened.
    pub navigation_grace: Duration,
    /// A thread is pruned at most once per this interval.
    pub prune_interval: Duration,
    /// Sweeps are never scheduled sooner than this.
    pub min_sweep_delay: Duration,
}

impl PruneConfig {
    /// Creates a configuration with the default intervals.
    pub fn new() -> Self {
        Self {
            navigation_grace: Duration::from_secs(60 * 60),
            prune_interval: Duration::from_secs(6 * 60 * 60),
            min_sweep_delay: Duration::from_secs(60),
        }
    }

    /// Sets the navigation grace period.
    pub fn with_navigation_grace(mut self, grace: Duration) -> Self {
        self.navigation_grace = grace;
        self
    }

    /// Sets the prune interval.
    pub fn with_prune_interval(mut self, interval: Duration) -> Self {
        self.prune_interval = interval;
        self
    }

    /// Sets the minimum sweep delay.
    pub fn with_min_sweep_delay(mut self, delay: Duration) -> Self {
        self.min_sweep_delay = delay;
        self
    }
}

impl Default for PruneConfig {
    fn default() -> Self {
        Self::new()
    }
}

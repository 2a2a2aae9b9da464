//! Ping scheduling decisions.

use crate::config::ClientConfig;
use commsync_protocol::Timestamp;
use std::time::Duration;
use tracing::debug;

/// Client-local ping bookkeeping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PingTimestamps {
    /// When the most recent ping started.
    pub last_started: Timestamp,
    /// When the most recent ping completed, successfully or not.
    pub last_completion: Timestamp,
    /// When the most recent ping succeeded.
    pub last_success: Timestamp,
}

/// What to do after deciding to fire a ping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FirePlan {
    /// Re-run the decision after each of these delays, regardless of how
    /// the ping ends. The second one lands just past the stuck threshold
    /// and recovers a schedule whose completion was lost.
    pub recheck_after: [Duration; 2],
}

/// Decides when to start a ping.
///
/// The in-flight counter is advisory: overlapping pings are allowed and
/// stay correct because the server's watermarks are monotonic.
///
/// All state lives in this struct. `reinitialize` returns it to the
/// freshly-constructed state; call it when the client is torn down and
/// rebuilt (login, logout, app restart).
#[derive(Debug, Clone)]
pub struct SyncCoordinator {
    frequency: u64,
    near_due_window: u64,
    stuck_after: u64,
    recheck_after: [Duration; 2],
    in_flight: u32,
    timestamps: PingTimestamps,
    visible: bool,
    logged_in: bool,
}

impl SyncCoordinator {
    /// Creates a coordinator that is hidden and logged out.
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            frequency: config.ping_frequency.as_millis() as u64,
            near_due_window: config.near_due_window.as_millis() as u64,
            stuck_after: config.stuck_after().as_millis() as u64,
            recheck_after: [
                config.ping_frequency,
                config.stuck_after() + Duration::from_millis(1),
            ],
            in_flight: 0,
            timestamps: PingTimestamps::default(),
            visible: false,
            logged_in: false,
        }
    }

    /// Returns the number of pings believed to be in flight.
    pub fn in_flight(&self) -> u32 {
        self.in_flight
    }

    /// Returns the ping timestamps.
    pub fn timestamps(&self) -> PingTimestamps {
        self.timestamps
    }

    /// Returns true if the app is visible.
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Returns true if the viewer is logged in.
    pub fn is_logged_in(&self) -> bool {
        self.logged_in
    }

    /// Decides whether to start a ping at `now`.
    ///
    /// Fires when nothing is in flight and the next ping is due within
    /// the near-due window, or when the last start is so old that the
    /// schedule must have stalled. The stall case resets the counter.
    pub fn should_fire(&mut self, now: Timestamp) -> bool {
        if !self.visible || !self.logged_in {
            return false;
        }
        let due = self.timestamps.last_started.saturating_add(self.frequency);
        let until_due = due as i128 - now as i128;
        if self.in_flight == 0 && until_due < self.near_due_window as i128 {
            return true;
        }
        let stalled = now
            .checked_sub(self.stuck_after)
            .is_some_and(|threshold| self.timestamps.last_started < threshold);
        if stalled {
            debug!(in_flight = self.in_flight, "ping schedule stalled, resetting");
            self.in_flight = 0;
            return true;
        }
        false
    }

    /// Records a ping starting at `now`.
    pub fn on_fire(&mut self, now: Timestamp) -> FirePlan {
        self.in_flight += 1;
        self.timestamps.last_started = now;
        FirePlan {
            recheck_after: self.recheck_after,
        }
    }

    /// Starts a ping if one should fire at `now`.
    pub fn try_fire(&mut self, now: Timestamp) -> Option<FirePlan> {
        self.should_fire(now).then(|| self.on_fire(now))
    }

    /// Records a ping completing at `now` and re-evaluates immediately.
    pub fn on_complete(&mut self, now: Timestamp, success: bool) -> Option<FirePlan> {
        self.in_flight = self.in_flight.saturating_sub(1);
        self.timestamps.last_completion = now;
        if success {
            self.timestamps.last_success = now;
        }
        self.try_fire(now)
    }

    /// Updates visibility. Regaining visibility re-evaluates immediately.
    pub fn set_visible(&mut self, visible: bool, now: Timestamp) -> Option<FirePlan> {
        let regained = visible && !self.visible;
        self.visible = visible;
        if regained {
            self.try_fire(now)
        } else {
            None
        }
    }

    /// Updates the login state. Logging in re-evaluates immediately.
    pub fn set_logged_in(&mut self, logged_in: bool, now: Timestamp) -> Option<FirePlan> {
        let gained = logged_in && !self.logged_in;
        self.logged_in = logged_in;
        if gained {
            self.try_fire(now)
        } else {
            None
        }
    }

    /// Clears the counter and timestamps. Visibility and login state are
    /// kept because they describe the app, not the schedule.
    pub fn reinitialize(&mut self) {
        self.in_flight = 0;
        self.timestamps = PingTimestamps::default();
    }
}

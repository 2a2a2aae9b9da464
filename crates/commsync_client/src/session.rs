//! Idle session rotation for logged-out clients.

use crate::config::SessionConfig;
use commsync_protocol::{SessionId, Timestamp};
use std::time::Duration;
use uuid::Uuid;

/// Outcome of a session check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCheck {
    /// The app is visible or the viewer is logged in; nothing to do and
    /// no further check is needed until that changes.
    Inactive,
    /// The session had expired and was replaced.
    Rotated {
        /// The new session id.
        session_id: SessionId,
        /// When to check again.
        next_check_in: Duration,
    },
    /// The session is still live.
    Waiting {
        /// When to check again: just after the session would expire.
        next_check_in: Duration,
    },
}

impl SessionCheck {
    /// Returns the delay until the next check, if one is needed.
    pub fn next_check_in(&self) -> Option<Duration> {
        match self {
            SessionCheck::Inactive => None,
            SessionCheck::Rotated { next_check_in, .. }
            | SessionCheck::Waiting { next_check_in } => Some(*next_check_in),
        }
    }
}

/// Tracks the session id of a logged-out client and replaces it once it
/// has been idle for longer than the inactivity limit.
///
/// Checks only run while the app is hidden and logged out. Each check
/// schedules the next one, so a stale identity never outlives the limit
/// by more than the slack, without polling.
#[derive(Debug, Clone)]
pub struct SessionLifecycle {
    config: SessionConfig,
    session_id: SessionId,
    last_activity: Timestamp,
}

impl SessionLifecycle {
    /// Starts tracking `session_id`, last active at `now`.
    pub fn new(config: SessionConfig, session_id: SessionId, now: Timestamp) -> Self {
        Self {
            config,
            session_id,
            last_activity: now,
        }
    }

    /// Returns a fresh random session id.
    pub fn generate_id() -> SessionId {
        SessionId::new(Uuid::new_v4().to_string())
    }

    /// Returns the current session id.
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Records activity on the current session.
    pub fn record_activity(&mut self, now: Timestamp) {
        self.last_activity = self.last_activity.max(now);
    }

    /// Replaces the session, e.g. after a login or logout.
    pub fn reset(&mut self, session_id: SessionId, now: Timestamp) {
        self.session_id = session_id;
        self.last_activity = now;
    }

    /// Returns how long until the current session expires.
    pub fn time_left(&self, now: Timestamp) -> Duration {
        let limit = self.config.inactivity_limit.as_millis() as u64;
        Duration::from_millis(self.last_activity.saturating_add(limit).saturating_sub(now))
    }

    /// Returns a replacement id if the current session has expired.
    pub fn next_session_id(&self, now: Timestamp) -> Option<SessionId> {
        self.time_left(now).is_zero().then(Self::generate_id)
    }

    /// Runs one check at `now`.
    pub fn check(&mut self, now: Timestamp, visible: bool, logged_in: bool) -> SessionCheck {
        if visible || logged_in {
            return SessionCheck::Inactive;
        }
        match self.next_session_id(now) {
            Some(session_id) => {
                self.reset(session_id.clone(), now);
                SessionCheck::Rotated {
                    session_id,
                    next_check_in: self.config.inactivity_limit,
                }
            }
            None => SessionCheck::Waiting {
                next_check_in: self.time_left(now) + self.config.rotation_slack,
            },
        }
    }
}

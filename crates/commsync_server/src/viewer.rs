//! The identity a ping is answered for.

use commsync_protocol::{Platform, SessionId, UserId};
use std::fmt;

/// A session as seen by the responder: who is asking, and what the
/// server already knows about their device.
#[derive(Clone, PartialEq, Eq)]
pub struct Viewer {
    /// Session handle.
    pub session_id: SessionId,
    /// Authenticated user, or `None` for a logged-out session.
    pub user_id: Option<UserId>,
    /// Platform recorded for this session.
    pub platform: Option<Platform>,
    /// Push token recorded for this session.
    pub device_token: Option<String>,
}

impl Viewer {
    /// Creates a logged-out viewer with nothing recorded.
    pub fn anonymous(session_id: impl Into<SessionId>) -> Self {
        Self {
            session_id: session_id.into(),
            user_id: None,
            platform: None,
            device_token: None,
        }
    }

    /// Creates a logged-in viewer with nothing recorded.
    pub fn logged_in(session_id: impl Into<SessionId>, user_id: impl Into<UserId>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            ..Self::anonymous(session_id)
        }
    }

    /// Sets the recorded platform.
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = Some(platform);
        self
    }

    /// Sets the recorded push token.
    pub fn with_device_token(mut self, token: impl Into<String>) -> Self {
        self.device_token = Some(token.into());
        self
    }

    /// Returns true if the session is authenticated.
    pub fn is_logged_in(&self) -> bool {
        self.user_id.is_some()
    }
}

impl fmt::Debug for Viewer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Viewer")
            .field("session_id", &self.session_id)
            .field("user_id", &self.user_id)
            .field("platform", &self.platform)
            .field(
                "device_token",
                &self.device_token.as_ref().map(|_| commsync_schema::REDACTED),
            )
            .finish()
    }
}

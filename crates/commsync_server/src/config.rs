//! Server configuration.

use commsync_protocol::{DEFAULT_MESSAGES_PER_THREAD, HOME_NAV_ID};

/// Configuration for the ping responder.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Size of the message window returned per thread.
    pub messages_per_thread: usize,
    /// Maximum number of watched thread ids accepted in one request.
    pub max_watched_ids: usize,
    /// Navigation id that is always valid.
    pub home_nav_id: String,
}

impl ServerConfig {
    /// Creates a configuration with default limits.
    pub fn new() -> Self {
        Self {
            messages_per_thread: DEFAULT_MESSAGES_PER_THREAD,
            max_watched_ids: 1000,
            home_nav_id: HOME_NAV_ID.to_string(),
        }
    }

    /// Sets the per-thread message window.
    pub fn with_messages_per_thread(mut self, count: usize) -> Self {
        self.messages_per_thread = count;
        self
    }

    /// Sets the watched-id cap.
    pub fn with_max_watched_ids(mut self, max: usize) -> Self {
        self.max_watched_ids = max;
        self
    }

    /// Sets the home navigation id.
    pub fn with_home_nav_id(mut self, nav_id: impl Into<String>) -> Self {
        self.home_nav_id = nav_id.into();
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new()
    }
}

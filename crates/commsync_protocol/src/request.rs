//! Server request / client response negotiation pair.
//!
//! The server piggybacks small asks on a ping response (`ServerRequest`);
//! the client answers them on a later ping (`ClientResponse`). Each answer
//! maps back to exactly one request variant via `ClientResponse::request`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Client operating system / app type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// iOS app.
    Ios,
    /// Android app.
    Android,
    /// Web client.
    Web,
}

/// Platforms that receive push notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    /// Apple push.
    Ios,
    /// Firebase push.
    Android,
}

impl Platform {
    /// Returns the push device type, if this platform has one.
    pub fn device_type(self) -> Option<DeviceType> {
        match self {
            Platform::Ios => Some(DeviceType::Ios),
            Platform::Android => Some(DeviceType::Android),
            Platform::Web => None,
        }
    }

    /// Returns true for platforms that receive push notifications.
    pub fn is_device(self) -> bool {
        self.device_type().is_some()
    }

    /// Returns the wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Ios => "ios",
            Platform::Android => "android",
            Platform::Web => "web",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Something the server asks the client to supply on a later ping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerRequest {
    /// Tell the server which platform this session runs on.
    #[serde(rename = "PLATFORM")]
    Platform,
    /// Tell the server this device's push-notification token.
    #[serde(rename = "DEVICE_TOKEN")]
    DeviceToken,
}

/// The client's answer to a `ServerRequest`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientResponse {
    /// Answer to `ServerRequest::Platform`.
    #[serde(rename = "PLATFORM")]
    Platform {
        /// The client platform.
        platform: Platform,
    },
    /// Answer to `ServerRequest::DeviceToken`.
    #[serde(rename = "DEVICE_TOKEN")]
    DeviceToken {
        /// Push-notification token.
        #[serde(rename = "deviceToken")]
        device_token: String,
    },
}

impl ClientResponse {
    /// Returns the request variant this response answers.
    pub fn request(&self) -> ServerRequest {
        match self {
            ClientResponse::Platform { .. } => ServerRequest::Platform,
            ClientResponse::DeviceToken { .. } => ServerRequest::DeviceToken,
        }
    }
}

// Push tokens must not end up in logs.
impl fmt::Debug for ClientResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientResponse::Platform { platform } => f
                .debug_struct("Platform")
                .field("platform", platform)
                .finish(),
            ClientResponse::DeviceToken { .. } => f
                .debug_struct("DeviceToken")
                .field("device_token", &commsync_schema::REDACTED)
                .finish(),
        }
    }
}
